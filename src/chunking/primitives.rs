//! Shared splitting primitives.
//!
//! Everything here is fence-aware: lines inside ``` / ~~~ blocks are never
//! treated as headers and never become cut points. The size-bounded
//! splitter keeps code blocks whole where possible, explodes pathological
//! ones fence-preserving, and cuts prose at the best available boundary.

use std::sync::OnceLock;

use regex::Regex;

use crate::text::find_char_boundary;

/// Code blocks up to this multiple of the chunk size may join the current
/// accumulator instead of forcing a flush.
pub const CODE_JOIN_FACTOR: f64 = 1.5;

/// Code blocks beyond this multiple of the chunk size are exploded.
pub const CODE_EXPLODE_FACTOR: f64 = 3.0;

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
        Regex::new(r"^(#{1,6})\s+(.*)$").unwrap()
    })
}

/// A section produced by [`split_by_headers`]. When `header` is present it
/// is also the first line of `text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// The full header line (e.g. `## Methods`), if the section has one.
    pub header: Option<String>,
    /// Section text, header line included.
    pub text: String,
}

impl Section {
    /// Header text without the leading `#` marks, if any.
    #[must_use]
    pub fn title(&self) -> Option<String> {
        self.header.as_deref().map(header_title)
    }
}

/// Strips the ATX marks and surrounding whitespace off a header line.
#[must_use]
pub fn header_title(line: &str) -> String {
    line.trim_start()
        .trim_start_matches('#')
        .trim()
        .to_string()
}

fn is_fence(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("```") || trimmed.starts_with("~~~")
}

fn header_level(line: &str) -> Option<usize> {
    header_re().captures(line).map(|caps| caps[1].len())
}

/// Splits at ATX headers whose level falls in `[min_level, max_level]`,
/// keeping each header line as the first line of its section. Text before
/// the first matching header becomes a headerless section. Header-like
/// lines inside code fences are ignored.
#[must_use]
pub fn split_by_headers(content: &str, min_level: usize, max_level: usize) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut current_header: Option<String> = None;
    let mut current_lines: Vec<&str> = Vec::new();
    let mut in_fence = false;

    let flush =
        |sections: &mut Vec<Section>, header: Option<String>, lines: &mut Vec<&str>| {
            if !lines.is_empty() {
                sections.push(Section {
                    header,
                    text: lines.join("\n"),
                });
                lines.clear();
            }
        };

    for line in content.lines() {
        if is_fence(line) {
            in_fence = !in_fence;
            current_lines.push(line);
            continue;
        }
        if !in_fence
            && let Some(level) = header_level(line)
            && level >= min_level
            && level <= max_level
        {
            flush(&mut sections, current_header.take(), &mut current_lines);
            current_header = Some(line.to_string());
        }
        current_lines.push(line);
    }
    flush(&mut sections, current_header, &mut current_lines);
    sections
}

/// Walks the headers of a document and emits an indented outline: two
/// spaces of indent per level beyond 1. Fenced lines are skipped.
#[must_use]
pub fn extract_toc(content: &str) -> String {
    let mut lines = Vec::new();
    let mut in_fence = false;
    for line in content.lines() {
        if is_fence(line) {
            in_fence = !in_fence;
            continue;
        }
        if !in_fence && let Some(level) = header_level(line) {
            let indent = "  ".repeat(level - 1);
            lines.push(format!("{indent}{}", header_title(line)));
        }
    }
    lines.join("\n")
}

/// A run of text or one whole fenced code block.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Code(String),
}

/// Splits text into alternating prose and fenced-code segments. An
/// unterminated fence extends to the end of the input.
fn split_fenced(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut buffer: Vec<&str> = Vec::new();
    let mut in_fence = false;

    for line in text.lines() {
        if is_fence(line) {
            if in_fence {
                buffer.push(line);
                segments.push(Segment::Code(buffer.join("\n")));
                buffer.clear();
                in_fence = false;
            } else {
                if !buffer.is_empty() {
                    segments.push(Segment::Text(buffer.join("\n")));
                    buffer.clear();
                }
                buffer.push(line);
                in_fence = true;
            }
        } else {
            buffer.push(line);
        }
    }
    if !buffer.is_empty() {
        let joined = buffer.join("\n");
        segments.push(if in_fence {
            Segment::Code(joined)
        } else {
            Segment::Text(joined)
        });
    }
    segments
}

/// Finds the byte position to cut `text` at, within `budget` bytes.
///
/// Searches backwards through the break priority list: paragraph break,
/// newline, `。`, then `.` followed by whitespace or end-of-string (so
/// URL dots are skipped). A break is accepted only past half the budget;
/// otherwise a hard cut at the budget is taken.
fn find_break(text: &str, budget: usize) -> usize {
    let limit = find_char_boundary(text, budget);
    let window = &text[..limit];
    let half = budget / 2;

    if let Some(pos) = window.rfind("\n\n") {
        let cut = pos + 2;
        if cut > half {
            return cut;
        }
    }
    if let Some(pos) = window.rfind('\n') {
        let cut = pos + 1;
        if cut > half {
            return cut;
        }
    }
    if let Some(pos) = window.rfind('。') {
        let cut = pos + '。'.len_utf8();
        if cut > half {
            return cut;
        }
    }
    for (i, c) in window.char_indices().rev() {
        if c != '.' {
            continue;
        }
        let after = i + 1;
        // A sentence period: followed by whitespace or the very end of the
        // input. Dots inside URLs and identifiers fail this test.
        let is_sentence_end = match text[after..].chars().next() {
            None => true,
            Some(next) => next.is_whitespace(),
        };
        if is_sentence_end && after > half {
            return after;
        }
        if after <= half {
            break;
        }
    }

    if limit == 0 {
        // Budget smaller than the first character; emit that character whole.
        text.chars().next().map_or(text.len(), char::len_utf8)
    } else {
        limit
    }
}

/// Cuts prose into pieces of at most `chunk_size` bytes at the best
/// available break points.
fn cut_text(text: &str, chunk_size: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut rest = text;
    while rest.len() > chunk_size {
        let cut = find_break(rest, chunk_size);
        pieces.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }
    if !rest.is_empty() {
        pieces.push(rest.to_string());
    }
    pieces
}

/// Size-bounded splitting that never cuts inside a fenced code block.
///
/// Code segments join the current accumulator when the result stays
/// within `chunk_size ×` [`CODE_JOIN_FACTOR`]; otherwise the accumulator
/// is flushed. Code blocks beyond `chunk_size ×` [`CODE_EXPLODE_FACTOR`]
/// are exploded by [`split_code_block`]; anything between stays whole as
/// its own chunk.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn split_protected(text: &str, chunk_size: usize) -> Vec<String> {
    let join_limit = (chunk_size as f64 * CODE_JOIN_FACTOR) as usize;
    let explode_limit = (chunk_size as f64 * CODE_EXPLODE_FACTOR) as usize;

    let mut out: Vec<String> = Vec::new();
    let mut acc = String::new();

    let flush = |out: &mut Vec<String>, acc: &mut String| {
        if !acc.trim().is_empty() {
            out.push(std::mem::take(acc));
        } else {
            acc.clear();
        }
    };

    for segment in split_fenced(text) {
        match segment {
            Segment::Code(block) => {
                if !acc.is_empty() && acc.len() + block.len() + 1 <= join_limit {
                    acc.push('\n');
                    acc.push_str(&block);
                } else if block.len() > explode_limit {
                    flush(&mut out, &mut acc);
                    out.extend(split_code_block(&block, chunk_size));
                } else if block.len() > chunk_size {
                    flush(&mut out, &mut acc);
                    out.push(block);
                } else {
                    flush(&mut out, &mut acc);
                    acc = block;
                }
            }
            Segment::Text(run) => {
                for piece in cut_text(&run, chunk_size) {
                    if acc.is_empty() {
                        acc = piece;
                    } else if acc.len() + piece.len() + 1 <= chunk_size {
                        acc.push('\n');
                        acc.push_str(&piece);
                    } else {
                        flush(&mut out, &mut acc);
                        acc = piece;
                    }
                }
            }
        }
    }
    flush(&mut out, &mut acc);
    out
}

/// Explodes an oversize fenced code block, preserving the fence on every
/// emitted piece.
///
/// Splits by blank lines first; when that yields a single piece, by
/// single newlines. A line exceeding the per-chunk budget is itself
/// hard-sliced at the budget (base64 blobs and minified bundles).
#[must_use]
pub fn split_code_block(block: &str, chunk_size: usize) -> Vec<String> {
    let mut lines = block.lines();
    let Some(open) = lines.next() else {
        return Vec::new();
    };
    let mut body_lines: Vec<&str> = lines.collect();
    let close = if body_lines.last().is_some_and(|l| is_fence(l)) {
        body_lines.pop().unwrap_or("```")
    } else {
        "```"
    };
    let body = body_lines.join("\n");

    // Fence overhead: open line, close line, and their newlines.
    let overhead = open.len() + close.len() + 2;
    let budget = chunk_size.saturating_sub(overhead).max(1);

    let by_blank: Vec<&str> = body.split("\n\n").collect();
    let (parts, separator): (Vec<&str>, &str) = if by_blank.len() > 1 {
        (by_blank, "\n\n")
    } else {
        (body.lines().collect(), "\n")
    };

    // Hard-slice any single part that alone exceeds the budget.
    let mut units: Vec<String> = Vec::new();
    for part in parts {
        if part.len() <= budget {
            units.push(part.to_string());
        } else {
            let mut rest = part;
            while rest.len() > budget {
                let mut cut = find_char_boundary(rest, budget);
                if cut == 0 {
                    cut = rest.chars().next().map_or(rest.len(), char::len_utf8);
                }
                units.push(rest[..cut].to_string());
                rest = &rest[cut..];
            }
            if !rest.is_empty() {
                units.push(rest.to_string());
            }
        }
    }

    let mut pieces = Vec::new();
    let mut acc = String::new();
    for unit in units {
        if !acc.is_empty() && acc.len() + separator.len() + unit.len() > budget {
            pieces.push(format!("{open}\n{acc}\n{close}"));
            acc.clear();
        }
        if !acc.is_empty() {
            acc.push_str(separator);
        }
        acc.push_str(&unit);
    }
    if !acc.is_empty() {
        pieces.push(format!("{open}\n{acc}\n{close}"));
    }
    pieces
}
