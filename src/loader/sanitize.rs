//! HTML residue cleanup for exported Markdown.
//!
//! Product corpora are exported from HTML-backed tooling and arrive with
//! span wrappers, inline styling, and Word-export attributes embedded in
//! otherwise plain Markdown. Fenced code blocks are stashed before any
//! rewriting and restored verbatim afterwards, so sanitization can never
//! corrupt sample code.

use std::sync::OnceLock;

use regex::Regex;

/// Nesting depth to which `<span>` wrappers are collapsed.
const SPAN_COLLAPSE_DEPTH: usize = 5;

/// Placeholder delimiter for stashed code blocks. Private-use characters
/// cannot occur in valid corpus text.
const STASH_MARK: char = '\u{F8FF}';

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
        Regex::new(r"(?s)```.*?```").unwrap()
    })
}

fn regex(pattern: &'static str, cell: &'static OnceLock<Regex>) -> &'static Regex {
    cell.get_or_init(|| {
        #[allow(clippy::unwrap_used)] // patterns are compile-time constants
        Regex::new(pattern).unwrap()
    })
}

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            regex($pattern, &RE)
        }
    };
}

static_regex!(span_pair_re, r"(?s)<span[^>]*>([^<]*)</span>");
static_regex!(empty_span_re, r"<span[^>]*>\s*</span>");
static_regex!(span_tag_re, r"</?span[^>]*>");
static_regex!(br_re, r"<br\s*/?>");
static_regex!(style_attr_re, r#"\s*style="[^"]*""#);
static_regex!(class_attr_re, r#"\s*class="[^"]*""#);
static_regex!(ccp_props_re, r#"\s*data-ccp-props="[^"]*""#);
static_regex!(newline_runs_re, r"\n{3,}");
static_regex!(space_runs_re, r" {2,}");

/// Cleans HTML residue out of exported Markdown.
///
/// Fenced code blocks pass through untouched; everything else has span
/// wrappers collapsed, `<br>` converted to newlines, inline `style=`,
/// `class=`, and `data-ccp-props` attributes dropped, and whitespace runs
/// normalized (three or more newlines to two, two or more spaces to one).
#[must_use]
pub fn sanitize(content: &str) -> String {
    let (stashed, blocks) = stash_code_blocks(content);

    let mut text = stashed;
    // Innermost spans first, up to the collapse depth.
    for _ in 0..SPAN_COLLAPSE_DEPTH {
        if !span_pair_re().is_match(&text) {
            break;
        }
        text = span_pair_re().replace_all(&text, "$1").into_owned();
    }
    text = empty_span_re().replace_all(&text, "").into_owned();
    text = span_tag_re().replace_all(&text, "").into_owned();
    text = br_re().replace_all(&text, "\n").into_owned();
    text = style_attr_re().replace_all(&text, "").into_owned();
    text = class_attr_re().replace_all(&text, "").into_owned();
    text = ccp_props_re().replace_all(&text, "").into_owned();
    text = newline_runs_re().replace_all(&text, "\n\n").into_owned();
    text = space_runs_re().replace_all(&text, " ").into_owned();

    restore_code_blocks(&text, &blocks)
}

fn stash_code_blocks(content: &str) -> (String, Vec<String>) {
    let mut blocks = Vec::new();
    let stashed = fence_re()
        .replace_all(content, |caps: &regex::Captures<'_>| {
            let index = blocks.len();
            blocks.push(caps[0].to_string());
            format!("{STASH_MARK}{index}{STASH_MARK}")
        })
        .into_owned();
    (stashed, blocks)
}

fn restore_code_blocks(text: &str, blocks: &[String]) -> String {
    let mut restored = text.to_string();
    for (index, block) in blocks.iter().enumerate() {
        restored = restored.replace(&format!("{STASH_MARK}{index}{STASH_MARK}"), block);
    }
    restored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_spans_collapse() {
        let input = "<span a=\"1\"><span><span><span><span>deep</span></span></span></span></span>";
        assert_eq!(sanitize(input), "deep");
    }

    #[test]
    fn test_empty_and_orphan_spans_dropped() {
        assert_eq!(sanitize("a<span >  </span>b"), "a b");
        assert_eq!(sanitize("a<span data-x=\"y\">b"), "ab");
        assert_eq!(sanitize("a</span>b"), "ab");
    }

    #[test]
    fn test_br_becomes_newline() {
        assert_eq!(sanitize("line one<br>line two<br/>line three"), "line one\nline two\nline three");
    }

    #[test]
    fn test_inline_attributes_stripped() {
        let input = "<td style=\"color: red\" class=\"cell\" data-ccp-props=\"{}\">x</td>";
        assert_eq!(sanitize(input), "<td>x</td>");
    }

    #[test]
    fn test_whitespace_normalization() {
        assert_eq!(sanitize("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(sanitize("a     b"), "a b");
    }

    #[test]
    fn test_code_blocks_protected() {
        let input = "before\n```js\nlet x = \"<span>   kept   </span>\";\n\n\n\nmore\n```\nafter<span>s</span>";
        let output = sanitize(input);
        assert!(output.contains("let x = \"<span>   kept   </span>\";\n\n\n\nmore"));
        assert!(output.ends_with("afters"));
    }

    #[test]
    fn test_multiple_code_blocks_restored_in_place() {
        let input = "```a\none\n```\n<span>x</span>\n```b\ntwo\n```";
        let output = sanitize(input);
        assert!(output.starts_with("```a\none\n```"));
        assert!(output.ends_with("```b\ntwo\n```"));
        assert!(output.contains("\nx\n"));
    }
}
