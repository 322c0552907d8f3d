//! JavaDoc chunking strategy.
//!
//! JavaDoc-exported API pages carry a summary table near the top and a
//! `Method Details` region holding the real content. Methods are grouped
//! up to the chunk budget, each group re-anchored with the page header.

use std::sync::OnceLock;

use regex::Regex;

use crate::chunking::markdown::MarkdownChunker;
use crate::chunking::primitives::{header_title, split_protected};
use crate::chunking::typedoc::first_h1_line;
use crate::chunking::{Chunker, ChunkerOptions, RawChunk, finalize};
use crate::core::{Category, Chunk, SourceDocument};

/// Lines scanned for a summary marker before falling back.
const SUMMARY_SCAN_LINES: usize = 30;

/// Header region size when no summary marker is found.
const FALLBACK_HEADER_LINES: usize = 15;

/// Minimum method count for the method-grouping strategy to apply.
const MIN_METHODS: usize = 3;

fn method_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
        Regex::new(r"(?m)^\s*\+?\s*###\s+\w+").unwrap()
    })
}

/// Chunker for JavaDoc-generated documentation.
#[derive(Debug, Clone, Copy)]
pub struct JavaDocChunker {
    options: ChunkerOptions,
}

impl JavaDocChunker {
    /// Creates a JavaDoc chunker with the given size options.
    #[must_use]
    pub const fn new(options: ChunkerOptions) -> Self {
        Self { options }
    }

    fn chunk_api(&self, doc: &SourceDocument) -> Vec<Chunk> {
        let lines: Vec<&str> = doc.content.lines().collect();

        let summary_marker = lines
            .iter()
            .take(SUMMARY_SCAN_LINES)
            .position(|l| {
                let t = l.trim_start();
                t.starts_with("## Method Summary") || t.starts_with("## Field Summary")
            });
        let header_end = summary_marker.unwrap_or(FALLBACK_HEADER_LINES.min(lines.len()));
        let header = lines[..header_end].join("\n");

        let details_start = lines.iter().position(|l| {
            let t = l.trim_start();
            t.starts_with("## Method Details") || t.starts_with("## Method Detail")
        });
        let body = details_start
            .map_or_else(|| lines[header_end..].join("\n"), |i| lines[i..].join("\n"));

        let starts: Vec<usize> = method_re().find_iter(&body).map(|m| m.start()).collect();
        if starts.len() < MIN_METHODS {
            // Too few methods for grouping; plain protected splitting.
            let pieces = split_protected(&doc.content, self.options.chunk_size)
                .into_iter()
                .map(|p| RawChunk::new(p, Vec::new()))
                .collect();
            return finalize(doc, pieces, self.options.min_chunk_size);
        }

        let mut methods = Vec::with_capacity(starts.len());
        for (i, &start) in starts.iter().enumerate() {
            let end = starts.get(i + 1).copied().unwrap_or(body.len());
            methods.push(&body[start..end]);
        }

        let class_title = first_h1_line(&doc.content)
            .map(|l| header_title(&l))
            .unwrap_or_else(|| doc.metadata.name.clone());

        let budget = self.options.chunk_size.max(header.len() + 1);
        let mut pieces = Vec::new();
        let mut group: Vec<&str> = Vec::new();
        let mut group_len = header.len();
        for method in methods {
            if !group.is_empty() && group_len + method.len() > budget {
                pieces.push(assemble(&header, &group, &class_title));
                group.clear();
                group_len = header.len();
            }
            group_len += method.len();
            group.push(method);
        }
        if !group.is_empty() {
            pieces.push(assemble(&header, &group, &class_title));
        }

        finalize(doc, pieces, self.options.min_chunk_size)
    }

    fn chunk_demo(&self, doc: &SourceDocument) -> Vec<Chunk> {
        let title = first_h1_line(&doc.content);
        let pieces = split_protected(&doc.content, self.options.chunk_size)
            .into_iter()
            .enumerate()
            .map(|(i, piece)| {
                let content = match (&title, i) {
                    (Some(title), i) if i > 0 => format!("{title}\n\n{piece}"),
                    _ => piece,
                };
                RawChunk::new(content, Vec::new())
            })
            .collect();
        finalize(doc, pieces, self.options.min_chunk_size)
    }
}

fn assemble(header: &str, methods: &[&str], class_title: &str) -> RawChunk {
    RawChunk::new(
        format!("{header}\n\n---\n\n{}", methods.join("")),
        vec![class_title.to_string()],
    )
}

impl Chunker for JavaDocChunker {
    fn chunk(&self, doc: &SourceDocument) -> Vec<Chunk> {
        if doc.content.len() <= self.options.chunk_size {
            return finalize(
                doc,
                vec![RawChunk::new(doc.content.clone(), Vec::new())],
                self.options.min_chunk_size,
            );
        }
        match doc.metadata.category {
            Category::Api => self.chunk_api(doc),
            Category::Demo => self.chunk_demo(doc),
            Category::Doc => finalize(
                doc,
                MarkdownChunker::pieces(&doc.content, self.options.chunk_size),
                self.options.min_chunk_size,
            ),
        }
    }

    fn name(&self) -> &'static str {
        "javadoc"
    }
}
