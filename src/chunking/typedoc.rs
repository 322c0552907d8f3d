//! TypeDoc chunking strategy.
//!
//! TypeDoc-generated API pages open with a class header, a generated
//! table of contents, and a long run of member sections. Members are
//! accumulated into chunks and every chunk is re-anchored with the class
//! header so a retrieved member never loses its owning class.

use crate::chunking::markdown::MarkdownChunker;
use crate::chunking::primitives::{header_title, split_by_headers, split_protected};
use crate::chunking::{Chunker, ChunkerOptions, RawChunk, finalize};
use crate::core::{Category, Chunk, SourceDocument};

/// Separator between the class header and an accumulated member group.
const HEADER_SEPARATOR: &str = "\n\n---\n\n";

/// Slack subtracted from the member budget on top of the class header.
const HEADER_SLACK: usize = 10;

/// Generated section titles that precede the real member content.
const SKIP_SECTIONS: [&str; 3] = ["Content", "Table of contents", "Hierarchy"];

/// Chunker for TypeDoc-generated documentation.
#[derive(Debug, Clone, Copy)]
pub struct TypeDocChunker {
    options: ChunkerOptions,
}

impl TypeDocChunker {
    /// Creates a TypeDoc chunker with the given size options.
    #[must_use]
    pub const fn new(options: ChunkerOptions) -> Self {
        Self { options }
    }

    fn chunk_api(&self, doc: &SourceDocument) -> Vec<Chunk> {
        let class_header = first_h1_line(&doc.content)
            .unwrap_or_else(|| doc.metadata.name.clone());
        let class_title = header_title(&class_header);

        // Partition into h2/h3 sections and skip the generated TOC region:
        // everything before the first h2 whose title is not boilerplate.
        let sections = split_by_headers(&doc.content, 2, 3);
        let content_start = sections.iter().position(|s| {
            s.header.as_deref().is_some_and(|h| {
                let title = header_title(h);
                h.trim_start().starts_with("## ")
                    && !title.is_empty()
                    && !SKIP_SECTIONS.contains(&title.as_str())
            })
        });
        let Some(content_start) = content_start else {
            // No member sections at all; treat the page as plain Markdown.
            return finalize(
                doc,
                MarkdownChunker::pieces(&doc.content, self.options.chunk_size),
                self.options.min_chunk_size,
            );
        };

        let members: Vec<&str> = sections[content_start..]
            .iter()
            .map(|s| s.text.as_str())
            .filter(|text| text.trim().len() >= self.options.min_chunk_size)
            .collect();

        let budget = self
            .options
            .chunk_size
            .saturating_sub(class_header.len() + HEADER_SLACK)
            .max(1);

        let mut pieces = Vec::new();
        let mut group: Vec<&str> = Vec::new();
        let mut group_len = 0usize;
        for member in members {
            if !group.is_empty() && group_len + member.len() + 2 > budget {
                pieces.push(assemble(&class_header, &group, &class_title));
                group.clear();
                group_len = 0;
            }
            group_len += member.len() + 2;
            group.push(member);
        }
        if !group.is_empty() {
            pieces.push(assemble(&class_header, &group, &class_title));
        }

        finalize(doc, pieces, self.options.min_chunk_size)
    }

    fn chunk_demo(&self, doc: &SourceDocument) -> Vec<Chunk> {
        let title = first_h1_line(&doc.content);
        if doc.content.len() <= self.options.chunk_size {
            return finalize(
                doc,
                vec![RawChunk::new(doc.content.clone(), Vec::new())],
                self.options.min_chunk_size,
            );
        }
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

fn assemble(class_header: &str, members: &[&str], class_title: &str) -> RawChunk {
    RawChunk::new(
        format!("{class_header}{HEADER_SEPARATOR}{}", members.join("\n\n")),
        vec![class_title.to_string()],
    )
}

/// First level-1 header line of a document, if any.
pub(crate) fn first_h1_line(content: &str) -> Option<String> {
    let mut in_fence = false;
    for line in content.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if !in_fence && trimmed.starts_with("# ") {
            return Some(line.to_string());
        }
    }
    None
}

impl Chunker for TypeDocChunker {
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
        "typedoc"
    }
}
