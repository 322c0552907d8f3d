//! Markdown chunking strategy.
//!
//! Header-driven splitting for hand-written guides: primary split at
//! `h2`, secondary split at `h3` for oversize sections, size-bounded
//! protected splitting below that. Continuation pieces get their section
//! header line re-prepended so retrieval context is not lost.

use crate::chunking::primitives::{Section, split_by_headers, split_protected};
use crate::chunking::{Chunker, ChunkerOptions, RawChunk, finalize};
use crate::core::{Chunk, SourceDocument};

/// Chunker for plain Markdown documentation.
#[derive(Debug, Clone, Copy)]
pub struct MarkdownChunker {
    options: ChunkerOptions,
}

impl MarkdownChunker {
    /// Creates a Markdown chunker with the given size options.
    #[must_use]
    pub const fn new(options: ChunkerOptions) -> Self {
        Self { options }
    }

    /// Cuts one document into raw pieces; shared with the strategies that
    /// treat `doc` and `demo` categories as Markdown.
    pub(crate) fn pieces(content: &str, chunk_size: usize) -> Vec<RawChunk> {
        if content.len() <= chunk_size {
            return vec![RawChunk::new(content.to_string(), Vec::new())];
        }

        let mut pieces = Vec::new();
        for h2_section in split_by_headers(content, 2, 2) {
            let h2_title = h2_section.title();
            if h2_section.text.len() <= chunk_size {
                pieces.push(RawChunk::new(
                    h2_section.text,
                    section_path(h2_title.as_deref(), None),
                ));
                continue;
            }

            for h3_section in split_by_headers(&h2_section.text, 3, 3) {
                let h3_title = h3_section.title();
                let header_line = continuation_header(&h3_section, h2_section.header.as_deref());
                let path = section_path(h2_title.as_deref(), h3_title.as_deref());
                for (i, piece) in split_protected(&h3_section.text, chunk_size)
                    .into_iter()
                    .enumerate()
                {
                    let content = if i > 0 && let Some(header) = header_line {
                        format!("{header}\n\n{piece}")
                    } else {
                        piece
                    };
                    pieces.push(RawChunk::new(content, path.clone()));
                }
            }
        }
        pieces
    }
}

/// The header line re-prepended to continuation pieces: the `h3` line when
/// the sub-section has one, the enclosing `h2` line otherwise.
fn continuation_header<'a>(h3_section: &'a Section, h2_header: Option<&'a str>) -> Option<&'a str> {
    h3_section.header.as_deref().or(h2_header)
}

fn section_path(h2: Option<&str>, h3: Option<&str>) -> Vec<String> {
    [h2, h3].into_iter().flatten().map(str::to_string).collect()
}

impl Chunker for MarkdownChunker {
    fn chunk(&self, doc: &SourceDocument) -> Vec<Chunk> {
        let pieces = Self::pieces(&doc.content, self.options.chunk_size);
        finalize(doc, pieces, self.options.min_chunk_size)
    }

    fn name(&self) -> &'static str {
        "markdown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::test_doc;
    use crate::core::Category;

    fn chunker(chunk_size: usize) -> MarkdownChunker {
        MarkdownChunker::new(ChunkerOptions::new(chunk_size, 10).unwrap())
    }

    #[test]
    fn test_small_doc_single_chunk() {
        let doc = test_doc("# Title\n\nshort guide body", Category::Doc);
        let chunks = chunker(3_000).chunk(&doc);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].metadata.total_chunks, 1);
        assert!(chunks[0].metadata.section_path.is_empty());
    }

    #[test]
    fn test_h2_sections_become_chunks() {
        let body_a = "a".repeat(120);
        let body_b = "b".repeat(120);
        let content =
            format!("# Guide\n\nintroductory paragraph\n\n## First\n{body_a}\n\n## Second\n{body_b}");
        let doc = test_doc(&content, Category::Doc);
        let chunks = chunker(200).chunk(&doc);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].metadata.section_path, vec!["First"]);
        assert_eq!(chunks[2].metadata.section_path, vec!["Second"]);
        assert!(chunks[1].content.starts_with("## First"));
    }

    #[test]
    fn test_oversize_section_splits_at_h3() {
        let content = format!(
            "## Big\nintro\n\n### Sub A\n{}\n\n### Sub B\n{}",
            "a".repeat(150),
            "b".repeat(150)
        );
        let doc = test_doc(&content, Category::Doc);
        let chunks = chunker(200).chunk(&doc);
        assert!(chunks.len() >= 3);
        let sub_a = chunks
            .iter()
            .find(|c| c.content.contains("### Sub A"))
            .unwrap();
        assert_eq!(sub_a.metadata.section_path, vec!["Big", "Sub A"]);
    }

    #[test]
    fn test_continuation_chunks_reprepend_header() {
        let long = "word ".repeat(120); // 600 chars, splits at chunk_size 300
        let content = format!("## Section\n\n### Deep\n{long}");
        let doc = test_doc(&content, Category::Doc);
        let chunks = chunker(300).chunk(&doc);

        let continuations: Vec<_> = chunks
            .iter()
            .filter(|c| c.chunk_index > 0)
            .collect();
        assert!(!continuations.is_empty());
        for chunk in continuations {
            assert!(
                chunk.content.starts_with("### Deep")
                    || chunk.content.starts_with("## Section"),
                "continuation lost its header: {}",
                &chunk.content[..40.min(chunk.content.len())]
            );
        }
    }

    #[test]
    fn test_indices_dense_and_total_backfilled() {
        let content = format!(
            "## A\n{}\n\n## B\n{}\n\n## C\n{}",
            "a".repeat(150),
            "b".repeat(150),
            "c".repeat(150)
        );
        let doc = test_doc(&content, Category::Doc);
        let chunks = chunker(200).chunk(&doc);
        let indices: Vec<usize> = chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indices, (0..chunks.len()).collect::<Vec<_>>());
        assert!(chunks.iter().all(|c| c.metadata.total_chunks == chunks.len()));
    }

    #[test]
    fn test_code_block_not_split() {
        let code = format!("```js\n{}\n```", "sheet.setValue(0, 0, 1);\n".repeat(12));
        let content = format!("## Usage\n\nintro text\n\n{code}\n\ntrailing text");
        let doc = test_doc(&content, Category::Doc);
        let chunks = chunker(250).chunk(&doc);
        let holding = chunks.iter().filter(|c| c.content.contains("```js")).count();
        // The whole fence lives in exactly one chunk.
        assert_eq!(holding, 1);
    }
}
