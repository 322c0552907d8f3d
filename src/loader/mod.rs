//! Corpus loading.
//!
//! Recursively reads Markdown files under a product's raw-data directory,
//! sanitizes HTML residue, and derives document metadata from the path.

pub mod sanitize;

pub use sanitize::sanitize;

use std::path::{Path, PathBuf};

use crate::core::{Category, DocumentMetadata, SourceDocument};
use crate::error::Result;

/// Reads a product corpus from disk.
///
/// Files are visited in sorted path order so document (and therefore
/// chunk) ordering is deterministic across runs.
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    base_dir: PathBuf,
    subdirs: Vec<String>,
}

impl DocumentLoader {
    /// Creates a loader over `base_dir` restricted to the given
    /// subdirectories (e.g. `apis`, `docs`, `demos`).
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>, subdirs: Vec<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            subdirs,
        }
    }

    /// Base directory this loader reads from.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Loads every non-empty Markdown file under the configured
    /// subdirectories.
    ///
    /// Files that are empty after trimming are skipped. Subdirectories
    /// that do not exist are skipped silently; a corpus may ship only a
    /// subset of the configured layout.
    ///
    /// # Errors
    ///
    /// Returns an I/O error when a directory or file that exists cannot
    /// be read.
    pub fn load(&self) -> Result<Vec<SourceDocument>> {
        let mut files = Vec::new();
        for subdir in &self.subdirs {
            let dir = self.base_dir.join(subdir);
            if dir.is_dir() {
                collect_markdown(&dir, &mut files)?;
            }
        }
        files.sort();

        let mut documents = Vec::with_capacity(files.len());
        for path in files {
            let raw = std::fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                tracing::debug!(path = %path.display(), "skipping empty file");
                continue;
            }
            let content = sanitize(&raw);
            let metadata = self.metadata_for(&path);
            documents.push(SourceDocument::new(content, metadata));
        }
        Ok(documents)
    }

    fn metadata_for(&self, path: &Path) -> DocumentMetadata {
        let relative = path.strip_prefix(&self.base_dir).unwrap_or(path);
        let relative_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let path_hierarchy: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let category = path_hierarchy
            .first()
            .map_or(Category::Doc, |top| Category::from_top_dir(top));
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        DocumentMetadata {
            relative_path,
            name,
            category,
            path_hierarchy,
        }
    }
}

fn collect_markdown(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_markdown(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "md") {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, relative: &str, content: &str) {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_load_recursive_sorted() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "apis/Workbook.md", "# Workbook");
        write(dir.path(), "apis/nested/Cell.md", "# Cell");
        write(dir.path(), "docs/intro.md", "# Intro");
        write(dir.path(), "docs/notes.txt", "not markdown");

        let loader = DocumentLoader::new(
            dir.path(),
            vec!["apis".to_string(), "docs".to_string()],
        );
        let docs = loader.load().unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["apis_Workbook", "apis_nested_Cell", "docs_intro"]);
    }

    #[test]
    fn test_empty_files_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "docs/empty.md", "   \n\t\n");
        write(dir.path(), "docs/full.md", "content");

        let loader = DocumentLoader::new(dir.path(), vec!["docs".to_string()]);
        let docs = loader.load().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "docs_full");
    }

    #[test]
    fn test_missing_subdir_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "docs/a.md", "content");
        let loader = DocumentLoader::new(
            dir.path(),
            vec!["apis".to_string(), "docs".to_string()],
        );
        let docs = loader.load().unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn test_metadata_derivation() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "demos/charts/bar.md", "# Bar charts");
        let loader = DocumentLoader::new(dir.path(), vec!["demos".to_string()]);
        let docs = loader.load().unwrap();

        let doc = &docs[0];
        assert_eq!(doc.id, "demos_charts_bar");
        assert_eq!(doc.metadata.relative_path, "demos/charts/bar.md");
        assert_eq!(doc.metadata.name, "bar");
        assert_eq!(doc.metadata.category, Category::Demo);
        assert_eq!(
            doc.metadata.path_hierarchy,
            vec!["demos", "charts", "bar.md"]
        );
    }

    #[test]
    fn test_content_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "docs/spans.md", "a<span><span>b</span></span>c");
        let loader = DocumentLoader::new(dir.path(), vec!["docs".to_string()]);
        let docs = loader.load().unwrap();
        assert_eq!(docs[0].content, "abc");
    }
}
