//! Source document representation.
//!
//! A document is an immutable unit of raw Markdown read from a product
//! corpus. Its identifier is derived from the relative path so that
//! re-ingesting the same tree always yields the same ids.

use serde::{Deserialize, Serialize};

/// Category of a document, derived from the top-level corpus directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// API reference pages (`apis/`).
    Api,
    /// Guides and conceptual documentation (`docs/`).
    Doc,
    /// Sample and demo walkthroughs (`demos/`).
    Demo,
}

impl Category {
    /// Maps a top-level corpus directory name to its category.
    ///
    /// Unrecognized directories fall back to [`Category::Doc`].
    #[must_use]
    pub fn from_top_dir(dir: &str) -> Self {
        match dir {
            "apis" => Self::Api,
            "demos" => Self::Demo,
            _ => Self::Doc,
        }
    }

    /// Lowercase wire name of the category.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Doc => "doc",
            Self::Demo => "demo",
        }
    }
}

/// Metadata carried by a document and inherited by its chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Path relative to the corpus base directory.
    pub relative_path: String,
    /// File name without extension.
    pub name: String,
    /// Category derived from the first path component.
    pub category: Category,
    /// Path components from the corpus base down to the file.
    pub path_hierarchy: Vec<String>,
}

/// An immutable source unit: raw (sanitized) Markdown plus metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Identifier derived from the relative path.
    pub id: String,
    /// Sanitized document text.
    pub content: String,
    /// Metadata inherited by every chunk of this document.
    pub metadata: DocumentMetadata,
}

impl SourceDocument {
    /// Creates a document, deriving its id from the metadata's relative path.
    #[must_use]
    pub fn new(content: String, metadata: DocumentMetadata) -> Self {
        Self {
            id: doc_id_from_path(&metadata.relative_path),
            content,
            metadata,
        }
    }
}

/// Derives a document id from a corpus-relative path.
///
/// Path separators collapse to underscores and the extension is dropped,
/// so `apis/Workbook.md` becomes `apis_Workbook`.
///
/// # Examples
///
/// ```
/// use docdex::core::doc_id_from_path;
///
/// assert_eq!(doc_id_from_path("apis/Workbook.md"), "apis_Workbook");
/// assert_eq!(doc_id_from_path("docs/cells/formatting.md"), "docs_cells_formatting");
/// ```
#[must_use]
pub fn doc_id_from_path(relative_path: &str) -> String {
    let without_ext = relative_path
        .rsplit_once('.')
        .map_or(relative_path, |(stem, _)| stem);
    without_ext.replace(['/', '\\'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_top_dir() {
        assert_eq!(Category::from_top_dir("apis"), Category::Api);
        assert_eq!(Category::from_top_dir("docs"), Category::Doc);
        assert_eq!(Category::from_top_dir("demos"), Category::Demo);
        assert_eq!(Category::from_top_dir("guides"), Category::Doc);
    }

    #[test]
    fn test_category_wire_name() {
        assert_eq!(Category::Api.as_str(), "api");
        assert_eq!(
            serde_json::to_string(&Category::Demo).ok().as_deref(),
            Some("\"demo\"")
        );
    }

    #[test]
    fn test_doc_id_from_path() {
        assert_eq!(doc_id_from_path("apis/Workbook.md"), "apis_Workbook");
        assert_eq!(doc_id_from_path("docs/intro.md"), "docs_intro");
        assert_eq!(doc_id_from_path("no_extension"), "no_extension");
        assert_eq!(
            doc_id_from_path("demos\\charts\\bar.md"),
            "demos_charts_bar"
        );
    }

    #[test]
    fn test_document_id_derivation() {
        let doc = SourceDocument::new(
            "# Workbook".to_string(),
            DocumentMetadata {
                relative_path: "apis/Workbook.md".to_string(),
                name: "Workbook".to_string(),
                category: Category::Api,
                path_hierarchy: vec!["apis".to_string(), "Workbook.md".to_string()],
            },
        );
        assert_eq!(doc.id, "apis_Workbook");
    }
}
