//! Structured-document extraction for one article directory.
//!
//! Every field is extracted independently and reported as [`Extracted`], so a
//! broken section never takes the rest of the record down with it.

pub mod context;
pub mod figures;
pub mod ids;
pub mod metadata;
pub mod tree;

use std::path::{Path, PathBuf};

pub use context::{FigureContext, extract_context};
pub use figures::{Figure, NO_CAPTION, figure_set};
pub use tree::{Document, TreeError};

/// Outcome of one field extraction
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted<T> {
    Found(T),
    /// The section is not in the document
    Missing,
    /// The document (or this section) could not be read
    Failed(String),
}

impl<T> Extracted<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Found(v) => Some(v),
            Self::Missing | Self::Failed(_) => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Extracted<U> {
        match self {
            Self::Found(v) => Extracted::Found(f(v)),
            Self::Missing => Extracted::Missing,
            Self::Failed(reason) => Extracted::Failed(reason),
        }
    }
}

impl<T> From<Option<T>> for Extracted<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Missing, Self::Found)
    }
}

/// Everything pulled out of one article.
#[derive(Debug, Clone)]
pub struct DocumentExtraction {
    pub title: Extracted<String>,
    pub abstract_text: Extracted<String>,
    pub keywords: Extracted<Vec<String>>,
    pub pmid: Extracted<String>,
    pub categories: Extracted<Vec<String>>,
    pub figure_set: Extracted<Vec<Figure>>,
    pub context: Extracted<FigureContext>,
    pub full_text: Extracted<String>,
}

impl DocumentExtraction {
    /// All fields failed for the same reason.
    pub fn failed(reason: &str) -> Self {
        let f = || reason.to_string();
        Self {
            title: Extracted::Failed(f()),
            abstract_text: Extracted::Failed(f()),
            keywords: Extracted::Failed(f()),
            pmid: Extracted::Failed(f()),
            categories: Extracted::Failed(f()),
            figure_set: Extracted::Failed(f()),
            context: Extracted::Failed(f()),
            full_text: Extracted::Failed(f()),
        }
    }

    fn from_document(doc: &Document) -> Self {
        Self {
            title: metadata::title(doc),
            abstract_text: metadata::abstract_text(doc),
            keywords: metadata::keywords(doc),
            pmid: metadata::pmid(doc),
            categories: metadata::categories(doc),
            figure_set: Extracted::Missing,
            context: Extracted::Found(extract_context(doc)),
            full_text: metadata::full_text(doc),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Image file extensions, without the dot
    pub image_extensions: Vec<String>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            image_extensions: vec!["jpg".to_string()],
        }
    }
}

/// First `.nxml` file in `dir` by name, else the first `.xml`.
pub fn find_document(dir: &Path) -> Option<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();

    let with_ext = |want: &str| {
        files
            .iter()
            .find(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(want))
            })
            .cloned()
    };
    with_ext("nxml").or_else(|| with_ext("xml"))
}

/// Extract one article directory. Never fails; problems are per field.
pub fn extract_article(article_dir: &Path, pmcid: &str, opts: &ExtractOptions) -> DocumentExtraction {
    let parsed = match find_document(article_dir) {
        Some(path) => Document::from_file(&path).map_err(|e| {
            log::warn!("{pmcid}: cannot parse {}: {e}", path.display());
            format!("cannot parse {}: {e}", path.display())
        }),
        None => {
            log::warn!("{pmcid}: no article document in {}", article_dir.display());
            Err(format!("no article document in {}", article_dir.display()))
        }
    };

    let (mut extraction, doc) = match parsed {
        Ok(doc) => (DocumentExtraction::from_document(&doc), Some(doc)),
        Err(reason) => (DocumentExtraction::failed(&reason), None),
    };

    extraction.figure_set = match figure_set(article_dir, pmcid, doc.as_ref(), &opts.image_extensions) {
        Ok(figures) => Extracted::Found(figures),
        Err(e) => {
            log::warn!("{pmcid}: cannot list images: {e}");
            Extracted::Failed(e.to_string())
        }
    };
    extraction
}
