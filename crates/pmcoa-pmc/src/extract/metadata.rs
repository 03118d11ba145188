//! Bibliographic fields from the article front matter

use super::Extracted;
use super::tree::{Document, NodeId, collapse_whitespace};

/// `title-group/article-title`, flattened in document order.
pub fn title(doc: &Document) -> Extracted<String> {
    doc.find_first(doc.root(), "title-group")
        .and_then(|group| doc.find_first(group, "article-title"))
        .map(|t| collapse_whitespace(&doc.text_content(t)))
        .filter(|t| !t.is_empty())
        .into()
}

/// `kwd` entries of the first `kwd-group`.
pub fn keywords(doc: &Document) -> Extracted<Vec<String>> {
    doc.find_first(doc.root(), "kwd-group")
        .map(|group| texts_of(doc, group, "kwd"))
        .into()
}

/// `article-id[@pub-id-type="pmid"]`
pub fn pmid(doc: &Document) -> Extracted<String> {
    doc.find_all(doc.root(), "article-id")
        .find(|&n| doc.get(n).attr("pub-id-type") == Some("pmid"))
        .map(|n| doc.text_content(n).trim().to_string())
        .filter(|id| !id.is_empty())
        .into()
}

/// `subject` tags of the first `article-categories`.
pub fn categories(doc: &Document) -> Extracted<Vec<String>> {
    doc.find_first(doc.root(), "article-categories")
        .map(|cats| texts_of(doc, cats, "subject"))
        .into()
}

/// Text of the first `abstract`.
pub fn abstract_text(doc: &Document) -> Extracted<String> {
    doc.find_first(doc.root(), "abstract")
        .map(|a| collapse_whitespace(&doc.text_content(a)))
        .into()
}

/// Whole document text, whitespace-collapsed.
pub fn full_text(doc: &Document) -> Extracted<String> {
    Extracted::Found(collapse_whitespace(&doc.text_content(doc.root())))
}

fn texts_of(doc: &Document, from: NodeId, tag: &str) -> Vec<String> {
    doc.find_all(from, tag)
        .map(|n| collapse_whitespace(&doc.text_content(n)))
        .filter(|t| !t.is_empty())
        .collect()
}
