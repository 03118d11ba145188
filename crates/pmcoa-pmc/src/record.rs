//! Canonical per-article record
//!
//! Every field is always serialized (null when unknown), so downstream
//! readers see the same keys whether extraction succeeded or not.

use serde::{Deserialize, Serialize};

use crate::citation;
use crate::extract::{DocumentExtraction, Figure, FigureContext};
use crate::manifest::WorkItem;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub accession_id: Option<String>,
    pub citation: Option<String>,
    pub license: Option<String>,
    /// `YYYY-MM-DD`, derived from the citation
    pub date: Option<String>,
    pub journal: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "abstract", default)]
    pub abstract_text: String,
    #[serde(rename = "keyword")]
    pub keywords: Option<Vec<String>>,
    pub pmid: Option<String>,
    pub article_categories: Option<Vec<String>>,
    /// Filled by enrichment
    pub mesh: Option<Vec<String>>,
    pub figure_set: Option<Vec<Figure>>,
    pub context: Option<FigureContext>,
    pub nxml: Option<String>,
    pub reference_ids: Option<Vec<String>>,
    pub reference_count: Option<usize>,
}

impl ArticleRecord {
    /// Record with every field null and an empty abstract.
    pub fn null_template() -> Self {
        Self::default()
    }

    /// Manifest-only record, used when the article could not be processed.
    pub fn from_row(row: &WorkItem) -> Self {
        Self {
            accession_id: non_empty(&row.accession_id),
            citation: non_empty(&row.citation),
            license: non_empty(&row.license),
            date: citation::date(&row.citation),
            journal: citation::journal(&row.citation),
            pmid: row.pmid.clone(),
            ..Self::null_template()
        }
    }

    /// Merge extraction output into the manifest-only record.
    ///
    /// A PMID from the manifest wins over the one found in the document.
    pub fn assemble(row: &WorkItem, extraction: DocumentExtraction) -> Self {
        let mut record = Self::from_row(row);
        record.title = extraction.title.into_option();
        record.abstract_text = extraction.abstract_text.into_option().unwrap_or_default();
        record.keywords = extraction.keywords.into_option();
        if record.pmid.is_none() {
            record.pmid = extraction.pmid.into_option();
        }
        record.article_categories = extraction.categories.into_option();
        record.figure_set = extraction.figure_set.into_option();
        record.context = extraction.context.into_option();
        record.nxml = extraction.full_text.into_option();
        record
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Extracted;

    const KEYS: [&str; 16] = [
        "accession_id",
        "citation",
        "license",
        "date",
        "journal",
        "title",
        "abstract",
        "keyword",
        "pmid",
        "article_categories",
        "mesh",
        "figure_set",
        "context",
        "nxml",
        "reference_ids",
        "reference_count",
    ];

    fn row(pmid: Option<&str>) -> WorkItem {
        WorkItem {
            file: "oa/PMC5.tar.gz".into(),
            citation: "PLoS One. 2010 Jan 5; 5(1):e8589".into(),
            accession_id: "PMC5".into(),
            date: "2020-01-01".into(),
            license: "CC BY".into(),
            pmid: pmid.map(String::from),
        }
    }

    fn assert_all_keys(record: &ArticleRecord) {
        let value = serde_json::to_value(record).unwrap();
        let obj = value.as_object().unwrap();
        for key in KEYS {
            assert!(obj.contains_key(key), "missing key {key}");
        }
        assert_eq!(obj.len(), KEYS.len());
    }

    #[test]
    fn null_template_has_every_key() {
        let record = ArticleRecord::null_template();
        assert_all_keys(&record);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["abstract"], "");
        assert!(value["title"].is_null());
    }

    #[test]
    fn from_row_derives_citation_fields() {
        let record = ArticleRecord::from_row(&row(None));
        assert_eq!(record.accession_id.as_deref(), Some("PMC5"));
        assert_eq!(record.journal.as_deref(), Some("PLoS One"));
        assert_eq!(record.date.as_deref(), Some("2010-01-05"));
        assert!(record.title.is_none());
        assert_all_keys(&record);
    }

    #[test]
    fn failed_extraction_keeps_every_key() {
        let record = ArticleRecord::assemble(&row(None), DocumentExtraction::failed("broken"));
        assert_all_keys(&record);
        assert_eq!(record.abstract_text, "");
        assert!(record.figure_set.is_none());
        assert_eq!(record.journal.as_deref(), Some("PLoS One"));
    }

    #[test]
    fn manifest_pmid_wins() {
        let mut ex = DocumentExtraction::failed("x");
        ex.pmid = Extracted::Found("999".into());
        let record = ArticleRecord::assemble(&row(Some("123")), ex.clone());
        assert_eq!(record.pmid.as_deref(), Some("123"));

        let record = ArticleRecord::assemble(&row(None), ex);
        assert_eq!(record.pmid.as_deref(), Some("999"));
    }

    #[test]
    fn found_fields_copied() {
        let mut ex = DocumentExtraction::failed("x");
        ex.title = Extracted::Found("T".into());
        ex.abstract_text = Extracted::Found("A".into());
        ex.keywords = Extracted::Found(vec!["k".into()]);
        ex.figure_set = Extracted::Found(vec![]);
        let record = ArticleRecord::assemble(&row(None), ex);
        assert_eq!(record.title.as_deref(), Some("T"));
        assert_eq!(record.abstract_text, "A");
        assert_eq!(record.keywords, Some(vec!["k".to_string()]));
        assert_eq!(record.figure_set, Some(vec![]));
    }

    #[test]
    fn old_records_deserialize_without_new_fields() {
        let json = r#"{"accession_id":"PMC1","title":"T"}"#;
        let record: ArticleRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.accession_id.as_deref(), Some("PMC1"));
        assert_eq!(record.abstract_text, "");
        assert!(record.reference_count.is_none());
    }
}
