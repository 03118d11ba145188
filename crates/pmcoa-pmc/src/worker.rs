//! One work item: fetch, extract, assemble

use pmcoa_core::FetchError;

use crate::archive::ArchiveSource;
use crate::extract::{ExtractOptions, extract_article};
use crate::manifest::WorkItem;
use crate::record::ArticleRecord;

/// Build the record for `item`.
///
/// Only archive retrieval can fail; extraction problems end up as null
/// fields in the record.
pub fn process_item(
    item: &WorkItem,
    source: &dyn ArchiveSource,
    opts: &ExtractOptions,
) -> Result<ArticleRecord, FetchError> {
    let dir = source.fetch(item)?;
    let extraction = extract_article(&dir, item.pmcid(), opts);
    let record = ArticleRecord::assemble(item, extraction);
    log::debug!(
        "{}: {} figures, {} with context",
        item.accession_id,
        record.figure_set.as_ref().map_or(0, Vec::len),
        record.context.as_ref().map_or(0, |c| c.len())
    );
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::LocalArchives;
    use tempfile::TempDir;

    fn item() -> WorkItem {
        WorkItem {
            file: "oa/PMC42.tar.gz".into(),
            citation: "Cell. 2015 Sep 17; 1".into(),
            accession_id: "PMC42".into(),
            date: String::new(),
            license: "CC0".into(),
            pmid: None,
        }
    }

    #[test]
    fn builds_record_from_local_dir() {
        let media = TempDir::new().unwrap();
        let dir = media.path().join("PMC42");
        std::fs::create_dir(&dir).unwrap();
        std::fs::write(
            dir.join("a.nxml"),
            "<article><front><title-group><article-title>T</article-title></title-group></front></article>",
        )
        .unwrap();

        let source = LocalArchives::new(media.path());
        let record = process_item(&item(), &source, &ExtractOptions::default()).unwrap();
        assert_eq!(record.title.as_deref(), Some("T"));
        assert_eq!(record.date.as_deref(), Some("2015-09-17"));
        assert_eq!(record.figure_set, Some(vec![]));
    }

    #[test]
    fn missing_archive_is_an_error() {
        let media = TempDir::new().unwrap();
        let source = LocalArchives::new(media.path());
        assert!(process_item(&item(), &source, &ExtractOptions::default()).is_err());
    }
}
