//! PubMed efetch XML parser using quick-xml
//!
//! Pulls the handful of fields the enrichment pass merges: abstract, MeSH
//! descriptor names, and the PMIDs of cited references.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// Metadata for one PubMed article
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PubmedRecord {
    pub pmid: String,
    /// `AbstractText` sections joined by a space
    pub abstract_text: Option<String>,
    /// `DescriptorName` of each `MeshHeading`, in document order
    pub mesh_terms: Vec<String>,
    /// PubMed ids of cited references that carry one
    pub reference_ids: Vec<String>,
    /// Every `Reference` entry, with or without a PubMed id
    pub reference_count: usize,
}

/// Malformed efetch response
#[derive(Debug)]
pub struct ParseError(quick_xml::Error);

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PubMed XML parse error: {}", self.0)
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl From<quick_xml::Error> for ParseError {
    fn from(e: quick_xml::Error) -> Self {
        Self(e)
    }
}

type Result<T> = std::result::Result<T, ParseError>;

/// Parse a `PubmedArticleSet` document into records.
///
/// Articles without a PMID are dropped.
pub fn parse_efetch_xml(xml: &str) -> Result<Vec<PubmedRecord>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"PubmedArticle" => {
                let record = parse_article(&mut reader)?;
                if record.pmid.is_empty() {
                    log::debug!("skipping PubmedArticle without PMID");
                } else {
                    records.push(record);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(records)
}

fn parse_article(reader: &mut Reader<&[u8]>) -> Result<PubmedRecord> {
    let mut record = PubmedRecord::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"MedlineCitation" => parse_medline_citation(reader, &mut record)?,
                b"PubmedData" => parse_pubmed_data(reader, &mut record)?,
                _ => {}
            },
            Event::End(e) if e.name().as_ref() == b"PubmedArticle" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(record)
}

fn parse_medline_citation(reader: &mut Reader<&[u8]>, record: &mut PubmedRecord) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                // CommentsCorrections also carry PMIDs; the article's own comes first
                b"PMID" if record.pmid.is_empty() => record.pmid = read_text(reader)?.trim().to_string(),
                b"Abstract" => {
                    let text = parse_abstract(reader)?;
                    if !text.is_empty() {
                        record.abstract_text = Some(text);
                    }
                }
                b"MeshHeadingList" => record.mesh_terms = parse_mesh_list(reader)?,
                _ => {}
            },
            Event::End(e) if e.name().as_ref() == b"MedlineCitation" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn parse_abstract(reader: &mut Reader<&[u8]>) -> Result<String> {
    let mut buf = Vec::new();
    let mut text_parts = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"AbstractText" => {
                let part = read_text_content(reader, b"AbstractText")?;
                if !part.is_empty() {
                    text_parts.push(part);
                }
            }
            Event::End(e) if e.name().as_ref() == b"Abstract" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(text_parts.join(" "))
}

fn parse_mesh_list(reader: &mut Reader<&[u8]>) -> Result<Vec<String>> {
    let mut terms = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"DescriptorName" => {
                let name = read_text(reader)?;
                if !name.is_empty() {
                    terms.push(name);
                }
            }
            Event::End(e) if e.name().as_ref() == b"MeshHeadingList" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(terms)
}

fn parse_pubmed_data(reader: &mut Reader<&[u8]>, record: &mut PubmedRecord) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"Reference" => {
                record.reference_count += 1;
                if let Some(pmid) = parse_reference(reader)? {
                    record.reference_ids.push(pmid);
                }
            }
            Event::End(e) if e.name().as_ref() == b"PubmedData" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

/// PubMed id of one `Reference`, if it lists one.
fn parse_reference(reader: &mut Reader<&[u8]>) -> Result<Option<String>> {
    let mut buf = Vec::new();
    let mut pmid = None;
    let mut depth = 1;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                if e.name().as_ref() == b"ArticleId" && id_type(&e).as_deref() == Some("pubmed") {
                    let value = read_text(reader)?.trim().to_string();
                    if pmid.is_none() && !value.is_empty() {
                        pmid = Some(value);
                    }
                } else {
                    depth += 1;
                }
            }
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(pmid)
}

fn id_type(e: &BytesStart) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == b"IdType")
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

/// Read text content until next end tag
fn read_text(reader: &mut Reader<&[u8]>) -> Result<String> {
    let mut buf = Vec::new();
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Text(e) => text.push_str(&e.unescape()?),
            Event::End(_) => break,
            Event::Start(_) => {
                // Inline markup (<i>, <sup>, ...)
                text.push_str(&read_text(reader)?);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

/// Read text content of a specific element, handling nested tags
fn read_text_content(reader: &mut Reader<&[u8]>, end_tag: &[u8]) -> Result<String> {
    let mut buf = Vec::new();
    let mut text = String::new();
    let mut depth = 1;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Text(e) => text.push_str(&e.unescape()?),
            Event::Start(_) => depth += 1,
            Event::End(e) => {
                depth -= 1;
                if depth == 0 && e.name().as_ref() == end_tag {
                    break;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_XML: &str = r#"<?xml version="1.0"?>
<!DOCTYPE PubmedArticleSet PUBLIC "-//NLM//DTD PubMedArticle, 1st January 2024//EN" "https://dtd.nlm.nih.gov/ncbi/pubmed/out/pubmed_240101.dtd">
<PubmedArticleSet>
  <PubmedArticle>
    <MedlineCitation Status="MEDLINE" Owner="NLM">
      <PMID Version="1">31452104</PMID>
      <Article>
        <ArticleTitle>Test Article</ArticleTitle>
        <Abstract>
          <AbstractText Label="BACKGROUND">Background <i>text</i>.</AbstractText>
          <AbstractText Label="RESULTS">Results &amp; more.</AbstractText>
        </Abstract>
      </Article>
      <MeshHeadingList>
        <MeshHeading>
          <DescriptorName UI="D000818" MajorTopicYN="N">Animals</DescriptorName>
        </MeshHeading>
        <MeshHeading>
          <DescriptorName UI="D006801" MajorTopicYN="Y">Humans</DescriptorName>
          <QualifierName UI="Q000378" MajorTopicYN="N">metabolism</QualifierName>
        </MeshHeading>
      </MeshHeadingList>
      <CommentsCorrectionsList>
        <CommentsCorrections RefType="ErratumIn">
          <RefSource>J Test. 2020</RefSource>
          <PMID Version="1">99999999</PMID>
        </CommentsCorrections>
      </CommentsCorrectionsList>
    </MedlineCitation>
    <PubmedData>
      <ArticleIdList>
        <ArticleId IdType="pubmed">31452104</ArticleId>
        <ArticleId IdType="pmc">PMC6710000</ArticleId>
      </ArticleIdList>
      <ReferenceList>
        <Reference>
          <Citation>First cited.</Citation>
          <ArticleIdList>
            <ArticleId IdType="doi">10.1/abc</ArticleId>
            <ArticleId IdType="pubmed">111</ArticleId>
          </ArticleIdList>
        </Reference>
        <Reference>
          <Citation>No ids here.</Citation>
        </Reference>
        <Reference>
          <Citation>Third cited.</Citation>
          <ArticleIdList>
            <ArticleId IdType="pubmed">333</ArticleId>
          </ArticleIdList>
        </Reference>
      </ReferenceList>
    </PubmedData>
  </PubmedArticle>
  <PubmedArticle>
    <MedlineCitation>
      <PMID>42</PMID>
      <Article>
        <ArticleTitle>No abstract</ArticleTitle>
      </Article>
    </MedlineCitation>
  </PubmedArticle>
</PubmedArticleSet>"#;

    #[test]
    fn parse_two_articles() {
        let records = parse_efetch_xml(SAMPLE_XML).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].pmid, "31452104");
        assert_eq!(records[1].pmid, "42");
    }

    #[test]
    fn own_pmid_not_overwritten_by_comments() {
        let records = parse_efetch_xml(SAMPLE_XML).unwrap();
        assert_eq!(records[0].pmid, "31452104");
    }

    #[test]
    fn abstract_sections_joined() {
        let records = parse_efetch_xml(SAMPLE_XML).unwrap();
        assert_eq!(
            records[0].abstract_text.as_deref(),
            Some("Background text. Results & more.")
        );
        assert!(records[1].abstract_text.is_none());
    }

    #[test]
    fn mesh_descriptors_only() {
        let records = parse_efetch_xml(SAMPLE_XML).unwrap();
        assert_eq!(records[0].mesh_terms, vec!["Animals", "Humans"]);
        assert!(records[1].mesh_terms.is_empty());
    }

    #[test]
    fn references_counted_and_resolved() {
        let records = parse_efetch_xml(SAMPLE_XML).unwrap();
        assert_eq!(records[0].reference_count, 3);
        assert_eq!(records[0].reference_ids, vec!["111", "333"]);
        assert_eq!(records[1].reference_count, 0);
    }

    #[test]
    fn empty_set() {
        let records = parse_efetch_xml("<PubmedArticleSet></PubmedArticleSet>").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn article_without_pmid_dropped() {
        let xml = "<PubmedArticleSet><PubmedArticle><MedlineCitation>\
                   <Article/></MedlineCitation></PubmedArticle></PubmedArticleSet>";
        assert!(parse_efetch_xml(xml).unwrap().is_empty());
    }

    #[test]
    fn mismatched_tags_error() {
        let xml = "<PubmedArticleSet><PubmedArticle></MedlineCitation></PubmedArticleSet>";
        let err = parse_efetch_xml(xml).unwrap_err();
        assert!(err.to_string().contains("PubMed XML parse error"));
    }
}
