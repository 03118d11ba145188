//! Paragraphs that reference each figure.
//!
//! Figure markers (`xref[@ref-type="fig"]`) and figure definitions
//! (`fig/@id`) often disagree on separators (`fig-1` vs `fig.1`), so both
//! sides are normalized before lookup. Results are keyed by the figure's
//! image identifier, the same id the figure set uses.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use super::ids::{image_identifier, normalize_rid};
use super::tree::{Document, NodeId, Visit};

/// Ordered map image identifier → distinct referencing paragraphs.
pub type FigureContext = IndexMap<String, Vec<String>>;

/// Normalized `fig/@id` → image identifier of the figure's first `graphic`.
pub fn rid_map(doc: &Document) -> FxHashMap<String, String> {
    let mut map = FxHashMap::default();
    for fig in doc.find_all(doc.root(), "fig") {
        let Some(id) = doc.get(fig).attr("id") else {
            continue;
        };
        let href = doc
            .find_all(fig, "graphic")
            .find_map(|g| doc.get(g).href());
        if let Some(href) = href {
            map.entry(normalize_rid(id))
                .or_insert_with(|| image_identifier(href));
        }
    }
    map
}

/// Context paragraphs for every resolvable figure marker, in document order.
pub fn extract_context(doc: &Document) -> FigureContext {
    let map = rid_map(doc);
    let mut context = FigureContext::new();
    if map.is_empty() {
        return context;
    }

    for xref in doc.find_all(doc.root(), "xref") {
        let Some(image_id) = resolve_fig_ref(doc, xref, &map) else {
            continue;
        };
        let Some(paragraph) = doc.nearest_ancestor(xref, "p") else {
            continue;
        };
        let text = serialize_paragraph(doc, paragraph, &map);
        let entry = context.entry(image_id.to_string()).or_default();
        if !entry.contains(&text) {
            entry.push(text);
        }
    }
    context
}

/// Image identifier a figure marker points at, if it resolves.
fn resolve_fig_ref<'m>(
    doc: &Document,
    xref: NodeId,
    map: &'m FxHashMap<String, String>,
) -> Option<&'m str> {
    let el = doc.get(xref);
    if el.tag != "xref" || el.attr("ref-type") != Some("fig") {
        return None;
    }
    let rid = el.attr("rid")?;
    map.get(&normalize_rid(rid)).map(String::as_str)
}

/// Paragraph text with resolved figure markers kept as
/// `<xref ref-type="fig" rid="IMAGE_ID">label</xref>`; all other markup is
/// flattened to its text. Tail text after every element is kept once.
pub fn serialize_paragraph(
    doc: &Document,
    paragraph: NodeId,
    map: &FxHashMap<String, String>,
) -> String {
    let mut out = String::new();
    let mut stack = vec![Visit::Enter(paragraph)];
    while let Some(visit) = stack.pop() {
        match visit {
            Visit::Enter(n) => {
                if let Some(image_id) = resolve_fig_ref(doc, n, map) {
                    out.push_str("<xref ref-type=\"fig\" rid=\"");
                    out.push_str(&quick_xml::escape::escape(image_id));
                    out.push_str("\">");
                    out.push_str(&quick_xml::escape::escape(doc.text_content(n).as_str()));
                    out.push_str("</xref>");
                    continue;
                }
                let el = doc.get(n);
                out.push_str(&el.text);
                for &child in el.children.iter().rev() {
                    stack.push(Visit::Tail(child));
                    stack.push(Visit::Enter(child));
                }
            }
            Visit::Tail(n) => out.push_str(&doc.get(n).tail),
        }
    }
    out
}
