//! Arena element tree built from quick-xml events.
//!
//! Each element keeps its leading `text` and the `tail` text that follows
//! its end tag inside the parent, so document order can be rebuilt exactly.
//! Tags are stored by local name; attributes keep their qualified keys
//! (`xlink:href`).

use std::borrow::Cow;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

pub type NodeId = usize;

#[derive(Debug, Clone, Default)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
    pub tail: String,
    pub children: Vec<NodeId>,
    pub parent: Option<NodeId>,
}

impl Element {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Link target of `graphic`-like elements.
    pub fn href(&self) -> Option<&str> {
        self.attr("xlink:href").or_else(|| self.attr("href"))
    }
}

/// Why a document could not be turned into a tree
#[derive(Debug)]
pub enum TreeError {
    Io(std::io::Error),
    Xml { position: u64, source: quick_xml::Error },
    NoRoot,
    TrailingElement(String),
    Unclosed(String),
}

impl std::fmt::Display for TreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO: {e}"),
            Self::Xml { position, source } => write!(f, "XML error at byte {position}: {source}"),
            Self::NoRoot => write!(f, "document has no root element"),
            Self::TrailingElement(tag) => write!(f, "element <{tag}> after the root element"),
            Self::Unclosed(tag) => write!(f, "document ends inside <{tag}>"),
        }
    }
}

impl std::error::Error for TreeError {}

/// Parsed document: all elements in one arena, root first.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Element>,
    root: NodeId,
}

impl Document {
    pub fn from_file(path: &Path) -> Result<Self, TreeError> {
        let bytes = std::fs::read(path).map_err(TreeError::Io)?;
        Self::parse(&String::from_utf8_lossy(&bytes))
    }

    pub fn parse(xml: &str) -> Result<Self, TreeError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut nodes: Vec<Element> = Vec::new();
        let mut stack: Vec<NodeId> = Vec::new();
        let mut root = None;

        loop {
            let event = reader.read_event().map_err(|source| TreeError::Xml {
                position: reader.error_position(),
                source,
            })?;
            match event {
                Event::Start(e) => {
                    let id = open_element(&mut nodes, &stack, &mut root, &e)?;
                    stack.push(id);
                }
                Event::Empty(e) => {
                    open_element(&mut nodes, &stack, &mut root, &e)?;
                }
                Event::End(_) => {
                    stack.pop();
                }
                Event::Text(e) => {
                    let text = e
                        .unescape()
                        .unwrap_or_else(|_| Cow::Owned(String::from_utf8_lossy(&e).into_owned()));
                    push_text(&mut nodes, &stack, &text);
                }
                Event::CData(e) => push_text(&mut nodes, &stack, &String::from_utf8_lossy(&e)),
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(&open) = stack.last() {
            return Err(TreeError::Unclosed(nodes[open].tag.clone()));
        }
        let root = root.ok_or(TreeError::NoRoot)?;
        Ok(Self { nodes, root })
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get(&self, id: NodeId) -> &Element {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// `id` and everything below it, in document order.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            stack: vec![id],
        }
    }

    /// First element named `tag` at or below `from`, depth first.
    pub fn find_first(&self, from: NodeId, tag: &str) -> Option<NodeId> {
        self.descendants(from).find(|&n| self.nodes[n].tag == tag)
    }

    pub fn find_all<'a>(&'a self, from: NodeId, tag: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.descendants(from).filter(move |&n| self.nodes[n].tag == tag)
    }

    /// Parent, grandparent, ... up to the root.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: self.nodes[id].parent,
        }
    }

    pub fn nearest_ancestor(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        self.ancestors(id).find(|&a| self.nodes[a].tag == tag)
    }

    /// All text inside `id` in document order, excluding its own tail.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![Visit::Enter(id)];
        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Enter(n) => {
                    let el = &self.nodes[n];
                    out.push_str(&el.text);
                    for &child in el.children.iter().rev() {
                        stack.push(Visit::Tail(child));
                        stack.push(Visit::Enter(child));
                    }
                }
                Visit::Tail(n) => out.push_str(&self.nodes[n].tail),
            }
        }
        out
    }
}

/// Step of an iterative in-order walk: an element's content, then its tail.
#[derive(Debug, Clone, Copy)]
pub enum Visit {
    Enter(NodeId),
    Tail(NodeId),
}

pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.doc.nodes[id].children.iter().rev().copied());
        Some(id)
    }
}

pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.doc.nodes[id].parent;
        Some(id)
    }
}

/// Collapse runs of whitespace to single spaces and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn open_element(
    nodes: &mut Vec<Element>,
    stack: &[NodeId],
    root: &mut Option<NodeId>,
    e: &BytesStart,
) -> Result<NodeId, TreeError> {
    let tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
    let parent = stack.last().copied();
    if parent.is_none() && root.is_some() {
        return Err(TreeError::TrailingElement(tag));
    }

    let attrs = e
        .attributes()
        .flatten()
        .map(|a| {
            let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
            let value = a
                .unescape_value()
                .map(Cow::into_owned)
                .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).into_owned());
            (key, value)
        })
        .collect();

    let id = nodes.len();
    nodes.push(Element {
        tag,
        attrs,
        parent,
        ..Default::default()
    });
    match parent {
        Some(p) => nodes[p].children.push(id),
        None => *root = Some(id),
    }
    Ok(id)
}

fn push_text(nodes: &mut [Element], stack: &[NodeId], s: &str) {
    // Text outside the root (prolog whitespace) has no owner
    let Some(&open) = stack.last() else {
        return;
    };
    match nodes[open].children.last() {
        Some(&last) => nodes[last].tail.push_str(s),
        None => nodes[open].text.push_str(s),
    }
}
