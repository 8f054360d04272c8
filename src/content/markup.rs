//! Markup rewriting for mobile reading.
//!
//! Book documents are parsed into a node tree, a fixed set of nodes is
//! appended to the document's `head`, and the whole tree is serialized back.
//! Everything the parser saw (declaration, doctype, comments, whitespace,
//! entity references) is written back as it was read.
//!
//! ```text
//!  bytes ──► Document::parse ──► head_mut().append(..) ──► Document::to_bytes
//! ```

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use thiserror::Error;

/// Analytics property the injected tag reports to.
pub const ANALYTICS_TRACKING_ID: &str = "UA-138233271-1";

/// Stylesheet constraining the reading column.
pub const READER_STYLESHEET: &str =
    "body { max-width: 40em; margin: 0 auto; padding: 0 1em; } img { max-width: 100%; }";

/// Errors while parsing or serializing a document.
#[derive(Debug, Clone, Error)]
pub enum MarkupError {
    #[error("parse error at byte {position}: {message}")]
    Parse { position: u64, message: String },

    #[error("element <{0}> is never closed")]
    Unclosed(String),

    #[error("document has no head or html element")]
    NoHead,

    #[error("serialization failed: {0}")]
    Serialize(String),
}

// =============================================================================
// Tree
// =============================================================================

/// A node in a parsed document.
#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    /// Text, comments, CDATA, declarations and processing instructions.
    Leaf(Event<'static>),
}

/// An element and its children.
#[derive(Debug, Clone)]
pub struct Element {
    start: BytesStart<'static>,
    children: Vec<Node>,
    /// Written as `<name/>` while it has no children.
    self_closing: bool,
}

impl Element {
    /// Create an element with no attributes.
    pub fn new(name: &'static str) -> Self {
        Self {
            start: BytesStart::new(name),
            children: Vec::new(),
            self_closing: false,
        }
    }

    /// Create an element from an already-built start tag.
    pub fn from_start(start: BytesStart<'static>) -> Self {
        Self {
            start,
            children: Vec::new(),
            self_closing: false,
        }
    }

    /// Mark the element as serializing to a single `<name/>` tag.
    pub fn self_closing(mut self) -> Self {
        self.self_closing = true;
        self
    }

    /// Append a child text node. `text` is written exactly as given.
    pub fn with_raw_text(mut self, text: impl Into<String>) -> Self {
        self.children
            .push(Node::Leaf(Event::Text(BytesText::from_escaped(text.into()))));
        self
    }

    /// The element name without namespace prefix.
    pub fn local_name(&self) -> &[u8] {
        self.start.local_name().into_inner()
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn append(&mut self, node: Node) {
        self.children.push(node);
    }
}

/// A parsed document.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    /// Parse a well-formed XML or XHTML document.
    pub fn parse(input: &[u8]) -> Result<Self, MarkupError> {
        let mut reader = Reader::from_reader(input);
        reader.config_mut().check_end_names = true;

        let mut root: Vec<Node> = Vec::new();
        let mut open: Vec<Element> = Vec::new();

        loop {
            let event = reader.read_event().map_err(|e| MarkupError::Parse {
                position: reader.buffer_position() as u64,
                message: e.to_string(),
            })?;

            let node = match event {
                Event::Eof => break,
                Event::Start(start) => {
                    open.push(Element::from_start(start.into_owned()));
                    continue;
                }
                Event::End(_) => match open.pop() {
                    Some(element) => Node::Element(element),
                    None => {
                        return Err(MarkupError::Parse {
                            position: reader.buffer_position() as u64,
                            message: "unexpected end tag".to_string(),
                        })
                    }
                },
                Event::Empty(start) => {
                    Node::Element(Element::from_start(start.into_owned()).self_closing())
                }
                other => Node::Leaf(other.into_owned()),
            };

            match open.last_mut() {
                Some(parent) => parent.append(node),
                None => root.push(node),
            }
        }

        if let Some(element) = open.pop() {
            let name = String::from_utf8_lossy(element.start.name().into_inner()).into_owned();
            return Err(MarkupError::Unclosed(name));
        }

        Ok(Self { nodes: root })
    }

    /// First element (depth-first) with the given local name.
    pub fn find_mut(&mut self, local_name: &[u8]) -> Option<&mut Element> {
        find_element_mut(&mut self.nodes, local_name)
    }

    /// The document's `head`, created as the first child of `html` when
    /// the document has none.
    pub fn head_mut(&mut self) -> Option<&mut Element> {
        if self.find_mut(b"head").is_none() {
            let html = self.find_mut(b"html")?;
            html.children.insert(0, Node::Element(Element::new("head")));
        }
        self.find_mut(b"head")
    }

    /// Serialize the tree back to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MarkupError> {
        let mut writer = Writer::new(Vec::new());
        for node in &self.nodes {
            write_node(&mut writer, node)?;
        }
        Ok(writer.into_inner())
    }
}

fn find_element_mut<'a>(nodes: &'a mut [Node], local_name: &[u8]) -> Option<&'a mut Element> {
    for node in nodes.iter_mut() {
        let Node::Element(element) = node else {
            continue;
        };
        if element.local_name() == local_name {
            return Some(element);
        }
        if let Some(found) = find_element_mut(&mut element.children, local_name) {
            return Some(found);
        }
    }
    None
}

fn serialize(e: impl std::fmt::Display) -> MarkupError {
    MarkupError::Serialize(e.to_string())
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<(), MarkupError> {
    match node {
        Node::Leaf(event) => writer.write_event(event.borrow()).map_err(serialize),
        Node::Element(element) if element.self_closing && element.children.is_empty() => writer
            .write_event(Event::Empty(element.start.borrow()))
            .map_err(serialize),
        Node::Element(element) => {
            writer
                .write_event(Event::Start(element.start.borrow()))
                .map_err(serialize)?;
            for child in &element.children {
                write_node(writer, child)?;
            }
            writer
                .write_event(Event::End(element.start.to_end()))
                .map_err(serialize)
        }
    }
}

// =============================================================================
// Injection
// =============================================================================

/// The nodes appended to every document head, in order.
pub fn reader_nodes() -> Vec<Node> {
    let viewport = Element::from_start(BytesStart::new("meta").with_attributes([
        ("name", "viewport"),
        ("content", "width=device-width, initial-scale=1"),
    ]))
    .self_closing();

    let style = Element::from_start(BytesStart::new("style").with_attributes([("type", "text/css")]))
        .with_raw_text(READER_STYLESHEET);

    let loader_src = format!(
        "https://www.googletagmanager.com/gtag/js?id={}",
        ANALYTICS_TRACKING_ID
    );
    let loader = Element::from_start(
        BytesStart::new("script")
            .with_attributes([("async", "async"), ("src", loader_src.as_str())]),
    );

    let init = Element::new("script").with_raw_text(format!(
        "window.dataLayer = window.dataLayer || []; \
         function gtag(){{dataLayer.push(arguments);}} \
         gtag('js', new Date()); \
         gtag('config', '{}');",
        ANALYTICS_TRACKING_ID
    ));

    [viewport, style, loader, init]
        .into_iter()
        .map(Node::Element)
        .collect()
}

/// Parse `input`, append [`reader_nodes`] to its head, and serialize.
pub fn inject_reader_nodes(input: &[u8]) -> Result<Vec<u8>, MarkupError> {
    let mut document = Document::parse(input)?;
    let head = document.head_mut().ok_or(MarkupError::NoHead)?;
    for node in reader_nodes() {
        head.append(node);
    }
    document.to_bytes()
}
