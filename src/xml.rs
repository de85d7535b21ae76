//! Namespace-aware element tree and XML serializer
//!
//! All generated documents are assembled as trees of [`Element`] nodes and
//! rendered in one pass at the end of a conversion. The tree keeps three
//! invariants the consuming schemas depend on:
//!
//! - attributes serialize in first-write insertion order, with later writes
//!   to the same key replacing the value in place;
//! - children are grouped into same-tag buckets, and an element with a
//!   declared child order emits declared tags first, then any undeclared
//!   tags in bucket insertion order (the schemas are sequence-typed, so
//!   this ordering is a correctness requirement, not cosmetics);
//! - text content, embedded markup, and child elements are mutually
//!   exclusive.
//!
//! Elements carry an identity token so that appending a clone of an
//! already-appended node is a no-op rather than a duplicate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

/// Closed set of XML namespaces used by the generated documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ns {
    /// XCCDF 1.2 (default namespace of benchmark documents)
    Xccdf,
    /// OVAL definitions, as referenced from benchmark documents
    OvalDef,
    /// Script Check Engine
    Sce,
    /// Script Check Engine result files
    SceRes,
    /// OVAL definitions (default namespace of test-definition documents)
    Oval,
    /// OVAL common vocabulary
    OvalCommon,
    /// OVAL independent test family
    OvalIndep,
    /// OVAL linux test family
    OvalLinux,
    /// OVAL unix test family
    OvalUnix,
    /// XML Schema instance
    Xsi,
    /// Dublin Core elements
    Dc,
}

impl Ns {
    /// Namespace URI
    pub fn uri(self) -> &'static str {
        match self {
            Self::Xccdf => "http://checklists.nist.gov/xccdf/1.2",
            Self::OvalDef => "http://oval.mitre.org/XMLSchema/oval-definitions-5",
            Self::Sce => "http://open-scap.org/page/SCE",
            Self::SceRes => "http://open-scap.org/page/SCE_result_file",
            Self::Oval => "http://oval.mitre.org/XMLSchema/oval-definitions-5",
            Self::OvalCommon => "http://oval.mitre.org/XMLSchema/oval-common-5",
            Self::OvalIndep => {
                "http://oval.mitre.org/XMLSchema/oval-definitions-5#independent"
            }
            Self::OvalLinux => "http://oval.mitre.org/XMLSchema/oval-definitions-5#linux",
            Self::OvalUnix => "http://oval.mitre.org/XMLSchema/oval-definitions-5#unix",
            Self::Xsi => "http://www.w3.org/2001/XMLSchema-instance",
            Self::Dc => "http://purl.org/dc/elements/1.1/",
        }
    }

    /// Tag prefix within its owning document, `None` for the default
    /// namespace
    pub fn prefix(self) -> Option<&'static str> {
        match self {
            Self::Xccdf | Self::Oval => None,
            Self::OvalDef => Some("oval-def"),
            Self::Sce => Some("sce"),
            Self::SceRes => Some("sceres"),
            Self::OvalCommon => Some("oval-common"),
            Self::OvalIndep => Some("oval-def-indep"),
            Self::OvalLinux => Some("oval-def-linux"),
            Self::OvalUnix => Some("oval-def-unix"),
            Self::Xsi => Some("xsi"),
            Self::Dc => Some("dc"),
        }
    }
}

/// Namespace declarations placed on a benchmark document root
pub const XCCDF_NSMAP: &[Ns] = &[Ns::Xccdf, Ns::OvalDef, Ns::Sce, Ns::SceRes, Ns::Xsi];

/// Namespace declarations placed on a test-definition document root
pub const OVAL_NSMAP: &[Ns] = &[
    Ns::Oval,
    Ns::OvalCommon,
    Ns::OvalIndep,
    Ns::OvalLinux,
    Ns::OvalUnix,
    Ns::Xsi,
];

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
enum Content {
    Empty,
    Text(String),
    /// Pre-rendered markup injected verbatim (already escaped by producer)
    Embedded(String),
    Children(Buckets),
}

/// Same-tag child buckets in first-insertion order
#[derive(Debug, Clone, Default)]
struct Buckets {
    order: Vec<String>,
    by_tag: HashMap<String, Vec<Element>>,
}

impl Buckets {
    fn bucket_mut(&mut self, tag: &str) -> &mut Vec<Element> {
        if !self.by_tag.contains_key(tag) {
            self.order.push(tag.to_string());
        }
        self.by_tag.entry(tag.to_string()).or_default()
    }

    fn get(&self, tag: &str) -> &[Element] {
        self.by_tag.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// A single node of the generated document tree
///
/// Cloning an element preserves its identity token: a clone of a node that
/// was already appended to some parent is rejected as a duplicate by
/// [`Element::append`].
#[derive(Debug, Clone)]
pub struct Element {
    name: String,
    ns: Ns,
    attrs: Vec<(String, String)>,
    attr_index: HashMap<String, usize>,
    content: Content,
    child_order: &'static [&'static str],
    restricted: bool,
    node_id: u64,
}

impl Element {
    /// Create an empty element with a local tag name and namespace
    pub fn new(name: impl Into<String>, ns: Ns) -> Self {
        Self {
            name: name.into(),
            ns,
            attrs: Vec::new(),
            attr_index: HashMap::new(),
            content: Content::Empty,
            child_order: &[],
            restricted: false,
            node_id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Declare the serialization order for child tags
    pub fn with_child_order(mut self, order: &'static [&'static str]) -> Self {
        self.child_order = order;
        self
    }

    /// Restrict children to the declared order vocabulary; appending any
    /// other tag becomes a [`Error::SchemaOrdering`] at append time
    pub fn with_restricted_children(mut self) -> Self {
        self.restricted = true;
        self
    }

    /// Local tag name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set an attribute; first write fixes the position, later writes
    /// replace the value in place
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self.attr_index.get(&name) {
            Some(&idx) => self.attrs[idx].1 = value,
            None => {
                self.attr_index.insert(name.clone(), self.attrs.len());
                self.attrs.push((name, value));
            }
        }
        self
    }

    /// Set several attributes preserving iteration order
    pub fn set_attrs<I, K, V>(&mut self, attrs: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in attrs {
            self.set_attr(k, v);
        }
        self
    }

    /// Read back an attribute value
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attr_index
            .get(name)
            .map(|&idx| self.attrs[idx].1.as_str())
    }

    /// Set literal text content; exclusive with children and embedded
    /// markup
    pub fn set_text(&mut self, text: impl Into<String>) -> Result<&mut Self> {
        if matches!(self.content, Content::Children(_)) {
            return Err(Error::validation(format!(
                "element '{}' already has children, cannot set text",
                self.name
            )));
        }
        self.content = Content::Text(text.into());
        Ok(self)
    }

    /// Set pre-rendered embedded markup; exclusive with children and text
    pub fn set_embedded(&mut self, markup: impl Into<String>) -> Result<&mut Self> {
        if matches!(self.content, Content::Children(_)) {
            return Err(Error::validation(format!(
                "element '{}' already has children, cannot embed markup",
                self.name
            )));
        }
        self.content = Content::Embedded(markup.into());
        Ok(self)
    }

    /// Text content, if any
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            Content::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Append a child element under its tag bucket
    ///
    /// Appending a node whose identity is already present in the bucket is
    /// a no-op. Returns a reference to the child actually stored.
    pub fn append(&mut self, child: Element) -> Result<&mut Element> {
        if matches!(self.content, Content::Text(_) | Content::Embedded(_)) {
            return Err(Error::validation(format!(
                "element '{}' carries text content, cannot append children",
                self.name
            )));
        }
        if self.restricted && !self.child_order.contains(&child.name.as_str()) {
            return Err(Error::SchemaOrdering {
                element: self.name.clone(),
                child: child.name,
            });
        }
        if matches!(self.content, Content::Empty) {
            self.content = Content::Children(Buckets::default());
        }
        let buckets = match &mut self.content {
            Content::Children(b) => b,
            _ => unreachable!("content set to children above"),
        };
        let tag = child.name.clone();
        let bucket = buckets.bucket_mut(&tag);
        if let Some(pos) = bucket.iter().position(|c| c.node_id == child.node_id) {
            return Ok(&mut bucket[pos]);
        }
        bucket.push(child);
        let last = bucket.len() - 1;
        Ok(&mut bucket[last])
    }

    /// Create and append an empty child in this element's namespace
    pub fn sub_element(&mut self, name: impl Into<String>) -> Result<&mut Element> {
        let ns = self.ns;
        self.append(Element::new(name, ns))
    }

    /// Create and append an empty child in an explicit namespace
    pub fn sub_element_ns(&mut self, name: impl Into<String>, ns: Ns) -> Result<&mut Element> {
        self.append(Element::new(name, ns))
    }

    /// Iterate children in one tag bucket, in insertion order
    pub fn children(&self, tag: &str) -> impl Iterator<Item = &Element> {
        let slice: &[Element] = match &self.content {
            Content::Children(b) => b.get(tag),
            _ => &[],
        };
        slice.iter()
    }

    /// Whether the element has neither content nor children
    pub fn is_empty(&self) -> bool {
        matches!(self.content, Content::Empty)
    }

    fn qname(&self) -> String {
        match self.ns.prefix() {
            Some(p) => format!("{}:{}", p, self.name),
            None => self.name.clone(),
        }
    }

    fn write_into(&self, out: &mut String, indent: usize, extra_attrs: &[(String, String)]) {
        let pad = "  ".repeat(indent);
        out.push_str(&pad);
        out.push('<');
        out.push_str(&self.qname());
        for (k, v) in extra_attrs {
            out.push(' ');
            out.push_str(k);
            out.push_str("=\"");
            out.push_str(&escape_attr(v));
            out.push('"');
        }
        for (k, v) in &self.attrs {
            out.push(' ');
            out.push_str(k);
            out.push_str("=\"");
            out.push_str(&escape_attr(v));
            out.push('"');
        }
        match &self.content {
            Content::Empty => out.push_str("/>\n"),
            Content::Text(t) => {
                out.push('>');
                out.push_str(&escape_text(t));
                out.push_str("</");
                out.push_str(&self.qname());
                out.push_str(">\n");
            }
            Content::Embedded(markup) => {
                out.push('>');
                out.push_str(markup);
                out.push_str("</");
                out.push_str(&self.qname());
                out.push_str(">\n");
            }
            Content::Children(buckets) => {
                out.push_str(">\n");
                for child in ordered_children(buckets, self.child_order) {
                    child.write_into(out, indent + 1, &[]);
                }
                out.push_str(&pad);
                out.push_str("</");
                out.push_str(&self.qname());
                out.push_str(">\n");
            }
        }
    }
}

fn ordered_children<'a>(
    buckets: &'a Buckets,
    declared: &[&str],
) -> impl Iterator<Item = &'a Element> {
    let mut result: Vec<&Element> = Vec::new();
    for tag in declared {
        result.extend(buckets.get(tag));
    }
    for tag in &buckets.order {
        if declared.contains(&tag.as_str()) {
            continue;
        }
        result.extend(buckets.get(tag));
    }
    result.into_iter()
}

/// Render a document: root element with namespace declarations, children
/// per declared order, two-space indentation
pub fn serialize(root: &Element, nsmap: &[Ns]) -> String {
    let mut extra = Vec::new();
    for ns in nsmap {
        let key = match ns.prefix() {
            Some(p) => format!("xmlns:{}", p),
            None => "xmlns".to_string(),
        };
        extra.push((key, ns.uri().to_string()));
    }
    let mut out = String::new();
    root.write_into(&mut out, 0, &extra);
    out
}

fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\n' => out.push_str("&#10;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_insertion_order_with_replacement() {
        let mut e = Element::new("unit", Ns::Oval);
        e.set_attr("id", "first").set_attr("version", "1");
        e.set_attr("id", "second");

        let xml = serialize(&e, &[]);
        // position preserved from the first write, value from the last
        assert_eq!(xml, "<unit id=\"second\" version=\"1\"/>\n");
    }

    #[test]
    fn test_declared_order_then_insertion_order() {
        let mut e = Element::new("root", Ns::Oval).with_child_order(&["a", "b", "c"]);
        e.sub_element("z").unwrap();
        e.sub_element("c").unwrap();
        e.sub_element("a").unwrap();
        e.sub_element("y").unwrap();

        let xml = serialize(&e, &[]);
        let pos = |tag: &str| xml.find(&format!("<{}/>", tag)).unwrap();
        assert!(pos("a") < pos("c"));
        assert!(pos("c") < pos("z"));
        assert!(pos("z") < pos("y"));
    }

    #[test]
    fn test_same_tag_bucket_preserves_insertion_order() {
        let mut e = Element::new("root", Ns::Oval);
        let mut first = Element::new("item", Ns::Oval);
        first.set_text("one").unwrap();
        let mut second = Element::new("item", Ns::Oval);
        second.set_text("two").unwrap();
        e.append(first).unwrap();
        e.append(second).unwrap();

        let xml = serialize(&e, &[]);
        assert!(xml.find("one").unwrap() < xml.find("two").unwrap());
    }

    #[test]
    fn test_identity_dedup_on_append() {
        let mut e = Element::new("root", Ns::Oval);
        let child = Element::new("item", Ns::Oval);
        let dup = child.clone();
        e.append(child).unwrap();
        e.append(dup).unwrap();
        assert_eq!(e.children("item").count(), 1);

        // a fresh node with the same tag is a separate child
        e.append(Element::new("item", Ns::Oval)).unwrap();
        assert_eq!(e.children("item").count(), 2);
    }

    #[test]
    fn test_text_and_children_exclusive() {
        let mut e = Element::new("root", Ns::Oval);
        e.sub_element("child").unwrap();
        assert!(e.set_text("boom").is_err());

        let mut t = Element::new("leaf", Ns::Oval);
        t.set_text("text").unwrap();
        assert!(t.append(Element::new("child", Ns::Oval)).is_err());
    }

    #[test]
    fn test_restricted_vocabulary_rejects_unknown_child() {
        let mut e = Element::new("metadata", Ns::Dc)
            .with_child_order(&["title", "creator"])
            .with_restricted_children();
        e.sub_element("title").unwrap();
        let err = e.sub_element("banana").unwrap_err();
        assert!(matches!(err, Error::SchemaOrdering { .. }));
    }

    #[test]
    fn test_escaping() {
        let mut e = Element::new("t", Ns::Oval);
        e.set_attr("a", "x\"<y>");
        e.set_text("a < b & c").unwrap();
        let xml = serialize(&e, &[]);
        assert!(xml.contains("a=\"x&quot;&lt;y&gt;\""));
        assert!(xml.contains("a &lt; b &amp; c"));
    }

    #[test]
    fn test_namespace_declarations_and_prefixes() {
        let mut root = Element::new("oval_definitions", Ns::Oval);
        let gen = root.sub_element("generator").unwrap();
        gen.sub_element_ns("product_name", Ns::OvalCommon)
            .unwrap()
            .set_text("rampart")
            .unwrap();

        let xml = serialize(&root, OVAL_NSMAP);
        assert!(xml.starts_with("<oval_definitions xmlns=\""));
        assert!(xml.contains("xmlns:oval-common=\"http://oval.mitre.org/XMLSchema/oval-common-5\""));
        assert!(xml.contains("<oval-common:product_name>rampart</oval-common:product_name>"));
    }
}
