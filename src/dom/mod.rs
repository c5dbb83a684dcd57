//! # Content Tree
//!
//! The unit of flow. A report is normalized into a sequence of these nodes,
//! the flow engine partitions them across page bodies, and the layout engine
//! measures and paints them.
//!
//! The tree is owned and acyclic. Order among siblings is significant and is
//! preserved by every transformation in the crate.

pub mod html;

use serde::{Deserialize, Serialize};

/// Tags that never have children and count as content on their own.
pub const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// A node in the content tree: a text run or an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentNode {
    Text { text: String },
    Element(Element),
}

/// A block or inline element with attributes and children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attrs: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ContentNode>,
}

impl ContentNode {
    pub fn text(content: impl Into<String>) -> Self {
        ContentNode::Text {
            text: content.into(),
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            ContentNode::Element(el) => Some(el),
            ContentNode::Text { .. } => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            ContentNode::Element(el) => Some(el),
            ContentNode::Text { .. } => None,
        }
    }

    /// Concatenated text of every leaf, in document order.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            ContentNode::Text { text } => out.push_str(text),
            ContentNode::Element(el) => {
                for child in &el.children {
                    child.collect_text(out);
                }
            }
        }
    }

    /// True if this subtree renders anything: non-blank text or a void
    /// element such as an image or a divider.
    pub fn has_content(&self) -> bool {
        match self {
            ContentNode::Text { text } => !text.trim().is_empty(),
            ContentNode::Element(el) => {
                VOID_TAGS.contains(&el.tag.as_str()) || el.children.iter().any(|c| c.has_content())
            }
        }
    }

    /// Every `img src` in this subtree, in document order.
    pub fn image_sources(&self, out: &mut Vec<String>) {
        if let ContentNode::Element(el) = self {
            if el.tag == "img" {
                if let Some(src) = el.get_attr("src") {
                    out.push(src.to_string());
                }
            }
            for child in &el.children {
                child.image_sources(out);
            }
        }
    }

    /// Replace placeholder tokens in every text leaf.
    pub fn substitute(&mut self, replacements: &[(&str, String)]) {
        match self {
            ContentNode::Text { text } => {
                for (token, value) in replacements {
                    if text.contains(token) {
                        *text = text.replace(token, value);
                    }
                }
            }
            ContentNode::Element(el) => {
                for child in &mut el.children {
                    child.substitute(replacements);
                }
            }
        }
    }
}

impl From<Element> for ContentNode {
    fn from(el: Element) -> Self {
        ContentNode::Element(el)
    }
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder: set an attribute.
    pub fn attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder: append a child node.
    pub fn child(mut self, node: impl Into<ContentNode>) -> Self {
        self.children.push(node.into());
        self
    }

    /// Builder: append a text child.
    pub fn text(mut self, content: impl Into<String>) -> Self {
        self.children.push(ContentNode::text(content));
        self
    }

    /// Builder: append several children.
    pub fn children(mut self, nodes: impl IntoIterator<Item = ContentNode>) -> Self {
        self.children.extend(nodes);
        self
    }

    pub fn get_attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(slot) = self.attrs.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            slot.1 = value;
        } else {
            self.attrs.push((name.to_ascii_lowercase(), value));
        }
    }

    /// Whitespace-separated class list.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.get_attr("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Same tag and attributes, no children. Used as the container for the
    /// first fragment when a block is split across pages.
    pub fn shallow_clone(&self) -> Element {
        Element {
            tag: self.tag.clone(),
            attrs: self.attrs.clone(),
            children: Vec::new(),
        }
    }

    pub fn is_void(&self) -> bool {
        VOID_TAGS.contains(&self.tag.as_str())
    }
}

impl ContentNode {
    /// Attribute lookup that is `None` for text runs.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.as_element().and_then(|el| el.get_attr(name))
    }
}

/// Concatenate the text of a node sequence.
pub fn text_of(nodes: &[ContentNode]) -> String {
    nodes.iter().map(|n| n.text_content()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shallow_clone_drops_children_keeps_attrs() {
        let el = Element::new("div")
            .attr("class", "section-body")
            .text("hello");
        let shell = el.shallow_clone();
        assert_eq!(shell.tag, "div");
        assert_eq!(shell.get_attr("class"), Some("section-body"));
        assert!(shell.children.is_empty());
    }

    #[test]
    fn text_content_concatenates_in_order() {
        let node: ContentNode = Element::new("p")
            .text("a")
            .child(Element::new("b").text("b"))
            .text("c")
            .into();
        assert_eq!(node.text_content(), "abc");
    }

    #[test]
    fn has_content_ignores_whitespace_but_counts_images() {
        let blank: ContentNode = Element::new("div").text("  \n ").into();
        assert!(!blank.has_content());
        let img: ContentNode = Element::new("div")
            .child(Element::new("img").attr("src", "x.png"))
            .into();
        assert!(img.has_content());
    }

    #[test]
    fn substitute_replaces_tokens_in_leaves() {
        let mut node: ContentNode = Element::new("p").text("Page {page} of {pages}").into();
        node.substitute(&[("{page}", "2".to_string()), ("{pages}", "5".to_string())]);
        assert_eq!(node.text_content(), "Page 2 of 5");
    }

    #[test]
    fn image_sources_in_document_order() {
        let node: ContentNode = Element::new("div")
            .child(Element::new("img").attr("src", "a.png"))
            .child(Element::new("p").child(Element::new("img").attr("src", "b.png")))
            .into();
        let mut srcs = Vec::new();
        node.image_sources(&mut srcs);
        assert_eq!(srcs, vec!["a.png", "b.png"]);
    }
}
