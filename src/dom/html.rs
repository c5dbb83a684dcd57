//! Rich-text HTML fragment parsing.
//!
//! Editor output is HTML, not XML: void elements without a slash, unquoted
//! attributes, named entities like `&nbsp;`, stray end tags. quick-xml runs in
//! its most permissive mode and a small tree builder repairs the rest. This
//! parser never fails; a malformed tail is dropped and logged.

use quick_xml::escape::{resolve_html5_entity, unescape_with};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{ContentNode, Element, VOID_TAGS};

/// Elements whose content never renders.
const SKIPPED_TAGS: &[&str] = &["script", "style", "head", "title", "template"];

/// Block-level tags that implicitly close an open `<p>`.
const CLOSES_P: &[&str] = &[
    "address", "blockquote", "div", "dl", "figure", "h1", "h2", "h3", "h4", "h5", "h6", "hr",
    "ol", "p", "pre", "section", "table", "ul",
];

/// Parse an HTML fragment into content nodes.
pub fn parse_fragment(html: &str) -> Vec<ContentNode> {
    let mut reader = Reader::from_str(html);
    {
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;
        config.check_comments = false;
    }

    let mut builder = TreeBuilder::default();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => builder.open(element_from(&e)),
            Ok(Event::Empty(e)) => builder.append(element_from(&e).into()),
            Ok(Event::End(e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                builder.close(&tag);
            }
            Ok(Event::Text(t)) => {
                let raw = String::from_utf8_lossy(&t);
                builder.text(&decode_entities(&raw));
            }
            Ok(Event::CData(c)) => builder.text(&String::from_utf8_lossy(&c)),
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                log::warn!(
                    "Rich-text fragment truncated at byte {}: {}",
                    reader.buffer_position(),
                    e
                );
                break;
            }
        }
    }
    builder.finish()
}

/// Resolve HTML5 named and numeric character references. Text that is not
/// valid escaped markup (a bare `&`, an unknown entity) passes through as-is.
fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    match unescape_with(raw, resolve_html5_entity) {
        Ok(text) => text.into_owned(),
        Err(_) => raw.to_string(),
    }
}

fn element_from(start: &BytesStart) -> Element {
    let tag = String::from_utf8_lossy(start.name().as_ref()).to_ascii_lowercase();
    let mut el = Element::new(&tag);
    for attr in start.html_attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
        let value = decode_entities(&String::from_utf8_lossy(&attr.value));
        el.set_attr(&key, value);
    }
    el
}

#[derive(Default)]
struct TreeBuilder {
    roots: Vec<ContentNode>,
    stack: Vec<Element>,
}

impl TreeBuilder {
    fn open(&mut self, el: Element) {
        if VOID_TAGS.contains(&el.tag.as_str()) {
            self.append(el.into());
            return;
        }
        self.close_implied_by(&el.tag);
        self.stack.push(el);
    }

    /// HTML's implicit end tags for the cases editors actually produce.
    fn close_implied_by(&mut self, tag: &str) {
        let top = match self.stack.last() {
            Some(top) => top.tag.clone(),
            None => return,
        };
        let implied = match tag {
            "li" => top == "li",
            "dt" | "dd" => top == "dt" || top == "dd",
            "td" | "th" => top == "td" || top == "th",
            "tr" => {
                if top == "td" || top == "th" {
                    self.pop();
                }
                self.stack.last().is_some_and(|t| t.tag == "tr")
            }
            _ => CLOSES_P.contains(&tag) && top == "p",
        };
        if implied {
            self.pop();
        }
    }

    fn close(&mut self, tag: &str) {
        if !self.stack.iter().any(|el| el.tag == tag) {
            return;
        }
        while let Some(el) = self.stack.last() {
            let done = el.tag == tag;
            self.pop();
            if done {
                break;
            }
        }
    }

    fn pop(&mut self) {
        if let Some(el) = self.stack.pop() {
            if !SKIPPED_TAGS.contains(&el.tag.as_str()) {
                self.append(el.into());
            }
        }
    }

    fn append(&mut self, node: ContentNode) {
        let siblings = match self.stack.last_mut() {
            Some(parent) => &mut parent.children,
            None => &mut self.roots,
        };
        if let ContentNode::Text { text } = &node {
            if let Some(ContentNode::Text { text: prev }) = siblings.last_mut() {
                prev.push_str(text);
                return;
            }
        }
        siblings.push(node);
    }

    fn text(&mut self, content: &str) {
        if content.is_empty() {
            return;
        }
        self.append(ContentNode::text(content));
    }

    fn finish(mut self) -> Vec<ContentNode> {
        while !self.stack.is_empty() {
            self.pop();
        }
        self.roots
    }
}
