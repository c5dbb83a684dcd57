//! # Page Flow
//!
//! Distributes a content tree across fixed-height page bodies.
//!
//! The engine is a greedy first-fit with forced splitting and no
//! backtracking. Every candidate placement is measured for real: a node is
//! appended, the page body is laid out, and if the scroll height exceeds the
//! body height the node comes back out. Nothing is estimated.
//!
//! For each node:
//! 1. try to append it where the cursor is (the page body, or a shell
//!    element inside it)
//! 2. if it overflows and the page already holds content, open a new page
//!    and try again there
//! 3. if it still overflows, split: append an empty shell (a shallow clone)
//!    and place each child into it by the same rules
//!
//! An element with no children that cannot fit even on an empty page is
//! placed anyway and overflows. A text run in that position is split at line
//! break opportunities when [`FlowOptions::split_text`] is on.
//!
//! Two continuation policies exist. [`SplitMode::Detach`] opens the new page
//! with a bare body: the remainder of a split block lands there unwrapped.
//! [`SplitMode::Reopen`] rebuilds the chain of open shells on the new page so
//! wrapper styling carries over and ordered lists keep counting.

pub mod geometry;

use serde::{Deserialize, Serialize};

use crate::dom::{ContentNode, Element};
use crate::style::{css, Dimension};
pub use geometry::{PageGeometry, Rect};

/// Measures a candidate page body.
pub trait Measure {
    /// Scroll height of a page body holding `body`.
    fn measure(&self, body: &[ContentNode]) -> f64;

    /// The fixed height every body must fit in.
    fn body_height(&self) -> f64;
}

/// What happens to the open shells when a split block overflows a page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SplitMode {
    /// Continue on a bare page body.
    #[default]
    Detach,
    /// Re-open the ancestor shells on the new page.
    Reopen,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlowOptions {
    pub split_mode: SplitMode,
    /// Split text runs that cannot fit on an empty page.
    pub split_text: bool,
    /// Slack allowed above the body height, for sub-pixel rounding.
    pub tolerance_px: f64,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            split_mode: SplitMode::Detach,
            split_text: true,
            tolerance_px: 0.5,
        }
    }
}

/// One composed page: letterhead, flowed body, footer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContainer {
    pub index: usize,
    pub header: Vec<ContentNode>,
    pub body: Vec<ContentNode>,
    pub footer: Vec<ContentNode>,
}

/// Letterhead content repeated on every page.
#[derive(Debug, Clone, Default)]
pub struct PageChrome {
    pub header: Vec<ContentNode>,
    pub footer: Vec<ContentNode>,
    /// Substitutions besides `{page}` and `{pages}`.
    pub placeholders: Vec<(&'static str, String)>,
}

/// Where the next node goes: the page body, or the children of the element
/// at this index path inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Body,
    Shell(Vec<usize>),
}

impl Target {
    fn path(&self) -> &[usize] {
        match self {
            Target::Body => &[],
            Target::Shell(path) => path,
        }
    }

    fn truncate(&self, depth: usize) -> Target {
        match self {
            Target::Shell(path) if depth > 0 => Target::Shell(path[..depth.min(path.len())].to_vec()),
            _ => Target::Body,
        }
    }
}

struct FlowState {
    done: Vec<Vec<ContentNode>>,
    current: Vec<ContentNode>,
}

impl FlowState {
    fn pages_opened(&self) -> usize {
        self.done.len()
    }
}

fn container_mut<'b>(body: &'b mut Vec<ContentNode>, path: &[usize]) -> Option<&'b mut Vec<ContentNode>> {
    let mut current = body;
    for &i in path {
        current = &mut current.get_mut(i)?.as_element_mut()?.children;
    }
    Some(current)
}

fn element_at<'b>(body: &'b [ContentNode], path: &[usize]) -> Vec<&'b Element> {
    let mut chain = Vec::with_capacity(path.len());
    let mut siblings = body;
    for &i in path {
        match siblings.get(i).and_then(ContentNode::as_element) {
            Some(el) => {
                chain.push(el);
                siblings = &el.children;
            }
            None => break,
        }
    }
    chain
}

pub struct FlowEngine<'a, M: Measure + ?Sized> {
    measure: &'a M,
    options: FlowOptions,
}

impl<'a, M: Measure + ?Sized> FlowEngine<'a, M> {
    pub fn new(measure: &'a M, options: FlowOptions) -> Self {
        Self { measure, options }
    }

    /// Partition `nodes` into page bodies. Always returns at least one page.
    pub fn flow(&self, nodes: &[ContentNode]) -> Vec<Vec<ContentNode>> {
        let mut st = FlowState {
            done: Vec::new(),
            current: Vec::new(),
        };
        let mut target = Target::Body;
        for node in nodes {
            target = self.place(&mut st, node, target);
        }
        let mut pages = st.done;
        pages.push(st.current);
        pages
    }

    fn place(&self, st: &mut FlowState, node: &ContentNode, target: Target) -> Target {
        match node {
            ContentNode::Text { text } => self.place_text(st, text, target),
            ContentNode::Element(el) => self.place_element(st, el, target),
        }
    }

    fn place_text(&self, st: &mut FlowState, text: &str, target: Target) -> Target {
        if text.trim().is_empty() {
            self.force_append(st, &target, wrap_text(text, &target));
            return target;
        }
        if self.try_append(st, &target, wrap_text(text, &target)) {
            return target;
        }
        let mut target = target;
        if self.page_has_content(st) {
            target = self.continuation(st, &target);
            if self.try_append(st, &target, wrap_text(text, &target)) {
                return target;
            }
        }
        if self.options.split_text {
            return self.split_text(st, text, target);
        }
        log::warn!(
            "Text run of {} chars is taller than a page body, placing as-is",
            text.chars().count()
        );
        self.force_append(st, &target, wrap_text(text, &target));
        target
    }

    /// Place `text` as consecutive fragments, each the longest prefix that
    /// fits at a line break opportunity. The fragments concatenate back to
    /// `text` exactly.
    fn split_text(&self, st: &mut FlowState, text: &str, target: Target) -> Target {
        let mut target = target;
        let mut rest = text;
        loop {
            if self.try_append(st, &target, wrap_text(rest, &target)) {
                return target;
            }
            let offsets = crate::text::break_offsets(rest);
            match self.longest_fitting_prefix(st, &target, rest, &offsets) {
                Some(cut) => {
                    self.force_append(st, &target, wrap_text(&rest[..cut], &target));
                    log::debug!("Split text run at byte {} of {}", cut, rest.len());
                    rest = &rest[cut..];
                    target = self.continuation(st, &target);
                }
                None if self.page_has_content(st) => {
                    target = self.continuation(st, &target);
                }
                None => {
                    // Not even one word fits on an empty page.
                    let cut = offsets.first().copied().unwrap_or(rest.len());
                    log::warn!("Word taller than a page body, placing as-is");
                    self.force_append(st, &target, wrap_text(&rest[..cut], &target));
                    rest = &rest[cut..];
                    if rest.is_empty() {
                        return target;
                    }
                    target = self.continuation(st, &target);
                }
            }
        }
    }

    fn longest_fitting_prefix(
        &self,
        st: &mut FlowState,
        target: &Target,
        text: &str,
        offsets: &[usize],
    ) -> Option<usize> {
        let (mut lo, mut hi) = (0usize, offsets.len());
        let mut best = None;
        while lo < hi {
            let mid = (lo + hi) / 2;
            let cut = offsets[mid];
            if self.try_append(st, target, wrap_text(&text[..cut], target)) {
                self.pop(st, target);
                best = Some(cut);
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        best
    }

    fn place_element(&self, st: &mut FlowState, el: &Element, target: Target) -> Target {
        let node = ContentNode::Element(el.clone());
        if self.try_append(st, &target, node.clone()) {
            return target;
        }

        let mut target = target;
        if self.page_has_content(st) {
            target = self.continuation(st, &target);
            if self.try_append(st, &target, node.clone()) {
                return target;
            }
        }

        if el.children.is_empty() {
            log::warn!(
                "<{}> is taller than a page body and cannot be split, placing as-is",
                el.tag
            );
            self.force_append(st, &target, node);
            return target;
        }

        log::debug!(
            "Splitting <{}> with {} children on page {}",
            el.tag,
            el.children.len(),
            st.pages_opened() + 1
        );
        let depth = target.path().len();
        let pages_before = st.pages_opened();
        let shell_index = self.force_append(st, &target, el.shallow_clone().into());
        let mut shell_path = target.path().to_vec();
        shell_path.push(shell_index);

        let mut child_target = Target::Shell(shell_path);
        for child in &el.children {
            child_target = self.place(st, child, child_target);
        }

        match self.options.split_mode {
            SplitMode::Detach if st.pages_opened() > pages_before => Target::Body,
            SplitMode::Detach => target,
            SplitMode::Reopen => child_target.truncate(depth),
        }
    }

    /// Open a new page and return where placement continues on it.
    fn continuation(&self, st: &mut FlowState, target: &Target) -> Target {
        let path = target.path();
        let shells = match self.options.split_mode {
            SplitMode::Reopen if !path.is_empty() => reopen_chain(&st.current, path),
            _ => None,
        };

        st.done.push(std::mem::take(&mut st.current));
        log::debug!("Opened page {}", st.pages_opened() + 1);

        match shells {
            Some(root) => {
                st.current.push(root);
                Target::Shell(vec![0; path.len()])
            }
            None => Target::Body,
        }
    }

    fn fits(&self, body: &[ContentNode]) -> bool {
        self.measure.measure(body) <= self.measure.body_height() + self.options.tolerance_px
    }

    fn page_has_content(&self, st: &FlowState) -> bool {
        st.current.iter().any(occupies_space)
    }

    fn try_append(&self, st: &mut FlowState, target: &Target, node: ContentNode) -> bool {
        match container_mut(&mut st.current, target.path()) {
            Some(container) => container.push(node),
            None => return false,
        }
        if self.fits(&st.current) {
            return true;
        }
        self.pop(st, target);
        false
    }

    /// Append without a fit test. Returns the new child's index.
    fn force_append(&self, st: &mut FlowState, target: &Target, node: ContentNode) -> usize {
        match container_mut(&mut st.current, target.path()) {
            Some(container) => {
                container.push(node);
                container.len() - 1
            }
            None => {
                log::warn!("Lost flow target {:?}, appending to page body", target.path());
                st.current.push(node);
                st.current.len() - 1
            }
        }
    }

    fn pop(&self, st: &mut FlowState, target: &Target) {
        if let Some(container) = container_mut(&mut st.current, target.path()) {
            container.pop();
        }
    }
}

/// Text goes into a `div` at body level and stays raw inside a shell.
fn wrap_text(text: &str, target: &Target) -> ContentNode {
    match target {
        Target::Body => Element::new("div").text(text).into(),
        Target::Shell(_) => ContentNode::text(text),
    }
}

/// Empty copies of the shells along `path`, nested, ready to open a page.
/// Ordered lists get a `start` that continues their numbering.
fn reopen_chain(body: &[ContentNode], path: &[usize]) -> Option<ContentNode> {
    let chain = element_at(body, path);
    if chain.len() != path.len() {
        return None;
    }
    let mut shells: Vec<Element> = chain
        .iter()
        .map(|el| {
            let mut shell = el.shallow_clone();
            if el.tag == "ol" {
                let start = el
                    .get_attr("start")
                    .and_then(|s| s.trim().parse::<i64>().ok())
                    .unwrap_or(1);
                let placed = el
                    .children
                    .iter()
                    .filter(|c| c.as_element().is_some_and(|e| e.tag == "li"))
                    .count() as i64;
                shell.set_attr("start", (start + placed).to_string());
            }
            shell
        })
        .collect();

    let mut node: ContentNode = shells.pop()?.into();
    while let Some(mut parent) = shells.pop() {
        parent.children.push(node);
        node = parent.into();
    }
    Some(node)
}

/// Attach letterhead chrome to each body and fill the page placeholders.
pub fn paginate(bodies: Vec<Vec<ContentNode>>, chrome: &PageChrome) -> Vec<PageContainer> {
    let total = bodies.len();
    bodies
        .into_iter()
        .enumerate()
        .map(|(index, body)| {
            let mut replacements: Vec<(&str, String)> = vec![
                ("{page}", (index + 1).to_string()),
                ("{pages}", total.to_string()),
            ];
            replacements.extend(chrome.placeholders.iter().map(|(k, v)| (*k, v.clone())));

            let fill = |nodes: &[ContentNode]| -> Vec<ContentNode> {
                nodes
                    .iter()
                    .cloned()
                    .map(|mut n| {
                        n.substitute(&replacements);
                        n
                    })
                    .collect()
            };
            PageContainer {
                index,
                header: fill(&chrome.header),
                body,
                footer: fill(&chrome.footer),
            }
        })
        .collect()
}

/// Renders something, or reserves room with an explicit height the way a
/// spacer `div` does.
fn occupies_space(node: &ContentNode) -> bool {
    if node.has_content() {
        return true;
    }
    match node {
        ContentNode::Element(el) => has_explicit_height(el) || el.children.iter().any(occupies_space),
        ContentNode::Text { .. } => false,
    }
}

fn has_explicit_height(el: &Element) -> bool {
    let styled = el.get_attr("style").is_some_and(|style| {
        css::parse_declarations(style)
            .iter()
            .any(|d| matches!(d.property.as_str(), "height" | "min-height") && positive_length(&d.value))
    });
    styled || el.get_attr("height").is_some_and(positive_length)
}

/// Percentages resolve against an auto-height parent, so they reserve nothing.
fn positive_length(value: &str) -> bool {
    match css::parse_length(value, 16.0) {
        Some(Dimension::Px(px)) => px > 0.0,
        Some(_) => false,
        // A bare number, as in the `height` attribute.
        None => value.trim().parse::<f64>().is_ok_and(|n| n > 0.0),
    }
}
