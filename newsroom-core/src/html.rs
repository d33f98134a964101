//! Plain-text extraction from HTML article bodies.
//!
//! Block boundaries (paragraphs, list items, headings, line breaks) become
//! single newlines; inline markup contributes nothing. The walk is written
//! against [`TextTree`] so any parsed tree can be used; [`HtmlFragment`] is
//! the html5ever-backed implementation.

use std::rc::Rc;

use html5ever::tendril::TendrilSink;
use html5ever::{LocalName, Namespace, ParseOpts, QualName, parse_fragment};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Shift-out control character used by some wire feeds as a line separator.
const SHIFT_OUT: char = '\u{000E}';

/// Elements that end a line when a text node is their last child.
const BLOCK_TAGS: &[&str] = &["p", "li", "h1", "h2", "h3", "h4", "h5", "div", "table", "blockquote"];

/// Elements that end a line when they directly follow a text node.
const BREAK_TAGS: &[&str] = &["br", "hr"];

/// What a tree node is, as far as text extraction cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Text,
    Element,
    Other,
}

/// A document tree that can be walked for text.
pub trait TextTree {
    type Node: Clone;

    /// The container whose descendants are walked.
    fn root(&self) -> Self::Node;
    fn kind(&self, node: &Self::Node) -> NodeKind;
    /// Contents of a text node; `None` for anything else.
    fn text(&self, node: &Self::Node) -> Option<String>;
    /// Lowercase tag name of an element; `None` for anything else.
    fn tag_name(&self, node: &Self::Node) -> Option<String>;
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;
}

/// An HTML fragment parsed into a DOM.
///
/// The fragment's own container reports itself as a `div`, as if the
/// markup had been assigned to a detached `<div>`.
pub struct HtmlFragment {
    // Dropping the dom clears every node's children, so it lives as long as the handles.
    _dom: RcDom,
    container: Handle,
}

impl HtmlFragment {
    pub fn parse(html: &str) -> Self {
        let context = QualName::new(
            None,
            Namespace::from(HTML_NAMESPACE),
            LocalName::from("div"),
        );
        let dom = parse_fragment(RcDom::default(), ParseOpts::default(), context, Vec::new())
            .one(html);

        // Fragment parsing puts every parsed node under a synthetic root element.
        let container = dom
            .document
            .children
            .borrow()
            .first()
            .cloned()
            .unwrap_or_else(|| dom.document.clone());
        Self {
            _dom: dom,
            container,
        }
    }

    fn is_container(&self, node: &Handle) -> bool {
        Rc::ptr_eq(node, &self.container)
    }
}

impl TextTree for HtmlFragment {
    type Node = Handle;

    fn root(&self) -> Handle {
        self.container.clone()
    }

    fn kind(&self, node: &Handle) -> NodeKind {
        match node.data {
            NodeData::Text { .. } => NodeKind::Text,
            NodeData::Element { .. } => NodeKind::Element,
            _ => NodeKind::Other,
        }
    }

    fn text(&self, node: &Handle) -> Option<String> {
        match &node.data {
            NodeData::Text { contents } => Some(contents.borrow().to_string()),
            _ => None,
        }
    }

    fn tag_name(&self, node: &Handle) -> Option<String> {
        if self.is_container(node) {
            return Some("div".to_string());
        }
        match &node.data {
            NodeData::Element { name, .. } => Some(name.local.to_string().to_ascii_lowercase()),
            _ => None,
        }
    }

    fn children(&self, node: &Handle) -> Vec<Handle> {
        node.children.borrow().clone()
    }
}

/// Plain text of an HTML fragment with block boundaries as newlines.
pub fn extract_text(html: &str) -> String {
    let prepared = replace_shift_out(html);
    extract_from_tree(&HtmlFragment::parse(&prepared))
}

/// Depth-first, in-order walk over the text nodes of `tree`.
///
/// Each pending node carries its parent and next sibling, taken from the
/// child list when the parent is expanded.
pub fn extract_from_tree<T: TextTree>(tree: &T) -> String {
    let mut out = String::new();
    let mut stack: Vec<Pending<T::Node>> = Vec::new();
    push_children(tree, &tree.root(), &mut stack);

    while let Some(Pending {
        node,
        parent,
        next_sibling,
    }) = stack.pop()
    {
        if tree.kind(&node) == NodeKind::Text {
            if let Some(text) = tree.text(&node) {
                out.push_str(&text);
            }
            let ends_line = match &next_sibling {
                Some(sibling) => has_tag(tree, sibling, BREAK_TAGS),
                None => has_tag(tree, &parent, BLOCK_TAGS),
            };
            if ends_line {
                out.push('\n');
            }
            continue;
        }
        push_children(tree, &node, &mut stack);
    }

    out
}

struct Pending<N> {
    node: N,
    parent: N,
    next_sibling: Option<N>,
}

/// Push the children of `parent` so the first child is popped first.
fn push_children<T: TextTree>(tree: &T, parent: &T::Node, stack: &mut Vec<Pending<T::Node>>) {
    let mut next_sibling = None;
    for child in tree.children(parent).into_iter().rev() {
        stack.push(Pending {
            node: child.clone(),
            parent: parent.clone(),
            next_sibling: next_sibling.replace(child),
        });
    }
}

fn has_tag<T: TextTree>(tree: &T, node: &T::Node, tags: &[&str]) -> bool {
    tree.tag_name(node)
        .is_some_and(|name| tags.contains(&name.as_str()))
}

/// Preformatted fragments keep a plain newline; everything else gets a `<br>`.
fn replace_shift_out(html: &str) -> String {
    if !html.contains(SHIFT_OUT) {
        return html.to_string();
    }
    let replacement = if contains_pre(html) { "\n" } else { "<br>" };
    html.replace(SHIFT_OUT, replacement)
}

fn contains_pre(html: &str) -> bool {
    let lower = html.to_ascii_lowercase();
    lower.match_indices("<pre").any(|(i, m)| {
        matches!(
            lower[i + m.len()..].chars().next(),
            Some('>') | Some(' ') | Some('\t') | Some('\n') | Some('\r')
        )
    })
}
