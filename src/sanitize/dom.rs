//! Reference-counted DOM built by html5ever.
//!
//! Nodes own their children and point to their parent through a weak
//! reference, so dropping the document frees the whole tree.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use html5ever::driver::ParseOpts;
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute, QualName, local_name, ns, parse_document};
use tracing::trace;

pub(crate) type Handle = Rc<Node>;

/// Payload of a DOM node.
#[derive(Debug)]
pub(crate) enum NodeData {
    Document,
    Doctype,
    Text { contents: RefCell<String> },
    Comment { contents: String },
    Element {
        name: QualName,
        attrs: RefCell<Vec<Attribute>>,
    },
    ProcessingInstruction,
}

pub(crate) struct Node {
    parent: Cell<Option<Weak<Node>>>,
    pub(crate) children: RefCell<Vec<Handle>>,
    pub(crate) data: NodeData,
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("data", &self.data)
            .field("children", &self.children.borrow().len())
            .finish_non_exhaustive()
    }
}

/// Drops descendants iteratively; deep trees would otherwise overflow the
/// stack through nested `Rc` drops.
impl Drop for Node {
    fn drop(&mut self) {
        let mut nodes = std::mem::take(self.children.get_mut());
        while let Some(node) = nodes.pop() {
            if Rc::strong_count(&node) == 1 {
                nodes.append(&mut node.children.borrow_mut());
            }
        }
    }
}

impl Node {
    fn new(data: NodeData) -> Handle {
        Rc::new(Self {
            parent: Cell::new(None),
            children: RefCell::new(Vec::new()),
            data,
        })
    }

    /// Qualified name of an element, `None` for other node kinds.
    pub(crate) fn element_name(&self) -> Option<&QualName> {
        match &self.data {
            NodeData::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub(crate) fn is_html_element(&self, local: &str) -> bool {
        self.element_name()
            .is_some_and(|name| name.ns == ns!(html) && name.local.as_ref() == local)
    }

    pub(crate) fn parent(&self) -> Option<Handle> {
        let weak = self.parent.take();
        let parent = weak.as_ref().and_then(Weak::upgrade);
        self.parent.set(weak);
        parent
    }
}

/// Parses `html` as a full document; html5ever never rejects input.
pub(crate) fn parse_html(html: &str) -> Handle {
    parse_document(DomSink::default(), ParseOpts::default())
        .from_utf8()
        .one(html.as_bytes())
}

/// Depth-first search for the first element matching `predicate`.
pub(crate) fn find_element(root: &Handle, predicate: &dyn Fn(&Node) -> bool) -> Option<Handle> {
    let mut stack: Vec<Handle> = root.children.borrow().iter().rev().cloned().collect();
    while let Some(node) = stack.pop() {
        if predicate(&node) {
            return Some(node);
        }
        stack.extend(node.children.borrow().iter().rev().cloned());
    }
    None
}

/// Every element below `root` in document order, excluding `root` itself.
pub(crate) fn descendant_elements(root: &Handle) -> Vec<Handle> {
    let mut out = Vec::new();
    let mut stack: Vec<Handle> = root.children.borrow().iter().rev().cloned().collect();
    while let Some(node) = stack.pop() {
        stack.extend(node.children.borrow().iter().rev().cloned());
        if node.element_name().is_some() {
            out.push(node);
        }
    }
    out
}

pub(crate) fn detach(target: &Handle) {
    if let Some(parent) = target.parent() {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, target));
    }
    target.parent.set(None);
}

fn append_node(parent: &Handle, child: Handle) {
    detach(&child);
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

fn append_text(parent: &Handle, text: &str) {
    if let Some(last) = parent.children.borrow().last()
        && let NodeData::Text { contents } = &last.data
    {
        contents.borrow_mut().push_str(text);
        return;
    }
    append_node(
        parent,
        Node::new(NodeData::Text {
            contents: RefCell::new(text.to_string()),
        }),
    );
}

/// Position of `target` among its parent's children.
fn sibling_position(target: &Handle) -> Option<(Handle, usize)> {
    let parent = target.parent()?;
    let index = parent
        .children
        .borrow()
        .iter()
        .position(|child| Rc::ptr_eq(child, target))?;
    Some((parent, index))
}

/// html5ever tree sink producing a [`Handle`] to the document node.
pub(crate) struct DomSink {
    document: Handle,
}

impl Default for DomSink {
    fn default() -> Self {
        Self {
            document: Node::new(NodeData::Document),
        }
    }
}

static EMPTY_NAME: QualName = QualName {
    prefix: None,
    ns: ns!(),
    local: local_name!(""),
};

impl TreeSink for DomSink {
    type Handle = Handle;
    type Output = Handle;
    type ElemName<'a>
        = &'a QualName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        self.document
    }

    fn parse_error(&self, msg: Cow<'static, str>) {
        trace!(%msg, "tolerated markup error");
    }

    fn get_document(&self) -> Self::Handle {
        Rc::clone(&self.document)
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        target.element_name().unwrap_or(&EMPTY_NAME)
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Attribute>,
        _flags: ElementFlags,
    ) -> Self::Handle {
        Node::new(NodeData::Element {
            name,
            attrs: RefCell::new(attrs),
        })
    }

    fn create_comment(&self, text: StrTendril) -> Self::Handle {
        Node::new(NodeData::Comment {
            contents: text.to_string(),
        })
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> Self::Handle {
        Node::new(NodeData::ProcessingInstruction)
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        match child {
            NodeOrText::AppendNode(node) => append_node(parent, node),
            NodeOrText::AppendText(text) => append_text(parent, &text),
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        if element.parent().is_some() {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        _name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
        append_node(&self.document, Node::new(NodeData::Doctype));
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        Rc::clone(target)
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        Rc::ptr_eq(x, y)
    }

    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let Some((parent, index)) = sibling_position(sibling) else {
            return;
        };

        let node = match new_node {
            NodeOrText::AppendNode(node) => {
                detach(&node);
                node
            }
            NodeOrText::AppendText(text) => {
                if index > 0
                    && let NodeData::Text { contents } = &parent.children.borrow()[index - 1].data
                {
                    contents.borrow_mut().push_str(&text);
                    return;
                }
                Node::new(NodeData::Text {
                    contents: RefCell::new(text.to_string()),
                })
            }
        };

        // Detaching may have shifted the sibling.
        let Some((parent, index)) = sibling_position(sibling) else {
            return;
        };
        node.parent.set(Some(Rc::downgrade(&parent)));
        parent.children.borrow_mut().insert(index, node);
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Attribute>) {
        if let NodeData::Element { attrs: existing, .. } = &target.data {
            let mut existing = existing.borrow_mut();
            for attr in attrs {
                if !existing.iter().any(|a| a.name == attr.name) {
                    existing.push(attr);
                }
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        detach(target);
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let children = std::mem::take(&mut *node.children.borrow_mut());
        for child in children {
            child.parent.set(None);
            append_node(new_parent, child);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fragment_lands_in_body() {
        let document = parse_html("<p>Hello <b>world</b></p>");
        let body = find_element(&document, &|node| node.is_html_element("body")).unwrap();
        let elements: Vec<_> = descendant_elements(&body)
            .iter()
            .map(|node| node.element_name().unwrap().local.to_string())
            .collect();
        assert_eq!(elements, vec!["p", "b"]);
    }

    #[test]
    fn test_adjacent_text_is_merged() {
        let document = parse_html("<p>a&amp;b</p>");
        let p = find_element(&document, &|node| node.is_html_element("p")).unwrap();
        let children = p.children.borrow();
        assert_eq!(children.len(), 1);
        match &children[0].data {
            NodeData::Text { contents } => assert_eq!(&*contents.borrow(), "a&b"),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn test_detach_removes_node_from_parent() {
        let document = parse_html("<p><img src=x><span>s</span></p>");
        let img = find_element(&document, &|node| node.is_html_element("img")).unwrap();
        let p = img.parent().unwrap();
        detach(&img);
        assert!(img.parent().is_none());
        assert_eq!(p.children.borrow().len(), 1);
    }

    #[test]
    fn test_deeply_nested_tree_is_walked_and_dropped() {
        let depth = 20_000;
        let html = format!("{}x{}", "<span>".repeat(depth), "</span>".repeat(depth));
        let document = parse_html(&html);
        let body = find_element(&document, &|node| node.is_html_element("body")).unwrap();
        assert_eq!(descendant_elements(&body).len(), depth);
        assert!(find_element(&body, &|node| matches!(node.data, NodeData::Text { .. })).is_some());
        drop(body);
        drop(document);
    }

    #[test]
    fn test_misnested_markup_is_tolerated() {
        let document = parse_html("<p><b>bold<i>both</b>italic</i></p><table><tr>x</table>");
        let body = find_element(&document, &|node| node.is_html_element("body")).unwrap();
        assert!(!descendant_elements(&body).is_empty());
    }
}
