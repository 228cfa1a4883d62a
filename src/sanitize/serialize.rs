//! XHTML serialization of sanitized chapter trees.

use std::rc::Rc;

use html5ever::{Attribute, QualName, ns};

use super::dom::{Handle, NodeData};

const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";
const MATHML_NAMESPACE: &str = "http://www.w3.org/1998/Math/MathML";
const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";

/// HTML elements that never have content and are written self-closed.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Serializes the children of `node` as well-formed XHTML.
///
/// Doctypes and processing instructions are dropped. Foreign roots (`svg`,
/// `math`) get their namespace declared since the surrounding chapter
/// document only declares XHTML. Elements whose tag is not a valid XML name
/// are unwrapped, and characters XML forbids are dropped.
///
/// The tree is walked with an explicit stack, so nesting depth is bounded
/// only by memory.
pub(crate) fn serialize_children(node: &Handle) -> String {
    let mut out = String::new();
    let mut stack = Vec::new();
    push_children(&mut stack, node, false);

    while let Some(step) = stack.pop() {
        match step {
            Step::Close(local) => {
                out.push_str("</");
                out.push_str(&local);
                out.push('>');
            }
            Step::Open { node, in_foreign } => match &node.data {
                NodeData::Text { contents } => escape_text(&mut out, &contents.borrow()),
                NodeData::Comment { contents } => write_comment(&mut out, contents),
                NodeData::Element { name, attrs } => {
                    open_element(&mut out, &mut stack, &node, name, &attrs.borrow(), in_foreign);
                }
                NodeData::Document | NodeData::Doctype | NodeData::ProcessingInstruction => {}
            },
        }
    }
    out
}

enum Step {
    Open { node: Handle, in_foreign: bool },
    Close(String),
}

fn push_children(stack: &mut Vec<Step>, node: &Handle, in_foreign: bool) {
    stack.extend(node.children.borrow().iter().rev().map(|child| Step::Open {
        node: Rc::clone(child),
        in_foreign,
    }));
}

fn open_element(
    out: &mut String,
    stack: &mut Vec<Step>,
    node: &Handle,
    name: &QualName,
    attrs: &[Attribute],
    in_foreign: bool,
) {
    let local: &str = &name.local;
    if !is_xml_name(local) {
        push_children(stack, node, in_foreign);
        return;
    }
    let is_html = name.ns == ns!(html);
    let is_void = is_html && VOID_ELEMENTS.contains(&local);

    out.push('<');
    out.push_str(local);

    if !in_foreign {
        if name.ns == ns!(svg) {
            push_attr(out, "xmlns", SVG_NAMESPACE);
            push_attr(out, "xmlns:xlink", XLINK_NAMESPACE);
        } else if name.ns == ns!(mathml) {
            push_attr(out, "xmlns", MATHML_NAMESPACE);
        }
    }

    for attr in attrs {
        push_attr(out, &attribute_name(attr), &attr.value);
    }

    if node.children.borrow().is_empty() && (!is_html || is_void) {
        out.push_str("/>");
        return;
    }
    out.push('>');

    stack.push(Step::Close(local.to_string()));
    if !is_void {
        push_children(stack, node, !is_html);
    }
}

/// Unprefixed XML name: a letter or `_`, then letters, digits, `-`, `_`, `.`.
fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Characters allowed in XML 1.0 content.
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && !matches!(c, '\u{fffe}' | '\u{ffff}'))
}

/// Comment text may not contain `--` or end with `-`.
fn write_comment(out: &mut String, contents: &str) {
    out.push_str("<!--");
    let mut previous = None;
    for c in contents.chars().filter(|&c| is_xml_char(c)) {
        if c == '-' && previous == Some('-') {
            out.push(' ');
        }
        out.push(c);
        previous = Some(c);
    }
    if previous == Some('-') {
        out.push(' ');
    }
    out.push_str("-->");
}

/// Attribute name as written in markup, including any namespace prefix.
pub(crate) fn attribute_name(attr: &Attribute) -> String {
    match &attr.name.prefix {
        Some(prefix) => format!("{prefix}:{}", attr.name.local),
        None => attr.name.local.to_string(),
    }
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    for c in value.chars().filter(|&c| is_xml_char(c)) {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&#160;"),
            _ => out.push(c),
        }
    }
    out.push('"');
}

fn escape_text(out: &mut String, text: &str) {
    for c in text.chars().filter(|&c| is_xml_char(c)) {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&#160;"),
            _ => out.push(c),
        }
    }
}
