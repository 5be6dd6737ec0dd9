use super::{Document, NodeId, NodeKind};
use html_escape::{encode_double_quoted_attribute, encode_text};

const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "link", "meta"];
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

fn is_one_of(tag: &str, names: &[&str]) -> bool {
    names.iter().any(|name| tag.eq_ignore_ascii_case(name))
}

pub(super) fn write_node(document: &Document, id: NodeId, out: &mut String) {
    write_node_in(document, id, false, out);
}

fn write_node_in(document: &Document, id: NodeId, raw_text: bool, out: &mut String) {
    let Some(kind) = document.kind(id) else {
        return;
    };

    match kind {
        NodeKind::Text(text) if raw_text => out.push_str(text),
        NodeKind::Text(text) => out.push_str(&encode_text(text)),
        NodeKind::Markup(markup) => out.push_str(markup),
        NodeKind::Element(element) => {
            out.push('<');
            out.push_str(&element.tag);
            for (name, value) in element.attributes() {
                out.push(' ');
                out.push_str(name);
                if !value.is_empty() {
                    out.push_str("=\"");
                    out.push_str(&encode_double_quoted_attribute(value));
                    out.push('"');
                }
            }
            out.push('>');

            if is_one_of(&element.tag, VOID_ELEMENTS) {
                return;
            }

            let raw_text = is_one_of(&element.tag, RAW_TEXT_ELEMENTS);
            for child in document.children(id) {
                write_node_in(document, *child, raw_text, out);
            }
            out.push_str("</");
            out.push_str(&element.tag);
            out.push('>');
        }
    }
}
