//! Serialization of a [`Document`] back to text.

use super::{Container, Document, NodeId, NodeKind};

pub(super) fn write_document(doc: &Document, out: &mut String) {
    out.push_str(&doc.leading);
    write_node(doc, doc.root, out);
    out.push_str(&doc.trailing);
}

fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    match &doc.nodes[id.0].kind {
        NodeKind::Null => out.push_str("null"),
        NodeKind::Bool(true) => out.push_str("true"),
        NodeKind::Bool(false) => out.push_str("false"),
        NodeKind::Number(raw) => out.push_str(raw),
        NodeKind::String { raw, .. } => out.push_str(raw),
        NodeKind::Array(c) => write_container(doc, c, '[', ']', out),
        NodeKind::Object(c) => write_container(doc, c, '{', '}', out),
    }
}

fn write_container(doc: &Document, c: &Container, open: char, close: char, out: &mut String) {
    out.push(open);
    let last = c.entries.len().saturating_sub(1);
    for (i, entry) in c.entries.iter().enumerate() {
        out.push_str(&entry.leading);
        if let Some(key) = &entry.key {
            out.push_str(&key.raw);
            out.push_str(&key.before_colon);
            out.push(':');
            out.push_str(&key.after_colon);
        }
        write_node(doc, entry.value, out);
        out.push_str(&entry.trailing);
        if i < last || c.trailing_comma {
            out.push(',');
            out.push_str(&entry.suffix);
        }
    }
    out.push_str(&c.close);
    out.push(close);
}
