//! Comment-preserving document model for JSON-with-comments files.
//!
//! Editor configuration files (`tasks.json`, `launch.json`) and the legacy
//! project files are hand-edited and routinely carry comments. This module
//! parses them into an arena of nodes where every container entry keeps the
//! whitespace and comments around it, so that:
//!
//! - writing an untouched document reproduces the input byte for byte, and
//! - `set`, `remove`, `insert` and `splice` only touch the trivia of the
//!   entries they change.
//!
//! Nodes are addressed by [`NodeId`]. Removed subtrees stay in the arena but
//! are no longer reachable from the root.

mod parse;
mod write;

use serde_json::Value;
use thiserror::Error;

/// Errors raised while parsing or editing a [`Document`].
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("syntax error at line {line}, column {column}: {message}")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("expected {expected} node")]
    TypeMismatch { expected: &'static str },

    #[error("index {index} out of bounds for length {len}")]
    OutOfBounds { index: usize, len: usize },
}

/// Handle to a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Shape of a node, without its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeType {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Null,
    Bool(bool),
    /// Raw number text as written in the source.
    Number(String),
    String {
        value: String,
        raw: String,
    },
    Array(Container),
    Object(Container),
}

/// Entries of an array or object plus the trivia before the closing bracket.
#[derive(Debug, Clone, Default)]
pub(crate) struct Container {
    pub(crate) entries: Vec<Entry>,
    pub(crate) close: String,
    pub(crate) trailing_comma: bool,
}

/// One element of a container with its surrounding trivia.
///
/// Written as `leading [key] value trailing [, suffix]`. `suffix` holds
/// comments that follow the separator on the same line.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) key: Option<Key>,
    pub(crate) value: NodeId,
    pub(crate) leading: String,
    pub(crate) trailing: String,
    pub(crate) suffix: String,
}

#[derive(Debug, Clone)]
pub(crate) struct Key {
    pub(crate) name: String,
    pub(crate) raw: String,
    pub(crate) before_colon: String,
    pub(crate) after_colon: String,
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
}

/// Indentation unit and line ending used for newly inserted content.
#[derive(Debug, Clone)]
pub(crate) struct Style {
    pub(crate) indent: String,
    pub(crate) newline: &'static str,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            indent: "  ".to_string(),
            newline: "\n",
        }
    }
}

impl Style {
    fn detect(doc: &Document, src: &str) -> Self {
        let newline = if src.contains("\r\n") { "\r\n" } else { "\n" };
        let indent = doc
            .container(doc.root)
            .and_then(|c| c.entries.first())
            .and_then(|e| line_indent_of(&e.leading))
            .filter(|indent| !indent.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| "  ".to_string());
        Self { indent, newline }
    }
}

/// A parsed JSON-with-comments document.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    leading: String,
    trailing: String,
    style: Style,
}

impl Document {
    /// Parse JSON-with-comments text.
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        parse::parse_document(text)
    }

    /// Build a document from a plain JSON value using two-space indentation.
    pub fn from_value(value: &Value) -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            leading: String::new(),
            trailing: "\n".to_string(),
            style: Style::default(),
        };
        doc.root = doc.import(value, None, "");
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node_type(&self, id: NodeId) -> NodeType {
        match &self.nodes[id.0].kind {
            NodeKind::Null => NodeType::Null,
            NodeKind::Bool(_) => NodeType::Bool,
            NodeKind::Number(_) => NodeType::Number,
            NodeKind::String { .. } => NodeType::String,
            NodeKind::Array(_) => NodeType::Array,
            NodeKind::Object(_) => NodeType::Object,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn as_str(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::String { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self, id: NodeId) -> Option<bool> {
        match &self.nodes[id.0].kind {
            NodeKind::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Look up a property of an object node.
    pub fn get(&self, object: NodeId, key: &str) -> Option<NodeId> {
        match &self.nodes[object.0].kind {
            NodeKind::Object(c) => c
                .entries
                .iter()
                .find(|e| e.key.as_ref().map(|k| k.name == key).unwrap_or(false))
                .map(|e| e.value),
            _ => None,
        }
    }

    /// String value of an object property.
    pub fn get_str(&self, object: NodeId, key: &str) -> Option<&str> {
        self.get(object, key).and_then(|id| self.as_str(id))
    }

    /// Elements of an array node (empty for any other node).
    pub fn items(&self, array: NodeId) -> Vec<NodeId> {
        match &self.nodes[array.0].kind {
            NodeKind::Array(c) => c.entries.iter().map(|e| e.value).collect(),
            _ => Vec::new(),
        }
    }

    /// Properties of an object node in document order.
    pub fn members(&self, object: NodeId) -> Vec<(&str, NodeId)> {
        match &self.nodes[object.0].kind {
            NodeKind::Object(c) => c
                .entries
                .iter()
                .filter_map(|e| e.key.as_ref().map(|k| (k.name.as_str(), e.value)))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Number of entries in an array or object node.
    pub fn len(&self, id: NodeId) -> usize {
        self.container(id).map(|c| c.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, id: NodeId) -> bool {
        self.len(id) == 0
    }

    /// Convert a subtree into a plain JSON value, dropping comments.
    pub fn to_value(&self, id: NodeId) -> Value {
        match &self.nodes[id.0].kind {
            NodeKind::Null => Value::Null,
            NodeKind::Bool(b) => Value::Bool(*b),
            NodeKind::Number(raw) => {
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
            }
            NodeKind::String { value, .. } => Value::String(value.clone()),
            NodeKind::Array(c) => Value::Array(c.entries.iter().map(|e| self.to_value(e.value)).collect()),
            NodeKind::Object(c) => Value::Object(
                c.entries
                    .iter()
                    .filter_map(|e| {
                        e.key
                            .as_ref()
                            .map(|k| (k.name.clone(), self.to_value(e.value)))
                    })
                    .collect(),
            ),
        }
    }

    /// Set an object property, replacing the value in place when the key exists
    /// and appending a new member otherwise.
    pub fn set(&mut self, object: NodeId, key: &str, value: &Value) -> Result<NodeId, DocumentError> {
        let existing = self
            .container(object)
            .filter(|_| self.node_type(object) == NodeType::Object)
            .ok_or(DocumentError::TypeMismatch { expected: "object" })?
            .entries
            .iter()
            .position(|e| e.key.as_ref().map(|k| k.name == key).unwrap_or(false));

        match existing {
            Some(index) => Ok(self.replace_entry_value(object, index, value)),
            None => {
                let len = self.len(object);
                let ids = self.insert_entries(object, len, vec![(Some(key.to_string()), value)]);
                Ok(ids[0])
            }
        }
    }

    /// Remove an object property. Returns whether it existed.
    pub fn remove(&mut self, object: NodeId, key: &str) -> bool {
        if self.node_type(object) != NodeType::Object {
            return false;
        }
        let index = self.container(object).and_then(|c| {
            c.entries
                .iter()
                .position(|e| e.key.as_ref().map(|k| k.name == key).unwrap_or(false))
        });
        match index {
            Some(index) => {
                self.remove_entry(object, index);
                true
            }
            None => false,
        }
    }

    /// Insert a value into an array at `index` (`index == len` appends).
    pub fn insert(&mut self, array: NodeId, index: usize, value: &Value) -> Result<NodeId, DocumentError> {
        let ids = self.splice(array, index, 0, std::slice::from_ref(value))?;
        Ok(ids[0])
    }

    /// Replace `delete_count` elements starting at `start` with `values`.
    ///
    /// Elements that are replaced one-for-one keep their surrounding comments.
    /// Returns the ids of the inserted nodes in order.
    pub fn splice(
        &mut self,
        array: NodeId,
        start: usize,
        delete_count: usize,
        values: &[Value],
    ) -> Result<Vec<NodeId>, DocumentError> {
        if self.node_type(array) != NodeType::Array {
            return Err(DocumentError::TypeMismatch { expected: "array" });
        }
        let len = self.len(array);
        if start > len || start + delete_count > len {
            return Err(DocumentError::OutOfBounds {
                index: start + delete_count,
                len,
            });
        }

        let replaced = delete_count.min(values.len());
        let mut ids = Vec::with_capacity(values.len());
        for (offset, value) in values.iter().take(replaced).enumerate() {
            ids.push(self.replace_entry_value(array, start + offset, value));
        }
        for _ in replaced..delete_count {
            self.remove_entry(array, start + replaced);
        }
        if values.len() > replaced {
            let rest = values[replaced..].iter().map(|v| (None, v)).collect();
            ids.extend(self.insert_entries(array, start + replaced, rest));
        }
        Ok(ids)
    }

    fn container(&self, id: NodeId) -> Option<&Container> {
        match &self.nodes[id.0].kind {
            NodeKind::Array(c) | NodeKind::Object(c) => Some(c),
            _ => None,
        }
    }

    fn container_mut(&mut self, id: NodeId) -> Option<&mut Container> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Array(c) | NodeKind::Object(c) => Some(c),
            _ => None,
        }
    }

    /// Indentation of the line a node starts on.
    fn line_indent(&self, id: NodeId) -> String {
        let parent = match self.parent(id) {
            Some(p) => p,
            None => return String::new(),
        };
        let own = self
            .container(parent)
            .and_then(|c| c.entries.iter().find(|e| e.value == id))
            .and_then(|e| line_indent_of(&e.leading));
        match own {
            Some(indent) => indent.to_string(),
            None => self.line_indent(parent),
        }
    }

    /// Indentation for entries of a container, or `None` when the container
    /// is written on a single line.
    fn entry_indent(&self, container: NodeId) -> Option<String> {
        let c = self.container(container)?;
        if c.entries.is_empty() {
            return Some(format!("{}{}", self.line_indent(container), self.style.indent));
        }
        c.entries
            .iter()
            .find_map(|e| line_indent_of(&e.leading))
            .map(str::to_string)
    }

    fn replace_entry_value(&mut self, container: NodeId, index: usize, value: &Value) -> NodeId {
        let indent = self
            .entry_indent(container)
            .unwrap_or_else(|| self.line_indent(container));
        let id = self.import(value, Some(container), &indent);
        if let Some(c) = self.container_mut(container) {
            c.entries[index].value = id;
        }
        id
    }

    fn insert_entries(
        &mut self,
        container: NodeId,
        index: usize,
        values: Vec<(Option<String>, &Value)>,
    ) -> Vec<NodeId> {
        let newline = self.style.newline;
        let entry_indent = self.entry_indent(container);
        let close_indent = self.line_indent(container);
        let value_indent = entry_indent.clone().unwrap_or_else(|| close_indent.clone());

        let mut new_entries = Vec::with_capacity(values.len());
        let mut ids = Vec::with_capacity(values.len());
        for (key, value) in values {
            let id = self.import(value, Some(container), &value_indent);
            ids.push(id);
            let leading = match &entry_indent {
                Some(indent) => format!("{}{}", newline, indent),
                None => " ".to_string(),
            };
            new_entries.push(Entry {
                key: key.map(|name| Key {
                    raw: quote(&name),
                    name,
                    before_colon: String::new(),
                    after_colon: " ".to_string(),
                }),
                value: id,
                leading,
                trailing: String::new(),
                suffix: String::new(),
            });
        }

        let c = match self.container_mut(container) {
            Some(c) => c,
            None => return ids,
        };
        let len = c.entries.len();

        if len == 0 {
            if let Some(first) = new_entries.first_mut() {
                first.leading = format!("{}{}", c.close.trim_end(), first.leading);
            }
            if let Some(last) = new_entries.last_mut() {
                last.trailing = format!("{}{}", newline, close_indent);
            }
            c.close.clear();
            c.trailing_comma = false;
        } else if index == len && !c.trailing_comma {
            let previous = &mut c.entries[len - 1];
            let split = previous.trailing.trim_end().len();
            let closing_ws = previous.trailing[split..].to_string();
            previous.suffix = previous.trailing[..split].to_string();
            previous.trailing.clear();
            if let Some(last) = new_entries.last_mut() {
                last.trailing = closing_ws;
            }
        } else if index == 0 && entry_indent.is_none() {
            if let Some(first) = new_entries.first_mut() {
                first.leading = c.entries[0].leading.clone();
            }
            if !has_comment(&c.entries[0].leading) {
                c.entries[0].leading = " ".to_string();
            }
        }

        c.entries.splice(index..index, new_entries);
        ids
    }

    fn remove_entry(&mut self, container: NodeId, index: usize) {
        let newline = self.style.newline;
        let close_indent = self.line_indent(container);
        let c = match self.container_mut(container) {
            Some(c) => c,
            None => return,
        };
        let len = c.entries.len();
        if index >= len {
            return;
        }
        let removed = c.entries.remove(index);

        if len == 1 {
            c.close.clear();
            c.trailing_comma = false;
        } else if index == len - 1 && !c.trailing_comma {
            let previous = &mut c.entries[index - 1];
            let suffix = std::mem::take(&mut previous.suffix);
            previous.trailing.push_str(&suffix);
            let tail = trailing_whitespace(&removed.trailing);
            if ends_in_line_comment(&previous.trailing) && !tail.contains('\n') {
                previous.trailing.push_str(newline);
                previous.trailing.push_str(&close_indent);
            } else {
                previous.trailing.push_str(tail);
            }
        } else if index == 0 {
            let next = &mut c.entries[0];
            if !has_comment(&next.leading) {
                next.leading = trailing_whitespace(&removed.leading).to_string();
            }
        }
    }

    /// Create nodes for a plain JSON value. `indent` is the indentation of the
    /// line the value starts on.
    fn import(&mut self, value: &Value, parent: Option<NodeId>, indent: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        let kind = match value {
            Value::Null => NodeKind::Null,
            Value::Bool(b) => NodeKind::Bool(*b),
            Value::Number(n) => NodeKind::Number(n.to_string()),
            Value::String(s) => NodeKind::String {
                value: s.clone(),
                raw: quote(s),
            },
            Value::Array(_) => NodeKind::Array(Container::default()),
            Value::Object(_) => NodeKind::Object(Container::default()),
        };
        self.nodes.push(Node { kind, parent });

        let children: Vec<(Option<String>, &Value)> = match value {
            Value::Array(items) => items.iter().map(|v| (None, v)).collect(),
            Value::Object(map) => map.iter().map(|(k, v)| (Some(k.clone()), v)).collect(),
            _ => return id,
        };
        if children.is_empty() {
            return id;
        }

        let child_indent = format!("{}{}", indent, self.style.indent);
        let newline = self.style.newline;
        let mut entries = Vec::with_capacity(children.len());
        for (key, child) in children {
            let child_id = self.import(child, Some(id), &child_indent);
            entries.push(Entry {
                key: key.map(|name| Key {
                    raw: quote(&name),
                    name,
                    before_colon: String::new(),
                    after_colon: " ".to_string(),
                }),
                value: child_id,
                leading: format!("{}{}", newline, child_indent),
                trailing: String::new(),
                suffix: String::new(),
            });
        }
        if let Some(last) = entries.last_mut() {
            last.trailing = format!("{}{}", newline, indent);
        }
        if let Some(c) = self.container_mut(id) {
            c.entries = entries;
        }
        id
    }
}

impl std::fmt::Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = String::new();
        write::write_document(self, &mut out);
        f.write_str(&out)
    }
}

fn quote(s: &str) -> String {
    // Serializing a str cannot fail.
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s))
}

fn has_comment(trivia: &str) -> bool {
    trivia.contains("//") || trivia.contains("/*")
}

fn trailing_whitespace(trivia: &str) -> &str {
    &trivia[trivia.trim_end().len()..]
}

/// Whether the last line of `trivia` is a `//` comment.
fn ends_in_line_comment(trivia: &str) -> bool {
    trivia
        .rsplit('\n')
        .next()
        .is_some_and(|line| line.contains("//"))
}

/// Whitespace after the last line break of `trivia`, if it has one.
fn line_indent_of(trivia: &str) -> Option<&str> {
    let pos = trivia.rfind('\n')?;
    let tail = &trivia[pos + 1..];
    if tail.chars().all(|c| c == ' ' || c == '\t') {
        Some(tail)
    } else {
        None
    }
}
