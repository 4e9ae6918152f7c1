//! Task-list queries and the shared relabeling routine.

use crate::document::{Document, DocumentError, NodeId, NodeType};
use serde_json::Value;
use std::collections::BTreeSet;

/// Labels present in a task list, rebuilt from the document on demand.
#[derive(Debug, Default)]
pub struct LabelIndex {
    labels: BTreeSet<String>,
}

impl LabelIndex {
    /// Index every labelled task, leaving out `skip`.
    pub fn build(doc: &Document, tasks: NodeId, skip: Option<NodeId>) -> Self {
        let mut labels = BTreeSet::new();
        for task in doc.items(tasks) {
            if Some(task) == skip {
                continue;
            }
            if let Some(label) = doc.get_str(task, "label") {
                labels.insert(label.to_string());
            }
        }
        Self { labels }
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    /// First free label: `base`, then `base #2`, `base #3`, ...
    pub fn unique(&self, base: &str) -> String {
        if !self.contains(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{} #{}", base, n))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| base.to_string())
    }
}

/// Whether a task is `{"type": "teamsfx", "command": <command>}`.
pub fn is_teamsfx_command(doc: &Document, task: NodeId, command: &str) -> bool {
    doc.get_str(task, "type") == Some("teamsfx") && doc.get_str(task, "command") == Some(command)
}

/// String argument of a task, if present.
pub fn arg_str(doc: &Document, task: NodeId, key: &str) -> Option<String> {
    let args = doc.get(task, "args")?;
    doc.get_str(args, key).map(str::to_string)
}

/// Where a string node lives, so it can be replaced through its parent.
#[derive(Debug, Clone)]
pub enum Slot {
    Member(NodeId, String),
    Element(NodeId, usize),
}

/// Every string node under `root` with its slot.
pub fn string_slots(doc: &Document, root: NodeId) -> Vec<(Slot, String)> {
    let mut out = Vec::new();
    collect_strings(doc, root, &mut out);
    out
}

fn collect_strings(doc: &Document, node: NodeId, out: &mut Vec<(Slot, String)>) {
    match doc.node_type(node) {
        NodeType::Object => {
            for (key, child) in doc.members(node) {
                match doc.as_str(child) {
                    Some(s) => out.push((Slot::Member(node, key.to_string()), s.to_string())),
                    None => collect_strings(doc, child, out),
                }
            }
        }
        NodeType::Array => {
            for (index, child) in doc.items(node).into_iter().enumerate() {
                match doc.as_str(child) {
                    Some(s) => out.push((Slot::Element(node, index), s.to_string())),
                    None => collect_strings(doc, child, out),
                }
            }
        }
        _ => {}
    }
}

/// Replace the string at `slot`.
pub fn replace_string(doc: &mut Document, slot: &Slot, value: &str) -> Result<(), DocumentError> {
    let value = Value::String(value.to_string());
    match slot {
        Slot::Member(object, key) => doc.set(*object, key, &value).map(|_| ()),
        Slot::Element(array, index) => doc
            .splice(*array, *index, 1, std::slice::from_ref(&value))
            .map(|_| ()),
    }
}

/// Point every `dependsOn` reference to `old` at `new` instead.
///
/// A single-string reference becomes a sequence when more than one label
/// replaces it and disappears when none does. Inside a sequence the old
/// member is replaced in place by the new labels the sequence does not
/// already hold; an emptied sequence removes the key.
pub fn relabel(doc: &mut Document, tasks: NodeId, old: &str, new: &[String]) -> Result<(), DocumentError> {
    for task in doc.items(tasks) {
        let depends = match doc.get(task, "dependsOn") {
            Some(id) => id,
            None => continue,
        };
        match doc.node_type(depends) {
            NodeType::String if doc.as_str(depends) == Some(old) => match new {
                [] => {
                    doc.remove(task, "dependsOn");
                }
                [single] => {
                    doc.set(task, "dependsOn", &Value::String(single.clone()))?;
                }
                many => {
                    let labels: Vec<Value> = dedup(many).into_iter().map(Value::String).collect();
                    doc.set(task, "dependsOn", &Value::Array(labels))?;
                }
            },
            NodeType::Array => {
                let mut index = 0;
                while index < doc.len(depends) {
                    let items = doc.items(depends);
                    if doc.as_str(items[index]) != Some(old) {
                        index += 1;
                        continue;
                    }
                    let others: Vec<&str> = items
                        .iter()
                        .enumerate()
                        .filter(|(i, _)| *i != index)
                        .filter_map(|(_, id)| doc.as_str(*id))
                        .collect();
                    let replacement: Vec<Value> = dedup(new)
                        .into_iter()
                        .filter(|label| !others.contains(&label.as_str()))
                        .map(Value::String)
                        .collect();
                    doc.splice(depends, index, 1, &replacement)?;
                    index += replacement.len();
                }
                if doc.is_empty(depends) {
                    doc.remove(task, "dependsOn");
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn dedup(labels: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(labels.len());
    for label in labels {
        if !out.contains(label) {
            out.push(label.clone());
        }
    }
    out
}
