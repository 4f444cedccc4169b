//! Structural diff between two document trees.

use std::fmt;

use crate::core::document::{Node, NodePath, Segment};

/// One difference between an original tree and a generated one.
///
/// `Add` and `Remove` name the enclosing node and list the affected
/// children; `Change` names the node whose value differs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOperation {
    Add {
        path: NodePath,
        items: Vec<(Segment, Node)>,
    },
    Remove {
        path: NodePath,
        items: Vec<(Segment, Node)>,
    },
    Change {
        path: NodePath,
        old: Node,
        new: Node,
    },
}

impl MergeOperation {
    pub fn path(&self) -> &NodePath {
        match self {
            MergeOperation::Add { path, .. }
            | MergeOperation::Remove { path, .. }
            | MergeOperation::Change { path, .. } => path,
        }
    }
}

impl fmt::Display for MergeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys = |items: &[(Segment, Node)]| {
            items
                .iter()
                .map(|(s, _)| s.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        match self {
            MergeOperation::Add { path, items } => write!(f, "add {} [{}]", path, keys(items)),
            MergeOperation::Remove { path, items } => {
                write!(f, "remove {} [{}]", path, keys(items))
            }
            MergeOperation::Change { path, old, new } => {
                write!(f, "change {} ({} -> {})", path, old.kind(), new.kind())
            }
        }
    }
}

/// Diff `original` against `generated`.
///
/// Mappings are compared key by key: additions follow the generated key
/// order, removals the original key order. Sequences are compared index by
/// index, with trailing removals listed from the highest index down so
/// they can be applied one at a time. Any other mismatch is a `Change`.
pub fn diff(original: &Node, generated: &Node) -> Vec<MergeOperation> {
    let mut ops = Vec::new();
    diff_node(&NodePath::root(), original, generated, &mut ops);
    ops
}

fn diff_node(path: &NodePath, original: &Node, generated: &Node, ops: &mut Vec<MergeOperation>) {
    match (original, generated) {
        (Node::Mapping(old), Node::Mapping(new)) => {
            for (key, old_value) in old.iter() {
                if let Some(new_value) = new.get(key) {
                    diff_node(&path.child(Segment::from(key)), old_value, new_value, ops);
                }
            }

            let added: Vec<_> = new
                .iter()
                .filter(|(key, _)| !old.contains_key(key))
                .map(|(key, value)| (Segment::from(key), value.clone()))
                .collect();
            if !added.is_empty() {
                ops.push(MergeOperation::Add {
                    path: path.clone(),
                    items: added,
                });
            }

            let removed: Vec<_> = old
                .iter()
                .filter(|(key, _)| !new.contains_key(key))
                .map(|(key, value)| (Segment::from(key), value.clone()))
                .collect();
            if !removed.is_empty() {
                ops.push(MergeOperation::Remove {
                    path: path.clone(),
                    items: removed,
                });
            }
        }
        (Node::Sequence(old), Node::Sequence(new)) => {
            let common = old.len().min(new.len());
            for i in 0..common {
                diff_node(&path.child(Segment::Index(i)), &old[i], &new[i], ops);
            }

            if new.len() > common {
                ops.push(MergeOperation::Add {
                    path: path.clone(),
                    items: new[common..]
                        .iter()
                        .enumerate()
                        .map(|(i, value)| (Segment::Index(common + i), value.clone()))
                        .collect(),
                });
            }
            if old.len() > common {
                ops.push(MergeOperation::Remove {
                    path: path.clone(),
                    items: (common..old.len())
                        .rev()
                        .map(|i| (Segment::Index(i), old[i].clone()))
                        .collect(),
                });
            }
        }
        (old, new) if old != new => ops.push(MergeOperation::Change {
            path: path.clone(),
            old: old.clone(),
            new: new.clone(),
        }),
        _ => {}
    }
}
