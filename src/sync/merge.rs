//! Reconciling a hand-edited descriptor with a freshly generated one.
//!
//! The rules, applied to a working copy of the original:
//!
//! - A `Change` is applied unless its new value is null. Generated leaves
//!   are always null, so a hand-written value under a generated key is
//!   never replaced by "nothing".
//! - A removal is applied only when the removed key is a generated keyword
//!   or the removed item sits directly inside a keyword collection.
//!   Everything else under a generated node was written by hand and stays.
//! - Additions run last, and only when the document is not frozen by
//!   `defaults.ignore` and no node on the way to the target carries
//!   `ignore: true`. A change that fills in a null leaf counts as an
//!   addition here.
//!
//! Changes and removals below an ignored node are skipped as well, so an
//! ignored subtree is never touched.

use crate::core::document::{is_generated_keyword, Document, NodePath, Segment};
use crate::sync::diff::{diff, MergeOperation};

/// Result of [`reconcile`].
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub document: Document,
    /// Number of edits applied to the original
    pub applied: usize,
    /// Number of edits that the rules above rejected
    pub skipped: usize,
}

/// Merge `generated` into `original`.
pub fn reconcile(original: &Document, generated: &Document) -> Reconciled {
    let mut working = original.clone();
    let mut additions = Vec::new();
    let mut applied = 0;
    let mut skipped = 0;
    let defaults_ignore = working.defaults_ignore();

    for op in diff(original.root(), generated.root()) {
        match op {
            MergeOperation::Change { path, old, new } => {
                // Filling in a null leaf adds members, so it is frozen like an add.
                let frozen = (defaults_ignore && old.is_null())
                    || path.parent().is_some_and(|p| working.is_frozen(&p));
                if new.is_null() || frozen || !working.set(&path, new) {
                    tracing::trace!("keeping {}", path);
                    skipped += 1;
                } else {
                    applied += 1;
                }
            }
            MergeOperation::Remove { path, items } => {
                for (segment, _) in items {
                    if removable(&working, &path, &segment)
                        && working.remove_child(&path, &segment).is_some()
                    {
                        applied += 1;
                    } else {
                        tracing::trace!("keeping {}", path.child(segment));
                        skipped += 1;
                    }
                }
            }
            MergeOperation::Add { path, items } => additions.push((path, items)),
        }
    }

    for (path, items) in additions {
        for (segment, value) in items {
            if defaults_ignore || working.is_frozen(&path) {
                tracing::trace!("not adding {} to ignored {}", segment, path);
                skipped += 1;
            } else if working.insert_child(&path, &segment, value) {
                applied += 1;
            } else {
                skipped += 1;
            }
        }
    }

    Reconciled {
        document: working,
        applied,
        skipped,
    }
}

fn removable(doc: &Document, parent: &NodePath, item: &Segment) -> bool {
    if doc.is_frozen(parent) {
        return false;
    }
    let names_keyword = |segment: Option<&Segment>| {
        segment
            .and_then(Segment::as_key)
            .is_some_and(is_generated_keyword)
    };
    names_keyword(Some(item)) || names_keyword(parent.last())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::document::Node;

    fn doc(text: &str) -> Document {
        Document::parse("t.yml", text).unwrap()
    }

    fn merged(original: &str, generated: &str) -> Document {
        reconcile(&doc(original), &doc(generated)).document
    }

    #[test]
    fn test_removed_method_only() {
        let out = merged(
            "classes:\n  Foo:\n    methods:\n      bar:\n      baz:\n",
            "classes:\n  Foo:\n    methods:\n      bar:\n",
        );
        assert_eq!(
            out.root(),
            doc("classes:\n  Foo:\n    methods:\n      bar:\n").root()
        );
    }

    #[test]
    fn test_defaults_ignore_blocks_additions() {
        let original = "defaults:\n  ignore: true\nclasses:\n  Foo:\n";
        let out = merged(original, "classes:\n  Foo:\n  Bar:\n");
        assert_eq!(out.root(), doc(original).root());
    }

    #[test]
    fn test_defaults_ignore_blocks_filling_null_leaf() {
        let original = "defaults:\n  ignore: true\nclasses:\n  Foo:\n";
        let out = merged(original, "classes:\n  Foo:\n    methods:\n      bar:\n");
        assert_eq!(out.root(), doc(original).root());
        assert_eq!(out.render(), doc(original).render());
    }

    #[test]
    fn test_null_change_keeps_user_content() {
        let original = "functions:\n  Get:\n    rename: get\n    doc: Returns the count\n";
        let out = merged(original, "functions:\n  Get:\n");
        assert_eq!(out.root(), doc(original).root());
    }

    #[test]
    fn test_non_null_change_applies() {
        let out = merged(
            "classes:\n  Foo:\n",
            "classes:\n  Foo:\n    methods:\n      bar:\n",
        );
        assert!(out
            .get(&NodePath::from_keys(["classes", "Foo", "methods", "bar"]))
            .is_some());
    }

    #[test]
    fn test_user_keys_survive_removal() {
        let out = merged(
            "extra_includes:\n- foo.h\nclasses:\n  Foo:\n    rename: Bar\n    methods:\n      a:\n",
            "classes:\n  Foo:\n    methods:\n      a:\n",
        );
        assert!(out.get(&NodePath::from_keys(["extra_includes"])).is_some());
        assert!(out
            .get(&NodePath::from_keys(["classes", "Foo", "rename"]))
            .is_some());
    }

    #[test]
    fn test_keyword_collection_removed_whole() {
        let out = merged(
            "classes:\n  Foo:\n    enums:\n      Mode:\n    methods:\n      a:\n",
            "classes:\n  Foo:\n    methods:\n      a:\n",
        );
        assert!(out
            .get(&NodePath::from_keys(["classes", "Foo", "enums"]))
            .is_none());
        assert!(out
            .get(&NodePath::from_keys(["classes", "Foo", "methods", "a"]))
            .is_some());
    }

    #[test]
    fn test_keyword_deletion_is_scoped() {
        let out = merged(
            "classes:\n  Foo:\n    methods:\n      a:\n      b:\n      c:\n  Bar:\n    methods:\n      b:\n",
            "classes:\n  Foo:\n    methods:\n      a:\n      c:\n  Bar:\n    methods:\n      b:\n",
        );
        let foo = NodePath::from_keys(["classes", "Foo", "methods"]);
        let methods: Vec<_> = out
            .get(&foo)
            .and_then(Node::as_mapping)
            .unwrap()
            .keys()
            .collect();
        assert_eq!(methods, ["a", "c"]);
        assert!(out
            .get(&NodePath::from_keys(["classes", "Bar", "methods", "b"]))
            .is_some());
    }

    #[test]
    fn test_ignored_node_gets_no_additions() {
        let original = "classes:\n  Foo:\n    ignore: true\n    methods:\n      a:\n";
        let generated = "classes:\n  Foo:\n    methods:\n      a:\n      b:\n    attributes:\n      x:\n";
        let out = merged(original, generated);
        assert_eq!(out.root(), doc(original).root());
    }

    #[test]
    fn test_ignored_subtree_keeps_stale_members() {
        let original = "classes:\n  Foo:\n    ignore: true\n    methods:\n      a:\n      gone:\n";
        let out = merged(original, "classes:\n  Foo:\n    methods:\n      a:\n");
        assert_eq!(out.root(), doc(original).root());
    }

    #[test]
    fn test_new_class_added_in_generated_order() {
        let out = merged(
            "classes:\n  Foo:\n",
            "classes:\n  Foo:\n  Bar:\n  Baz:\n",
        );
        let classes: Vec<_> = out
            .get(&NodePath::from_keys(["classes"]))
            .and_then(Node::as_mapping)
            .unwrap()
            .keys()
            .collect();
        assert_eq!(classes, ["Foo", "Bar", "Baz"]);
    }

    #[test]
    fn test_idempotent() {
        let original = doc(
            "defaults:\n  subpackage: x\nclasses:\n  Foo:\n    rename: F\n    methods:\n      a:\n        rename: b\n      old:\n  Ignored:\n    ignore: true\nfunctions:\n  f:\n",
        );
        let generated = doc(
            "classes:\n  Foo:\n    methods:\n      a:\n      new:\n  Ignored:\n    methods:\n      m:\n  Added:\nfunctions:\n  f:\n  g:\n",
        );

        let first = reconcile(&original, &generated);
        assert!(first.applied > 0);
        let second = reconcile(&first.document, &generated);
        assert_eq!(second.applied, 0);
        assert_eq!(second.document.render(), first.document.render());
    }

    #[test]
    fn test_counts() {
        let result = reconcile(
            &doc("classes:\n  Foo:\n    methods:\n      a:\n        rename: x\n      b:\n"),
            &doc("classes:\n  Foo:\n    methods:\n      a:\n      c:\n"),
        );
        // remove b, add c applied; null change on a skipped
        assert_eq!(result.applied, 2);
        assert_eq!(result.skipped, 1);
    }
}
