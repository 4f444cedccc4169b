//! Header signature reports.
//!
//! A [`SignatureReport`] is the bindable surface of one header, keyed by
//! qualified name and expressed in the generated-content vocabulary
//! (`enums`, `functions`, `classes`, `methods`, `attributes`, `overloads`).
//! Sorted collections keep every rendering deterministic.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::core::document::{Document, Mapping, Node};

/// A free function or method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionSig {
    /// Overload keys (comma-separated parameter types). Empty unless the
    /// function is overloaded.
    pub overloads: BTreeSet<String>,
}

/// A class or struct.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassSig {
    pub attributes: BTreeSet<String>,
    pub enums: BTreeSet<String>,
    pub methods: BTreeMap<String, FunctionSig>,
}

impl ClassSig {
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.enums.is_empty() && self.methods.is_empty()
    }
}

/// The bindable surface of one header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureReport {
    pub enums: BTreeSet<String>,
    pub functions: BTreeMap<String, FunctionSig>,
    pub classes: BTreeMap<String, ClassSig>,
}

/// Error raised when a document does not follow the report vocabulary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("unexpected key `{key}` at `{path}`")]
    UnexpectedKey { path: String, key: String },

    #[error("expected a mapping at `{path}`, found {found}")]
    NotAMapping { path: String, found: &'static str },
}

impl SignatureReport {
    pub fn is_empty(&self) -> bool {
        self.enums.is_empty() && self.functions.is_empty() && self.classes.is_empty()
    }

    /// Build the generated descriptor for this report. Every leaf is null
    /// and empty collections are omitted.
    pub fn to_document(&self, name: impl Into<String>) -> Document {
        let mut root = Mapping::new();
        if !self.classes.is_empty() {
            let classes = self
                .classes
                .iter()
                .map(|(name, class)| (name.clone(), class_node(class)))
                .collect();
            root.insert("classes", Node::Mapping(classes));
        }
        if !self.enums.is_empty() {
            root.insert("enums", names_node(&self.enums));
        }
        if !self.functions.is_empty() {
            root.insert("functions", functions_node(&self.functions));
        }
        Document::from_mapping(name, root)
    }

    /// Read a report expressed in descriptor vocabulary.
    pub fn from_document(doc: &Document) -> Result<Self, SignatureError> {
        let mut report = SignatureReport::default();

        for (key, node) in entries(doc.root(), "<root>")? {
            match key {
                "enums" => report.enums = names(node, "enums")?,
                "functions" => report.functions = functions(node, "functions")?,
                "classes" => {
                    for (class_name, class_node) in entries(node, "classes")? {
                        let path = format!("classes.{}", class_name);
                        let mut class = ClassSig::default();
                        for (member, value) in entries(class_node, &path)? {
                            let member_path = format!("{}.{}", path, member);
                            match member {
                                "attributes" => class.attributes = names(value, &member_path)?,
                                "enums" => class.enums = names(value, &member_path)?,
                                "methods" => class.methods = functions(value, &member_path)?,
                                other => return Err(unexpected(&path, other)),
                            }
                        }
                        report.classes.insert(class_name.to_string(), class);
                    }
                }
                other => return Err(unexpected("<root>", other)),
            }
        }

        Ok(report)
    }

    /// Everything in this report that the descriptor does not mention yet.
    pub fn missing_from(&self, doc: &Document) -> SignatureReport {
        let root = Some(doc.root());
        let mut missing = SignatureReport::default();

        let enums = child(root, "enums");
        missing.enums = self
            .enums
            .iter()
            .filter(|e| !has_key(enums, e))
            .cloned()
            .collect();

        missing.functions = missing_functions(&self.functions, child(root, "functions"));

        let classes = child(root, "classes");
        for (name, class) in &self.classes {
            if !has_key(classes, name) {
                missing.classes.insert(name.clone(), class.clone());
                continue;
            }
            let existing = child(classes, name);
            let attributes = child(existing, "attributes");
            let class_enums = child(existing, "enums");
            let delta = ClassSig {
                attributes: class
                    .attributes
                    .iter()
                    .filter(|a| !has_key(attributes, a))
                    .cloned()
                    .collect(),
                enums: class
                    .enums
                    .iter()
                    .filter(|e| !has_key(class_enums, e))
                    .cloned()
                    .collect(),
                methods: missing_functions(&class.methods, child(existing, "methods")),
            };
            if !delta.is_empty() {
                missing.classes.insert(name.clone(), delta);
            }
        }

        missing
    }
}

fn names_node(names: &BTreeSet<String>) -> Node {
    Node::Mapping(names.iter().map(|n| (n.clone(), Node::null())).collect())
}

fn function_node(sig: &FunctionSig) -> Node {
    if sig.overloads.is_empty() {
        Node::null()
    } else {
        let mut mapping = Mapping::new();
        mapping.insert("overloads", names_node(&sig.overloads));
        Node::Mapping(mapping)
    }
}

fn functions_node(functions: &BTreeMap<String, FunctionSig>) -> Node {
    Node::Mapping(
        functions
            .iter()
            .map(|(name, sig)| (name.clone(), function_node(sig)))
            .collect(),
    )
}

fn class_node(class: &ClassSig) -> Node {
    let mut mapping = Mapping::new();
    if !class.attributes.is_empty() {
        mapping.insert("attributes", names_node(&class.attributes));
    }
    if !class.enums.is_empty() {
        mapping.insert("enums", names_node(&class.enums));
    }
    if !class.methods.is_empty() {
        mapping.insert("methods", functions_node(&class.methods));
    }
    if mapping.is_empty() {
        Node::null()
    } else {
        Node::Mapping(mapping)
    }
}

fn unexpected(path: &str, key: &str) -> SignatureError {
    SignatureError::UnexpectedKey {
        path: path.to_string(),
        key: key.to_string(),
    }
}

fn entries<'a>(node: &'a Node, path: &str) -> Result<Vec<(&'a str, &'a Node)>, SignatureError> {
    match node {
        Node::Mapping(m) => Ok(m.iter().collect()),
        n if n.is_null() => Ok(Vec::new()),
        other => Err(SignatureError::NotAMapping {
            path: path.to_string(),
            found: other.kind(),
        }),
    }
}

fn names(node: &Node, path: &str) -> Result<BTreeSet<String>, SignatureError> {
    Ok(entries(node, path)?
        .into_iter()
        .map(|(k, _)| k.to_string())
        .collect())
}

fn functions(node: &Node, path: &str) -> Result<BTreeMap<String, FunctionSig>, SignatureError> {
    let mut out = BTreeMap::new();
    for (name, value) in entries(node, path)? {
        let fn_path = format!("{}.{}", path, name);
        let mut sig = FunctionSig::default();
        for (key, overloads) in entries(value, &fn_path)? {
            match key {
                "overloads" => sig.overloads = names(overloads, &format!("{}.overloads", fn_path))?,
                other => return Err(unexpected(&fn_path, other)),
            }
        }
        out.insert(name.to_string(), sig);
    }
    Ok(out)
}

fn child<'a>(node: Option<&'a Node>, key: &str) -> Option<&'a Node> {
    node.and_then(Node::as_mapping).and_then(|m| m.get(key))
}

fn has_key(node: Option<&Node>, key: &str) -> bool {
    node.and_then(Node::as_mapping)
        .is_some_and(|m| m.contains_key(key))
}

fn missing_functions(
    functions: &BTreeMap<String, FunctionSig>,
    existing: Option<&Node>,
) -> BTreeMap<String, FunctionSig> {
    let mut missing = BTreeMap::new();
    for (name, sig) in functions {
        if !has_key(existing, name) {
            missing.insert(name.clone(), sig.clone());
            continue;
        }
        let overloads = child(child(existing, name), "overloads");
        let delta: BTreeSet<String> = sig
            .overloads
            .iter()
            .filter(|o| !has_key(overloads, o))
            .cloned()
            .collect();
        if !delta.is_empty() {
            missing.insert(name.clone(), FunctionSig { overloads: delta });
        }
    }
    missing
}
