//! Descriptor documents.
//!
//! A descriptor is the hand-maintained YAML file that describes how one
//! header is exposed through the binding layer. Documents are parsed into a
//! closed tree of [`Node`]s so that diffing and patching can match on every
//! node kind exhaustively.
//!
//! All rendering goes through [`Document::render`], the single canonical
//! formatter. Two documents with the same tree always render to the same
//! text, which is what makes line diffs reflect semantic change only.

use std::fmt;
use std::sync::LazyLock;

use miette::{Diagnostic, NamedSource, SourceSpan};
use regex::Regex;
use thiserror::Error;

/// Keys whose contents are produced by header analysis rather than by hand.
pub const GENERATED_KEYWORDS: [&str; 6] = [
    "enums",
    "functions",
    "classes",
    "methods",
    "attributes",
    "overloads",
];

/// Check if a key is one of the generated-content keywords.
pub fn is_generated_keyword(key: &str) -> bool {
    GENERATED_KEYWORDS.contains(&key)
}

/// A leaf value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scalar {
    /// The empty/absent marker (`key:` with no value)
    Null,
    Bool(bool),
    /// Numbers are kept as their canonical text
    Number(String),
    String(String),
}

/// An insertion-ordered mapping with string keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    entries: Vec<(String, Node)>,
}

impl Mapping {
    /// Create an empty mapping.
    pub fn new() -> Self {
        Mapping::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert a value, replacing an existing entry in place or appending a
    /// new one at the end.
    pub fn insert(&mut self, key: impl Into<String>, value: Node) -> Option<Node> {
        let key = key.into();
        match self.get_mut(&key) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    /// Remove an entry, keeping the order of the remaining ones.
    pub fn remove(&mut self, key: &str) -> Option<Node> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl FromIterator<(String, Node)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (String, Node)>>(iter: I) -> Self {
        let mut mapping = Mapping::new();
        for (key, value) in iter {
            mapping.insert(key, value);
        }
        mapping
    }
}

/// A node in a descriptor document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Mapping(Mapping),
    Sequence(Vec<Node>),
    Scalar(Scalar),
}

impl Node {
    /// The empty/absent marker.
    pub fn null() -> Self {
        Node::Scalar(Scalar::Null)
    }

    /// Create a string scalar.
    pub fn string(value: impl Into<String>) -> Self {
        Node::Scalar(Scalar::String(value.into()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Scalar(Scalar::Null))
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Node::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut Mapping> {
        match self {
            Node::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Name of the node kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Mapping(_) => "a mapping",
            Node::Sequence(_) => "a sequence",
            Node::Scalar(_) => "a scalar",
        }
    }

    /// Whether this node carries `ignore: true`.
    pub fn is_ignored(&self) -> bool {
        matches!(
            self.as_mapping().and_then(|m| m.get("ignore")),
            Some(Node::Scalar(Scalar::Bool(true)))
        )
    }

    pub fn child(&self, segment: &Segment) -> Option<&Node> {
        match (self, segment) {
            (Node::Mapping(m), Segment::Key(k)) => m.get(k),
            (Node::Sequence(items), Segment::Index(i)) => items.get(*i),
            _ => None,
        }
    }

    pub fn child_mut(&mut self, segment: &Segment) -> Option<&mut Node> {
        match (self, segment) {
            (Node::Mapping(m), Segment::Key(k)) => m.get_mut(k),
            (Node::Sequence(items), Segment::Index(i)) => items.get_mut(*i),
            _ => None,
        }
    }

    /// Resolve a path relative to this node.
    pub fn lookup(&self, path: &NodePath) -> Option<&Node> {
        path.segments()
            .iter()
            .try_fold(self, |node, segment| node.child(segment))
    }

    pub fn lookup_mut(&mut self, path: &NodePath) -> Option<&mut Node> {
        let mut node = self;
        for segment in path.segments() {
            node = node.child_mut(segment)?;
        }
        Some(node)
    }

    /// Remove a direct child.
    pub fn remove_child(&mut self, segment: &Segment) -> Option<Node> {
        match (self, segment) {
            (Node::Mapping(m), Segment::Key(k)) => m.remove(k),
            (Node::Sequence(items), Segment::Index(i)) if *i < items.len() => {
                Some(items.remove(*i))
            }
            _ => None,
        }
    }

    /// Insert a direct child. Keys are appended (or replaced in place),
    /// indices are inserted at that position.
    pub fn insert_child(&mut self, segment: &Segment, value: Node) -> bool {
        match (self, segment) {
            (Node::Mapping(m), Segment::Key(k)) => {
                m.insert(k.clone(), value);
                true
            }
            (Node::Sequence(items), Segment::Index(i)) if *i <= items.len() => {
                items.insert(*i, value);
                true
            }
            _ => false,
        }
    }

    /// Replace a direct child that already exists (or append one past the
    /// end of a sequence).
    fn replace_child(&mut self, segment: &Segment, value: Node) -> bool {
        match (self, segment) {
            (Node::Mapping(m), Segment::Key(k)) => {
                m.insert(k.clone(), value);
                true
            }
            (Node::Sequence(items), Segment::Index(i)) if *i < items.len() => {
                items[*i] = value;
                true
            }
            (Node::Sequence(items), Segment::Index(i)) if *i == items.len() => {
                items.push(value);
                true
            }
            _ => false,
        }
    }
}

impl From<Mapping> for Node {
    fn from(mapping: Mapping) -> Self {
        Node::Mapping(mapping)
    }
}

/// One step of a [`NodePath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl Segment {
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Segment::Key(k) => Some(k),
            Segment::Index(_) => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(k) => f.write_str(k),
            Segment::Index(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for Segment {
    fn from(key: &str) -> Self {
        Segment::Key(key.to_string())
    }
}

/// A traversal path through nested mappings and sequences.
///
/// Segments are kept separately rather than as a dotted string, so keys
/// that themselves contain dots stay unambiguous.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath(Vec<Segment>);

impl NodePath {
    /// The document root.
    pub fn root() -> Self {
        NodePath(Vec::new())
    }

    /// Build a path from a list of mapping keys.
    pub fn from_keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        NodePath(keys.into_iter().map(Segment::from).collect())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn last(&self) -> Option<&Segment> {
        self.0.last()
    }

    /// Path of the enclosing node, `None` for the root.
    pub fn parent(&self) -> Option<NodePath> {
        if self.0.is_empty() {
            None
        } else {
            Some(NodePath(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Extend the path by one segment.
    pub fn child(&self, segment: Segment) -> NodePath {
        let mut segments = self.0.clone();
        segments.push(segment);
        NodePath(segments)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

/// Error raised when a descriptor cannot be turned into a document tree.
#[derive(Debug, Error, Diagnostic)]
pub enum DocumentError {
    #[error("malformed descriptor `{name}`: {message}")]
    #[diagnostic(code(wrapsync::document::syntax))]
    Syntax {
        name: String,
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: Option<SourceSpan>,
    },

    #[error("descriptor `{name}` must contain a mapping at the top level, found {found}")]
    #[diagnostic(code(wrapsync::document::root))]
    NotAMapping { name: String, found: &'static str },

    #[error("descriptor `{name}` has an unsupported key: {message}")]
    #[diagnostic(code(wrapsync::document::key))]
    BadKey { name: String, message: String },
}

/// A parsed descriptor document. The root is always a mapping.
#[derive(Debug, Clone)]
pub struct Document {
    name: String,
    root: Node,
}

impl Document {
    /// Create an empty document.
    pub fn new(name: impl Into<String>) -> Self {
        Document {
            name: name.into(),
            root: Node::Mapping(Mapping::new()),
        }
    }

    /// Create a document from an existing mapping.
    pub fn from_mapping(name: impl Into<String>, root: Mapping) -> Self {
        Document {
            name: name.into(),
            root: Node::Mapping(root),
        }
    }

    /// Parse descriptor text. An empty file is an empty document.
    pub fn parse(name: impl Into<String>, text: &str) -> Result<Self, DocumentError> {
        let name = name.into();

        let value: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| {
            let span = e
                .location()
                .map(|loc| SourceSpan::from((loc.index().min(text.len()), 1)));
            DocumentError::Syntax {
                message: e.to_string(),
                src: NamedSource::new(name.clone(), text.to_string()),
                span,
                name: name.clone(),
            }
        })?;

        let root = convert(value).map_err(|message| DocumentError::BadKey {
            name: name.clone(),
            message,
        })?;

        match root {
            Node::Mapping(_) => Ok(Document { name, root }),
            Node::Scalar(Scalar::Null) => Ok(Document::new(name)),
            other => Err(DocumentError::NotAMapping {
                name,
                found: other.kind(),
            }),
        }
    }

    /// Name used in diagnostics, usually the project-relative path.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The root node (always a mapping).
    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn root_mapping(&self) -> &Mapping {
        match &self.root {
            Node::Mapping(m) => m,
            _ => unreachable!("document root is always a mapping"),
        }
    }

    pub fn get(&self, path: &NodePath) -> Option<&Node> {
        self.root.lookup(path)
    }

    pub fn get_mut(&mut self, path: &NodePath) -> Option<&mut Node> {
        self.root.lookup_mut(path)
    }

    /// Set the value at `path`, whose parent must already exist.
    pub fn set(&mut self, path: &NodePath, value: Node) -> bool {
        let (Some(parent), Some(last)) = (path.parent(), path.last()) else {
            return false;
        };
        match self.root.lookup_mut(&parent) {
            Some(node) => node.replace_child(last, value),
            None => false,
        }
    }

    /// Remove a direct child of the node at `parent`.
    pub fn remove_child(&mut self, parent: &NodePath, segment: &Segment) -> Option<Node> {
        self.root.lookup_mut(parent)?.remove_child(segment)
    }

    /// Insert a direct child into the node at `parent`.
    pub fn insert_child(&mut self, parent: &NodePath, segment: &Segment, value: Node) -> bool {
        match self.root.lookup_mut(parent) {
            Some(node) => node.insert_child(segment, value),
            None => false,
        }
    }

    /// Whether `defaults.ignore` is set, freezing the document against
    /// additions.
    pub fn defaults_ignore(&self) -> bool {
        self.root_mapping()
            .get("defaults")
            .is_some_and(|defaults| defaults.is_ignored())
    }

    /// Whether the node at `path`, or any node above it, carries
    /// `ignore: true`. A path that does not resolve counts as frozen since
    /// nothing can be added below it.
    pub fn is_frozen(&self, path: &NodePath) -> bool {
        let mut node = &self.root;
        if node.is_ignored() {
            return true;
        }
        for segment in path.segments() {
            match node.child(segment) {
                Some(child) => node = child,
                None => return true,
            }
            if node.is_ignored() {
                return true;
            }
        }
        false
    }

    /// Render through the canonical formatter.
    pub fn render(&self) -> String {
        let mut out = String::from("---\n\n");
        let root = self.root_mapping();
        if root.is_empty() {
            out.push_str("{}\n");
        } else {
            write_mapping(&mut out, root, 0, false);
        }
        out
    }
}

fn convert(value: serde_yaml::Value) -> Result<Node, String> {
    use serde_yaml::Value;

    Ok(match value {
        Value::Null => Node::null(),
        Value::Bool(b) => Node::Scalar(Scalar::Bool(b)),
        Value::Number(n) => Node::Scalar(Scalar::Number(n.to_string())),
        Value::String(s) => Node::string(s),
        Value::Sequence(items) => Node::Sequence(
            items
                .into_iter()
                .map(convert)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Mapping(map) => {
            let mut mapping = Mapping::new();
            for (key, value) in map {
                let key = match key {
                    Value::String(s) => s,
                    Value::Bool(b) => b.to_string(),
                    Value::Number(n) => n.to_string(),
                    Value::Null => return Err("null mapping key".to_string()),
                    Value::Tagged(tagged) => match tagged.value {
                        Value::String(s) => s,
                        _ => return Err("tagged non-string mapping key".to_string()),
                    },
                    Value::Sequence(_) | Value::Mapping(_) => {
                        return Err("collection used as a mapping key".to_string())
                    }
                };
                mapping.insert(key, convert(value)?);
            }
            Node::Mapping(mapping)
        }
        Value::Tagged(tagged) => convert(tagged.value)?,
    })
}

// ---------------------------------------------------------------------------
// Canonical formatter
// ---------------------------------------------------------------------------

static NUMBER_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[-+]?(?:[0-9][0-9_]*(?:\.[0-9_]*)?|\.[0-9][0-9_]*)(?:[eE][-+]?[0-9]+)?|0x[0-9a-fA-F_]+|0o[0-7_]+|0b[01_]+|[-+]?\.(?:inf|Inf|INF)|\.(?:nan|NaN|NAN))$",
    )
    .expect("number pattern is valid")
});

const RESERVED_WORDS: &[&str] = &[
    "~", "null", "Null", "NULL", "true", "True", "TRUE", "false", "False", "FALSE", "yes", "Yes",
    "YES", "no", "No", "NO", "on", "On", "ON", "off", "Off", "OFF", "y", "Y", "n", "N",
];

fn pad(out: &mut String, indent: usize) {
    out.extend(std::iter::repeat(' ').take(indent));
}

/// Write mapping entries at `indent`. With `inline_first`, the first entry
/// continues the current line (used for mappings inside sequences).
fn write_mapping(out: &mut String, mapping: &Mapping, indent: usize, inline_first: bool) {
    for (i, (key, value)) in mapping.iter().enumerate() {
        if i > 0 || !inline_first {
            pad(out, indent);
        }
        out.push_str(&format_string(key));
        out.push(':');
        write_value(out, value, indent);
    }
}

/// Write the value following `key:` for a key at `indent`.
fn write_value(out: &mut String, value: &Node, indent: usize) {
    match value {
        Node::Scalar(Scalar::Null) => out.push('\n'),
        Node::Scalar(Scalar::String(text)) if use_block_scalar(text) => {
            write_block_scalar(out, text, indent + 2)
        }
        Node::Scalar(scalar) => {
            out.push(' ');
            out.push_str(&format_scalar(scalar));
            out.push('\n');
        }
        Node::Mapping(m) if m.is_empty() => out.push_str(" {}\n"),
        Node::Mapping(m) => {
            out.push('\n');
            write_mapping(out, m, indent + 2, false);
        }
        Node::Sequence(items) if items.is_empty() => out.push_str(" []\n"),
        Node::Sequence(items) => {
            out.push('\n');
            write_sequence(out, items, indent);
        }
    }
}

fn write_sequence(out: &mut String, items: &[Node], indent: usize) {
    for item in items {
        pad(out, indent);
        out.push('-');
        match item {
            Node::Scalar(Scalar::Null) => out.push('\n'),
            Node::Scalar(Scalar::String(text)) if use_block_scalar(text) => {
                write_block_scalar(out, text, indent + 2)
            }
            Node::Scalar(scalar) => {
                out.push(' ');
                out.push_str(&format_scalar(scalar));
                out.push('\n');
            }
            Node::Mapping(m) if m.is_empty() => out.push_str(" {}\n"),
            Node::Mapping(m) => {
                out.push(' ');
                write_mapping(out, m, indent + 2, true);
            }
            Node::Sequence(inner) if inner.is_empty() => out.push_str(" []\n"),
            Node::Sequence(inner) => {
                out.push('\n');
                write_sequence(out, inner, indent + 2);
            }
        }
    }
}

/// Multi-line strings use literal blocks when every line survives one.
fn use_block_scalar(text: &str) -> bool {
    let core = text.trim_end_matches('\n');
    if !text.contains('\n') || core.is_empty() {
        return false;
    }
    let first_content = core.lines().find(|l| !l.is_empty());
    if first_content.is_some_and(|l| l.starts_with(' ')) {
        return false;
    }
    core.split('\n').all(|line| {
        line == line.trim_end() && !line.chars().any(|c| needs_escape(c) && c != '\t')
    }) && !core.split('\n').any(|line| line.starts_with('\t'))
}

fn write_block_scalar(out: &mut String, text: &str, indent: usize) {
    let core = text.trim_end_matches('\n');
    let trailing = text.len() - core.len();
    let chomp = match trailing {
        0 => "-",
        1 => "",
        _ => "+",
    };
    out.push_str(" |");
    out.push_str(chomp);
    out.push('\n');
    for line in core.split('\n') {
        if !line.is_empty() {
            pad(out, indent);
            out.push_str(line);
        }
        out.push('\n');
    }
    for _ in 1..trailing {
        out.push('\n');
    }
}

fn format_scalar(scalar: &Scalar) -> String {
    match scalar {
        Scalar::Null => String::new(),
        Scalar::Bool(b) => b.to_string(),
        Scalar::Number(n) => n.clone(),
        Scalar::String(s) => format_string(s),
    }
}

fn format_string(text: &str) -> String {
    if is_plain_safe(text) {
        text.to_string()
    } else if text.chars().any(needs_escape) {
        double_quoted(text)
    } else {
        format!("'{}'", text.replace('\'', "''"))
    }
}

fn is_plain_safe(text: &str) -> bool {
    let Some(first) = text.chars().next() else {
        return false;
    };
    if text != text.trim() || text.starts_with("...") {
        return false;
    }
    if "-?:,[]{}#&*!|>'\"%@`".contains(first) {
        return false;
    }
    if text.contains(": ") || text.contains(" #") || text.ends_with(':') {
        return false;
    }
    if text.chars().any(needs_escape) {
        return false;
    }
    !RESERVED_WORDS.contains(&text) && !NUMBER_LIKE.is_match(text)
}

/// Characters a YAML reader would not take back verbatim from a plain or
/// single-quoted scalar: controls, the Unicode line and paragraph
/// separators, and the byte order mark.
fn needs_escape(c: char) -> bool {
    c.is_control() || matches!(c, '\u{2028}' | '\u{2029}' | '\u{FEFF}')
}

fn double_quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            '\u{2028}' => out.push_str("\\L"),
            '\u{2029}' => out.push_str("\\P"),
            '\u{FEFF}' => out.push_str("\\uFEFF"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(doc: &Document) -> Document {
        Document::parse(doc.name(), &doc.render()).unwrap()
    }

    #[test]
    fn test_parse_empty_file() {
        let doc = Document::parse("empty.yml", "").unwrap();
        assert!(doc.root_mapping().is_empty());
        assert_eq!(doc.render(), "---\n\n{}\n");
    }

    #[test]
    fn test_parse_preserves_key_order() {
        let doc = Document::parse("a.yml", "zeta: 1\nalpha: 2\nmid:\n").unwrap();
        let keys: Vec<_> = doc.root_mapping().keys().collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);
        assert!(doc.root_mapping().get("mid").unwrap().is_null());
    }

    #[test]
    fn test_parse_rejects_sequence_root() {
        let err = Document::parse("list.yml", "- a\n- b\n").unwrap_err();
        assert!(matches!(err, DocumentError::NotAMapping { .. }));
    }

    #[test]
    fn test_parse_rejects_duplicate_keys() {
        let err = Document::parse("dup.yml", "a: 1\na: 2\n").unwrap_err();
        assert!(matches!(err, DocumentError::Syntax { .. }));
    }

    #[test]
    fn test_parse_reports_syntax_location() {
        let err = Document::parse("bad.yml", "classes:\n  Foo: [unclosed\n").unwrap_err();
        match err {
            DocumentError::Syntax { span, name, .. } => {
                assert_eq!(name, "bad.yml");
                assert!(span.is_some());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_render_nested_document() {
        let text = "classes:\n  frc::Encoder:\n    methods:\n      Get:\n      Set:\n        overloads:\n          int, int:\n";
        let doc = Document::parse("enc.yml", text).unwrap();
        assert_eq!(doc.render(), format!("---\n\n{}", text));
    }

    #[test]
    fn test_render_quotes_ambiguous_strings() {
        let text = "a: 'true'\nb: '123'\nc: ''\nd: 'x: y'\ne: it's\nf: '#tag'\ng: yes\n";
        let doc = Document::parse("q.yml", text).unwrap();
        let rendered = doc.render();
        assert!(rendered.contains("a: 'true'\n"));
        assert!(rendered.contains("b: '123'\n"));
        assert!(rendered.contains("c: ''\n"));
        assert!(rendered.contains("d: 'x: y'\n"));
        assert!(rendered.contains("e: it's\n"));
        assert!(rendered.contains("f: '#tag'\n"));
        // `yes` is a plain string to the YAML 1.2 parser, but stays quoted
        // for readers that follow YAML 1.1
        assert!(rendered.contains("g: 'yes'\n"));
        assert_eq!(roundtrip(&doc).root(), doc.root());

        let mut root = Mapping::new();
        root.insert("line", Node::string("a\u{2028}b"));
        root.insert("para", Node::string("a\u{2029}b"));
        root.insert("\u{FEFF}bom", Node::string("\u{FEFF}x"));
        root.insert("block", Node::string("one\u{2028}\ntwo\n"));
        let doc = Document::from_mapping("u.yml", root);
        let rendered = doc.render();
        assert!(rendered.contains("line: \"a\\Lb\"\n"));
        assert!(rendered.contains("para: \"a\\Pb\"\n"));
        assert!(rendered.contains("\"\\uFEFFbom\": \"\\uFEFFx\"\n"));
        assert!(!rendered.contains('\u{2028}'));
        assert_eq!(roundtrip(&doc).root(), doc.root());
    }

    #[test]
    fn test_render_multiline_strings_as_literal_blocks() {
        let mut root = Mapping::new();
        root.insert("clip", Node::string("line one\nline two\n"));
        root.insert("strip", Node::string("a\nb"));
        root.insert("keep", Node::string("a\n\n"));
        root.insert("indented", Node::string("  leading\nspace"));
        let doc = Document::from_mapping("ml.yml", root);

        let rendered = doc.render();
        assert!(rendered.contains("clip: |\n  line one\n  line two\n"));
        assert!(rendered.contains("strip: |-\n  a\n  b\n"));
        assert!(rendered.contains("keep: |+\n  a\n\n"));
        assert!(rendered.contains("indented: \"  leading\\nspace\"\n"));
        assert_eq!(roundtrip(&doc).root(), doc.root());
    }

    #[test]
    fn test_render_sequences() {
        let text = "ignored_bases:\n- Base<int>\n- Other\nkeepalive:\n- - 1\n  - 2\nparams:\n- name: x\n  default: '0'\n- {}\nempty: []\n";
        let doc = Document::parse("seq.yml", text).unwrap();
        let again = roundtrip(&doc);
        assert_eq!(again.root(), doc.root());
        assert!(doc.render().contains("ignored_bases:\n- Base<int>\n- Other\n"));
        assert!(doc.render().contains("- name: x\n  default: '0'\n"));
    }

    #[test]
    fn test_defaults_ignore() {
        let doc = Document::parse("d.yml", "defaults:\n  ignore: true\n").unwrap();
        assert!(doc.defaults_ignore());

        let doc = Document::parse("d.yml", "defaults:\n  ignore: false\n").unwrap();
        assert!(!doc.defaults_ignore());
    }

    #[test]
    fn test_is_frozen_checks_every_ancestor() {
        let doc = Document::parse(
            "f.yml",
            "classes:\n  Foo:\n    ignore: true\n    methods:\n      bar:\n  Baz:\n    methods: {}\n",
        )
        .unwrap();

        assert!(doc.is_frozen(&NodePath::from_keys(["classes", "Foo"])));
        assert!(doc.is_frozen(&NodePath::from_keys(["classes", "Foo", "methods"])));
        assert!(!doc.is_frozen(&NodePath::from_keys(["classes", "Baz", "methods"])));
        assert!(doc.is_frozen(&NodePath::from_keys(["classes", "Missing"])));
    }

    #[test]
    fn test_path_editing() {
        let mut doc = Document::parse("p.yml", "classes:\n  Foo:\n    methods:\n      a:\n").unwrap();
        let methods = NodePath::from_keys(["classes", "Foo", "methods"]);

        assert!(doc.insert_child(&methods, &Segment::from("b"), Node::null()));
        assert!(doc.set(&methods.child(Segment::from("a")), Node::string("x")));
        assert_eq!(
            doc.remove_child(&methods, &Segment::from("b")),
            Some(Node::null())
        );
        assert_eq!(
            doc.get(&methods.child(Segment::from("a"))),
            Some(&Node::string("x"))
        );
        assert!(!doc.set(&NodePath::root(), Node::null()));
    }

    #[test]
    fn test_node_path_display() {
        assert_eq!(NodePath::root().to_string(), "<root>");
        let path = NodePath::from_keys(["classes", "frc::Encoder"]).child(Segment::Index(2));
        assert_eq!(path.to_string(), "classes.frc::Encoder.2");
    }
}
