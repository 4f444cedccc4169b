//! Built-in C++ header scanner.
//!
//! This is a declaration scanner, not a compiler front end. Two regex
//! passes strip comments, string contents and preprocessor lines and then
//! split what is left into tokens. A brace walker over those tokens tracks
//! namespace and class nesting, which a flat pattern cannot, to find
//! namespaces, classes, enums, functions and public data members.
//! Function bodies, templates and operators are skipped. Good enough to
//! keep descriptors honest for ordinary library headers.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::core::signature::{ClassSig, FunctionSig, SignatureReport};
use crate::extract::{ExtractError, ExtractRequest, Extractor, HeaderSignature};
use crate::util::fs::{normalize_path, to_slash, write_once};

static INCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^[ \t]*#[ \t]*include[ \t]*([<"])([^>"\n]+)[>"]"#)
        .expect("include pattern is valid")
});

/// Comments, preprocessor lines and literals. Matched left to right, so a
/// `//` inside a string is never taken for a comment and a digit separator
/// (`1'000`) stays part of its number.
static LEXEME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r##"(?xm)
          (?P<comment> //[^\n]* | /\*(?s:.*?)(?:\*/|\z) )
        | (?P<directive> ^[\x20\t]*\#(?:[^\n\\]|\\(?s:.))* )
        | (?P<raw> (?:u8|[uUL])?R"[^(\s"]*\((?s:.*?)\)[^)\s"]*" )
        | (?P<string> "(?:[^"\\\n]|\\.)*"? )
        | (?P<char> '(?:[^'\\\n]|\\.)*'? )
        | (?P<word> [_\p{Alphabetic}]\w* | [0-9][\w.']* )
        "##,
    )
    .expect("lexeme pattern is valid")
});

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?P<ident>[_\p{Alphabetic}]\w*)|(?P<literal>[0-9][\w.']*|""?|''?)|(?P<scope>::)|\S"#,
    )
    .expect("token pattern is valid")
});

/// Identifiers that look like a call but never name a function.
const NOT_FUNCTIONS: &[&str] = &[
    "decltype", "sizeof", "alignof", "noexcept", "throw", "return", "if", "while", "for",
    "switch", "requires", "static_assert", "alignas",
];

/// Words that end a parameter type rather than name the parameter.
const TYPE_WORDS: &[&str] = &[
    "void", "bool", "char", "short", "int", "long", "float", "double", "signed", "unsigned",
    "auto", "const", "volatile", "wchar_t", "char8_t", "char16_t", "char32_t",
];

/// The built-in extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderScanner;

impl HeaderScanner {
    pub fn new() -> Self {
        HeaderScanner
    }
}

impl Extractor for HeaderScanner {
    fn name(&self) -> &str {
        "scanner"
    }

    fn extract(&self, request: &ExtractRequest<'_>) -> Result<HeaderSignature, ExtractError> {
        let action = request.action;
        let source = std::fs::read_to_string(&action.header).map_err(|source| ExtractError::Io {
            path: action.header.clone(),
            source,
        })?;

        let (report, problem) = scan(&source);
        if let Some(message) = problem {
            if !request.bootstrap {
                return Err(ExtractError::Parse {
                    header: action.header.display().to_string(),
                    message,
                });
            }
            tracing::warn!(
                "{}: {} (using partial results)",
                action.header.display(),
                message
            );
        }

        write_depfile(request, &source)?;
        Ok(HeaderSignature::new(report, request.descriptor))
    }
}

/// Scan header source. Returns whatever could be recovered plus the first
/// structural problem, if any.
fn scan(source: &str) -> (SignatureReport, Option<String>) {
    let mut parser = Parser::new(tokenize(&strip_source(source)));
    let mut scope = Scope {
        prefix: String::new(),
        class: None,
        visible: true,
    };
    parser.parse_block(&mut scope, false);
    parser.finish()
}

/// Makefile-style depfile: the generated descriptor depends on the header,
/// every include we can resolve, and the current descriptor.
fn write_depfile(request: &ExtractRequest<'_>, source: &str) -> Result<(), ExtractError> {
    let action = request.action;
    let mut deps = vec![action.header.clone()];

    for cap in INCLUDE_RE.captures_iter(source) {
        let name = cap[2].trim();
        let local = action
            .header
            .parent()
            .filter(|_| &cap[1] == "\"")
            .map(|dir| dir.join(name));
        let found = local
            .into_iter()
            .chain(action.include_paths.iter().map(|dir| dir.join(name)))
            .find(|path| path.is_file());
        if let Some(path) = found {
            let path = normalize_path(&path);
            if !deps.contains(&path) {
                deps.push(path);
            }
        }
    }

    let descriptor = request.project_root.join(&action.descriptor);
    if descriptor.is_file() {
        deps.push(descriptor);
    }

    let mut text = format!("{}:", escape_make(&to_slash(&action.output)));
    for dep in &deps {
        text.push_str(" \\\n  ");
        text.push_str(&escape_make(&dep.display().to_string()));
    }
    text.push('\n');

    write_once(&request.depfile, &text).map_err(|e| ExtractError::Io {
        path: request.depfile.clone(),
        source: std::io::Error::other(format!("{:#}", e)),
    })
}

fn escape_make(path: &str) -> String {
    path.replace(' ', "\\ ")
}

/// Remove comments and preprocessor lines; reduce string and character
/// literals to empty quotes.
fn strip_source(source: &str) -> String {
    LEXEME_RE
        .replace_all(source, |caps: &Captures<'_>| {
            if let Some(word) = caps.name("word") {
                word.as_str().to_string()
            } else if caps.name("raw").is_some() || caps.name("string").is_some() {
                "\"\"".to_string()
            } else if caps.name("char").is_some() {
                "''".to_string()
            } else {
                " ".to_string()
            }
        })
        .into_owned()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Punct(char),
    Scope,
    Literal(String),
}

impl Token {
    fn is_punct(&self, c: char) -> bool {
        matches!(self, Token::Punct(p) if *p == c)
    }

    fn is_ident(&self, word: &str) -> bool {
        matches!(self, Token::Ident(w) if w == word)
    }

    fn is_word(&self) -> bool {
        matches!(self, Token::Ident(_) | Token::Literal(_))
    }

    fn text(&self) -> String {
        match self {
            Token::Ident(s) | Token::Literal(s) => s.clone(),
            Token::Punct(c) => c.to_string(),
            Token::Scope => "::".to_string(),
        }
    }
}

fn tokenize(source: &str) -> Vec<Token> {
    TOKEN_RE
        .captures_iter(source)
        .filter_map(|caps| {
            let text = &caps[0];
            let token = if caps.name("ident").is_some() {
                Token::Ident(text.to_string())
            } else if caps.name("literal").is_some() {
                Token::Literal(text.to_string())
            } else if caps.name("scope").is_some() {
                Token::Scope
            } else {
                Token::Punct(text.chars().next()?)
            };
            Some(token)
        })
        .collect()
}

#[derive(Debug, Default)]
struct Members {
    attributes: BTreeSet<String>,
    enums: BTreeSet<String>,
    methods: BTreeMap<String, BTreeSet<String>>,
}

#[derive(Debug)]
struct ClassScope {
    public: bool,
    members: Members,
}

#[derive(Debug)]
struct Scope {
    /// Qualified name of the enclosing namespace or class
    prefix: String,
    class: Option<ClassScope>,
    /// False inside anonymous namespaces and non-public nested classes
    visible: bool,
}

impl Scope {
    fn exposed(&self) -> bool {
        self.visible && self.class.as_ref().map_or(true, |c| c.public)
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    enums: BTreeSet<String>,
    functions: BTreeMap<String, BTreeSet<String>>,
    classes: BTreeMap<String, Members>,
    problem: Option<String>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            enums: BTreeSet::new(),
            functions: BTreeMap::new(),
            classes: BTreeMap::new(),
            problem: None,
        }
    }

    fn finish(self) -> (SignatureReport, Option<String>) {
        let report = SignatureReport {
            enums: self.enums,
            functions: overload_sets(self.functions),
            classes: self
                .classes
                .into_iter()
                .map(|(name, members)| {
                    let class = ClassSig {
                        attributes: members.attributes,
                        enums: members.enums,
                        methods: overload_sets(members.methods),
                    };
                    (name, class)
                })
                .collect(),
        };
        (report, self.problem)
    }

    fn fail(&mut self, message: &str) {
        if self.problem.is_none() {
            self.problem = Some(message.to_string());
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn punct_at(&self, offset: usize, c: char) -> bool {
        self.tokens.get(self.pos + offset).is_some_and(|t| t.is_punct(c))
    }

    fn ident_at(&self, offset: usize, word: &str) -> bool {
        self.tokens.get(self.pos + offset).is_some_and(|t| t.is_ident(word))
    }

    /// Parse declarations until the closing brace of a nested block (which
    /// is consumed) or the end of input.
    fn parse_block(&mut self, scope: &mut Scope, nested: bool) {
        loop {
            let Some(tok) = self.peek().cloned() else {
                if nested {
                    self.fail("unbalanced braces: missing `}` at end of file");
                }
                return;
            };
            match tok {
                Token::Punct('}') => {
                    self.pos += 1;
                    if nested {
                        return;
                    }
                    self.fail("unbalanced braces: unexpected `}`");
                }
                Token::Punct(';') => self.pos += 1,
                Token::Punct('{') => self.skip_group('{', '}'),
                Token::Punct('[') if self.punct_at(1, '[') => self.skip_group('[', ']'),
                Token::Ident(word) => self.parse_statement(&word, scope),
                _ => self.parse_declaration(scope),
            }
        }
    }

    fn parse_statement(&mut self, word: &str, scope: &mut Scope) {
        match word {
            "namespace" => self.parse_namespace(scope),
            "inline" if self.ident_at(1, "namespace") => {
                self.pos += 1;
                self.parse_namespace(scope);
            }
            "extern" if matches!(self.tokens.get(self.pos + 1), Some(Token::Literal(_))) => {
                if self.punct_at(2, '{') {
                    self.pos += 3;
                    self.parse_block(scope, true);
                } else {
                    self.pos += 2;
                }
            }
            "public" | "private" | "protected" if self.punct_at(1, ':') => {
                self.pos += 2;
                if let Some(class) = &mut scope.class {
                    class.public = word == "public";
                }
            }
            "template" => {
                self.pos += 1;
                if self.punct_at(0, '<') {
                    self.skip_angle();
                }
                self.skip_declaration();
            }
            "typedef" | "using" | "friend" | "static_assert" => self.skip_declaration(),
            "class" | "struct" | "union" => self.parse_class(scope),
            "enum" => self.parse_enum(scope),
            w if is_macro_name(w) && self.punct_at(1, '(') => {
                self.pos += 1;
                self.skip_group('(', ')');
            }
            w if is_macro_name(w)
                && self.tokens.get(self.pos + 1).map_or(true, |t| {
                    t.is_punct('}') || ["public", "private", "protected"].iter().any(|a| t.is_ident(a))
                }) =>
            {
                self.pos += 1;
            }
            _ => self.parse_declaration(scope),
        }
    }

    fn parse_namespace(&mut self, scope: &mut Scope) {
        self.pos += 1;
        let mut names = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Ident(w)) if w == "inline" => self.pos += 1,
                Some(Token::Ident(w)) => {
                    names.push(w.clone());
                    self.pos += 1;
                }
                Some(Token::Scope) => self.pos += 1,
                Some(Token::Punct('[')) if self.punct_at(1, '[') => self.skip_group('[', ']'),
                _ => break,
            }
        }

        if !self.punct_at(0, '{') {
            // namespace alias
            self.skip_declaration();
            return;
        }
        self.pos += 1;

        let mut inner = Scope {
            prefix: names.iter().fold(scope.prefix.clone(), |p, n| qualify(&p, n)),
            class: None,
            visible: scope.visible && !names.is_empty(),
        };
        self.parse_block(&mut inner, true);
    }

    fn parse_class(&mut self, scope: &mut Scope) {
        let start = self.pos;
        let is_class = self.ident_at(0, "class");
        self.pos += 1;

        let mut name: Vec<String> = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Punct('[')) if self.punct_at(1, '[') => self.skip_group('[', ']'),
                Some(Token::Ident(w)) if w == "final" => self.pos += 1,
                Some(Token::Ident(w))
                    if matches!(w.as_str(), "alignas" | "__declspec" | "__attribute__")
                        && self.punct_at(1, '(') =>
                {
                    self.pos += 1;
                    self.skip_group('(', ')');
                }
                Some(Token::Ident(w)) => {
                    // `class EXPORT_MACRO Foo`: the last plain identifier wins
                    if !matches!(self.tokens.get(self.pos - 1), Some(Token::Scope)) {
                        name.clear();
                    }
                    name.push(w.clone());
                    self.pos += 1;
                }
                Some(Token::Scope) => self.pos += 1,
                _ => break,
            }
        }

        match self.peek() {
            Some(Token::Punct(';')) if !name.is_empty() => {
                // forward declaration
                self.pos += 1;
                return;
            }
            Some(Token::Punct(':')) => {
                while let Some(tok) = self.peek() {
                    if tok.is_punct('{') || tok.is_punct(';') {
                        break;
                    }
                    self.pos += 1;
                }
                if !self.punct_at(0, '{') {
                    self.skip_declaration();
                    return;
                }
            }
            Some(Token::Punct('{')) => {}
            _ => {
                // elaborated type specifier in a declaration
                self.pos = start;
                self.parse_declaration(scope);
                return;
            }
        }

        if name.is_empty() {
            // anonymous struct or union
            self.skip_group('{', '}');
            self.skip_declaration();
            return;
        }

        self.pos += 1;
        let qualified = name.iter().fold(scope.prefix.clone(), |p, n| qualify(&p, n));
        let visible = scope.exposed();
        let mut inner = Scope {
            prefix: qualified.clone(),
            class: Some(ClassScope {
                public: !is_class,
                members: Members::default(),
            }),
            visible,
        };
        self.parse_block(&mut inner, true);
        self.skip_declaration();

        if let (true, Some(class)) = (visible, inner.class) {
            let entry = self.classes.entry(qualified).or_default();
            entry.attributes.extend(class.members.attributes);
            entry.enums.extend(class.members.enums);
            for (method, sigs) in class.members.methods {
                entry.methods.entry(method).or_default().extend(sigs);
            }
        }
    }

    fn parse_enum(&mut self, scope: &mut Scope) {
        let start = self.pos;
        self.pos += 1;
        if self.ident_at(0, "class") || self.ident_at(0, "struct") {
            self.pos += 1;
        }

        let mut name = None;
        loop {
            match self.peek() {
                Some(Token::Punct('[')) if self.punct_at(1, '[') => self.skip_group('[', ']'),
                Some(Token::Ident(w)) => {
                    name = Some(w.clone());
                    self.pos += 1;
                }
                Some(Token::Scope) => self.pos += 1,
                _ => break,
            }
        }

        if self.punct_at(0, ':') {
            while let Some(tok) = self.peek() {
                if tok.is_punct('{') || tok.is_punct(';') {
                    break;
                }
                self.pos += 1;
            }
        }

        match self.peek() {
            Some(Token::Punct('{')) => {
                self.skip_group('{', '}');
                self.skip_declaration();
            }
            Some(Token::Punct(';')) => {
                // opaque declaration
                self.pos += 1;
                return;
            }
            _ => {
                self.pos = start;
                self.parse_declaration(scope);
                return;
            }
        }

        let Some(name) = name else { return };
        if !scope.exposed() {
            return;
        }
        match &mut scope.class {
            Some(class) => {
                class.members.enums.insert(name);
            }
            None => {
                self.enums.insert(name);
            }
        }
    }

    /// Collect one declaration (up to `;`, or through a function body) and
    /// record what it declares.
    fn parse_declaration(&mut self, scope: &mut Scope) {
        let mut decl = Vec::new();
        let mut depth = 0usize;
        let mut angle = 0usize;
        let mut has_params = false;
        let mut initializer = false;
        let mut operator = false;

        while let Some(tok) = self.peek().cloned() {
            match &tok {
                Token::Ident(w) if w == "operator" => operator = true,
                Token::Punct('(') => {
                    if depth == 0 && angle == 0 && !initializer {
                        has_params = true;
                    }
                    depth += 1;
                }
                Token::Punct('[') => depth += 1,
                Token::Punct(')') | Token::Punct(']') => depth = depth.saturating_sub(1),
                Token::Punct('<') if depth == 0 && !initializer && !operator => angle += 1,
                Token::Punct('>') if depth == 0 && angle > 0 => angle -= 1,
                Token::Punct('=') if depth == 0 && angle == 0 => initializer = true,
                Token::Punct(';') if depth == 0 => {
                    self.pos += 1;
                    break;
                }
                Token::Punct('}') if depth == 0 => break,
                Token::Punct('{') => {
                    self.skip_group('{', '}');
                    if depth == 0 && has_params && !initializer {
                        // function body
                        break;
                    }
                    continue;
                }
                _ => {}
            }
            decl.push(tok);
            self.pos += 1;
        }

        if operator {
            return;
        }
        self.record_declaration(&clean_declaration(&decl), scope);
    }

    fn record_declaration(&mut self, decl: &[Token], scope: &mut Scope) {
        if decl.is_empty() || !scope.exposed() {
            return;
        }
        if decl.iter().any(|t| t.is_ident("friend") || t.is_ident("typedef")) {
            return;
        }

        match find_params(decl) {
            Some(open) => self.record_function(decl, open, scope),
            None => {
                if let Some(class) = &mut scope.class {
                    class.members.attributes.extend(declarator_names(decl));
                }
            }
        }
    }

    fn record_function(&mut self, decl: &[Token], open: usize, scope: &mut Scope) {
        let close = matching(decl, open, '(', ')');

        // function pointer data member: `void (*callback)(int)`
        if decl
            .get(open + 1)
            .is_some_and(|t| t.is_punct('*') || t.is_punct('&') || t.is_punct('^'))
        {
            if let (Some(class), Some(Token::Ident(name))) = (
                &mut scope.class,
                decl[open + 1..close].iter().find(|t| matches!(t, Token::Ident(_))),
            ) {
                class.members.attributes.insert(name.clone());
            }
            return;
        }

        let Some(Token::Ident(name)) = open.checked_sub(1).and_then(|i| decl.get(i)) else {
            return;
        };
        if NOT_FUNCTIONS.contains(&name.as_str()) {
            return;
        }
        if open >= 2 && (matches!(decl[open - 2], Token::Scope) || decl[open - 2].is_punct('~')) {
            // out-of-line definition or destructor
            return;
        }
        if is_deleted(&decl[close.min(decl.len())..]) {
            return;
        }

        let params = normalize_params(&decl[open + 1..close]);
        match &mut scope.class {
            Some(class) => {
                class
                    .members
                    .methods
                    .entry(name.clone())
                    .or_default()
                    .insert(params);
            }
            None => {
                self.functions.entry(name.clone()).or_default().insert(params);
            }
        }
    }

    /// Skip a balanced group starting at the current `open` token.
    fn skip_group(&mut self, open: char, close: char) {
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            if tok.is_punct(open) {
                depth += 1;
            } else if tok.is_punct(close) {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    self.pos += 1;
                    return;
                }
            }
            self.pos += 1;
        }
        if open == '{' {
            self.fail("unbalanced braces: missing `}` at end of file");
        }
    }

    fn skip_angle(&mut self) {
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            if tok.is_punct('<') {
                depth += 1;
            } else if tok.is_punct('>') {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    self.pos += 1;
                    return;
                }
            } else if tok.is_punct('{') || tok.is_punct(';') {
                return;
            }
            self.pos += 1;
        }
    }

    /// Skip to the end of the current declaration without recording it.
    fn skip_declaration(&mut self) {
        let mut depth = 0usize;
        let mut type_body = false;
        while let Some(tok) = self.peek().cloned() {
            match tok {
                Token::Punct('(') | Token::Punct('[') => depth += 1,
                Token::Punct(')') | Token::Punct(']') => depth = depth.saturating_sub(1),
                Token::Punct(';') if depth == 0 => {
                    self.pos += 1;
                    return;
                }
                Token::Punct('}') if depth == 0 => return,
                Token::Punct('{') => {
                    self.skip_group('{', '}');
                    if depth == 0 && !type_body && !self.punct_at(0, ';') {
                        return;
                    }
                    continue;
                }
                Token::Ident(ref w) if matches!(w.as_str(), "class" | "struct" | "union" | "enum") => {
                    type_body = true
                }
                _ => {}
            }
            self.pos += 1;
        }
    }
}

fn qualify(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}::{}", prefix, name)
    }
}

fn is_macro_name(word: &str) -> bool {
    word.len() >= 2
        && word.chars().any(|c| c.is_ascii_uppercase())
        && word
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn overload_sets(functions: BTreeMap<String, BTreeSet<String>>) -> BTreeMap<String, FunctionSig> {
    functions
        .into_iter()
        .map(|(name, sigs)| {
            let sig = if sigs.len() > 1 {
                FunctionSig { overloads: sigs }
            } else {
                FunctionSig::default()
            };
            (name, sig)
        })
        .collect()
}

/// Index just past the group opened at `open`, or the end of `tokens`.
fn skip_group_in(tokens: &[Token], open: usize, open_c: char, close_c: char) -> usize {
    matching(tokens, open, open_c, close_c).saturating_add(1).min(tokens.len())
}

/// Index of the token closing the group opened at `open`, or `tokens.len()`.
fn matching(tokens: &[Token], open: usize, open_c: char, close_c: char) -> usize {
    let mut depth = 0usize;
    for (i, tok) in tokens.iter().enumerate().skip(open) {
        if tok.is_punct(open_c) {
            depth += 1;
        } else if tok.is_punct(close_c) {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return i;
            }
        }
    }
    tokens.len()
}

/// Drop attributes and attribute-like calls that would confuse the
/// function/variable split.
fn clean_declaration(decl: &[Token]) -> Vec<Token> {
    const STRIP: &[&str] = &["__attribute__", "__declspec", "alignas", "decltype"];

    let mut out = Vec::with_capacity(decl.len());
    let mut i = 0;
    while i < decl.len() {
        let tok = &decl[i];
        if tok.is_punct('[') && decl.get(i + 1).is_some_and(|t| t.is_punct('[')) {
            i = skip_group_in(decl, i, '[', ']');
            continue;
        }
        if let Token::Ident(w) = tok {
            if STRIP.contains(&w.as_str()) && decl.get(i + 1).is_some_and(|t| t.is_punct('(')) {
                if w == "decltype" {
                    out.push(tok.clone());
                }
                i = skip_group_in(decl, i + 1, '(', ')');
                continue;
            }
        }
        out.push(tok.clone());
        i += 1;
    }
    out
}

/// Position of the parameter list's `(`, if the declaration is a function.
fn find_params(decl: &[Token]) -> Option<usize> {
    let mut angle = 0usize;
    for (i, tok) in decl.iter().enumerate() {
        match tok {
            Token::Punct('<') => angle += 1,
            Token::Punct('>') if angle > 0 => angle -= 1,
            Token::Punct('=') | Token::Punct('[') | Token::Punct('{') if angle == 0 => return None,
            Token::Punct('(') if angle == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

fn is_deleted(tail: &[Token]) -> bool {
    tail.windows(2)
        .any(|w| w[0].is_punct('=') && w[1].is_ident("delete"))
}

/// Split on `sep` outside any bracket pair.
fn split_top_level(tokens: &[Token], sep: char) -> Vec<&[Token]> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, tok) in tokens.iter().enumerate() {
        match tok {
            Token::Punct('(' | '[' | '{' | '<') => depth += 1,
            Token::Punct(')' | ']' | '}' | '>') => depth = depth.saturating_sub(1),
            Token::Punct(c) if *c == sep && depth == 0 => {
                parts.push(&tokens[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&tokens[start..]);
    parts
}

/// Cut `tokens` at the first top-level token matching `stop`.
fn cut_at(tokens: &[Token], stop: impl Fn(&Token) -> bool) -> &[Token] {
    let mut depth = 0usize;
    for (i, tok) in tokens.iter().enumerate() {
        match tok {
            Token::Punct('(' | '<') => depth += 1,
            Token::Punct(')' | '>') => depth = depth.saturating_sub(1),
            t if depth == 0 && stop(t) => return &tokens[..i],
            _ => {}
        }
    }
    tokens
}

/// Names declared by a data member declaration (`int a, b = 2, c : 3;`).
fn declarator_names(decl: &[Token]) -> Vec<String> {
    let mut names = Vec::new();
    for (i, piece) in split_top_level(decl, ',').into_iter().enumerate() {
        let piece = cut_at(piece, |t| {
            t.is_punct('=') || t.is_punct('{') || t.is_punct('[') || t.is_punct(':')
        });
        let idents: Vec<&String> = piece
            .iter()
            .filter_map(|t| match t {
                Token::Ident(w) => Some(w),
                _ => None,
            })
            .collect();
        // the first declarator needs a type in front of it
        if i == 0 && idents.len() < 2 {
            continue;
        }
        if let Some(Token::Ident(name)) = piece.last() {
            if !TYPE_WORDS.contains(&name.as_str()) {
                names.push(name.clone());
            }
        }
    }
    names
}

/// Parameter types joined by `", "`; names and default values dropped.
fn normalize_params(tokens: &[Token]) -> String {
    let params: Vec<String> = split_top_level(tokens, ',')
        .into_iter()
        .map(normalize_param)
        .filter(|p| !p.is_empty())
        .collect();
    if params.len() == 1 && params[0] == "void" {
        return String::new();
    }
    params.join(", ")
}

fn normalize_param(tokens: &[Token]) -> String {
    let tokens = cut_at(tokens, |t| t.is_punct('='));
    let array = tokens.iter().position(|t| t.is_punct('['));
    let (ty, suffix) = tokens.split_at(array.unwrap_or(tokens.len()));

    let mut ty = ty.to_vec();
    let names_param = ty.len() >= 2
        && matches!(ty.last(), Some(Token::Ident(w)) if !TYPE_WORDS.contains(&w.as_str()))
        && !matches!(ty[ty.len() - 2], Token::Scope);
    if names_param {
        ty.pop();
    }
    ty.extend_from_slice(suffix);
    join_tokens(&ty)
}

fn join_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut prev: Option<&Token> = None;
    for tok in tokens {
        if let Some(p) = prev {
            let space = (p.is_word() && tok.is_word())
                || ((p.is_punct('*') || p.is_punct('&')) && tok.is_word())
                || p.is_punct(',');
            if space {
                out.push(' ');
            }
        }
        out.push_str(&tok.text());
        prev = Some(tok);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::plan::{BuildAction, CompilerFlavor};
    use crate::core::document::Document;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    const ENCODER_H: &str = r#"
#pragma once
#include <cstdint>
#include "Counter.h"
#define ENCODER_MAX \
    42

// class Commented { void nope(); };
namespace frc {

/* enum Hidden { A }; */
enum class EncodingType : uint8_t { k1X, k2X = 2, k4X };

class Counter;

class WPILIB_DLLEXPORT Encoder : public Sendable, private Base<int, 2> {
 public:
  explicit Encoder(int channel, bool reverse = false);
  Encoder(int a, int b, EncodingType type = EncodingType::k4X);
  ~Encoder() override;
  Encoder(const Encoder&) = delete;
  Encoder& operator=(const Encoder&) = delete;

  [[nodiscard]] int Get() const;
  double GetRate() const { return m_rate / 2.0; }
  void SetDistancePerPulse(double distancePerPulse);
  template <typename T> T As() const;
  static constexpr int kMaxChannels = 10;
  const char* label = "enc";
  std::function<void(int)> callback;

  enum IndexingType { kResetWhileHigh, kResetOnRisingEdge };

  struct Config {
    int samples;
    double period, scale;
  };

 protected:
  void InitEncoder(bool reverse);

 private:
  double m_rate{0.0};
  struct Impl;
};

int Clamp(int value, int low, int high);
double Clamp(double value, double low, double high);
void Reset(void);
bool operator==(const Encoder& a, const Encoder& b);

namespace {
void HiddenHelper();
}

namespace detail::impl {
struct Helper { int x; };
}

}  // namespace frc

extern "C" {
int HAL_GetEncoder(int32_t handle, int32_t* status);
}

void frc::Encoder::Reset() {}
"#;

    fn report() -> SignatureReport {
        let (report, problem) = scan(ENCODER_H);
        assert_eq!(problem, None);
        report
    }

    #[test]
    fn test_namespace_level_declarations() {
        let report = report();

        assert_eq!(
            report.enums.iter().collect::<Vec<_>>(),
            ["EncodingType"]
        );
        assert!(report.functions.contains_key("Reset"));
        assert!(report.functions.contains_key("HAL_GetEncoder"));
        assert!(!report.functions.contains_key("HiddenHelper"));
        assert!(!report.functions.contains_key("operator"));
        assert_eq!(
            report.functions["Clamp"].overloads,
            BTreeSet::from([
                "double, double, double".to_string(),
                "int, int, int".to_string()
            ])
        );
        assert!(report.functions["Reset"].overloads.is_empty());
    }

    #[test]
    fn test_classes_are_fully_qualified() {
        let report = report();
        let names: Vec<_> = report.classes.keys().map(String::as_str).collect();
        assert_eq!(
            names,
            ["frc::Encoder", "frc::Encoder::Config", "frc::detail::impl::Helper"]
        );
        assert_eq!(
            report.classes["frc::Encoder::Config"].attributes,
            BTreeSet::from(["period".to_string(), "samples".to_string(), "scale".to_string()])
        );
    }

    #[test]
    fn test_class_members() {
        let report = report();
        let encoder = &report.classes["frc::Encoder"];

        let methods: Vec<_> = encoder.methods.keys().map(String::as_str).collect();
        assert_eq!(methods, ["Encoder", "Get", "GetRate", "SetDistancePerPulse"]);
        assert_eq!(
            encoder.methods["Encoder"].overloads,
            BTreeSet::from([
                "int, bool".to_string(),
                "int, int, EncodingType".to_string()
            ])
        );
        assert_eq!(
            encoder.attributes,
            BTreeSet::from([
                "callback".to_string(),
                "kMaxChannels".to_string(),
                "label".to_string()
            ])
        );
        assert_eq!(encoder.enums, BTreeSet::from(["IndexingType".to_string()]));
    }

    #[test]
    fn test_normalize_params() {
        let params = |src: &str| normalize_params(&tokenize(src));
        assert_eq!(params("void"), "");
        assert_eq!(params(""), "");
        assert_eq!(params("const std::string& name, int count = 3"), "const std::string&, int");
        assert_eq!(params("std::map<int, double> m, unsigned int"), "std::map<int, double>, unsigned int");
        assert_eq!(params("const char* const p, int values[4]"), "const char* const, int[4]");
        assert_eq!(params("Foo"), "Foo");
    }

    #[test]
    fn test_strip_source() {
        let stripped = strip_source("int a = 1'000; // x\nconst char* s = \"a // b\";\n#if X\nint b;\n");
        assert!(stripped.contains("1'000"));
        assert!(stripped.contains("\"\""));
        assert!(!stripped.contains("a // b"));
        assert!(!stripped.contains("#if"));
        assert!(stripped.contains("int b;"));

        let stripped = strip_source(concat!(
            "#define TWO \\\n  2\n",
            "auto r = R\"x(a \" // b)x\";\n",
            "/* don't */ char c = '\\'';\n",
            "int after;\n",
        ));
        assert!(!stripped.contains("TWO"));
        assert!(!stripped.contains("2\n"));
        assert!(stripped.contains("auto r = \"\";"));
        assert!(stripped.contains("char c = '';"));
        assert!(!stripped.contains("don"));
        assert!(stripped.contains("int after;"));
    }

    #[test]
    fn test_tokenize() {
        let tokens = tokenize("std::size_t n = 1'000; s = \"\";");
        assert_eq!(
            tokens,
            [
                Token::Ident("std".into()),
                Token::Scope,
                Token::Ident("size_t".into()),
                Token::Ident("n".into()),
                Token::Punct('='),
                Token::Literal("1'000".into()),
                Token::Punct(';'),
                Token::Ident("s".into()),
                Token::Punct('='),
                Token::Literal("\"\"".into()),
                Token::Punct(';'),
            ]
        );
    }

    #[test]
    fn test_unbalanced_braces() {
        let (report, problem) = scan("namespace a {\nclass Foo {\n public:\n  void f();\n");
        assert!(problem.unwrap().contains("unbalanced"));
        assert!(report.classes["a::Foo"].methods.contains_key("f"));

        let (_, problem) = scan("void f();\n}\n");
        assert!(problem.is_some());
    }

    fn action(root: &Path, header: &Path) -> BuildAction {
        BuildAction {
            module: "pkg._ext".into(),
            name: "Encoder".into(),
            header: header.to_path_buf(),
            header_root: root.join("src/pkg"),
            include_paths: vec![root.join("src/pkg"), root.join("include")],
            defines: Vec::new(),
            compiler: CompilerFlavor::Gcc,
            descriptor: PathBuf::from("wrapcfg/pkg/_ext/Encoder.yml"),
            descriptor_exists: true,
            output: PathBuf::from("wrapcfg/pkg/_ext/Encoder.yml"),
            depfile: PathBuf::from("wrapcfg/pkg/_ext/Encoder.d"),
        }
    }

    #[test]
    fn test_extract_writes_depfile() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        std::fs::create_dir_all(root.join("src/pkg")).unwrap();
        std::fs::create_dir_all(root.join("include")).unwrap();
        std::fs::create_dir_all(root.join("wrapcfg/pkg/_ext")).unwrap();
        let header = root.join("src/pkg/Encoder.h");
        std::fs::write(&header, ENCODER_H).unwrap();
        std::fs::write(root.join("include/Counter.h"), "class Counter {};\n").unwrap();
        std::fs::write(root.join("wrapcfg/pkg/_ext/Encoder.yml"), "---\n").unwrap();

        let action = action(root, &header);
        let descriptor = Document::parse("Encoder.yml", "classes:\n  frc::Encoder:\n").unwrap();
        let depfile = root.join("scratch/wrapcfg/pkg/_ext/Encoder.d");
        let request = ExtractRequest {
            action: &action,
            descriptor: &descriptor,
            depfile: depfile.clone(),
            bootstrap: false,
            project_root: root,
        };

        let sig = HeaderScanner::new().extract(&request).unwrap();
        assert!(sig.missing.classes["frc::Encoder"].methods.contains_key("Get"));
        assert!(sig.missing.enums.contains("EncodingType"));

        let text = std::fs::read_to_string(&depfile).unwrap();
        assert!(text.starts_with("wrapcfg/pkg/_ext/Encoder.yml:"));
        assert!(text.contains(&header.display().to_string()));
        assert!(text.contains(&root.join("include/Counter.h").display().to_string()));
        assert!(!text.contains("cstdint"));
        let descriptor_path = root.join("wrapcfg/pkg/_ext/Encoder.yml");
        assert!(text.trim_end().ends_with(&descriptor_path.display().to_string()));
    }

    #[test]
    fn test_parse_problem_fails_unless_bootstrap() {
        let tmp = TempDir::new().unwrap();
        let header = tmp.path().join("Broken.h");
        std::fs::write(&header, "class Broken {\n public:\n  void f();\n").unwrap();

        let action = action(tmp.path(), &header);
        let descriptor = Document::new("Broken.yml");
        let mut request = ExtractRequest {
            action: &action,
            descriptor: &descriptor,
            depfile: tmp.path().join("a.d"),
            bootstrap: false,
            project_root: tmp.path(),
        };
        let err = HeaderScanner::new().extract(&request).unwrap_err();
        assert!(matches!(err, ExtractError::Parse { .. }));

        request.bootstrap = true;
        request.depfile = tmp.path().join("b.d");
        let sig = HeaderScanner::new().extract(&request).unwrap();
        assert!(sig.report.classes.contains_key("Broken"));
    }
}
