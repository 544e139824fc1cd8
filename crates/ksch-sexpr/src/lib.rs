//! An S-expression parser that preserves the exact format of atoms and
//! tracks the source span of every node.
//!
//! Parsed trees keep enough provenance to reproduce their input byte-for-byte:
//! each [`Sexpr`] records the `[start, end)` byte range it occupied in the
//! source text, and numeric atoms keep their original lexeme so `12.000000`
//! never collapses to `12` on re-emission. Constructed nodes carry a synthetic
//! span and are rendered through the canonical formatter instead.
//!
//! - [`parse`] / [`parse_document`] - text to tree
//! - [`formatter`] - canonical (KiCad-style) rendering of dirty subtrees
//! - [`emitter`] - format-preserving document emission

pub mod emitter;
pub mod formatter;

use std::fmt;

/// Find a direct child list `(name ...)` within a list of [`Sexpr`] nodes.
pub fn find_child_list<'a>(items: &'a [Sexpr], name: &str) -> Option<&'a [Sexpr]> {
    for item in items {
        if let Some(list_items) = item.as_list() {
            if list_items.first().and_then(Sexpr::as_sym) == Some(name) {
                return Some(list_items);
            }
        }
    }
    None
}

/// Find all direct child lists `(name ...)` within a list of [`Sexpr`] nodes.
pub fn find_all_child_lists<'a>(items: &'a [Sexpr], name: &str) -> Vec<&'a [Sexpr]> {
    let mut result = Vec::new();
    for item in items {
        if let Some(list_items) = item.as_list() {
            if list_items.first().and_then(Sexpr::as_sym) == Some(name) {
                result.push(list_items);
            }
        }
    }
    result
}

/// Coerce a number atom into f64.
///
/// KiCad S-exprs sometimes encode whole numbers as ints and sometimes as floats.
pub fn number_as_f64(node: &Sexpr) -> Option<f64> {
    node.as_float().or_else(|| node.as_int().map(|v| v as f64))
}

/// Byte span in source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
}

impl Span {
    /// Create a new span
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Create an empty/synthetic span (for constructed nodes)
    pub fn synthetic() -> Self {
        Self { start: 0, end: 0 }
    }

    /// Check if this is a synthetic (non-parsed) span
    pub fn is_synthetic(&self) -> bool {
        self.start == 0 && self.end == 0
    }

    /// Get the length of the span
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Check if span is empty
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// The kind of S-expression value
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SexprKind {
    /// A symbol - unquoted identifier
    Symbol(String),
    /// A string - quoted text
    String(String),
    /// An integer value
    Int(i64),
    /// A floating-point value
    F64(f64),
    /// A list of S-expressions
    List(Vec<Sexpr>),
}

/// An S-expression value with source span and provenance.
///
/// `raw_atom` holds the exact numeric lexeme as it appeared in the source so
/// canonical re-rendering of an untouched number reproduces the original
/// digits. `dirty` marks a node whose value no longer matches its span; the
/// emitter regenerates dirty (and synthetic) subtrees and replays everything
/// else verbatim.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sexpr {
    /// The kind of S-expression
    pub kind: SexprKind,
    /// Source span (byte offsets)
    pub span: Span,
    /// Original lexeme for numeric atoms parsed from source
    pub raw_atom: Option<String>,
    /// Modified since parse; forces canonical re-rendering on emit
    pub dirty: bool,
}

impl PartialEq for Sexpr {
    fn eq(&self, other: &Self) -> bool {
        // Compare only the kind, not the span or provenance
        self.kind == other.kind
    }
}

impl Sexpr {
    /// Create a new Sexpr with a span
    pub fn with_span(kind: SexprKind, span: Span) -> Self {
        Self {
            kind,
            span,
            raw_atom: None,
            dirty: false,
        }
    }

    /// Create a symbol (unquoted atom) with synthetic span
    pub fn symbol(s: impl Into<String>) -> Self {
        Self::with_span(SexprKind::Symbol(s.into()), Span::synthetic())
    }

    /// Create a string (quoted atom) with synthetic span
    pub fn string(s: impl Into<String>) -> Self {
        Self::with_span(SexprKind::String(s.into()), Span::synthetic())
    }

    /// Create an integer with synthetic span
    pub fn int(n: i64) -> Self {
        Self::with_span(SexprKind::Int(n), Span::synthetic())
    }

    /// Create a float with synthetic span
    pub fn float(f: f64) -> Self {
        Self::with_span(SexprKind::F64(f), Span::synthetic())
    }

    /// Create a list from a vector of S-expressions with synthetic span
    pub fn list(items: Vec<Sexpr>) -> Self {
        Self::with_span(SexprKind::List(items), Span::synthetic())
    }

    /// Check if this is a list
    pub fn is_list(&self) -> bool {
        matches!(self.kind, SexprKind::List(_))
    }

    /// Get the atom value if this is an atom (symbol or string)
    pub fn as_atom(&self) -> Option<&str> {
        match &self.kind {
            SexprKind::Symbol(s) | SexprKind::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the symbol name if this is a symbol
    pub fn as_sym(&self) -> Option<&str> {
        match &self.kind {
            SexprKind::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Get the string content if this is a string literal
    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            SexprKind::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the integer value if this is an integer
    pub fn as_int(&self) -> Option<i64> {
        match &self.kind {
            SexprKind::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Get the float value if this is a float
    pub fn as_float(&self) -> Option<f64> {
        match &self.kind {
            SexprKind::F64(f) => Some(*f),
            _ => None,
        }
    }

    /// Get the list items if this is a list
    pub fn as_list(&self) -> Option<&[Sexpr]> {
        match &self.kind {
            SexprKind::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get mutable access to list items if this is a list
    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Sexpr>> {
        match &mut self.kind {
            SexprKind::List(items) => Some(items),
            _ => None,
        }
    }

    /// Head tag of a list node: the leading symbol of `(tag ...)`.
    pub fn tag(&self) -> Option<&str> {
        self.as_list()?.first()?.as_sym()
    }

    /// Find a child list with the given name (first element)
    pub fn find_list(&self, name: &str) -> Option<&[Sexpr]> {
        find_child_list(self.as_list()?, name)
    }

    /// Find all child lists with the given name
    pub fn find_all_lists(&self, name: &str) -> Vec<&[Sexpr]> {
        self.as_list()
            .map(|items| find_all_child_lists(items, name))
            .unwrap_or_default()
    }

    /// Mark this node (and therefore its whole subtree, for emission purposes)
    /// as modified since parse.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// True if this node must be re-rendered rather than replayed verbatim.
    pub fn needs_render(&self) -> bool {
        self.dirty || self.span.is_synthetic()
    }
}

/// Create a key-value pair list
pub fn kv<K: Into<String>, V: Into<Sexpr>>(k: K, v: V) -> Sexpr {
    Sexpr::list(vec![Sexpr::symbol(k), v.into()])
}

/// A builder for constructing lists incrementally
#[derive(Debug)]
pub struct ListBuilder {
    items: Vec<Sexpr>,
}

impl Default for ListBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ListBuilder {
    /// Create a new builder with a node name
    pub fn node<N: Into<Sexpr>>(name: N) -> Self {
        Self {
            items: vec![name.into()],
        }
    }

    /// Create an empty builder
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Push a value to the list
    pub fn push<V: Into<Sexpr>>(&mut self, v: V) -> &mut Self {
        self.items.push(v.into());
        self
    }

    /// Conditionally push a value to the list
    pub fn push_if<V: Into<Sexpr>>(&mut self, cond: bool, v: V) -> &mut Self {
        if cond {
            self.items.push(v.into());
        }
        self
    }

    /// Push an optional value to the list
    pub fn push_opt<V: Into<Sexpr>>(&mut self, v: Option<V>) -> &mut Self {
        if let Some(v) = v {
            self.items.push(v.into());
        }
        self
    }

    /// Extend the list with an iterator of values
    pub fn extend<I, V>(&mut self, iter: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Sexpr>,
    {
        self.items.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Build the final list
    pub fn build(self) -> Sexpr {
        Sexpr::list(self.items)
    }
}

/// From implementations for automatic conversion
impl From<&str> for Sexpr {
    fn from(s: &str) -> Self {
        Self::symbol(s)
    }
}

impl From<String> for Sexpr {
    fn from(s: String) -> Self {
        Self::symbol(s)
    }
}

impl From<i64> for Sexpr {
    fn from(n: i64) -> Self {
        Sexpr::int(n)
    }
}

impl From<u32> for Sexpr {
    fn from(n: u32) -> Self {
        Sexpr::int(n as i64)
    }
}

impl From<f64> for Sexpr {
    fn from(n: f64) -> Self {
        Sexpr::float(n)
    }
}

impl From<bool> for Sexpr {
    fn from(b: bool) -> Self {
        Self::symbol(if b { "yes" } else { "no" })
    }
}

/// Line/column position in source text (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Errors that can occur during parsing.
///
/// Parsing is all-or-nothing: any error aborts the parse and no partial tree
/// is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Input ended in the middle of an expression
    UnexpectedEof { at: Location },
    /// A `(` was never matched by a `)`
    UnclosedList { opened_at: Location },
    /// A `"` was never matched by a closing `"`
    UnterminatedString { started_at: Location },
    /// A `)` with no matching `(`, or other stray token
    UnexpectedToken { at: Location, token: String },
    /// Content after the closing paren of a document root
    TrailingContent { at: Location, token: String },
}

impl ParseError {
    /// Location the error was detected at.
    pub fn location(&self) -> Location {
        match self {
            ParseError::UnexpectedEof { at } => *at,
            ParseError::UnclosedList { opened_at } => *opened_at,
            ParseError::UnterminatedString { started_at } => *started_at,
            ParseError::UnexpectedToken { at, .. } => *at,
            ParseError::TrailingContent { at, .. } => *at,
        }
    }

    /// The offending token, when one was read.
    pub fn token(&self) -> Option<&str> {
        match self {
            ParseError::UnexpectedToken { token, .. }
            | ParseError::TrailingContent { token, .. } => Some(token),
            _ => None,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnexpectedEof { at } => {
                write!(f, "unexpected end of input at {at}")
            }
            ParseError::UnclosedList { opened_at } => {
                write!(f, "unclosed list opened at {opened_at}")
            }
            ParseError::UnterminatedString { started_at } => {
                write!(f, "unterminated string started at {started_at}")
            }
            ParseError::UnexpectedToken { at, token } => {
                write!(f, "unexpected token '{token}' at {at}")
            }
            ParseError::TrailingContent { at, token } => {
                write!(f, "trailing content '{token}' after document root at {at}")
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Parser for S-expressions
pub struct Parser<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    current_pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Parser<'a> {
    /// Create a new parser for the given input
    pub fn new(input: &'a str) -> Self {
        Parser {
            input,
            chars: input.char_indices().peekable(),
            current_pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn location(&self) -> Location {
        Location {
            line: self.line,
            column: self.column,
        }
    }

    /// Parse a single expression from the input
    pub fn parse(&mut self) -> Result<Sexpr, ParseError> {
        self.skip_trivia();
        if self.is_at_end() {
            return Err(ParseError::UnexpectedEof {
                at: self.location(),
            });
        }

        if self.peek_char() == Some('(') {
            self.parse_list()
        } else {
            self.parse_atom()
        }
    }

    /// Parse multiple S-expressions from the input
    pub fn parse_all(&mut self) -> Result<Vec<Sexpr>, ParseError> {
        let mut results = Vec::new();

        loop {
            self.skip_trivia();
            if self.is_at_end() {
                break;
            }
            results.push(self.parse()?);
        }

        Ok(results)
    }

    /// Parse exactly one expression and reject anything after it.
    pub fn parse_document(&mut self) -> Result<Sexpr, ParseError> {
        let root = self.parse()?;
        self.skip_trivia();
        if !self.is_at_end() {
            let at = self.location();
            let token = self.read_raw_token();
            return Err(ParseError::TrailingContent { at, token });
        }
        Ok(root)
    }

    fn parse_list(&mut self) -> Result<Sexpr, ParseError> {
        let start_pos = self.current_pos;
        let opened_at = self.location();
        self.advance(); // consume '('
        let mut items = Vec::new();
        let mut item_count = 0usize;

        loop {
            self.skip_trivia();

            if self.is_at_end() {
                return Err(ParseError::UnclosedList { opened_at });
            }

            if self.peek_char() == Some(')') {
                self.advance();
                break;
            }

            items.push(self.parse()?);
            item_count += 1;

            if item_count % 1000 == 0 {
                log::trace!("parsed {item_count} items in list at byte {start_pos}");
            }
        }

        let end_pos = self.current_pos;
        Ok(Sexpr::with_span(
            SexprKind::List(items),
            Span::new(start_pos, end_pos),
        ))
    }

    fn parse_atom(&mut self) -> Result<Sexpr, ParseError> {
        if self.peek_char() == Some('"') {
            return self.parse_string();
        }
        if self.peek_char() == Some(')') {
            let at = self.location();
            self.advance();
            return Err(ParseError::UnexpectedToken {
                at,
                token: ")".to_string(),
            });
        }

        let start = self.current_pos;
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() || ch == '(' || ch == ')' {
                break;
            }
            self.advance();
        }

        let end = self.current_pos;
        let lexeme = &self.input[start..end];
        let span = Span::new(start, end);

        // Numbers first; anything else is a symbol. The raw lexeme is kept so
        // an untouched `0.000000` re-renders with its original digits.
        let mut node = if let Ok(int_val) = lexeme.parse::<i64>() {
            Sexpr::with_span(SexprKind::Int(int_val), span)
        } else if let Ok(float_val) = lexeme.parse::<f64>() {
            Sexpr::with_span(SexprKind::F64(float_val), span)
        } else {
            return Ok(Sexpr::with_span(
                SexprKind::Symbol(lexeme.to_string()),
                span,
            ));
        };
        node.raw_atom = Some(lexeme.to_string());
        Ok(node)
    }

    fn parse_string(&mut self) -> Result<Sexpr, ParseError> {
        let start_pos = self.current_pos;
        let started_at = self.location();
        self.advance(); // consume '"'
        let mut result = String::new();

        loop {
            match self.peek_char() {
                None => return Err(ParseError::UnterminatedString { started_at }),
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.peek_char() {
                        Some('n') => {
                            result.push('\n');
                            self.advance();
                        }
                        Some('r') => {
                            result.push('\r');
                            self.advance();
                        }
                        Some('t') => {
                            result.push('\t');
                            self.advance();
                        }
                        Some('\\') => {
                            result.push('\\');
                            self.advance();
                        }
                        Some('"') => {
                            result.push('"');
                            self.advance();
                        }
                        Some(ch) => {
                            result.push(ch);
                            self.advance();
                        }
                        None => return Err(ParseError::UnterminatedString { started_at }),
                    }
                }
                Some(ch) => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        let end_pos = self.current_pos;
        Ok(Sexpr::with_span(
            SexprKind::String(result),
            Span::new(start_pos, end_pos),
        ))
    }

    fn skip_trivia(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.advance();
            } else if ch == ';' {
                // Comment until end of line
                self.advance();
                while let Some(ch) = self.peek_char() {
                    self.advance();
                    if ch == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn read_raw_token(&mut self) -> String {
        let start = self.current_pos;
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                break;
            }
            self.advance();
        }
        self.input[start..self.current_pos].to_string()
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn advance(&mut self) {
        if let Some((pos, ch)) = self.chars.next() {
            self.current_pos = pos + ch.len_utf8();
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn is_at_end(&mut self) -> bool {
        self.chars.peek().is_none()
    }
}

/// Parse a string into an S-expression
pub fn parse(input: &str) -> Result<Sexpr, ParseError> {
    log::trace!("parsing S-expression from {} bytes of input", input.len());
    Parser::new(input).parse()
}

/// Parse a string into multiple S-expressions
pub fn parse_all(input: &str) -> Result<Vec<Sexpr>, ParseError> {
    Parser::new(input).parse_all()
}

/// Parse a complete document: exactly one top-level list, nothing after it.
pub fn parse_document(input: &str) -> Result<Sexpr, ParseError> {
    let result = Parser::new(input).parse_document();
    match &result {
        Ok(_) => log::trace!("parsed document of {} bytes", input.len()),
        Err(e) => log::debug!("document parse failed: {e}"),
    }
    result
}

impl fmt::Display for Sexpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = formatter::format_node(self, 0, formatter::FormatRules::kicad_default());
        write!(f, "{}", formatted.trim_end_matches('\n'))
    }
}
