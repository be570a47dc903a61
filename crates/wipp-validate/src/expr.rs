//! Syntax checking for attribute-mapping and attribute-condition expressions.
//!
//! Expressions are written in a subset of CEL and are only ever evaluated by
//! the backend during token exchange. Here they are parsed far enough to
//! reject malformed input and free identifiers outside the three namespaces
//! the backend exposes; no AST is kept.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("at offset {offset}: {message}")]
pub struct ExprError {
    /// Byte offset into the expression.
    pub offset: usize,
    pub message: String,
}

impl ExprError {
    fn new(offset: usize, message: impl Into<String>) -> Self {
        Self { offset, message: message.into() }
    }
}

/// Identifiers an expression may start from.
pub const ROOT_IDENTIFIERS: &[&str] = &["assertion", "google", "attribute"];

const GLOBAL_FUNCTIONS: &[&str] = &[
    "size", "int", "uint", "double", "string", "bytes", "bool", "has", "matches", "dyn", "type",
    "timestamp", "duration",
];

/// Methods whose first argument binds a variable for the remaining arguments.
const COMPREHENSION_MACROS: &[&str] = &["all", "exists", "exists_one", "map", "filter"];

const MAX_NESTING: usize = 64;

/// Check that `src` is a well-formed expression.
pub fn validate_expression(src: &str) -> Result<(), ExprError> {
    if src.trim().is_empty() {
        return Err(ExprError::new(0, "expression is empty"));
    }
    let tokens = tokenize(src)?;
    let mut parser = Parser { tokens: &tokens, pos: 0, scope: Vec::new(), depth: 0 };
    parser.expr()?;
    match parser.peek() {
        Tok::Eof => Ok(()),
        other => Err(ExprError::new(
            parser.offset(),
            format!("unexpected {} after end of expression", describe(other)),
        )),
    }
}

// ── Lexer ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Literal,
    Op(&'static str),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Question,
    Dot,
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    offset: usize,
}

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Ident(name) => format!("identifier '{}'", name),
        Tok::Literal => "literal".to_string(),
        Tok::Op(op) => format!("'{}'", op),
        Tok::LParen => "'('".to_string(),
        Tok::RParen => "')'".to_string(),
        Tok::LBracket => "'['".to_string(),
        Tok::RBracket => "']'".to_string(),
        Tok::LBrace => "'{'".to_string(),
        Tok::RBrace => "'}'".to_string(),
        Tok::Comma => "','".to_string(),
        Tok::Colon => "':'".to_string(),
        Tok::Question => "'?'".to_string(),
        Tok::Dot => "'.'".to_string(),
        Tok::Eof => "end of expression".to_string(),
    }
}

const TWO_CHAR_OPS: &[&str] = &["==", "!=", "<=", ">=", "&&", "||"];

fn tokenize(src: &str) -> Result<Vec<Token>, ExprError> {
    let bytes = src.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        // Line comment
        if c == b'/' && bytes.get(i + 1) == Some(&b'/') {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }

        // Prefixed string literals: r"..", R"..", b"..", B"..", rb"..", br".."
        if let Some((prefix_len, raw)) = string_prefix(&bytes[i..]) {
            i = lex_string(bytes, i + prefix_len, raw, start)?;
            out.push(Token { tok: Tok::Literal, offset: start });
            continue;
        }

        if c == b'"' || c == b'\'' {
            i = lex_string(bytes, i, false, start)?;
            out.push(Token { tok: Tok::Literal, offset: start });
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let tok = match &src[start..i] {
                "in" => Tok::Op("in"),
                "true" | "false" | "null" => Tok::Literal,
                word => Tok::Ident(word.to_string()),
            };
            out.push(Token { tok, offset: start });
            continue;
        }

        if c.is_ascii_digit() {
            i = lex_number(bytes, i);
            out.push(Token { tok: Tok::Literal, offset: start });
            continue;
        }

        if let Some(op) = TWO_CHAR_OPS
            .iter()
            .find(|op| bytes[i..].starts_with(op.as_bytes()))
        {
            out.push(Token { tok: Tok::Op(*op), offset: start });
            i += 2;
            continue;
        }

        let tok = match c {
            b'<' => Tok::Op("<"),
            b'>' => Tok::Op(">"),
            b'+' => Tok::Op("+"),
            b'-' => Tok::Op("-"),
            b'*' => Tok::Op("*"),
            b'/' => Tok::Op("/"),
            b'%' => Tok::Op("%"),
            b'!' => Tok::Op("!"),
            b'(' => Tok::LParen,
            b')' => Tok::RParen,
            b'[' => Tok::LBracket,
            b']' => Tok::RBracket,
            b'{' => Tok::LBrace,
            b'}' => Tok::RBrace,
            b',' => Tok::Comma,
            b':' => Tok::Colon,
            b'?' => Tok::Question,
            b'.' => Tok::Dot,
            b'=' => {
                return Err(ExprError::new(start, "unexpected '=' (did you mean '==')"));
            }
            _ => {
                let ch = src[start..].chars().next().unwrap_or('?');
                return Err(ExprError::new(start, format!("unexpected character '{}'", ch)));
            }
        };
        out.push(Token { tok, offset: start });
        i += 1;
    }

    out.push(Token { tok: Tok::Eof, offset: bytes.len() });
    Ok(out)
}

/// Length of a string-literal prefix at the start of `rest` and whether it
/// makes the literal raw.
fn string_prefix(rest: &[u8]) -> Option<(usize, bool)> {
    let is_quote = |b: Option<&u8>| matches!(b, Some(b'"') | Some(b'\''));
    let lower: Vec<u8> = rest.iter().take(2).map(|b| b.to_ascii_lowercase()).collect();
    match lower.as_slice() {
        [b'r', b'b', ..] | [b'b', b'r', ..] if is_quote(rest.get(2)) => Some((2, true)),
        [b'r', ..] if is_quote(rest.get(1)) => Some((1, true)),
        [b'b', ..] if is_quote(rest.get(1)) => Some((1, false)),
        _ => None,
    }
}

/// Scan a string literal whose opening quote is at `q`. Returns the index
/// just past the closing quote.
fn lex_string(bytes: &[u8], q: usize, raw: bool, start: usize) -> Result<usize, ExprError> {
    let quote = bytes[q];
    let triple = bytes.len() >= q + 3 && bytes[q + 1] == quote && bytes[q + 2] == quote;
    let mut i = if triple { q + 3 } else { q + 1 };

    loop {
        let Some(&c) = bytes.get(i) else {
            return Err(ExprError::new(start, "unterminated string literal"));
        };
        if !raw && c == b'\\' {
            if i + 1 >= bytes.len() {
                return Err(ExprError::new(start, "unterminated string literal"));
            }
            i += 2;
            continue;
        }
        if triple {
            if bytes[i..].starts_with(&[quote, quote, quote]) {
                return Ok(i + 3);
            }
        } else {
            if c == quote {
                return Ok(i + 1);
            }
            if c == b'\n' {
                return Err(ExprError::new(
                    start,
                    "unterminated string literal (newline before closing quote)",
                ));
            }
        }
        i += 1;
    }
}

fn lex_number(bytes: &[u8], mut i: usize) -> usize {
    if bytes[i] == b'0' && matches!(bytes.get(i + 1), Some(b'x') | Some(b'X')) {
        i += 2;
        while i < bytes.len() && bytes[i].is_ascii_hexdigit() {
            i += 1;
        }
    } else {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if bytes.get(i) == Some(&b'.') && bytes.get(i + 1).is_some_and(|b| b.is_ascii_digit()) {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
        if matches!(bytes.get(i), Some(b'e') | Some(b'E')) {
            let mut j = i + 1;
            if matches!(bytes.get(j), Some(b'+') | Some(b'-')) {
                j += 1;
            }
            if bytes.get(j).is_some_and(|b| b.is_ascii_digit()) {
                i = j;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
            }
        }
    }
    if matches!(bytes.get(i), Some(b'u') | Some(b'U')) {
        i += 1;
    }
    i
}

// ── Parser ───────────────────────────────────────────────────────────────────

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    /// Variables bound by enclosing comprehension macros.
    scope: Vec<String>,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Tok {
        &self.tokens[self.pos].tok
    }

    fn peek_at(&self, ahead: usize) -> &Tok {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx].tok
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos].offset
    }

    fn bump(&mut self) {
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == tok {
            self.bump();
            true
        } else {
            false
        }
    }

    fn eat_op(&mut self, ops: &[&str]) -> bool {
        match self.peek() {
            Tok::Op(op) if ops.contains(op) => {
                self.bump();
                true
            }
            _ => false,
        }
    }

    /// Consume the closing token of a group opened at `open_offset`.
    fn close(&mut self, tok: Tok, open_offset: usize) -> Result<(), ExprError> {
        if self.eat(&tok) {
            return Ok(());
        }
        if *self.peek() == Tok::Eof {
            return Err(ExprError::new(
                open_offset,
                format!("unbalanced group: missing closing {}", describe(&tok)),
            ));
        }
        Err(ExprError::new(
            self.offset(),
            format!("expected {}, found {}", describe(&tok), describe(self.peek())),
        ))
    }

    fn expr(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(ExprError::new(self.offset(), "expression nests too deeply"));
        }

        self.or()?;
        if self.eat(&Tok::Question) {
            self.or()?;
            if !self.eat(&Tok::Colon) {
                return Err(ExprError::new(
                    self.offset(),
                    format!("expected ':' in conditional, found {}", describe(self.peek())),
                ));
            }
            self.expr()?;
        }

        self.depth -= 1;
        Ok(())
    }

    fn or(&mut self) -> Result<(), ExprError> {
        self.and()?;
        while self.eat_op(&["||"]) {
            self.and()?;
        }
        Ok(())
    }

    fn and(&mut self) -> Result<(), ExprError> {
        self.relation()?;
        while self.eat_op(&["&&"]) {
            self.relation()?;
        }
        Ok(())
    }

    fn relation(&mut self) -> Result<(), ExprError> {
        self.addition()?;
        while self.eat_op(&["==", "!=", "<", "<=", ">", ">=", "in"]) {
            self.addition()?;
        }
        Ok(())
    }

    fn addition(&mut self) -> Result<(), ExprError> {
        self.multiplication()?;
        while self.eat_op(&["+", "-"]) {
            self.multiplication()?;
        }
        Ok(())
    }

    fn multiplication(&mut self) -> Result<(), ExprError> {
        self.unary()?;
        while self.eat_op(&["*", "/", "%"]) {
            self.unary()?;
        }
        Ok(())
    }

    fn unary(&mut self) -> Result<(), ExprError> {
        if self.eat_op(&["!"]) {
            while self.eat_op(&["!"]) {}
        } else if self.eat_op(&["-"]) {
            while self.eat_op(&["-"]) {}
        }
        self.member()
    }

    fn member(&mut self) -> Result<(), ExprError> {
        self.primary()?;
        loop {
            match self.peek() {
                Tok::Dot => {
                    self.bump();
                    let name = match self.peek() {
                        Tok::Ident(name) => name.clone(),
                        other => {
                            return Err(ExprError::new(
                                self.offset(),
                                format!("expected field name after '.', found {}", describe(other)),
                            ))
                        }
                    };
                    self.bump();
                    if *self.peek() == Tok::LParen {
                        if COMPREHENSION_MACROS.contains(&name.as_str()) {
                            self.macro_call(&name)?;
                        } else {
                            self.call_args()?;
                        }
                    }
                }
                Tok::LBracket => {
                    let open = self.offset();
                    self.bump();
                    self.expr()?;
                    self.close(Tok::RBracket, open)?;
                }
                _ => return Ok(()),
            }
        }
    }

    fn primary(&mut self) -> Result<(), ExprError> {
        let offset = self.offset();
        match self.peek().clone() {
            Tok::Ident(name) => {
                self.bump();
                if *self.peek() == Tok::LParen {
                    if !GLOBAL_FUNCTIONS.contains(&name.as_str()) {
                        return Err(ExprError::new(offset, format!("unknown function '{}'", name)));
                    }
                    return self.call_args();
                }
                if ROOT_IDENTIFIERS.contains(&name.as_str()) || self.scope.contains(&name) {
                    Ok(())
                } else {
                    Err(ExprError::new(
                        offset,
                        format!(
                            "unknown identifier '{}': expressions may only reference {}",
                            name,
                            ROOT_IDENTIFIERS.join(", ")
                        ),
                    ))
                }
            }
            Tok::Literal => {
                self.bump();
                Ok(())
            }
            Tok::LParen => {
                self.bump();
                self.expr()?;
                self.close(Tok::RParen, offset)
            }
            Tok::LBracket => {
                self.bump();
                self.list_items(Tok::RBracket, false)?;
                self.close(Tok::RBracket, offset)
            }
            Tok::LBrace => {
                self.bump();
                self.list_items(Tok::RBrace, true)?;
                self.close(Tok::RBrace, offset)
            }
            Tok::Eof => Err(ExprError::new(offset, "unexpected end of expression")),
            other => Err(ExprError::new(offset, format!("unexpected {}", describe(&other)))),
        }
    }

    /// Comma-separated items up to (not including) `end`; map entries when
    /// `entries` is set. A trailing comma is allowed.
    fn list_items(&mut self, end: Tok, entries: bool) -> Result<(), ExprError> {
        while *self.peek() != end && *self.peek() != Tok::Eof {
            self.expr()?;
            if entries {
                if !self.eat(&Tok::Colon) {
                    return Err(ExprError::new(
                        self.offset(),
                        format!("expected ':' in map literal, found {}", describe(self.peek())),
                    ));
                }
                self.expr()?;
            }
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        Ok(())
    }

    fn call_args(&mut self) -> Result<(), ExprError> {
        let open = self.offset();
        self.bump();
        self.list_items(Tok::RParen, false)?;
        self.close(Tok::RParen, open)
    }

    fn macro_call(&mut self, name: &str) -> Result<(), ExprError> {
        let open = self.offset();
        self.bump();
        let var = match (self.peek().clone(), self.peek_at(1)) {
            (Tok::Ident(var), Tok::Comma) => var,
            _ => {
                return Err(ExprError::new(
                    self.offset(),
                    format!("'{}' expects a variable name as its first argument", name),
                ))
            }
        };
        self.bump();
        self.bump();

        self.scope.push(var);
        let result = self.list_items(Tok::RParen, false);
        self.scope.pop();
        result?;
        self.close(Tok::RParen, open)
    }
}
