//! # Stone Lexer (Tokenizer)
//!
//! This module provides the `Lexer` for Stone spec files. The lexer is the
//! first stage of the compilation pipeline: it converts raw source text into
//! a sequence of [`Token`]s for the [`Parser`](crate::parser::Parser).
//!
//! ## Architectural Overview
//!
//! The `Lexer` is a hand-written, stateful scanner that walks the input
//! character by character. Unlike a free-form language, Stone has significant
//! indentation, so alongside the ordinary tokens the lexer synthesizes three
//! structural tokens from the layout of the source:
//!
//! - **NEWLINE** at the end of every line that carried content.
//! - **INDENT** when a line starts at a column deeper than the enclosing one.
//! - **DEDENT** for every block closed by a line returning to a shallower
//!   column.
//!
//! A stack of indentation columns (seeded with column 0) drives the
//! synthesis. Blank lines and `#` comment lines never touch the stack, and
//! the contents of triple-quoted strings are opaque to it. A line whose
//! leading whitespace mixes tabs and spaces, or that dedents to a column no
//! enclosing block started at, is a lexical error.
//!
//! Each `Token` records its start and end byte positions in the source,
//! which downstream stages use for error reporting.
//!
//! ## Example
//!
//! ```rust
//! use stone_core::lexer::{Lexer, TokenKind};
//!
//! let source = "namespace files\n\nstruct File\n    name String\n";
//! let tokens = Lexer::new(source).lex().unwrap();
//! let kinds: Vec<TokenKind> = tokens.into_iter().map(|t| t.kind).collect();
//!
//! assert_eq!(
//!     kinds,
//!     vec![
//!         TokenKind::Namespace,
//!         TokenKind::Ident("files".to_string()),
//!         TokenKind::Newline,
//!         TokenKind::Struct,
//!         TokenKind::Ident("File".to_string()),
//!         TokenKind::Newline,
//!         TokenKind::Indent,
//!         TokenKind::Ident("name".to_string()),
//!         TokenKind::Ident("String".to_string()),
//!         TokenKind::Newline,
//!         TokenKind::Dedent,
//!         TokenKind::Eof,
//!     ]
//! );
//! ```

use crate::error::LexError;
use miette::NamedSource;
use std::sync::Arc;

/// The kinds of token the lexer can produce.
#[derive(Debug, PartialEq, Clone)]
pub enum TokenKind {
    // == Structural tokens ==
    /// End of input. Always the final token of a stream.
    Eof,
    /// End of a line that carried content.
    Newline,
    /// A line opened a block deeper than the enclosing one.
    Indent,
    /// A block closed; one `Dedent` is emitted per closed block.
    Dedent,

    // == Literals ==
    /// An identifier: names of namespaces, types, fields, tags, labels.
    Ident(String),
    /// An integer literal.
    Int(i64),
    /// A floating-point literal.
    Float(f64),
    /// A string literal, either `"single-line"` or `"""multi-line"""`.
    Str(String),

    // == Keywords ==
    Namespace,
    Import,
    Alias,
    Struct,
    Union,
    Route,
    Extends,
    Attrs,
    Example,
    True,
    False,
    Null,

    // == Punctuation ==
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `.`
    Dot,
    /// `=`
    Eq,
    /// `?` (nullable suffix)
    Question,
    /// `*` (catch-all marker)
    Star,
    /// `:`
    Colon,
}

/// A single lexical token with its byte span in the source.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    /// 0-based starting byte position in the source.
    pub pos_start: usize,
    /// 0-based ending byte position (exclusive).
    pub pos_end: usize,
}

impl Token {
    #[must_use]
    pub fn new(kind: TokenKind, pos_start: usize, pos_end: usize) -> Token {
        Token {
            kind,
            pos_start,
            pos_end,
        }
    }
}

/// An indentation-aware lexer for Stone spec files.
pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    position: usize,
    src: Arc<NamedSource<String>>,
    /// Stack of open indentation columns; the bottom entry is always 0.
    indents: Vec<usize>,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        Self::new_with_name(input, "spec.stone")
    }

    #[must_use]
    pub fn new_with_name(input: &'a str, name: impl AsRef<str>) -> Self {
        Self {
            chars: input.chars().peekable(),
            position: 0,
            src: Arc::new(NamedSource::new(name, input.to_string())),
            indents: vec![0],
        }
    }

    /// Tokenizes the entire input, up to and including the final
    /// [`TokenKind::Eof`].
    ///
    /// # Errors
    ///
    /// Returns a [`LexError`] for an illegal character, an unterminated
    /// string, or inconsistent indentation.
    pub fn lex(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            if !self.begin_line(&mut tokens)? {
                break;
            }
            self.scan_line(&mut tokens)?;
        }
        // Close every block still open at end of input.
        while self.indents.len() > 1 {
            self.indents.pop();
            tokens.push(Token::new(TokenKind::Dedent, self.position, self.position));
        }
        tokens.push(Token::new(TokenKind::Eof, self.position, self.position));
        Ok(tokens)
    }

    /// Consumes blank and comment-only lines, then measures the indentation
    /// of the next content line and emits INDENT/DEDENT tokens against the
    /// column stack. Returns `false` at end of input.
    fn begin_line(&mut self, tokens: &mut Vec<Token>) -> Result<bool, LexError> {
        loop {
            let line_start = self.position;
            let mut column = 0usize;
            let mut seen_space = false;
            let mut seen_tab = false;
            while let Some(c) = self.peek() {
                match c {
                    ' ' => seen_space = true,
                    '\t' => seen_tab = true,
                    _ => break,
                }
                self.advance();
                column += 1;
            }
            if seen_space && seen_tab {
                return Err(LexError::MixedIndentation {
                    src: (*self.src).clone(),
                    span: (line_start, self.position - line_start).into(),
                });
            }
            match self.peek() {
                None => return Ok(false),
                Some('\n') => {
                    self.advance();
                    continue;
                }
                Some('#') => {
                    self.skip_comment();
                    continue;
                }
                Some(_) => {
                    self.apply_indentation(column, tokens)?;
                    return Ok(true);
                }
            }
        }
    }

    fn apply_indentation(
        &mut self,
        column: usize,
        tokens: &mut Vec<Token>,
    ) -> Result<(), LexError> {
        let top = *self.indents.last().unwrap_or(&0);
        if column > top {
            self.indents.push(column);
            tokens.push(Token::new(TokenKind::Indent, self.position, self.position));
        } else if column < top {
            while *self.indents.last().unwrap_or(&0) > column {
                self.indents.pop();
                tokens.push(Token::new(TokenKind::Dedent, self.position, self.position));
            }
            if *self.indents.last().unwrap_or(&0) != column {
                return Err(LexError::IndentMismatch {
                    src: (*self.src).clone(),
                    span: (self.position.saturating_sub(column), column).into(),
                });
            }
        }
        Ok(())
    }

    /// Scans tokens until the end of the current line, emitting a trailing
    /// NEWLINE.
    fn scan_line(&mut self, tokens: &mut Vec<Token>) -> Result<(), LexError> {
        loop {
            let start = self.position;
            let c = match self.peek() {
                None => {
                    tokens.push(Token::new(TokenKind::Newline, start, start));
                    return Ok(());
                }
                Some(c) => *c,
            };
            match c {
                '\n' => {
                    self.advance();
                    tokens.push(Token::new(TokenKind::Newline, start, self.position));
                    return Ok(());
                }
                ' ' | '\t' => {
                    self.advance();
                }
                '#' => {
                    self.skip_comment();
                }
                '(' | ')' | ',' | '.' | '=' | '?' | '*' | ':' => {
                    self.advance();
                    let kind = match c {
                        '(' => TokenKind::LParen,
                        ')' => TokenKind::RParen,
                        ',' => TokenKind::Comma,
                        '.' => TokenKind::Dot,
                        '=' => TokenKind::Eq,
                        '?' => TokenKind::Question,
                        '*' => TokenKind::Star,
                        _ => TokenKind::Colon,
                    };
                    tokens.push(Token::new(kind, start, self.position));
                }
                '"' => {
                    let kind = self.read_string(start)?;
                    tokens.push(Token::new(kind, start, self.position));
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    let kind = self.read_identifier();
                    tokens.push(Token::new(kind, start, self.position));
                }
                c if c.is_ascii_digit() => {
                    let kind = self.read_number(start)?;
                    tokens.push(Token::new(kind, start, self.position));
                }
                '-' => {
                    self.advance();
                    if self.peek().is_some_and(char::is_ascii_digit) {
                        let kind = self.read_number(start)?;
                        tokens.push(Token::new(kind, start, self.position));
                    } else {
                        return Err(LexError::IllegalCharacter {
                            src: (*self.src).clone(),
                            span: (start, 1).into(),
                            character: '-',
                        });
                    }
                }
                other => {
                    return Err(LexError::IllegalCharacter {
                        src: (*self.src).clone(),
                        span: (start, other.len_utf8()).into(),
                        character: other,
                    });
                }
            }
        }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.chars.next();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    fn peek(&mut self) -> Option<&char> {
        self.chars.peek()
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek() {
            if *c == '\n' {
                break;
            }
            self.advance();
        }
    }

    /// Reads a string literal. The opening quote has not been consumed yet;
    /// `start` is its byte position. Dispatches between the single-line form
    /// and the triple-quoted multi-line form.
    fn read_string(&mut self, start: usize) -> Result<TokenKind, LexError> {
        self.advance(); // opening quote
        if self.peek() == Some(&'"') {
            self.advance();
            if self.peek() == Some(&'"') {
                self.advance();
                return self.read_multiline_string(start);
            }
            // An empty string: "".
            return Ok(TokenKind::Str(String::new()));
        }
        let mut value = String::new();
        loop {
            match self.peek() {
                Some('"') => {
                    self.advance();
                    return Ok(TokenKind::Str(value));
                }
                Some('\n') | None => {
                    return Err(LexError::UnterminatedString {
                        src: (*self.src).clone(),
                        span: (start, 1).into(),
                    });
                }
                Some('\\') => {
                    self.advance();
                    self.read_escape(&mut value, start)?;
                }
                Some(c) => {
                    value.push(*c);
                    self.advance();
                }
            }
        }
    }

    /// Reads the body of a `"""..."""` string. Newlines and indentation
    /// inside are preserved verbatim and do not touch the indentation stack.
    fn read_multiline_string(&mut self, start: usize) -> Result<TokenKind, LexError> {
        let mut value = String::new();
        loop {
            match self.advance() {
                None => {
                    return Err(LexError::UnterminatedString {
                        src: (*self.src).clone(),
                        span: (start, 3).into(),
                    });
                }
                Some('"') => {
                    if self.peek() == Some(&'"') {
                        self.advance();
                        if self.peek() == Some(&'"') {
                            self.advance();
                            return Ok(TokenKind::Str(value));
                        }
                        value.push('"');
                        value.push('"');
                    } else {
                        value.push('"');
                    }
                }
                Some('\\') => {
                    self.read_escape(&mut value, start)?;
                }
                Some(c) => value.push(c),
            }
        }
    }

    fn read_escape(&mut self, value: &mut String, start: usize) -> Result<(), LexError> {
        match self.advance() {
            Some('"') => value.push('"'),
            Some('\\') => value.push('\\'),
            Some('n') => value.push('\n'),
            Some('r') => value.push('\r'),
            Some('t') => value.push('\t'),
            Some(other) => {
                value.push('\\');
                value.push(other);
            }
            None => {
                return Err(LexError::UnterminatedString {
                    src: (*self.src).clone(),
                    span: (start, 1).into(),
                });
            }
        }
        Ok(())
    }

    fn read_identifier(&mut self) -> TokenKind {
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || *c == '_' {
                ident.push(*c);
                self.advance();
            } else {
                break;
            }
        }
        match ident.as_str() {
            "namespace" => TokenKind::Namespace,
            "import" => TokenKind::Import,
            "alias" => TokenKind::Alias,
            "struct" => TokenKind::Struct,
            "union" => TokenKind::Union,
            "route" => TokenKind::Route,
            "extends" => TokenKind::Extends,
            "attrs" => TokenKind::Attrs,
            "example" => TokenKind::Example,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            _ => TokenKind::Ident(ident),
        }
    }

    fn read_number(&mut self, start: usize) -> Result<TokenKind, LexError> {
        let mut text = String::new();
        if self.position > start {
            text.push('-');
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(*c);
                self.advance();
            } else if *c == '.' && !is_float {
                is_float = true;
                text.push('.');
                self.advance();
            } else if (*c == 'e' || *c == 'E') && !text.ends_with(['e', 'E']) {
                is_float = true;
                text.push(*c);
                self.advance();
                if let Some(sign) = self.peek() {
                    if *sign == '+' || *sign == '-' {
                        text.push(*sign);
                        self.advance();
                    }
                }
            } else {
                break;
            }
        }
        if !is_float {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(TokenKind::Int(n));
            }
        }
        match text.parse::<f64>() {
            Ok(n) => Ok(TokenKind::Float(n)),
            Err(_) => Err(LexError::IllegalCharacter {
                src: (*self.src).clone(),
                span: (start, self.position - start).into(),
                character: text.chars().last().unwrap_or('?'),
            }),
        }
    }
}
