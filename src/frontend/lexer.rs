use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use strum::EnumString;

use crate::frontend::{Position, SourceFile};

/// The tokenizer is a plain cursor over the source text. Copying it is how
/// speculative parsing works: parse ahead on a copy, then either assign the
/// copy back (commit) or drop it (discard).
#[derive(Debug, Clone, Copy)]
pub struct Lexer<'source> {
    source: &'source SourceFile,
    position: usize,
    line: u32,
    line_start: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub position: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /* Words */
    Keyword(Keyword), // if
    Identifier,       // x

    /* Literals */
    Number, // 1
    String, // "hello, world"

    /* Delimiters */
    OpenParen,  // (
    CloseParen, // )
    OpenBrace,  // {
    CloseBrace, // }
    Semicolon,  // ;
    Comma,      // ,

    /* Operators */
    Equals,               // =
    DoubleEquals,         // ==
    NotEquals,            // !=
    LessThan,             // <
    LessThanOrEqualTo,    // <=
    GreaterThan,          // >
    GreaterThanOrEqualTo, // >=
    Plus,                 // +
    Minus,                // -
    Asterisk,             // *
    Divide,               // /
    Bang,                 // !

    /* Other */
    EndOfStream,
    /// A character that does not start any token
    Unknown,
    /// A string literal missing its closing quote
    UnterminatedString,
    /// Stand-in returned when a required token was missing
    Error,
}

impl TokenKind {
    pub fn is_comparison_operator(&self) -> bool {
        matches!(
            self,
            Self::DoubleEquals
                | Self::NotEquals
                | Self::LessThan
                | Self::LessThanOrEqualTo
                | Self::GreaterThan
                | Self::GreaterThanOrEqualTo
        )
    }

    pub fn is_term_operator(&self) -> bool {
        matches!(self, Self::Plus | Self::Minus)
    }

    pub fn is_factor_operator(&self) -> bool {
        matches!(self, Self::Asterisk | Self::Divide)
    }

    pub fn is_unary_operator(&self) -> bool {
        matches!(self, Self::Bang | Self::Minus)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Keyword {
    If,
    Else,
    Print,
}

/// Table of single char tokens (matched after longer sequences are checked for)
static SINGLE_TOKENS: Lazy<BTreeMap<char, TokenKind>> = Lazy::new(|| {
    BTreeMap::from([
        ('(', TokenKind::OpenParen),
        (')', TokenKind::CloseParen),
        ('{', TokenKind::OpenBrace),
        ('}', TokenKind::CloseBrace),
        (';', TokenKind::Semicolon),
        (',', TokenKind::Comma),
        ('!', TokenKind::Bang),
        ('*', TokenKind::Asterisk),
        ('-', TokenKind::Minus),
        ('=', TokenKind::Equals),
        ('+', TokenKind::Plus),
        ('/', TokenKind::Divide),
        ('<', TokenKind::LessThan),
        ('>', TokenKind::GreaterThan),
    ])
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source SourceFile) -> Self {
        Self {
            source,
            position: 0,
            line: 1,
            line_start: 0,
        }
    }

    pub fn source(&self) -> &'source SourceFile {
        self.source
    }

    /// Whether anything other than whitespace and comments is left
    pub fn has_more(&self) -> bool {
        self.peek().kind != TokenKind::EndOfStream
    }

    pub fn current_position(&self) -> Position {
        Position {
            line: self.line,
            column: (self.position - self.line_start + 1) as _,
        }
    }

    fn peek_char(&self, n: usize) -> Option<char> {
        self.source.contents[self.position..].chars().nth(n)
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek_char(0) {
            self.position += c.len_utf8();

            if c == '\n' {
                self.line += 1;
                self.line_start = self.position;
            }
        }
    }

    fn ignore_whitespace_and_comments(&mut self) {
        while let Some(c) = self.peek_char(0) {
            if c.is_whitespace() {
                self.bump();
            } else if c == '/' && self.peek_char(1) == Some('/') {
                while self.peek_char(0).is_some_and(|c| c != '\n') {
                    self.bump();
                }
            } else {
                break;
            }
        }
    }

    fn token_from(&self, start: usize, position: Position, kind: TokenKind) -> Token {
        Token {
            kind,
            span: Span::new(start, self.position),
            position,
        }
    }

    fn read_while(&mut self, predicate: impl Fn(char) -> bool) {
        while self.peek_char(0).is_some_and(&predicate) {
            self.bump();
        }
    }

    pub fn peek(&self) -> Token {
        let mut ahead = *self;
        ahead.next()
    }

    pub fn next(&mut self) -> Token {
        self.ignore_whitespace_and_comments();

        let start = self.position;
        let position = self.current_position();

        let Some(c) = self.peek_char(0) else {
            return self.token_from(start, position, TokenKind::EndOfStream);
        };

        let kind = match c {
            // Identifiers and keywords
            a if a.is_ascii_alphabetic() || a == '_' => {
                self.read_while(|c| c.is_ascii_alphanumeric() || c == '_');

                match self.source.contents[start..self.position].parse() {
                    Ok(keyword) => TokenKind::Keyword(keyword),
                    Err(_) => TokenKind::Identifier,
                }
            }

            // Integer literals
            n if n.is_ascii_digit() => {
                self.read_while(|c| c.is_ascii_digit());
                TokenKind::Number
            }

            // String literals
            '"' => {
                self.bump();

                loop {
                    match self.peek_char(0) {
                        None | Some('\n') => break TokenKind::UnterminatedString,
                        Some('\\') => {
                            self.bump();
                            self.bump();
                        }
                        Some('"') => {
                            self.bump();
                            break TokenKind::String;
                        }
                        Some(_) => self.bump(),
                    }
                }
            }

            '=' if self.peek_char(1) == Some('=') => self.read_double(TokenKind::DoubleEquals),
            '!' if self.peek_char(1) == Some('=') => self.read_double(TokenKind::NotEquals),
            '<' if self.peek_char(1) == Some('=') => {
                self.read_double(TokenKind::LessThanOrEqualTo)
            }
            '>' if self.peek_char(1) == Some('=') => {
                self.read_double(TokenKind::GreaterThanOrEqualTo)
            }

            s if SINGLE_TOKENS.contains_key(&s) => {
                self.bump();
                SINGLE_TOKENS[&s]
            }

            _ => {
                self.bump();
                TokenKind::Unknown
            }
        };

        self.token_from(start, position, kind)
    }

    fn read_double(&mut self, kind: TokenKind) -> TokenKind {
        self.bump();
        self.bump();
        kind
    }
}
