//! Hand-rolled scanner producing spanned tokens.

use crate::ast::{Pos, Span};
use crate::error::{CompileError, CompileResult};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Integer(i64),
    Real(f64),
    /// String contents are raw bytes; the language's strings are
    /// byte-oriented, not code-point-oriented.
    Str(Vec<u8>),
    Boolean(bool),
    Nil,
    Identifier(String),

    // Brackets
    LeftBrace,
    LeftParen,
    LeftSquare,
    RightBrace,
    RightParen,
    RightSquare,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqualsEquals,
    NotEquals,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    AndAnd,
    OrOr,
    Not,

    // Keywords
    KwAssert,
    KwCatch,
    KwClass,
    KwElse,
    KwFor,
    KwFunction,
    KwIf,
    KwIn,
    KwIterate,
    KwLocal,
    KwMember,
    KwReturn,
    KwSwitch,
    KwThrow,
    KwTry,
    KwWhile,

    // Punctuation
    Assign,
    Colon,
    Comma,
    Period,
    Semicolon,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

struct Lexer<'a> {
    bytes: &'a [u8],
    pos: Pos,
}

/// Scans a whole source unit into tokens.
pub fn tokenize(source: &str) -> CompileResult<Vec<Token>> {
    let mut lexer = Lexer {
        bytes: source.as_bytes(),
        pos: Pos {
            offset: 0,
            line: 1,
            column: 1,
        },
    };

    let mut tokens = Vec::new();

    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }

    Ok(tokens)
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos.offset).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.bytes.get(self.pos.offset + ahead).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos.offset += 1;

        if byte == b'\n' {
            self.pos.line += 1;
            self.pos.column = 1;
        } else {
            self.pos.column += 1;
        }

        Some(byte)
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError::syntax(
            message,
            Span {
                start: self.pos,
                end: self.pos,
            },
        )
    }

    fn skip_trivia(&mut self) -> CompileResult<()> {
        loop {
            match self.peek() {
                Some(byte) if byte.is_ascii_whitespace() => {
                    self.advance();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(byte) = self.peek() {
                        if byte == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    self.advance();
                    self.advance();

                    loop {
                        match self.peek() {
                            Some(b'*') if self.peek_at(1) == Some(b'/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            Some(_) => {
                                self.advance();
                            }
                            None => return Err(self.error("unterminated block comment")),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> CompileResult<Option<Token>> {
        self.skip_trivia()?;

        let start = self.pos;

        let Some(byte) = self.peek() else {
            return Ok(None);
        };

        let kind = match byte {
            b'0'..=b'9' => return self.number(start).map(Some),
            b'\'' | b'"' => return self.string(start).map(Some),
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => return self.identifier(start).map(Some),

            b'{' => self.single(TokenKind::LeftBrace),
            b'(' => self.single(TokenKind::LeftParen),
            b'[' => self.single(TokenKind::LeftSquare),
            b'}' => self.single(TokenKind::RightBrace),
            b')' => self.single(TokenKind::RightParen),
            b']' => self.single(TokenKind::RightSquare),
            b'+' => self.single(TokenKind::Plus),
            b'-' => self.single(TokenKind::Minus),
            b'*' => self.single(TokenKind::Star),
            b'/' => self.single(TokenKind::Slash),
            b'%' => self.single(TokenKind::Percent),
            b':' => self.single(TokenKind::Colon),
            b',' => self.single(TokenKind::Comma),
            b'.' => self.single(TokenKind::Period),
            b';' => self.single(TokenKind::Semicolon),

            b'=' => {
                self.advance();
                if self.peek() == Some(b'=') {
                    self.advance();
                    TokenKind::EqualsEquals
                } else {
                    TokenKind::Assign
                }
            }
            b'!' => {
                self.advance();
                if self.peek() == Some(b'=') {
                    self.advance();
                    TokenKind::NotEquals
                } else {
                    TokenKind::Not
                }
            }
            b'<' => {
                self.advance();
                if self.peek() == Some(b'=') {
                    self.advance();
                    TokenKind::LessEq
                } else {
                    TokenKind::Less
                }
            }
            b'>' => {
                self.advance();
                if self.peek() == Some(b'=') {
                    self.advance();
                    TokenKind::GreaterEq
                } else {
                    TokenKind::Greater
                }
            }
            b'&' => {
                self.advance();
                if self.peek() == Some(b'&') {
                    self.advance();
                    TokenKind::AndAnd
                } else {
                    return Err(self.error("expected '&&'"));
                }
            }
            b'|' => {
                self.advance();
                if self.peek() == Some(b'|') {
                    self.advance();
                    TokenKind::OrOr
                } else {
                    return Err(self.error("expected '||'"));
                }
            }

            other => return Err(self.error(format!("unexpected character '{}'", other as char))),
        };

        Ok(Some(Token {
            kind,
            span: Span {
                start,
                end: self.pos,
            },
        }))
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn number(&mut self, start: Pos) -> CompileResult<Token> {
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.advance();
        }

        let mut is_real = false;

        if self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(b'0'..=b'9')) {
            is_real = true;
            self.advance();

            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.advance();
            }
        }

        if matches!(self.peek(), Some(b'e' | b'E')) {
            let exponent_digits = match self.peek_at(1) {
                Some(b'0'..=b'9') => Some(1),
                Some(b'+' | b'-') if matches!(self.peek_at(2), Some(b'0'..=b'9')) => Some(2),
                _ => None,
            };

            if let Some(skip) = exponent_digits {
                is_real = true;
                for _ in 0..=skip {
                    self.advance();
                }

                while matches!(self.peek(), Some(b'0'..=b'9')) {
                    self.advance();
                }
            }
        }

        let text = std::str::from_utf8(&self.bytes[start.offset..self.pos.offset])
            .expect("numeric text is ASCII");
        let span = Span {
            start,
            end: self.pos,
        };

        let kind = if is_real {
            TokenKind::Real(
                text.parse::<f64>()
                    .map_err(|_| CompileError::syntax("malformed real literal", span))?,
            )
        } else {
            TokenKind::Integer(
                text.parse::<i64>()
                    .map_err(|_| CompileError::syntax("integer literal out of range", span))?,
            )
        };

        Ok(Token { kind, span })
    }

    fn string(&mut self, start: Pos) -> CompileResult<Token> {
        let quote = self.advance().expect("quote present");
        let mut bytes = Vec::new();

        loop {
            match self.advance() {
                None => return Err(self.error("unterminated string literal")),
                Some(byte) if byte == quote => break,
                Some(b'\\') => {
                    let escape = self
                        .advance()
                        .ok_or_else(|| self.error("unterminated escape sequence"))?;

                    match escape {
                        b'n' => bytes.push(b'\n'),
                        b't' => bytes.push(b'\t'),
                        b'r' => bytes.push(b'\r'),
                        b'\\' => bytes.push(b'\\'),
                        b'\'' => bytes.push(b'\''),
                        b'"' => bytes.push(b'"'),
                        b'0' => bytes.push(b'\0'),
                        other => {
                            return Err(
                                self.error(format!("unknown escape '\\{}'", other as char))
                            )
                        }
                    }
                }
                // Source bytes pass through untouched; multi-byte sequences
                // stay exactly as written.
                Some(byte) => bytes.push(byte),
            }
        }

        Ok(Token {
            kind: TokenKind::Str(bytes),
            span: Span {
                start,
                end: self.pos,
            },
        })
    }

    fn identifier(&mut self, start: Pos) -> CompileResult<Token> {
        while matches!(
            self.peek(),
            Some(b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_')
        ) {
            self.advance();
        }

        let text = std::str::from_utf8(&self.bytes[start.offset..self.pos.offset])
            .expect("identifier text is ASCII");

        let kind = match text {
            "assert" => TokenKind::KwAssert,
            "catch" => TokenKind::KwCatch,
            "class" => TokenKind::KwClass,
            "else" => TokenKind::KwElse,
            "false" => TokenKind::Boolean(false),
            "for" => TokenKind::KwFor,
            "function" => TokenKind::KwFunction,
            "if" => TokenKind::KwIf,
            "in" => TokenKind::KwIn,
            "iterate" => TokenKind::KwIterate,
            "local" => TokenKind::KwLocal,
            "member" => TokenKind::KwMember,
            "nil" => TokenKind::Nil,
            "return" => TokenKind::KwReturn,
            "switch" => TokenKind::KwSwitch,
            "throw" => TokenKind::KwThrow,
            "true" => TokenKind::Boolean(true),
            "try" => TokenKind::KwTry,
            "while" => TokenKind::KwWhile,
            _ => TokenKind::Identifier(text.to_owned()),
        };

        Ok(Token {
            kind,
            span: Span {
                start,
                end: self.pos,
            },
        })
    }
}
