//! Tokenizer for structured control flow text.

use crate::error::TranslateError;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    If,
    Else,
    Switch,
    Case,
    Default,
    While,
    Do,
    Break,
    Continue,
    /// The `label` pseudo-variable.
    Label,
}

impl Keyword {
    fn from_word(word: &str) -> Option<Self> {
        Some(match word {
            "if" => Keyword::If,
            "else" => Keyword::Else,
            "switch" => Keyword::Switch,
            "case" => Keyword::Case,
            "default" => Keyword::Default,
            "while" => Keyword::While,
            "do" => Keyword::Do,
            "break" => Keyword::Break,
            "continue" => Keyword::Continue,
            "label" => Keyword::Label,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::Switch => "switch",
            Keyword::Case => "case",
            Keyword::Default => "default",
            Keyword::While => "while",
            Keyword::Do => "do",
            Keyword::Break => "break",
            Keyword::Continue => "continue",
            Keyword::Label => "label",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    LBrace,
    RBrace,
    LParen,
    RParen,
    Colon,
    Semi,
    Bang,
    /// `&&`
    AndAnd,
    /// `|0` integer coercion, ignored by the parser.
    OrZero,
    /// `=`
    Assign,
    /// `==`
    EqEq,
    Number(u32),
    /// Quoted numeric reference: `"12"`.
    Expr(u32),
    /// Loop label: `L12`.
    LoopLabel(u32),
    Keyword(Keyword),
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::LBrace => f.write_str("'{'"),
            Token::RBrace => f.write_str("'}'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::Colon => f.write_str("':'"),
            Token::Semi => f.write_str("';'"),
            Token::Bang => f.write_str("'!'"),
            Token::AndAnd => f.write_str("'&&'"),
            Token::OrZero => f.write_str("'|0'"),
            Token::Assign => f.write_str("'='"),
            Token::EqEq => f.write_str("'=='"),
            Token::Number(n) => write!(f, "number {}", n),
            Token::Expr(n) => write!(f, "expression \"{}\"", n),
            Token::LoopLabel(n) => write!(f, "label L{}", n),
            Token::Keyword(k) => write!(f, "keyword '{}'", k.as_str()),
            Token::Eof => f.write_str("end of input"),
        }
    }
}

/// A token and the byte offset it starts at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

pub struct Lexer<'src> {
    src: &'src [u8],
    pos: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
        }
    }

    /// Tokenize the whole input. The result always ends with [`Token::Eof`].
    pub fn tokenize(&mut self) -> Result<Vec<Spanned>, TranslateError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let pos = self.pos;
            let token = self.next_token()?;
            tokens.push(Spanned { token, pos });
            if token == Token::Eof {
                return Ok(tokens);
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.src.get(self.pos + 1).copied()
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => self.pos += 1,
                Some(b'/') if self.peek2() == Some(b'/') => {
                    while let Some(c) = self.peek() {
                        self.pos += 1;
                        if c == b'\n' {
                            break;
                        }
                    }
                }
                _ => return,
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, TranslateError> {
        let start = self.pos;
        let Some(c) = self.peek() else {
            return Ok(Token::Eof);
        };
        self.pos += 1;
        let token = match c {
            b'{' => Token::LBrace,
            b'}' => Token::RBrace,
            b'(' => Token::LParen,
            b')' => Token::RParen,
            b':' => Token::Colon,
            b';' => Token::Semi,
            b'!' => Token::Bang,
            b'&' => {
                self.expect_byte(b'&', start, "expected &&")?;
                Token::AndAnd
            }
            b'|' => {
                self.expect_byte(b'0', start, "expected |0")?;
                Token::OrZero
            }
            b'=' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    Token::EqEq
                } else {
                    Token::Assign
                }
            }
            b'0'..=b'9' => {
                self.pos = start;
                Token::Number(self.digits(start)?)
            }
            b'L' => Token::LoopLabel(self.digits(start)?),
            b'"' => {
                let n = self.digits(start)?;
                self.expect_byte(b'"', start, "unterminated numbered expression")?;
                Token::Expr(n)
            }
            b'a'..=b'z' => {
                while matches!(self.peek(), Some(b'a'..=b'z')) {
                    self.pos += 1;
                }
                let word = String::from_utf8_lossy(&self.src[start..self.pos]);
                let keyword = Keyword::from_word(&word).ok_or_else(|| {
                    TranslateError::grammar(start, format!("unknown keyword: {}", word))
                })?;
                Token::Keyword(keyword)
            }
            other => {
                return Err(TranslateError::grammar(
                    start,
                    format!("unexpected character {:?}", char::from(other)),
                ))
            }
        };
        Ok(token)
    }

    fn expect_byte(&mut self, byte: u8, start: usize, reason: &str) -> Result<(), TranslateError> {
        if self.peek() != Some(byte) {
            return Err(TranslateError::grammar(start, reason));
        }
        self.pos += 1;
        Ok(())
    }

    /// Read a run of decimal digits (at least one).
    fn digits(&mut self, start: usize) -> Result<u32, TranslateError> {
        let from = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        if from == self.pos {
            return Err(TranslateError::grammar(start, "expected digits"));
        }
        std::str::from_utf8(&self.src[from..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| TranslateError::grammar(start, "number out of range"))
    }
}
