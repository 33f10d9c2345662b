//! FILENAME: formula-parser/src/lexer.rs
//! PURPOSE: Scans a raw formula string and produces a stream of Tokens.
//! CONTEXT: This is the first stage of the parsing pipeline. It handles
//! whitespace skipping, number parsing, string literals, identifiers, and
//! the multi-character operators `<=`, `>=`, `<>`.
//!
//! SUPPORTED OPERATORS:
//! - Single char: + - * / ^ = ( ) , . [ ]
//! - Multi char: <= >= <>

use crate::error::{FormulaError, FormulaResult};
use crate::token::{Op, Token, TokenKind};
use std::iter::Peekable;
use std::str::CharIndices;

pub struct Lexer<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
    len: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            chars: input.char_indices().peekable(),
            len: input.len(),
        }
    }

    /// Advances the lexer and returns the next token, or a position-tagged
    /// error if the input cannot be tokenized.
    pub fn next_token(&mut self) -> FormulaResult<Token> {
        self.skip_whitespace();

        let (pos, ch) = match self.chars.next() {
            Some(pair) => pair,
            None => return Ok(Token::new(TokenKind::Eof, self.len)),
        };

        match ch {
            '+' => Ok(Token::new(TokenKind::Op(Op::Add), pos)),
            '-' => Ok(Token::new(TokenKind::Op(Op::Sub), pos)),
            '*' => Ok(Token::new(TokenKind::Op(Op::Mul), pos)),
            '/' => Ok(Token::new(TokenKind::Op(Op::Div), pos)),
            '^' => Ok(Token::new(TokenKind::Op(Op::Pow), pos)),
            '=' => Ok(Token::new(TokenKind::Op(Op::Eq), pos)),
            '(' => Ok(Token::new(TokenKind::LParen, pos)),
            ')' => Ok(Token::new(TokenKind::RParen, pos)),
            ',' => Ok(Token::new(TokenKind::Comma, pos)),
            '[' => Ok(Token::new(TokenKind::LBracket, pos)),
            ']' => Ok(Token::new(TokenKind::RBracket, pos)),

            '<' => Ok(self.read_less_than(pos)),
            '>' => Ok(self.read_greater_than(pos)),

            '"' | '\'' => self.read_string(pos, ch),

            // A leading '.' only starts a number when immediately followed
            // by a digit; otherwise it's a standalone DOT token (used by
            // CFG.field, VAR.name, ROW(id).field, and name.subname).
            '.' if self.peek_is_digit() => Ok(self.read_number(pos, ch)),
            '.' => Ok(Token::new(TokenKind::Dot, pos)),

            c if c.is_ascii_digit() => Ok(self.read_number(pos, c)),
            c if is_ident_start(c) => Ok(self.read_identifier(pos, c)),

            c => Err(FormulaError::at(format!("Unexpected character '{}'", c), pos)),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&(_, ch)) = self.chars.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.chars.next();
        }
    }

    fn peek_is_digit(&mut self) -> bool {
        matches!(self.chars.peek(), Some(&(_, c)) if c.is_ascii_digit())
    }

    /// Handles operators starting with '<': <, <=, <>
    fn read_less_than(&mut self, pos: usize) -> Token {
        match self.chars.peek() {
            Some(&(_, '=')) => {
                self.chars.next();
                Token::new(TokenKind::Op(Op::Le), pos)
            }
            Some(&(_, '>')) => {
                self.chars.next();
                Token::new(TokenKind::Op(Op::NotEq), pos)
            }
            _ => Token::new(TokenKind::Op(Op::Lt), pos),
        }
    }

    /// Handles operators starting with '>': >, >=
    fn read_greater_than(&mut self, pos: usize) -> Token {
        match self.chars.peek() {
            Some(&(_, '=')) => {
                self.chars.next();
                Token::new(TokenKind::Op(Op::Ge), pos)
            }
            _ => Token::new(TokenKind::Op(Op::Gt), pos),
        }
    }

    /// Reads a string literal delimited by `quote` (either `"` or `'`).
    /// `\` copies the next character literally, so `\"` and `\\` both work
    /// inside a double-quoted string. An unterminated string raises at the
    /// position of the opening quote.
    fn read_string(&mut self, start: usize, quote: char) -> FormulaResult<Token> {
        let mut result = String::new();
        loop {
            match self.chars.next() {
                Some((_, '\\')) => {
                    if let Some((_, escaped)) = self.chars.next() {
                        result.push(escaped);
                    }
                }
                Some((_, c)) if c == quote => {
                    return Ok(Token::new(TokenKind::String(result), start));
                }
                Some((_, c)) => result.push(c),
                None => {
                    return Err(FormulaError::at("Unterminated string literal", start));
                }
            }
        }
    }

    /// Reads a number: one or more digits with at most one `.`. A leading
    /// `.` is only reached here when `next_token` has already confirmed it
    /// is followed by a digit.
    fn read_number(&mut self, start: usize, first: char) -> Token {
        let mut has_dot = first == '.';
        let mut end = start + first.len_utf8();

        while let Some(&(idx, ch)) = self.chars.peek() {
            if ch.is_ascii_digit() {
                self.chars.next();
                end = idx + ch.len_utf8();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.chars.next();
                end = idx + ch.len_utf8();
            } else {
                break;
            }
        }

        let text = &self.input[start..end];
        let value: f64 = text.parse().unwrap_or(0.0);
        Token::new(TokenKind::Number(value), start)
    }

    /// Reads an identifier: starts with a letter or `_`, continues with
    /// letters, digits, or `_`. Casing is preserved verbatim.
    fn read_identifier(&mut self, start: usize, first: char) -> Token {
        let mut end = start + first.len_utf8();

        while let Some(&(idx, ch)) = self.chars.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.chars.next();
                end = idx + ch.len_utf8();
            } else {
                break;
            }
        }

        let ident = self.input[start..end].to_string();
        Token::new(TokenKind::Ident(ident), start)
    }

    /// Tokenizes the entire input, ending with a single `Eof` token.
    pub fn tokenize(input: &'a str) -> FormulaResult<Vec<Token>> {
        let mut lexer = Lexer::new(input);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token()?;
            let is_eof = matches!(token.kind, TokenKind::Eof);
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}
