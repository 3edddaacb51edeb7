//! Hand-written longest-match scanner for CEL source text.
//!
//! Tokens carry byte spans; all line/column work happens later against the
//! `Source` line table. String and bytes literals are decoded here (via
//! `parser::literals`) so escape errors surface with the literal's position.

mod token;

pub use token::*;

use std::{error::Error, fmt::Display};

use crate::parser::literals;

#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    pub offset: usize,
}

impl LexError {
    fn new(message: impl Into<String>, offset: usize) -> LexError {
        LexError {
            message: message.into(),
            offset,
        }
    }
}

impl Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at offset {}", self.message, self.offset)
    }
}

impl Error for LexError {}

pub type LexResult<T> = Result<T, LexError>;

pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            position: 0,
            tokens: vec![],
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.position).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.input.as_bytes().get(self.position + ahead).copied()
    }

    fn eat_whitespace_and_comments(&mut self) {
        loop {
            while let Some(c) = self.peek() {
                if c.is_ascii_whitespace() {
                    self.position += 1;
                } else {
                    break;
                }
            }

            if self.peek() == Some(b'/') && self.peek_at(1) == Some(b'/') {
                while let Some(c) = self.peek() {
                    if c == b'\n' {
                        break;
                    }
                    self.position += 1;
                }
                continue;
            }

            return;
        }
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            span: Span::new(start, self.position),
        });
    }

    pub fn lex(mut self) -> LexResult<Vec<Token>> {
        loop {
            self.eat_whitespace_and_comments();
            let Some(c) = self.peek() else {
                return Ok(self.tokens);
            };
            let start = self.position;

            match c {
                b'(' => self.single(TokenKind::LParen),
                b')' => self.single(TokenKind::RParen),
                b'[' => self.single(TokenKind::LBracket),
                b']' => self.single(TokenKind::RBracket),
                b'{' => self.single(TokenKind::LBrace),
                b'}' => self.single(TokenKind::RBrace),
                b',' => self.single(TokenKind::Comma),
                b':' => self.single(TokenKind::Colon),
                b'?' => self.single(TokenKind::Question),
                b'+' => self.single(TokenKind::Plus),
                b'-' => self.single(TokenKind::Minus),
                b'*' => self.single(TokenKind::Star),
                b'/' => self.single(TokenKind::Slash),
                b'%' => self.single(TokenKind::Percent),
                b'.' => {
                    if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                        self.lex_number(start)?;
                    } else {
                        self.single(TokenKind::Dot);
                    }
                }
                b'!' => {
                    self.position += 1;
                    if self.peek() == Some(b'=') {
                        self.position += 1;
                        self.push(TokenKind::NotEq, start);
                    } else {
                        self.push(TokenKind::Bang, start);
                    }
                }
                b'<' => {
                    self.position += 1;
                    if self.peek() == Some(b'=') {
                        self.position += 1;
                        self.push(TokenKind::LessEq, start);
                    } else {
                        self.push(TokenKind::Less, start);
                    }
                }
                b'>' => {
                    self.position += 1;
                    if self.peek() == Some(b'=') {
                        self.position += 1;
                        self.push(TokenKind::GreaterEq, start);
                    } else {
                        self.push(TokenKind::Greater, start);
                    }
                }
                b'=' => {
                    if self.peek_at(1) == Some(b'=') {
                        self.position += 2;
                        self.push(TokenKind::EqEq, start);
                    } else {
                        return Err(LexError::new("unexpected character '='", start));
                    }
                }
                b'&' => {
                    if self.peek_at(1) == Some(b'&') {
                        self.position += 2;
                        self.push(TokenKind::And, start);
                    } else {
                        return Err(LexError::new("unexpected character '&'", start));
                    }
                }
                b'|' => {
                    if self.peek_at(1) == Some(b'|') {
                        self.position += 2;
                        self.push(TokenKind::Or, start);
                    } else {
                        return Err(LexError::new("unexpected character '|'", start));
                    }
                }
                b'"' | b'\'' => self.lex_string(start)?,
                c if c.is_ascii_digit() => self.lex_number(start)?,
                c if c == b'_' || c.is_ascii_alphabetic() => self.lex_word(start)?,
                other => {
                    return Err(LexError::new(
                        format!("unexpected character '{}'", other as char),
                        start,
                    ));
                }
            }
        }
    }

    fn single(&mut self, kind: TokenKind) {
        let start = self.position;
        self.position += 1;
        self.push(kind, start);
    }

    fn lex_word(&mut self, start: usize) -> LexResult<()> {
        while let Some(c) = self.peek() {
            if c == b'_' || c.is_ascii_alphanumeric() {
                self.position += 1;
            } else {
                break;
            }
        }

        let word = &self.input[start..self.position];

        // String prefixes glue directly onto a quote.
        if matches!(self.peek(), Some(b'"') | Some(b'\''))
            && word.len() <= 2
            && word.bytes().all(|c| matches!(c, b'r' | b'R' | b'b' | b'B'))
        {
            self.position = start;
            return self.lex_string(start);
        }

        let kind = match word {
            "true" => TokenKind::Bool(true),
            "false" => TokenKind::Bool(false),
            "null" => TokenKind::Null,
            "in" => TokenKind::In,
            _ => TokenKind::Ident(word.to_string()),
        };
        self.push(kind, start);
        Ok(())
    }

    fn lex_number(&mut self, start: usize) -> LexResult<()> {
        let bytes = self.input.as_bytes();
        let mut is_double = false;

        if self.peek() == Some(b'0')
            && matches!(self.peek_at(1), Some(b'x') | Some(b'X'))
        {
            self.position += 2;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.position += 1;
            }
            let digits = &self.input[start + 2..self.position];
            if matches!(self.peek(), Some(b'u') | Some(b'U')) {
                self.position += 1;
                let value = literals::decode_uint(digits, 16)
                    .map_err(|message| LexError::new(message, start))?;
                self.push(TokenKind::Uint(value), start);
            } else {
                let value = literals::decode_int(digits, 16)
                    .map_err(|message| LexError::new(message, start))?;
                self.push(TokenKind::Int(value), start);
            }
            return Ok(());
        }

        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.position += 1;
        }

        if self.peek() == Some(b'.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_double = true;
            self.position += 1;
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.position += 1;
            }
        }

        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            let mut ahead = 1;
            if matches!(
                bytes.get(self.position + ahead),
                Some(b'+') | Some(b'-')
            ) {
                ahead += 1;
            }
            if bytes
                .get(self.position + ahead)
                .is_some_and(|c| c.is_ascii_digit())
            {
                is_double = true;
                self.position += ahead;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.position += 1;
                }
            }
        }

        let text = &self.input[start..self.position];
        if is_double {
            let value = literals::decode_double(text)
                .map_err(|message| LexError::new(message, start))?;
            self.push(TokenKind::Double(value), start);
        } else if matches!(self.peek(), Some(b'u') | Some(b'U')) {
            self.position += 1;
            let value =
                literals::decode_uint(text, 10).map_err(|message| LexError::new(message, start))?;
            self.push(TokenKind::Uint(value), start);
        } else {
            let value =
                literals::decode_int(text, 10).map_err(|message| LexError::new(message, start))?;
            self.push(TokenKind::Int(value), start);
        }
        Ok(())
    }

    fn lex_string(&mut self, start: usize) -> LexResult<()> {
        let mut raw = false;
        let mut bytes_literal = false;
        while let Some(c) = self.peek() {
            match c {
                b'r' | b'R' if !raw => {
                    raw = true;
                    self.position += 1;
                }
                b'b' | b'B' if !bytes_literal => {
                    bytes_literal = true;
                    self.position += 1;
                }
                _ => break,
            }
        }

        let quote = match self.peek() {
            Some(c @ (b'"' | b'\'')) => c,
            _ => return Err(LexError::new("malformed string literal", start)),
        };

        let triple = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        let delimiter_len = if triple { 3 } else { 1 };
        self.position += delimiter_len;
        let body_start = self.position;

        loop {
            let Some(c) = self.peek() else {
                return Err(LexError::new("unterminated string literal", start));
            };

            if c == quote {
                if !triple {
                    break;
                }
                if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                    break;
                }
                self.position += 1;
                continue;
            }

            if c == b'\n' && !triple {
                return Err(LexError::new("unterminated string literal", start));
            }

            if c == b'\\' && !raw {
                self.position += 1;
                if self.peek().is_none() {
                    return Err(LexError::new("unterminated string literal", start));
                }
                self.position += 1;
                continue;
            }

            // Advance a full UTF-8 sequence at once.
            let width = self.input[self.position..]
                .chars()
                .next()
                .map(char::len_utf8)
                .unwrap_or(1);
            self.position += width;
        }

        let body = &self.input[body_start..self.position];
        self.position += delimiter_len;

        if bytes_literal {
            let value = literals::decode_bytes(body, raw)
                .map_err(|message| LexError::new(message, start))?;
            self.push(TokenKind::Bytes(value), start);
        } else {
            let value = literals::decode_string(body, raw)
                .map_err(|message| LexError::new(message, start))?;
            self.push(TokenKind::Str(value), start);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Lexer::new(input)
            .lex()
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn test_lex_operators() {
        assert_eq!(
            kinds("a && b || !c"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::And,
                TokenKind::Ident("b".into()),
                TokenKind::Or,
                TokenKind::Bang,
                TokenKind::Ident("c".into()),
            ]
        );
    }

    #[test]
    fn test_lex_numbers() {
        assert_eq!(
            kinds("1 42u 0x1F 0x2Au 1.5 1e3 .25"),
            vec![
                TokenKind::Int(1),
                TokenKind::Uint(42),
                TokenKind::Int(31),
                TokenKind::Uint(42),
                TokenKind::Double(1.5),
                TokenKind::Double(1000.0),
                TokenKind::Double(0.25),
            ]
        );
    }

    #[test]
    fn test_lex_strings() {
        assert_eq!(
            kinds(r#""hello" 'world' r"a\nb" b"\x41""#),
            vec![
                TokenKind::Str("hello".into()),
                TokenKind::Str("world".into()),
                TokenKind::Str("a\\nb".into()),
                TokenKind::Bytes(vec![0x41]),
            ]
        );
    }

    #[test]
    fn test_lex_triple_quoted() {
        assert_eq!(
            kinds("'''it's fine'''"),
            vec![TokenKind::Str("it's fine".into())]
        );
    }

    #[test]
    fn test_lex_keywords() {
        assert_eq!(
            kinds("true false null x in xs"),
            vec![
                TokenKind::Bool(true),
                TokenKind::Bool(false),
                TokenKind::Null,
                TokenKind::Ident("x".into()),
                TokenKind::In,
                TokenKind::Ident("xs".into()),
            ]
        );
    }

    #[test]
    fn test_lex_comments() {
        assert_eq!(
            kinds("a // trailing\n&& b"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::And,
                TokenKind::Ident("b".into()),
            ]
        );
    }

    #[test]
    fn test_unterminated_string() {
        assert!(Lexer::new("'abc").lex().is_err());
    }

    #[test]
    fn test_int_overflow_is_error() {
        assert!(Lexer::new("9223372036854775808").lex().is_err());
    }
}
