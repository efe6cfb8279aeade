//! Literal-only decoder for structured payloads embedded in log text.
//!
//! Accepts JSON extended with single-quoted strings, trailing commas and the
//! `True`/`False`/`None` spellings. Anything else that looks like an
//! expression (bare identifiers, calls, operators) is rejected; nothing is
//! ever evaluated.

use serde_json::{Map, Number, Value};
use std::fmt;

/// Nesting limit for arrays and objects.
const MAX_DEPTH: usize = 128;

/// Literal decode failure with the byte offset where it was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralError {
    pub offset: usize,
    pub reason: LiteralErrorReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiteralErrorReason {
    /// Input ended inside a value
    UnexpectedEnd,
    /// Character that cannot start or continue a value here
    UnexpectedChar(char),
    /// Backslash sequence we do not understand
    InvalidEscape(String),
    /// Numeric token that does not form a number
    InvalidNumber(String),
    /// Bare word that is not one of the accepted constants
    ForbiddenIdentifier(String),
    /// Non-whitespace after the top-level value
    TrailingInput,
    /// Nesting exceeded `MAX_DEPTH`
    TooDeep,
}

impl fmt::Display for LiteralErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedEnd => write!(f, "unexpected end of input"),
            Self::UnexpectedChar(c) => write!(f, "unexpected character {:?}", c),
            Self::InvalidEscape(s) => write!(f, "invalid escape \\{}", s),
            Self::InvalidNumber(s) => write!(f, "invalid number {:?}", s),
            Self::ForbiddenIdentifier(s) => write!(f, "identifier {:?} is not a literal", s),
            Self::TrailingInput => write!(f, "trailing input after literal"),
            Self::TooDeep => write!(f, "nesting deeper than {}", MAX_DEPTH),
        }
    }
}

impl fmt::Display for LiteralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.reason, self.offset)
    }
}

impl std::error::Error for LiteralError {}

/// Decode `src` as a single literal value.
pub fn parse_literal(src: &str) -> Result<Value, LiteralError> {
    let mut parser = LiteralParser { src, pos: 0 };
    parser.skip_ws();
    let value = parser.value(0)?;
    parser.skip_ws();
    if parser.pos < src.len() {
        return Err(parser.err(LiteralErrorReason::TrailingInput));
    }
    Ok(value)
}

struct LiteralParser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> LiteralParser<'a> {
    fn err(&self, reason: LiteralErrorReason) -> LiteralError {
        LiteralError {
            offset: self.pos,
            reason,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn expect_more(&self) -> Result<char, LiteralError> {
        self.peek()
            .ok_or_else(|| self.err(LiteralErrorReason::UnexpectedEnd))
    }

    fn value(&mut self, depth: usize) -> Result<Value, LiteralError> {
        if depth > MAX_DEPTH {
            return Err(self.err(LiteralErrorReason::TooDeep));
        }
        match self.expect_more()? {
            '{' => self.object(depth),
            '[' => self.array(depth),
            '"' | '\'' => self.string().map(Value::String),
            '-' | '0'..='9' => self.number(),
            c if c.is_alphabetic() || c == '_' => self.constant(),
            c => Err(self.err(LiteralErrorReason::UnexpectedChar(c))),
        }
    }

    fn object(&mut self, depth: usize) -> Result<Value, LiteralError> {
        self.bump();
        let mut map = Map::new();
        loop {
            self.skip_ws();
            match self.expect_more()? {
                '}' => {
                    self.bump();
                    return Ok(Value::Object(map));
                }
                '"' | '\'' => {}
                c => return Err(self.err(LiteralErrorReason::UnexpectedChar(c))),
            }
            let key = self.string()?;
            self.skip_ws();
            match self.expect_more()? {
                ':' => {
                    self.bump();
                }
                c => return Err(self.err(LiteralErrorReason::UnexpectedChar(c))),
            }
            self.skip_ws();
            let value = self.value(depth + 1)?;
            map.insert(key, value);
            self.skip_ws();
            match self.expect_more()? {
                ',' => {
                    self.bump();
                }
                '}' => {
                    self.bump();
                    return Ok(Value::Object(map));
                }
                c => return Err(self.err(LiteralErrorReason::UnexpectedChar(c))),
            }
        }
    }

    fn array(&mut self, depth: usize) -> Result<Value, LiteralError> {
        self.bump();
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.expect_more()? == ']' {
                self.bump();
                return Ok(Value::Array(items));
            }
            items.push(self.value(depth + 1)?);
            self.skip_ws();
            match self.expect_more()? {
                ',' => {
                    self.bump();
                }
                ']' => {
                    self.bump();
                    return Ok(Value::Array(items));
                }
                c => return Err(self.err(LiteralErrorReason::UnexpectedChar(c))),
            }
        }
    }

    fn string(&mut self) -> Result<String, LiteralError> {
        let quote = self.bump().ok_or_else(|| self.err(LiteralErrorReason::UnexpectedEnd))?;
        let mut out = String::new();
        loop {
            let c = self.bump().ok_or_else(|| self.err(LiteralErrorReason::UnexpectedEnd))?;
            match c {
                c if c == quote => return Ok(out),
                '\\' => out.push(self.escape()?),
                c => out.push(c),
            }
        }
    }

    fn escape(&mut self) -> Result<char, LiteralError> {
        let c = self.bump().ok_or_else(|| self.err(LiteralErrorReason::UnexpectedEnd))?;
        let decoded = match c {
            '"' => '"',
            '\'' => '\'',
            '\\' => '\\',
            '/' => '/',
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            '0' => '\0',
            'x' => {
                let code = self.hex_digits(2)?;
                char::from_u32(code)
                    .ok_or_else(|| self.err(LiteralErrorReason::InvalidEscape(format!("x{:02x}", code))))?
            }
            'u' => self.unicode_escape()?,
            other => return Err(self.err(LiteralErrorReason::InvalidEscape(other.to_string()))),
        };
        Ok(decoded)
    }

    fn unicode_escape(&mut self) -> Result<char, LiteralError> {
        let high = self.hex_digits(4)?;
        if (0xD800..0xDC00).contains(&high) {
            // Surrogate pair: expect a following \uDC00..\uDFFF
            if self.src[self.pos..].starts_with("\\u") {
                self.pos += 2;
                let low = self.hex_digits(4)?;
                if (0xDC00..0xE000).contains(&low) {
                    let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                    if let Some(c) = char::from_u32(code) {
                        return Ok(c);
                    }
                }
            }
            return Err(self.err(LiteralErrorReason::InvalidEscape(format!("u{:04x}", high))));
        }
        char::from_u32(high)
            .ok_or_else(|| self.err(LiteralErrorReason::InvalidEscape(format!("u{:04x}", high))))
    }

    fn hex_digits(&mut self, count: usize) -> Result<u32, LiteralError> {
        let end = self.pos + count;
        let digits = self
            .src
            .get(self.pos..end)
            .ok_or_else(|| self.err(LiteralErrorReason::UnexpectedEnd))?;
        let code = u32::from_str_radix(digits, 16)
            .map_err(|_| self.err(LiteralErrorReason::InvalidEscape(digits.to_string())))?;
        self.pos = end;
        Ok(code)
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        let mut is_float = false;
        if self.peek() == Some('-') {
            self.bump();
        }
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {}
                '.' | 'e' | 'E' => is_float = true,
                '+' | '-' if matches!(self.src[..self.pos].chars().last(), Some('e' | 'E')) => {}
                _ => break,
            }
            self.pos += 1;
        }
        let token = &self.src[start..self.pos];
        let invalid = || LiteralError {
            offset: start,
            reason: LiteralErrorReason::InvalidNumber(token.to_string()),
        };

        if !is_float {
            if let Ok(n) = token.parse::<i64>() {
                return Ok(Value::Number(n.into()));
            }
            if let Ok(n) = token.parse::<u64>() {
                return Ok(Value::Number(n.into()));
            }
        }
        // Rust's float grammar is looser than JSON's ("1.", "inf"), so insist
        // on a digit on both ends of the mantissa.
        let digits = token.trim_start_matches('-');
        if !digits.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(invalid());
        }
        let mantissa = digits.split(['e', 'E']).next().unwrap_or("");
        if mantissa.ends_with('.') {
            return Err(invalid());
        }
        token
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(invalid)
    }

    fn constant(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !(c.is_alphanumeric() || c == '_') {
                break;
            }
            self.pos += c.len_utf8();
        }
        match &self.src[start..self.pos] {
            "true" | "True" => Ok(Value::Bool(true)),
            "false" | "False" => Ok(Value::Bool(false)),
            "null" | "None" => Ok(Value::Null),
            word => Err(LiteralError {
                offset: start,
                reason: LiteralErrorReason::ForbiddenIdentifier(word.to_string()),
            }),
        }
    }
}
