//! Text encoding for list-valued cells
//!
//! Lists are written as bracketed literals: `['eel', 'worm']`, `[1, 2.5]`,
//! `[None, 'x']`, `[[1], []]`. The decoder below only understands that
//! grammar (quoted strings, numbers, `None`, `nan`, `inf`, nested lists), so
//! decoding a cell never evaluates anything.

use crate::table::CellValue;
use log::warn;
use thiserror::Error;

/// Lists nested deeper than this are rejected
const MAX_DEPTH: usize = 32;

/// A list literal that could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed list literal at offset {offset}: {message}")]
pub struct LiteralError {
    /// Character offset where decoding stopped
    pub offset: usize,
    pub message: String,
}

/// Encode a value as literal text. Scalars encode the way they appear inside a list.
pub fn encode(value: &CellValue) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Shortest text that reads back as the same float, always with a decimal point or exponent
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "inf" } else { "-inf" }.to_string()
    } else {
        format!("{:?}", f)
    }
}

fn write_value(out: &mut String, value: &CellValue) {
    match value {
        CellValue::Integer(i) => out.push_str(&i.to_string()),
        CellValue::Float(f) => out.push_str(&format_float(*f)),
        CellValue::String(s) => write_quoted(out, s),
        CellValue::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item);
            }
            out.push(']');
        }
        CellValue::Empty => out.push_str("None"),
    }
}

fn write_quoted(out: &mut String, s: &str) {
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
}

/// Decode a list literal
pub fn parse_list(input: &str) -> Result<Vec<CellValue>, LiteralError> {
    let mut parser = Parser::new(input);
    parser.skip_ws();
    if parser.peek() != Some('[') {
        return Err(parser.error("expected '['"));
    }
    let items = parser.parse_items(0)?;
    parser.skip_ws();
    if parser.pos != parser.chars.len() {
        return Err(parser.error("trailing characters after list"));
    }
    Ok(items)
}

/// Decode a field holding exactly one quoted string literal, such as `'[draft] wreck'`
pub fn parse_quoted(input: &str) -> Result<String, LiteralError> {
    let mut parser = Parser::new(input);
    parser.skip_ws();
    let text = match parser.peek() {
        Some(q @ ('\'' | '"')) => parser.parse_string(q)?,
        _ => return Err(parser.error("expected a quote")),
    };
    parser.skip_ws();
    if parser.pos != parser.chars.len() {
        return Err(parser.error("trailing characters after string"));
    }
    Ok(text)
}

/// True when `token` is made only of digits, signs, decimal points and exponents.
/// Words such as `nan` or `Infinity` are not numeric.
pub fn is_numeric(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit())
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
}

/// Decode a list literal, substituting an empty list when it is malformed
pub fn parse_list_or_empty(input: &str) -> Vec<CellValue> {
    match parse_list(input) {
        Ok(items) => items,
        Err(e) => {
            warn!("{} in {:?}; using an empty list", e, input);
            Vec::new()
        }
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn parse_value(&mut self, depth: usize) -> Result<CellValue, LiteralError> {
        self.skip_ws();
        match self.peek() {
            Some('[') => self.parse_items(depth + 1).map(CellValue::List),
            Some(q @ ('\'' | '"')) => self.parse_string(q).map(CellValue::String),
            Some(_) => self.parse_bare(),
            None => Err(self.error("unexpected end of input")),
        }
    }

    /// Parses `[ value (, value)* ,? ]` starting at the opening bracket
    fn parse_items(&mut self, depth: usize) -> Result<Vec<CellValue>, LiteralError> {
        if depth > MAX_DEPTH {
            return Err(self.error("lists nested too deeply"));
        }
        self.pos += 1;

        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(']') {
            self.pos += 1;
            return Ok(items);
        }

        loop {
            items.push(self.parse_value(depth)?);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                    self.skip_ws();
                    if self.peek() == Some(']') {
                        self.pos += 1;
                        return Ok(items);
                    }
                }
                Some(']') => {
                    self.pos += 1;
                    return Ok(items);
                }
                Some(c) => return Err(self.error(format!("unexpected '{}'", c))),
                None => return Err(self.error("unterminated list")),
            }
        }
    }

    fn parse_string(&mut self, quote: char) -> Result<String, LiteralError> {
        self.pos += 1;
        let mut s = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(s);
                }
                Some('\\') => {
                    self.pos += 1;
                    let escaped = self
                        .peek()
                        .ok_or_else(|| self.error("unterminated escape"))?;
                    self.pos += 1;
                    s.push(match escaped {
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        '0' => '\0',
                        other => other,
                    });
                }
                Some(c) => {
                    s.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn parse_bare(&mut self) -> Result<CellValue, LiteralError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == ',' || c == ']' || c == '[' || c.is_whitespace() {
                break;
            }
            self.pos += 1;
        }
        let token: String = self.chars[start..self.pos].iter().collect();

        match token.as_str() {
            "" => Err(self.error("expected a value")),
            "None" => Ok(CellValue::Empty),
            "nan" => Ok(CellValue::Float(f64::NAN)),
            "inf" => Ok(CellValue::Float(f64::INFINITY)),
            "-inf" => Ok(CellValue::Float(f64::NEG_INFINITY)),
            _ => {
                if let Ok(i) = token.parse::<i64>() {
                    return Ok(CellValue::Integer(i));
                }
                match token.parse::<f64>() {
                    Ok(f) if is_numeric(&token) => Ok(CellValue::Float(f)),
                    _ => Err(LiteralError {
                        offset: start,
                        message: format!("unsupported token '{}'", token),
                    }),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> CellValue {
        CellValue::String(v.to_string())
    }

    #[test]
    fn test_encode_strings_and_numbers() {
        let list = CellValue::List(vec![s("eel"), s("worm")]);
        assert_eq!(encode(&list), "['eel', 'worm']");

        let mixed = CellValue::List(vec![CellValue::Integer(1), CellValue::Float(2.0), CellValue::Empty]);
        assert_eq!(encode(&mixed), "[1, 2.0, None]");
        assert_eq!(encode(&CellValue::List(vec![])), "[]");
    }

    #[test]
    fn test_encode_escapes_quotes() {
        let list = CellValue::List(vec![s("it's"), s("a\\b"), s("")]);
        assert_eq!(encode(&list), r"['it\'s', 'a\\b', '']");
        assert_eq!(parse_list(&encode(&list)).unwrap(), vec![s("it's"), s("a\\b"), s("")]);
    }

    #[test]
    fn test_parse_python_style_literals() {
        assert_eq!(
            parse_list("[\"eel\", 'worm' ,]").unwrap(),
            vec![s("eel"), s("worm")]
        );
        assert_eq!(
            parse_list("[0.8, -3, nan, None]").unwrap()[..2],
            [CellValue::Float(0.8), CellValue::Integer(-3)]
        );
        assert_eq!(
            parse_list("[[1], []]").unwrap(),
            vec![CellValue::List(vec![CellValue::Integer(1)]), CellValue::List(vec![])]
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse_list("[1,2").is_err());
        assert!(parse_list("1,2]").is_err());
        assert!(parse_list("[1,,2]").is_err());
        assert!(parse_list("['open]").is_err());
        assert!(parse_list("[1] extra").is_err());
        assert!(parse_list("[__import__('os')]").is_err());
        assert!(parse_list("[True]").is_err());
    }

    #[test]
    fn test_parse_or_empty_recovers() {
        assert_eq!(parse_list_or_empty("[1,2"), Vec::<CellValue>::new());
        assert_eq!(parse_list_or_empty("[1]"), vec![CellValue::Integer(1)]);
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}{}", "[".repeat(MAX_DEPTH + 2), "]".repeat(MAX_DEPTH + 2));
        assert!(parse_list(&deep).is_err());
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(f64::NAN), "nan");
        assert_eq!(format_float(f64::NEG_INFINITY), "-inf");
    }

    #[test]
    fn test_parse_quoted() {
        assert_eq!(parse_quoted("'[draft] wreck'").unwrap(), "[draft] wreck");
        assert_eq!(parse_quoted("'it\\'s'").unwrap(), "it's");
        assert!(parse_quoted("'open").is_err());
        assert!(parse_quoted("'a' 'b'").is_err());
        assert!(parse_quoted("plain").is_err());
    }

    #[test]
    fn test_numeric_words_are_not_numbers() {
        assert!(is_numeric("1e-3"));
        assert!(is_numeric("-2.5"));
        assert!(!is_numeric("Infinity"));
        assert!(!is_numeric("NaN"));
        assert!(!is_numeric("-"));
        assert!(parse_list("[Infinity]").is_err());
    }
}
