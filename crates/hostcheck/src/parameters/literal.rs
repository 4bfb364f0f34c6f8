//! Whitelisted literal parser for parameters persisted as strings by very old
//! discovery output.
//!
//! Accepts `None`, `True`, `False`, numbers, quoted strings, tuples, lists and
//! dicts with string keys. Bare identifiers are looked up in the plugin's
//! constant namespace; nothing is ever evaluated.

use std::collections::BTreeMap;

use super::value::ParamValue;
use crate::error::ParameterError;

/// Constants a plugin exposes to its persisted parameter strings
pub type ConstantNamespace = BTreeMap<String, ParamValue>;

/// Parse a literal expression, resolving identifiers in `namespace`
pub fn parse_literal(
    input: &str,
    namespace: &ConstantNamespace,
) -> Result<ParamValue, ParameterError> {
    let mut parser = Parser { chars: input.chars().collect(), pos: 0, namespace };
    let value = parser.value()?;
    parser.skip_whitespace();
    if parser.pos < parser.chars.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(value)
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    namespace: &'a ConstantNamespace,
}

impl Parser<'_> {
    fn error(&self, message: &str) -> ParameterError {
        ParameterError::Literal { position: self.pos, message: message.to_string() }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ParameterError> {
        self.skip_whitespace();
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{expected}'")))
        }
    }

    fn value(&mut self) -> Result<ParamValue, ParameterError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some('(') => self.tuple(),
            Some('[') => {
                self.pos += 1;
                Ok(ParamValue::List(self.items(']')?.0))
            }
            Some('{') => self.dict(),
            Some('\'') | Some('"') => self.string().map(ParamValue::Str),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.identifier(),
            Some(c) => Err(self.error(&format!("unexpected character '{c}'"))),
        }
    }

    /// Comma separated values up to `close`; also reports a trailing comma
    fn items(&mut self, close: char) -> Result<(Vec<ParamValue>, bool), ParameterError> {
        let mut items = Vec::new();
        let mut trailing_comma = false;
        loop {
            self.skip_whitespace();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok((items, trailing_comma));
            }
            items.push(self.value()?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                    trailing_comma = true;
                }
                Some(c) if c == close => {
                    trailing_comma = false;
                }
                _ => return Err(self.error(&format!("expected ',' or '{close}'"))),
            }
        }
    }

    fn tuple(&mut self) -> Result<ParamValue, ParameterError> {
        self.pos += 1;
        let (mut items, trailing_comma) = self.items(')')?;
        // `(x)` is a parenthesized value, `(x,)` a one-element tuple
        if items.len() == 1 && !trailing_comma {
            return Ok(items.remove(0));
        }
        Ok(ParamValue::Tuple(items))
    }

    fn dict(&mut self) -> Result<ParamValue, ParameterError> {
        self.pos += 1;
        let mut map = BTreeMap::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(ParamValue::Map(map));
            }
            let key = match self.value()? {
                ParamValue::Str(key) => key,
                other => {
                    let message = format!("dict keys must be strings, got {}", other.type_name());
                    return Err(self.error(&message));
                }
            };
            self.expect(':')?;
            let value = self.value()?;
            map.insert(key, value);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some('}') => {}
                _ => return Err(self.error("expected ',' or '}'")),
            }
        }
    }

    fn string(&mut self) -> Result<String, ParameterError> {
        let quote = self.chars[self.pos];
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some('\\') => {
                    self.pos += 1;
                    let escaped = match self.peek() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('0') => '\0',
                        Some(c @ ('\\' | '\'' | '"')) => c,
                        _ => return Err(self.error("invalid escape sequence")),
                    };
                    out.push(escaped);
                    self.pos += 1;
                }
                Some(c) => {
                    out.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn number(&mut self) -> Result<ParamValue, ParameterError> {
        let start = self.pos;
        if matches!(self.peek(), Some('-') | Some('+')) {
            self.pos += 1;
        }
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '_'))
            || (matches!(self.peek(), Some('-') | Some('+'))
                && matches!(self.chars.get(self.pos - 1), Some('e') | Some('E')))
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().filter(|c| **c != '_').collect();
        if let Ok(int) = text.parse::<i64>() {
            return Ok(ParamValue::Int(int));
        }
        text.parse::<f64>().map(ParamValue::Float).map_err(|_| ParameterError::Literal {
            position: start,
            message: format!("invalid number '{text}'"),
        })
    }

    fn identifier(&mut self) -> Result<ParamValue, ParameterError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        match name.as_str() {
            "None" => Ok(ParamValue::None),
            "True" => Ok(ParamValue::Bool(true)),
            "False" => Ok(ParamValue::Bool(false)),
            _ => self
                .namespace
                .get(&name)
                .cloned()
                .ok_or(ParameterError::UnknownConstant(name)),
        }
    }
}
