//! Sandboxed evaluator for the `%:{...}` scripted-expression macro.
//!
//! The grammar is deliberately tiny: string literals, capture-group
//! references `m[N]`, a handful of text functions, and `+` concatenation.
//! Evaluation errors never escape the macro expander; the caller falls back
//! to the whole match (group 0) for the failing macro.

use crate::macros::{capitalize, title_case};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvalError {
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected character '{0}'")]
    Unexpected(char),
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("capture group {0} out of range")]
    GroupOutOfRange(usize),
    #[error("unterminated string literal")]
    UnterminatedString,
}

/// Evaluate `body` against the capture-group sequence `groups`.
///
/// Grammar:
/// ```text
/// expression := term { '+' term }
/// term       := literal | group | call
/// literal    := '"' ... '"' | '\'' ... '\'' | digits
/// group      := 'm' '[' digits ']'
/// call       := ident '(' expression ')'
/// ```
pub fn eval(body: &str, groups: &[String]) -> Result<String, EvalError> {
    let mut parser = Parser {
        chars: body.chars().collect(),
        pos: 0,
        groups,
    };
    parser.skip_ws();
    let value = parser.expression()?;
    parser.skip_ws();
    match parser.peek() {
        None => Ok(value),
        Some(c) => Err(EvalError::Unexpected(c)),
    }
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    groups: &'a [String],
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expression(&mut self) -> Result<String, EvalError> {
        let mut value = self.term()?;
        loop {
            self.skip_ws();
            if self.peek() == Some('+') {
                self.bump();
                self.skip_ws();
                value.push_str(&self.term()?);
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&mut self) -> Result<String, EvalError> {
        match self.peek() {
            None => Err(EvalError::UnexpectedEnd),
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                self.literal(quote)
            },
            Some(c) if c.is_ascii_digit() => Ok(self.digits()),
            Some(c) if c.is_ascii_alphabetic() => {
                let ident = self.ident();
                if ident == "m" && self.peek() == Some('[') {
                    self.group_ref()
                } else if self.peek() == Some('(') {
                    self.call(&ident)
                } else {
                    Err(EvalError::Unexpected(c))
                }
            },
            Some(c) => Err(EvalError::Unexpected(c)),
        }
    }

    fn literal(&mut self, quote: char) -> Result<String, EvalError> {
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(EvalError::UnterminatedString),
                Some(c) if c == quote => return Ok(text),
                Some(c) => text.push(c),
            }
        }
    }

    fn digits(&mut self) -> String {
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            text.push(self.bump().unwrap());
        }
        text
    }

    fn ident(&mut self) -> String {
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            text.push(self.bump().unwrap());
        }
        text
    }

    fn group_ref(&mut self) -> Result<String, EvalError> {
        self.bump(); // consume '['
        self.skip_ws();
        let digits = self.digits();
        if digits.is_empty() {
            return match self.peek() {
                None => Err(EvalError::UnexpectedEnd),
                Some(c) => Err(EvalError::Unexpected(c)),
            };
        }
        self.skip_ws();
        if self.peek() != Some(']') {
            return match self.peek() {
                None => Err(EvalError::UnexpectedEnd),
                Some(c) => Err(EvalError::Unexpected(c)),
            };
        }
        self.bump();
        let index: usize = digits.parse().unwrap_or(usize::MAX);
        self.groups
            .get(index)
            .cloned()
            .ok_or(EvalError::GroupOutOfRange(index))
    }

    fn call(&mut self, name: &str) -> Result<String, EvalError> {
        self.bump(); // consume '('
        self.skip_ws();
        let arg = self.expression()?;
        self.skip_ws();
        if self.peek() != Some(')') {
            return match self.peek() {
                None => Err(EvalError::UnexpectedEnd),
                Some(c) => Err(EvalError::Unexpected(c)),
            };
        }
        self.bump();
        match name {
            "upper" => Ok(arg.to_uppercase()),
            "lower" => Ok(arg.to_lowercase()),
            "capitalize" => Ok(capitalize(&arg)),
            "title" => Ok(title_case(&arg)),
            "trim" => Ok(arg.trim().to_string()),
            "len" => Ok(arg.chars().count().to_string()),
            _ => Err(EvalError::UnknownFunction(name.to_string())),
        }
    }
}
