//! Recursive-descent parser for the filter grammar.
//!
//! ```text
//! filter     = "(" component ")"
//! component  = "&" filter+ | "|" filter+ | "!" filter | item
//! item       = attribute ( "=" | "~=" | ">" | ">=" | "<" | "<=" ) value
//!            | attribute "=*"                      ; presence
//! ```
//!
//! Whitespace is skipped around expressions and attributes but kept inside
//! values. A `\` in a value makes the next character literal.

use crate::error::{FilterError, FilterErrorKind};
use crate::filter::Filter;

/// Parses `text` into a filter tree.
///
/// Either the whole input is consumed or an error is returned; no partial
/// tree escapes.
pub(crate) fn parse(text: &str) -> Result<Filter, FilterError> {
    let mut parser = Parser { text, pos: 0 };
    let filter = parser.parse_filter()?;
    if parser.pos != text.len() {
        return Err(parser.error(FilterErrorKind::TrailingCharacters));
    }
    Ok(filter)
}

struct Parser<'a> {
    text: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.text[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, kind: FilterErrorKind) -> FilterError {
        FilterError::new(kind, self.pos)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn parse_filter(&mut self) -> Result<Filter, FilterError> {
        self.skip_whitespace();
        if self.peek() != Some('(') {
            return Err(self.error(FilterErrorKind::MissingOpenParen));
        }
        self.bump();

        let filter = self.parse_component()?;

        self.skip_whitespace();
        if self.peek() != Some(')') {
            return Err(self.error(FilterErrorKind::MissingCloseParen));
        }
        self.bump();
        self.skip_whitespace();

        Ok(filter)
    }

    fn parse_component(&mut self) -> Result<Filter, FilterError> {
        self.skip_whitespace();
        match self.peek() {
            Some('&') => {
                self.bump();
                Ok(Filter::And(self.parse_children()?))
            }
            Some('|') => {
                self.bump();
                Ok(Filter::Or(self.parse_children()?))
            }
            Some('!') => {
                self.bump();
                self.skip_whitespace();
                if self.peek() != Some('(') {
                    return Err(self.error(FilterErrorKind::MissingOpenParen));
                }
                Ok(Filter::Not(Box::new(self.parse_filter()?)))
            }
            _ => self.parse_item(),
        }
    }

    fn parse_children(&mut self) -> Result<Vec<Filter>, FilterError> {
        self.skip_whitespace();
        if self.peek() != Some('(') {
            return Err(self.error(FilterErrorKind::MissingOpenParen));
        }

        let mut children = Vec::new();
        while self.peek() == Some('(') {
            children.push(self.parse_filter()?);
        }
        Ok(children)
    }

    fn parse_item(&mut self) -> Result<Filter, FilterError> {
        let attribute = self.parse_attribute()?;
        self.skip_whitespace();

        match (self.peek(), self.peek_second()) {
            (Some('~'), Some('=')) => {
                self.pos += 2;
                let value = self.parse_value()?;
                Ok(Filter::Approx { attribute, value })
            }
            (Some('>'), Some('=')) => {
                self.pos += 2;
                let value = self.parse_value()?;
                Ok(Filter::GreaterEqual { attribute, value })
            }
            (Some('>'), _) => {
                self.pos += 1;
                let value = self.parse_value()?;
                Ok(Filter::Greater { attribute, value })
            }
            (Some('<'), Some('=')) => {
                self.pos += 2;
                let value = self.parse_value()?;
                Ok(Filter::LessEqual { attribute, value })
            }
            (Some('<'), _) => {
                self.pos += 1;
                let value = self.parse_value()?;
                Ok(Filter::Less { attribute, value })
            }
            (Some('='), _) => {
                self.pos += 1;
                self.parse_equality(attribute)
            }
            _ => Err(self.error(FilterErrorKind::InvalidOperator)),
        }
    }

    fn parse_attribute(&mut self) -> Result<String, FilterError> {
        self.skip_whitespace();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, '~' | '<' | '>' | '=' | '(' | ')') {
                break;
            }
            self.bump();
        }

        let attribute = self.text[start..self.pos].trim_end();
        if attribute.is_empty() {
            return Err(FilterError::new(FilterErrorKind::MissingAttribute, start));
        }
        Ok(attribute.to_owned())
    }

    /// Parses the right-hand side of `=`: presence, plain equality, or a
    /// substring pattern.
    fn parse_equality(&mut self, attribute: String) -> Result<Filter, FilterError> {
        if self.peek() == Some('*') {
            let star = self.pos;
            self.bump();
            self.skip_whitespace();
            if self.peek() == Some(')') {
                return Ok(Filter::Present { attribute });
            }
            self.pos = star;
        }

        let mut segments = Vec::new();
        let mut current = String::new();
        loop {
            match self.peek() {
                Some(')') => break,
                Some('(') => return Err(self.error(FilterErrorKind::UnexpectedParen)),
                None => return Err(self.error(FilterErrorKind::UnterminatedValue)),
                Some('*') => {
                    self.bump();
                    segments.push(core::mem::take(&mut current));
                }
                Some('\\') => {
                    self.bump();
                    current.push(self.escaped()?);
                }
                Some(c) => {
                    self.bump();
                    current.push(c);
                }
            }
        }

        if segments.is_empty() {
            if current.is_empty() {
                return Err(self.error(FilterErrorKind::MissingValue));
            }
            return Ok(Filter::Equal {
                attribute,
                value: current,
            });
        }

        segments.push(current);
        Ok(Filter::Substring {
            attribute,
            segments,
        })
    }

    fn parse_value(&mut self) -> Result<String, FilterError> {
        let mut value = String::new();
        loop {
            match self.peek() {
                Some(')') => break,
                Some('(') => return Err(self.error(FilterErrorKind::UnexpectedParen)),
                None => return Err(self.error(FilterErrorKind::UnterminatedValue)),
                Some('\\') => {
                    self.bump();
                    value.push(self.escaped()?);
                }
                Some(c) => {
                    self.bump();
                    value.push(c);
                }
            }
        }

        if value.is_empty() {
            return Err(self.error(FilterErrorKind::MissingValue));
        }
        Ok(value)
    }

    fn escaped(&mut self) -> Result<char, FilterError> {
        self.bump()
            .ok_or_else(|| self.error(FilterErrorKind::UnterminatedValue))
    }
}
