//! Filter parse errors.

use core::fmt;

/// The kind of grammar violation found while parsing a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterErrorKind {
    /// An expression did not start with `(`.
    MissingOpenParen,
    /// An expression was not closed with `)`.
    MissingCloseParen,
    /// A leaf had no attribute name before its operator.
    MissingAttribute,
    /// The character after the attribute is not a known operator.
    InvalidOperator,
    /// A leaf had an operator but no value.
    MissingValue,
    /// A `(` appeared unescaped inside a value.
    UnexpectedParen,
    /// The input ended inside a value or right after a `\` escape.
    UnterminatedValue,
    /// Input remained after the outermost expression was closed.
    TrailingCharacters,
}

impl fmt::Display for FilterErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            FilterErrorKind::MissingOpenParen => "missing '('",
            FilterErrorKind::MissingCloseParen => "missing ')'",
            FilterErrorKind::MissingAttribute => "missing attribute",
            FilterErrorKind::InvalidOperator => "invalid operator",
            FilterErrorKind::MissingValue => "missing value",
            FilterErrorKind::UnexpectedParen => "unescaped '(' in value",
            FilterErrorKind::UnterminatedValue => "unterminated value",
            FilterErrorKind::TrailingCharacters => "extraneous trailing characters",
        };
        f.write_str(msg)
    }
}

/// Error returned when a filter string cannot be parsed.
///
/// `position` is the byte offset into the input where parsing stopped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid filter at position {position}: {kind}")]
pub struct FilterError {
    /// What went wrong.
    pub kind: FilterErrorKind,
    /// Byte offset into the filter text.
    pub position: usize,
}

impl FilterError {
    pub(crate) fn new(kind: FilterErrorKind, position: usize) -> Self {
        Self { kind, position }
    }
}
