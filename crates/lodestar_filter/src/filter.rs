//! The filter expression tree and its evaluation.

use core::cmp::Ordering;
use core::fmt;
use core::str::FromStr;

use crate::error::FilterError;
use crate::lookup::PropertyLookup;
use crate::parser;

// ─────────────────────────────────────────────────────────────────────────────
// Operand
// ─────────────────────────────────────────────────────────────────────────────

/// The operation a filter node performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    /// All children must match.
    And,
    /// At least one child must match.
    Or,
    /// The single child must not match.
    Not,
    /// `(attr=value)`
    Equal,
    /// `(attr~=value)`
    Approx,
    /// `(attr>value)`
    Greater,
    /// `(attr>=value)`
    GreaterEqual,
    /// `(attr<value)`
    Less,
    /// `(attr<=value)`
    LessEqual,
    /// `(attr=a*b*c)`
    Substring,
    /// `(attr=*)`
    Present,
}

// ─────────────────────────────────────────────────────────────────────────────
// Filter
// ─────────────────────────────────────────────────────────────────────────────

/// A parsed filter expression.
///
/// Each node owns its children, so a tree is immutable once built and can
/// be shared freely between threads for matching.
///
/// # Example
///
/// ```
/// use lodestar_filter::Filter;
/// use std::collections::HashMap;
///
/// let filter = Filter::parse("(&(lang=en)(version>=1.2))").unwrap();
///
/// let props = HashMap::from([("lang", "en"), ("version", "1.10")]);
/// // Ordering is lexicographic: "1.10" < "1.2".
/// assert!(!filter.matches(&props));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Conjunction of the children.
    And(Vec<Filter>),
    /// Disjunction of the children.
    Or(Vec<Filter>),
    /// Negation of the child.
    Not(Box<Filter>),
    /// Exact string equality.
    Equal {
        /// Property key.
        attribute: String,
        /// Expected value.
        value: String,
    },
    /// Case-insensitive containment of `value` in the property.
    Approx {
        /// Property key.
        attribute: String,
        /// Text to look for.
        value: String,
    },
    /// Property sorts after `value`.
    Greater {
        /// Property key.
        attribute: String,
        /// Bound.
        value: String,
    },
    /// Property sorts after or equal to `value`.
    GreaterEqual {
        /// Property key.
        attribute: String,
        /// Bound.
        value: String,
    },
    /// Property sorts before `value`.
    Less {
        /// Property key.
        attribute: String,
        /// Bound.
        value: String,
    },
    /// Property sorts before or equal to `value`.
    LessEqual {
        /// Property key.
        attribute: String,
        /// Bound.
        value: String,
    },
    /// Wildcard pattern split on `*`.
    ///
    /// `segments` always has at least two entries. The first must be a
    /// prefix of the property, the last a suffix, and the ones in between
    /// must appear in order. Empty first/last segments match anything.
    Substring {
        /// Property key.
        attribute: String,
        /// Literal pieces between the wildcards.
        segments: Vec<String>,
    },
    /// The property exists.
    Present {
        /// Property key.
        attribute: String,
    },
}

impl Filter {
    /// Parses a filter string.
    ///
    /// # Errors
    ///
    /// Returns a [`FilterError`] describing the first grammar violation and
    /// where it occurred.
    pub fn parse(text: &str) -> Result<Self, FilterError> {
        parser::parse(text)
    }

    /// Builds `(attribute=value)`.
    ///
    /// The builders do not validate their input. See the [`Display`]
    /// impl for which trees render to parseable text.
    ///
    /// [`Display`]: fmt::Display
    #[must_use]
    pub fn equal(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Equal {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Builds `(attribute=*)`.
    #[must_use]
    pub fn present(attribute: impl Into<String>) -> Self {
        Filter::Present {
            attribute: attribute.into(),
        }
    }

    /// Builds a conjunction of `children`.
    #[must_use]
    pub fn and(children: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(children.into_iter().collect())
    }

    /// Builds a disjunction of `children`.
    #[must_use]
    pub fn or(children: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(children.into_iter().collect())
    }

    /// Builds the negation of `child`.
    #[must_use]
    pub fn not(child: Filter) -> Self {
        Filter::Not(Box::new(child))
    }

    /// Returns the operand of this node.
    #[must_use]
    pub fn operand(&self) -> Operand {
        match self {
            Filter::And(_) => Operand::And,
            Filter::Or(_) => Operand::Or,
            Filter::Not(_) => Operand::Not,
            Filter::Equal { .. } => Operand::Equal,
            Filter::Approx { .. } => Operand::Approx,
            Filter::Greater { .. } => Operand::Greater,
            Filter::GreaterEqual { .. } => Operand::GreaterEqual,
            Filter::Less { .. } => Operand::Less,
            Filter::LessEqual { .. } => Operand::LessEqual,
            Filter::Substring { .. } => Operand::Substring,
            Filter::Present { .. } => Operand::Present,
        }
    }

    /// Returns the attribute of a leaf node, `None` for composites.
    #[must_use]
    pub fn attribute(&self) -> Option<&str> {
        match self {
            Filter::And(_) | Filter::Or(_) | Filter::Not(_) => None,
            Filter::Equal { attribute, .. }
            | Filter::Approx { attribute, .. }
            | Filter::Greater { attribute, .. }
            | Filter::GreaterEqual { attribute, .. }
            | Filter::Less { attribute, .. }
            | Filter::LessEqual { attribute, .. }
            | Filter::Substring { attribute, .. }
            | Filter::Present { attribute } => Some(attribute),
        }
    }

    /// Returns the single comparison value of a leaf node.
    ///
    /// `None` for composites, substring patterns and presence tests.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        match self {
            Filter::Equal { value, .. }
            | Filter::Approx { value, .. }
            | Filter::Greater { value, .. }
            | Filter::GreaterEqual { value, .. }
            | Filter::Less { value, .. }
            | Filter::LessEqual { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Returns the children of a composite node, empty for leaves.
    #[must_use]
    pub fn children(&self) -> &[Filter] {
        match self {
            Filter::And(children) | Filter::Or(children) => children,
            Filter::Not(child) => core::slice::from_ref(child.as_ref()),
            _ => &[],
        }
    }

    /// Evaluates the filter against a property map.
    ///
    /// A leaf whose attribute is missing evaluates to `false`, so
    /// `(!(attr=*))` holds exactly when `attr` is absent.
    #[must_use]
    pub fn matches<P: PropertyLookup + ?Sized>(&self, properties: &P) -> bool {
        match self {
            Filter::And(children) => children.iter().all(|child| child.matches(properties)),
            Filter::Or(children) => children.iter().any(|child| child.matches(properties)),
            Filter::Not(child) => !child.matches(properties),
            Filter::Present { attribute } => properties.lookup(attribute).is_some(),
            Filter::Substring {
                attribute,
                segments,
            } => properties
                .lookup(attribute)
                .is_some_and(|actual| match_substring(actual, segments)),
            Filter::Equal { attribute, value } => {
                properties.lookup(attribute) == Some(value.as_str())
            }
            Filter::Approx { attribute, value } => properties
                .lookup(attribute)
                .is_some_and(|actual| actual.to_lowercase().contains(&value.to_lowercase())),
            Filter::Greater { attribute, value } => {
                compare(properties, attribute, value, Ordering::is_gt)
            }
            Filter::GreaterEqual { attribute, value } => {
                compare(properties, attribute, value, Ordering::is_ge)
            }
            Filter::Less { attribute, value } => {
                compare(properties, attribute, value, Ordering::is_lt)
            }
            Filter::LessEqual { attribute, value } => {
                compare(properties, attribute, value, Ordering::is_le)
            }
        }
    }

    /// Returns true if both trees express the same condition.
    ///
    /// Leaves must agree on operand, attribute and value. Composites must
    /// have the same operand and child count, and every child of `self`
    /// must have a structurally equal counterpart in `other`, in any order.
    #[must_use]
    pub fn structurally_equal(&self, other: &Filter) -> bool {
        if self.operand() != other.operand() {
            return false;
        }

        match (self, other) {
            (Filter::And(a), Filter::And(b)) | (Filter::Or(a), Filter::Or(b)) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .all(|child| b.iter().any(|candidate| child.structurally_equal(candidate)))
            }
            (Filter::Not(a), Filter::Not(b)) => a.structurally_equal(b),
            _ => self == other,
        }
    }
}

/// Applies an ordering test to the raw property string.
///
/// The comparison is lexicographic even for numeric-looking values.
fn compare<P: PropertyLookup + ?Sized>(
    properties: &P,
    attribute: &str,
    value: &str,
    test: fn(Ordering) -> bool,
) -> bool {
    properties
        .lookup(attribute)
        .is_some_and(|actual| test(actual.cmp(value)))
}

fn match_substring(actual: &str, segments: &[String]) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return false;
    };
    let Some((last, middle)) = rest.split_last() else {
        return actual == first;
    };

    let Some(mut remaining) = actual.strip_prefix(first.as_str()) else {
        return false;
    };

    for segment in middle.iter().filter(|s| !s.is_empty()) {
        match remaining.find(segment.as_str()) {
            Some(index) => remaining = &remaining[index + segment.len()..],
            None => return false,
        }
    }

    remaining.ends_with(last.as_str())
}

impl FromStr for Filter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Filter::parse(s)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Display
// ─────────────────────────────────────────────────────────────────────────────

/// Writes `value` with the characters that are special in filter values
/// escaped.
fn write_escaped(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    for c in value.chars() {
        if matches!(c, '(' | ')' | '*' | '\\') {
            f.write_str("\\")?;
        }
        write!(f, "{c}")?;
    }
    Ok(())
}

impl fmt::Display for Filter {
    /// Renders the canonical filter string.
    ///
    /// Any tree produced by [`Filter::parse`] renders to text that parses
    /// back to an equal tree. Builder-made trees only do so when they could
    /// have been parsed: values must be non-empty, `&` and `|` need at least
    /// one child, and attributes must not contain `(`, `)`, `=`, `<`, `>`
    /// or `~`. Attributes are written as is.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (attribute, op, value) = match self {
            Filter::And(children) | Filter::Or(children) => {
                f.write_str(if matches!(self, Filter::And(_)) { "(&" } else { "(|" })?;
                for child in children {
                    write!(f, "{child}")?;
                }
                return f.write_str(")");
            }
            Filter::Not(child) => return write!(f, "(!{child})"),
            Filter::Present { attribute } => return write!(f, "({attribute}=*)"),
            Filter::Substring {
                attribute,
                segments,
            } => {
                write!(f, "({attribute}=")?;
                for (i, segment) in segments.iter().enumerate() {
                    if i > 0 {
                        f.write_str("*")?;
                    }
                    write_escaped(f, segment)?;
                }
                return f.write_str(")");
            }
            Filter::Equal { attribute, value } => (attribute, "=", value),
            Filter::Approx { attribute, value } => (attribute, "~=", value),
            Filter::Greater { attribute, value } => (attribute, ">", value),
            Filter::GreaterEqual { attribute, value } => (attribute, ">=", value),
            Filter::Less { attribute, value } => (attribute, "<", value),
            Filter::LessEqual { attribute, value } => (attribute, "<=", value),
        };

        write!(f, "({attribute}{op}")?;
        write_escaped(f, value)?;
        f.write_str(")")
    }
}
