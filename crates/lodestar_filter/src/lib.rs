//! LDAP-style filter expressions for selecting services by their properties.
//!
//! `lodestar_filter` parses the prefix-notation grammar used throughout
//! lodestar and evaluates it against any string-to-string property source:
//!
//! - [`filter`] - The expression tree, matching and canonical rendering
//! - [`lookup`] - The [`PropertyLookup`] trait for property sources
//! - [`error`] - Parse errors with byte positions
//!
//! # Grammar
//!
//! ```text
//! (&(a=1)(b=2))      conjunction
//! (|(a=1)(b=2))      disjunction
//! (!(a=1))           negation
//! (a=1) (a~=x)       equality, case-insensitive containment
//! (a>1) (a>=1)       lexicographic ordering
//! (a<1) (a<=1)
//! (a=*)              presence
//! (a=pre*mid*suf)    substring
//! ```
//!
//! # Example
//!
//! ```
//! use lodestar_filter::Filter;
//!
//! let filter: Filter = "(&(objectClass=logger)(level>=2))".parse().unwrap();
//! assert!(filter.matches(&[("objectClass", "logger"), ("level", "3")]));
//! assert!(!filter.matches(&[("objectClass", "logger")]));
//! ```

/// Parse errors.
pub mod error;

/// The filter expression tree.
pub mod filter;

/// Property sources filters evaluate against.
pub mod lookup;

mod parser;

pub use error::{FilterError, FilterErrorKind};
pub use filter::{Filter, Operand};
pub use lookup::PropertyLookup;
