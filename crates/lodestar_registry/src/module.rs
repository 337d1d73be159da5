//! Module identities.
//!
//! Every registration is owned by a providing module, and every
//! [`ServiceReference`](crate::reference::ServiceReference) belongs to a
//! consuming module. The registry does not load or start modules itself; it
//! is only told which module performs each call.

use core::fmt;

// ─────────────────────────────────────────────────────────────────────────────
// ModuleId
// ─────────────────────────────────────────────────────────────────────────────

/// Identity of a providing or consuming module.
///
/// The registry treats this as an opaque key. [`ModuleId::FRAMEWORK`] is
/// reserved for the host itself.
///
/// # Example
///
/// ```
/// use lodestar_registry::module::ModuleId;
///
/// let logger = ModuleId::new(7);
/// assert_eq!(logger.get(), 7);
/// assert_ne!(logger, ModuleId::FRAMEWORK);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(u64);

impl ModuleId {
    /// The host framework's own identity.
    pub const FRAMEWORK: ModuleId = ModuleId(0);

    /// Creates a module identity from a raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module#{}", self.0)
    }
}

impl From<u64> for ModuleId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}
