//! Registry configuration.

/// Default service name that marks a registration as a listener hook.
pub const DEFAULT_HOOK_SERVICE_NAME: &str = "listener_hook_service";

/// Configuration for a [`ServiceRegistry`](crate::registry::ServiceRegistry).
///
/// # Example
///
/// ```
/// use lodestar_registry::config::RegistryConfig;
///
/// let config = RegistryConfig::default()
///     .with_hook_service_name("hooks")
///     .with_warn_on_dangling(false);
///
/// assert_eq!(config.hook_service_name(), "hooks");
/// assert!(!config.warn_on_dangling());
/// ```
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    hook_service_name: String,
    warn_on_dangling: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            hook_service_name: DEFAULT_HOOK_SERVICE_NAME.to_owned(),
            warn_on_dangling: true,
        }
    }
}

impl RegistryConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the service name collected by
    /// [`listener_hooks`](crate::registry::ServiceRegistry::listener_hooks).
    #[must_use]
    pub fn with_hook_service_name(mut self, name: impl Into<String>) -> Self {
        self.hook_service_name = name.into();
        self
    }

    /// Sets whether owner cleanup logs each dangling registration and
    /// reference it finds.
    #[must_use]
    pub fn with_warn_on_dangling(mut self, warn: bool) -> Self {
        self.warn_on_dangling = warn;
        self
    }

    /// The listener hook service name.
    #[must_use]
    pub fn hook_service_name(&self) -> &str {
        &self.hook_service_name
    }

    /// Whether owner cleanup logs dangling entries.
    #[must_use]
    pub fn warn_on_dangling(&self) -> bool {
        self.warn_on_dangling
    }
}
