//! Tracker configuration.
//!
//! [`TrackerOptions`] names what to track and how to customize it. The
//! effective filter combines the service name with an optional extra filter:
//!
//! | service name | extra filter | effective filter |
//! |--------------|--------------|------------------|
//! | `calc` | none | `(objectClass=calc)` |
//! | `calc` | `(mode=fast)` | `(&(objectClass=calc)(mode=fast))` |
//! | none | `(mode=fast)` | `(mode=fast)` |

use std::sync::Arc;

use lodestar_filter::Filter;
use lodestar_registry::properties::OBJECT_CLASS;
use lodestar_registry::reference::ServiceReference;
use lodestar_registry::service::ServiceInstance;

use crate::customizer::{CallbackCustomizer, TrackerCustomizer};
use crate::error::TrackerError;

enum CustomizerSlot {
    None,
    Callbacks(CallbackCustomizer),
    Custom(Arc<dyn TrackerCustomizer>),
}

/// What a [`ServiceTracker`](crate::tracker::ServiceTracker) tracks.
///
/// Closure hooks (`on_*`) and [`with_customizer`](Self::with_customizer) are
/// alternatives; whichever is set last wins.
///
/// # Example
///
/// ```
/// use lodestar_tracker::options::TrackerOptions;
///
/// let options = TrackerOptions::new("calc")
///     .with_filter("(mode=fast)")
///     .on_set(|service| tracing::info!(selected = service.is_some(), "calc selection changed"));
///
/// assert_eq!(
///     options.filter().unwrap().to_string(),
///     "(&(objectClass=calc)(mode=fast))"
/// );
/// ```
pub struct TrackerOptions {
    service_name: Option<String>,
    filter: Option<String>,
    customizer: CustomizerSlot,
}

impl TrackerOptions {
    /// Tracks services registered under `service_name`.
    #[must_use]
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: Some(service_name.into()),
            filter: None,
            customizer: CustomizerSlot::None,
        }
    }

    /// Tracks every service matching `filter`, regardless of name.
    #[must_use]
    pub fn with_filter_only(filter: impl Into<String>) -> Self {
        Self {
            service_name: None,
            filter: Some(filter.into()),
            customizer: CustomizerSlot::None,
        }
    }

    /// Narrows the tracked services with an extra filter.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Uses a custom [`TrackerCustomizer`].
    #[must_use]
    pub fn with_customizer(mut self, customizer: impl TrackerCustomizer) -> Self {
        self.customizer = CustomizerSlot::Custom(Arc::new(customizer));
        self
    }

    fn callbacks(mut self, update: impl FnOnce(CallbackCustomizer) -> CallbackCustomizer) -> Self {
        let current = match core::mem::replace(&mut self.customizer, CustomizerSlot::None) {
            CustomizerSlot::Callbacks(callbacks) => callbacks,
            CustomizerSlot::None | CustomizerSlot::Custom(_) => CallbackCustomizer::new(),
        };
        self.customizer = CustomizerSlot::Callbacks(update(current));
        self
    }

    /// Sets the `adding` hook. Returning `None` vetoes the service.
    #[must_use]
    pub fn on_adding(
        self,
        hook: impl Fn(&ServiceReference, ServiceInstance) -> Option<ServiceInstance>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.callbacks(|callbacks| callbacks.on_adding(hook))
    }

    /// Sets the `added` hook.
    #[must_use]
    pub fn on_added(
        self,
        hook: impl Fn(&ServiceReference, &ServiceInstance) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks(|callbacks| callbacks.on_added(hook))
    }

    /// Sets the `modified` hook.
    #[must_use]
    pub fn on_modified(
        self,
        hook: impl Fn(&ServiceReference, &ServiceInstance) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks(|callbacks| callbacks.on_modified(hook))
    }

    /// Sets the `removed` hook.
    #[must_use]
    pub fn on_removed(
        self,
        hook: impl Fn(&ServiceReference, &ServiceInstance) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks(|callbacks| callbacks.on_removed(hook))
    }

    /// Sets the `set` hook.
    #[must_use]
    pub fn on_set(self, hook: impl Fn(Option<&ServiceInstance>) + Send + Sync + 'static) -> Self {
        self.callbacks(|callbacks| callbacks.on_set(hook))
    }

    /// The tracked service name, if any.
    #[must_use]
    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    /// Builds the effective filter.
    ///
    /// # Errors
    ///
    /// - [`TrackerError::IllegalArgument`] if neither a non-empty service
    ///   name nor a filter was given.
    /// - [`TrackerError::Filter`] if the extra filter does not parse.
    pub fn filter(&self) -> Result<Filter, TrackerError> {
        let extra = self.filter.as_deref().map(Filter::parse).transpose()?;

        match (self.service_name.as_deref(), extra) {
            (Some(""), _) => Err(TrackerError::IllegalArgument(
                "service name must not be empty".into(),
            )),
            (Some(name), None) => Ok(Filter::equal(OBJECT_CLASS, name)),
            (Some(name), Some(extra)) => Ok(Filter::and([Filter::equal(OBJECT_CLASS, name), extra])),
            (None, Some(extra)) => Ok(extra),
            (None, None) => Err(TrackerError::IllegalArgument(
                "a tracker needs a service name or a filter".into(),
            )),
        }
    }

    pub(crate) fn into_customizer(self) -> Option<Arc<dyn TrackerCustomizer>> {
        match self.customizer {
            CustomizerSlot::None => None,
            CustomizerSlot::Callbacks(callbacks) => Some(Arc::new(callbacks)),
            CustomizerSlot::Custom(custom) => Some(custom),
        }
    }
}
