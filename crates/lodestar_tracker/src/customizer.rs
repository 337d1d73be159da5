//! Tracker customization hooks.
//!
//! A [`TrackerCustomizer`] observes, and can veto or replace, the services a
//! tracker picks up. Every hook has a default, so implementors override only
//! what they need. For closure-based hooks use [`CallbackCustomizer`], which
//! is what [`TrackerOptions::on_adding`](crate::options::TrackerOptions::on_adding)
//! and friends build.
//!
//! Hooks are always called without any tracker lock held. Errors and panics
//! are caught at the tracker boundary and logged.

use core::fmt;

use lodestar_registry::reference::ServiceReference;
use lodestar_registry::service::ServiceInstance;

use crate::error::CustomizerError;

// ─────────────────────────────────────────────────────────────────────────────
// TrackerCustomizer
// ─────────────────────────────────────────────────────────────────────────────

/// Callbacks a tracker drives as matching services come and go.
pub trait TrackerCustomizer: Send + Sync + 'static {
    /// Called before a service is tracked.
    ///
    /// Return the instance to track, usually `service` itself. `Ok(None)`
    /// vetoes the service; so does an error.
    fn adding(
        &self,
        reference: &ServiceReference,
        service: ServiceInstance,
    ) -> Result<Option<ServiceInstance>, CustomizerError> {
        let _ = reference;
        Ok(Some(service))
    }

    /// Called after a service has been tracked.
    fn added(
        &self,
        reference: &ServiceReference,
        service: &ServiceInstance,
    ) -> Result<(), CustomizerError> {
        let _ = (reference, service);
        Ok(())
    }

    /// Called when a tracked service's properties changed and it still
    /// matches.
    fn modified(
        &self,
        reference: &ServiceReference,
        service: &ServiceInstance,
    ) -> Result<(), CustomizerError> {
        let _ = (reference, service);
        Ok(())
    }

    /// Called after a service stopped being tracked, before it is released.
    fn removed(
        &self,
        reference: &ServiceReference,
        service: &ServiceInstance,
    ) -> Result<(), CustomizerError> {
        let _ = (reference, service);
        Ok(())
    }

    /// Called when the highest-ranked tracked service changes, with `None`
    /// once nothing is tracked.
    fn set(&self, service: Option<&ServiceInstance>) -> Result<(), CustomizerError> {
        let _ = service;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CallbackCustomizer
// ─────────────────────────────────────────────────────────────────────────────

type AddingHook =
    Box<dyn Fn(&ServiceReference, ServiceInstance) -> Option<ServiceInstance> + Send + Sync>;
type ServiceHook = Box<dyn Fn(&ServiceReference, &ServiceInstance) + Send + Sync>;
type SetHook = Box<dyn Fn(Option<&ServiceInstance>) + Send + Sync>;

/// A customizer assembled from optional closures.
///
/// Hooks left as `None` fall back to the [`TrackerCustomizer`] defaults.
///
/// # Example
///
/// ```
/// use lodestar_tracker::customizer::CallbackCustomizer;
///
/// let customizer = CallbackCustomizer::new()
///     .on_added(|reference, _service| {
///         tracing::info!(service_id = %reference.service_id(), "tracked");
///     })
///     .on_set(|service| {
///         tracing::info!(selected = service.is_some(), "selection changed");
///     });
/// assert!(customizer.has_set());
/// ```
#[derive(Default)]
pub struct CallbackCustomizer {
    adding: Option<AddingHook>,
    added: Option<ServiceHook>,
    modified: Option<ServiceHook>,
    removed: Option<ServiceHook>,
    set: Option<SetHook>,
}

impl CallbackCustomizer {
    /// Creates a customizer with no hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `adding` hook. Returning `None` vetoes the service.
    #[must_use]
    pub fn on_adding(
        mut self,
        hook: impl Fn(&ServiceReference, ServiceInstance) -> Option<ServiceInstance>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.adding = Some(Box::new(hook));
        self
    }

    /// Sets the `added` hook.
    #[must_use]
    pub fn on_added(
        mut self,
        hook: impl Fn(&ServiceReference, &ServiceInstance) + Send + Sync + 'static,
    ) -> Self {
        self.added = Some(Box::new(hook));
        self
    }

    /// Sets the `modified` hook.
    #[must_use]
    pub fn on_modified(
        mut self,
        hook: impl Fn(&ServiceReference, &ServiceInstance) + Send + Sync + 'static,
    ) -> Self {
        self.modified = Some(Box::new(hook));
        self
    }

    /// Sets the `removed` hook.
    #[must_use]
    pub fn on_removed(
        mut self,
        hook: impl Fn(&ServiceReference, &ServiceInstance) + Send + Sync + 'static,
    ) -> Self {
        self.removed = Some(Box::new(hook));
        self
    }

    /// Sets the `set` hook.
    #[must_use]
    pub fn on_set(
        mut self,
        hook: impl Fn(Option<&ServiceInstance>) + Send + Sync + 'static,
    ) -> Self {
        self.set = Some(Box::new(hook));
        self
    }

    /// Returns true if a `set` hook is configured.
    #[must_use]
    pub fn has_set(&self) -> bool {
        self.set.is_some()
    }
}

impl TrackerCustomizer for CallbackCustomizer {
    fn adding(
        &self,
        reference: &ServiceReference,
        service: ServiceInstance,
    ) -> Result<Option<ServiceInstance>, CustomizerError> {
        Ok(match &self.adding {
            Some(hook) => hook(reference, service),
            None => Some(service),
        })
    }

    fn added(
        &self,
        reference: &ServiceReference,
        service: &ServiceInstance,
    ) -> Result<(), CustomizerError> {
        if let Some(hook) = &self.added {
            hook(reference, service);
        }
        Ok(())
    }

    fn modified(
        &self,
        reference: &ServiceReference,
        service: &ServiceInstance,
    ) -> Result<(), CustomizerError> {
        if let Some(hook) = &self.modified {
            hook(reference, service);
        }
        Ok(())
    }

    fn removed(
        &self,
        reference: &ServiceReference,
        service: &ServiceInstance,
    ) -> Result<(), CustomizerError> {
        if let Some(hook) = &self.removed {
            hook(reference, service);
        }
        Ok(())
    }

    fn set(&self, service: Option<&ServiceInstance>) -> Result<(), CustomizerError> {
        if let Some(hook) = &self.set {
            hook(service);
        }
        Ok(())
    }
}

impl fmt::Debug for CallbackCustomizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackCustomizer")
            .field("adding", &self.adding.is_some())
            .field("added", &self.added.is_some())
            .field("modified", &self.modified.is_some())
            .field("removed", &self.removed.is_some())
            .field("set", &self.set.is_some())
            .finish()
    }
}
