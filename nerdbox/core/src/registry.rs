//! Instance Registry
//!
//! Tracks the instance that most recently *finished* opening. The record is
//! written when an instance's fade-in completes, never when `open` is
//! called, so a close issued mid-animation still targets whatever was open
//! before, and overlapping opens leave the record on whichever fade-in
//! finished last.
//!
//! # Architecture
//!
//! ```text
//!                    InstanceRegistry
//!           ┌──────────────────────────────────┐
//!           │ Option<WeakNerdbox>  (last open) │
//!           │ Arc<Options>         (defaults)  │
//!           │   - wrapped in Arc<RwLock<>>     │
//!           └────────────────┬─────────────────┘
//!                            │ current()
//!              ┌─────────────┴─────────────┐
//!              ▼                           ▼
//!       Current::Open(Nerdbox)    Current::Defaults(Arc<Options>)
//! ```
//!
//! The record is a weak reference because instances hold the page's shared
//! services, registry included; a strong record would form a cycle. The
//! owning `Page` keeps every instance alive, so while the page lives the
//! record always upgrades.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::Options;
use crate::lightbox::{CloseTicket, Nerdbox, WeakNerdbox};

struct RegistryState {
    open: Option<WeakNerdbox>,
    defaults: Arc<Options>,
}

/// Tracks the most recently opened instance
///
/// Cheap to clone; clones share the record.
#[derive(Clone)]
pub struct InstanceRegistry {
    state: Arc<RwLock<RegistryState>>,
}

/// What [`InstanceRegistry::current`] returns
///
/// A null object: callers can always read options without checking whether
/// anything was ever opened.
#[derive(Debug, Clone)]
pub enum Current {
    /// The most recently opened instance
    Open(Nerdbox),
    /// Nothing recorded; only the defaults are available
    Defaults(Arc<Options>),
}

impl Current {
    /// Options of the current instance, or the defaults
    #[must_use]
    pub fn options(&self) -> &Options {
        match self {
            Self::Open(instance) => instance.options(),
            Self::Defaults(defaults) => defaults,
        }
    }

    /// The current instance, if any
    #[must_use]
    pub fn instance(&self) -> Option<&Nerdbox> {
        match self {
            Self::Open(instance) => Some(instance),
            Self::Defaults(_) => None,
        }
    }
}

impl InstanceRegistry {
    /// Create an empty registry falling back to `defaults`
    #[must_use]
    pub fn new(defaults: Arc<Options>) -> Self {
        Self {
            state: Arc::new(RwLock::new(RegistryState {
                open: None,
                defaults,
            })),
        }
    }

    /// Record `instance` as current, replacing any previous record
    pub fn record_opened(&self, instance: &Nerdbox) {
        self.state.write().open = Some(instance.downgrade());
        tracing::debug!(instance_id = %instance.id(), "Recorded current instance");
    }

    /// The current instance, or the defaults
    #[must_use]
    pub fn current(&self) -> Current {
        let state = self.state.read();
        match state.open.as_ref().and_then(WeakNerdbox::upgrade) {
            Some(instance) => Current::Open(instance),
            None => Current::Defaults(Arc::clone(&state.defaults)),
        }
    }

    /// Whether nothing is recorded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current().instance().is_none()
    }

    /// Close the current instance
    ///
    /// Returns `None` without doing anything when nothing is recorded. The
    /// record itself is kept; closing again closes the same instance again.
    pub fn close(&self) -> Option<CloseTicket> {
        let current = self.current();
        let Some(instance) = current.instance() else {
            tracing::debug!("Close requested with no instance recorded");
            return None;
        };
        Some(instance.close())
    }

    /// Replace the fallback defaults
    pub(crate) fn set_defaults(&self, defaults: Arc<Options>) {
        self.state.write().defaults = defaults;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_registry_reads_defaults() {
        let registry = InstanceRegistry::new(Arc::new(Options::default()));
        assert!(registry.is_empty());

        let current = registry.current();
        assert!(current.instance().is_none());
        assert_eq!(current.options().fade_duration_ms, 200);
    }

    #[test]
    fn test_close_with_nothing_recorded_is_noop() {
        let registry = InstanceRegistry::new(Arc::new(Options::default()));
        assert!(registry.close().is_none());
    }

    #[test]
    fn test_set_defaults_changes_fallback() {
        let registry = InstanceRegistry::new(Arc::new(Options::default()));
        let defaults = Options {
            fade_duration_ms: 0,
            ..Options::default()
        };
        registry.set_defaults(Arc::new(defaults));
        assert_eq!(registry.current().options().fade_duration_ms, 0);
    }
}
