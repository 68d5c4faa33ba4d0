//! Notification Bus
//!
//! Every lifecycle notification is delivered on three channels, always in
//! this order:
//!
//! ```text
//!   Nerdbox::trigger(event)
//!        │
//!        ├─► 1. instance channel, bare name        ("opened")
//!        ├─► 2. instance channel, namespaced name  ("nerdbox.opened")
//!        └─► 3. page-wide bus                      ("nerdbox.opened")
//!                 ├─ registered listeners
//!                 └─ broadcast subscribers
//! ```
//!
//! Each notification carries the originating instance, so a page-wide
//! listener can tell instances apart. Listeners are called synchronously,
//! outside of any lock, and may call back into the instance.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::lightbox::Nerdbox;

/// Namespace prefixed to event names on the page-wide channel
pub const NAMESPACE: &str = "nerdbox";

/// Default capacity of the broadcast channel
const DEFAULT_BROADCAST_CAPACITY: usize = 64;

/// Lifecycle notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleEvent {
    /// Panel mounted and triggers bound
    Initialized,
    /// Panel visible
    Opened,
    /// Content swapped in
    Loaded,
    /// Panel hidden, content about to be cleared
    Closed,
}

impl LifecycleEvent {
    /// Every event, in lifecycle order
    pub const ALL: [Self; 4] = [Self::Initialized, Self::Opened, Self::Loaded, Self::Closed];

    /// Bare name
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Opened => "opened",
            Self::Loaded => "loaded",
            Self::Closed => "closed",
        }
    }

    /// Namespaced name (`nerdbox.<name>`)
    #[must_use]
    pub fn namespaced(self) -> &'static str {
        match self {
            Self::Initialized => "nerdbox.initialized",
            Self::Opened => "nerdbox.opened",
            Self::Loaded => "nerdbox.loaded",
            Self::Closed => "nerdbox.closed",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespaced())
    }
}

/// Unrecognized event name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown lifecycle event: {0}")]
pub struct UnknownEvent(pub String);

/// Which form an event name was registered under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameForm {
    /// `opened`
    Bare,
    /// `nerdbox.opened`
    Namespaced,
}

/// Event plus the form of its name
///
/// Instance listeners registered under the bare name run before those
/// registered under the namespaced name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventName {
    /// The lifecycle event
    pub event: LifecycleEvent,
    /// The name form
    pub form: NameForm,
}

impl EventName {
    /// Bare form of `event`
    #[must_use]
    pub fn bare(event: LifecycleEvent) -> Self {
        Self {
            event,
            form: NameForm::Bare,
        }
    }

    /// Namespaced form of `event`
    #[must_use]
    pub fn namespaced(event: LifecycleEvent) -> Self {
        Self {
            event,
            form: NameForm::Namespaced,
        }
    }
}

impl From<LifecycleEvent> for EventName {
    fn from(event: LifecycleEvent) -> Self {
        Self::bare(event)
    }
}

impl FromStr for EventName {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, form) = match s
            .strip_prefix(NAMESPACE)
            .and_then(|rest| rest.strip_prefix('.'))
        {
            Some(rest) => (rest, NameForm::Namespaced),
            None => (s, NameForm::Bare),
        };
        LifecycleEvent::ALL
            .into_iter()
            .find(|event| event.name() == name)
            .map(|event| Self { event, form })
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}

impl FromStr for LifecycleEvent {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<EventName>().map(|name| name.event)
    }
}

/// One emitted notification
#[derive(Clone)]
pub struct Notification {
    /// What happened
    pub event: LifecycleEvent,
    /// The instance it happened to
    pub instance: Nerdbox,
}

impl fmt::Debug for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notification")
            .field("event", &self.event)
            .field("instance", &self.instance.id())
            .finish()
    }
}

/// Listener callback
pub type Listener = Arc<dyn Fn(&Notification) + Send + Sync>;

type Registrations = RwLock<Vec<(LifecycleEvent, Listener)>>;

fn snapshot(registrations: &Registrations, event: LifecycleEvent) -> Vec<Listener> {
    registrations
        .read()
        .iter()
        .filter(|(registered, _)| *registered == event)
        .map(|(_, listener)| Arc::clone(listener))
        .collect()
}

/// Per-instance listeners
#[derive(Default)]
pub struct InstanceChannel {
    bare: Registrations,
    namespaced: Registrations,
}

impl InstanceChannel {
    /// Register `listener` for every future emission of `name`
    pub fn subscribe(&self, name: EventName, listener: Listener) {
        let registrations = match name.form {
            NameForm::Bare => &self.bare,
            NameForm::Namespaced => &self.namespaced,
        };
        registrations.write().push((name.event, listener));
    }

    fn dispatch(&self, notification: &Notification) {
        for listener in snapshot(&self.bare, notification.event) {
            listener(notification);
        }
        for listener in snapshot(&self.namespaced, notification.event) {
            listener(notification);
        }
    }
}

struct BusInner {
    listeners: Registrations,
    sender: broadcast::Sender<Notification>,
}

/// Page-wide notification channel
///
/// Cheap to clone; clones share listeners and subscribers.
#[derive(Clone)]
pub struct NotificationBus {
    inner: Arc<BusInner>,
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(DEFAULT_BROADCAST_CAPACITY)
    }
}

impl NotificationBus {
    /// Create a bus whose broadcast stream buffers `capacity` notifications
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(BusInner {
                listeners: RwLock::new(Vec::new()),
                sender,
            }),
        }
    }

    /// Register `listener` for every future emission of `event` on any instance
    pub fn on(&self, event: impl Into<EventName>, listener: Listener) {
        self.inner.listeners.write().push((event.into().event, listener));
    }

    /// Receive every future notification as a stream
    ///
    /// Slow receivers observe `RecvError::Lagged` rather than blocking emitters.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.inner.sender.subscribe()
    }

    /// Deliver `notification` on the instance channel, then page-wide
    pub(crate) fn emit(&self, channel: &InstanceChannel, notification: &Notification) {
        tracing::debug!(
            instance_id = %notification.instance.id(),
            event = %notification.event,
            "Emitting notification"
        );
        channel.dispatch(notification);
        for listener in snapshot(&self.inner.listeners, notification.event) {
            listener(notification);
        }
        // No subscribers is fine
        let _ = self.inner.sender.send(notification.clone());
    }
}
