//! Page
//!
//! A [`Page`] owns everything the lightbox instances on one document share:
//! the collaborators, the configuration provider, the instance registry and
//! the notification bus. Nothing is process-wide; tests build as many pages
//! as they like.
//!
//! # Architecture
//!
//! ```text
//!                               Page
//!   ┌────────────────────────────────────────────────────────────┐
//!   │  instances: Vec<Nerdbox>         (construction order)      │
//!   │  services:  Arc<Services> ───────────────┐                 │
//!   └──────────────────────────────────────────┼─────────────────┘
//!                                              ▼
//!   ┌────────────────────────────────────────────────────────────┐
//!   │ Document │ FadeEffect │ ContentResolver │ ConfigProvider   │
//!   │ InstanceRegistry │ NotificationBus │ epochs per panel      │
//!   └────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`Page::dispatch`] is the event router: clicks on a panel's close control
//! or overlay close the current instance, clicks on a trigger open the first
//! instance bound to it, and Escape closes the current instance.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::config::{ConfigProvider, NerdboxConfig, OptionsOverrides};
use crate::content::{ContentInput, ContentResolver};
use crate::events::{Key, UiEvent};
use crate::lightbox::{CloseTicket, InstanceArgs, Nerdbox, OpenTicket};
use crate::notify::{EventName, Notification, NotificationBus};
use crate::registry::{Current, InstanceRegistry};
use crate::surface::{
    Document, ElementHandle, FadeEffect, Fetcher, HeadlessDocument, StaticFetcher, TimedFade,
};

/// Shared collaborators and state of one page
pub(crate) struct Services {
    pub(crate) document: Arc<dyn Document>,
    pub(crate) fade: Arc<dyn FadeEffect>,
    pub(crate) resolver: ContentResolver,
    pub(crate) registry: InstanceRegistry,
    pub(crate) bus: NotificationBus,
    config: RwLock<ConfigProvider>,
    epochs: DashMap<String, PanelEpoch>,
}

/// What the latest call on a panel asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PanelIntent {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy)]
struct PanelEpoch {
    epoch: u64,
    intent: PanelIntent,
}

impl Services {
    /// Current configuration provider
    pub(crate) fn config(&self) -> ConfigProvider {
        self.config.read().clone()
    }

    /// Start a new epoch on `panel`, invalidating pending work on it
    pub(crate) fn advance_epoch(&self, panel: &str, intent: PanelIntent) -> u64 {
        let mut latest = self
            .epochs
            .entry(panel.to_string())
            .or_insert(PanelEpoch {
                epoch: 0,
                intent,
            });
        latest.epoch += 1;
        latest.intent = intent;
        latest.epoch
    }

    /// Run `f` only if `epoch` is still the latest on `panel`
    ///
    /// The epoch cannot advance while `f` runs. `f` must not start or close
    /// an instance.
    pub(crate) fn if_current_epoch<T>(
        &self,
        panel: &str,
        epoch: u64,
        f: impl FnOnce() -> T,
    ) -> Option<T> {
        let latest = self.epochs.get(panel)?;
        if latest.epoch != epoch {
            return None;
        }
        let result = f();
        drop(latest);
        Some(result)
    }

    /// Run `f` only if the latest call on `panel` asked for `intent`
    ///
    /// Same locking rules as [`Services::if_current_epoch`].
    pub(crate) fn if_latest_intent<T>(
        &self,
        panel: &str,
        intent: PanelIntent,
        f: impl FnOnce() -> T,
    ) -> Option<T> {
        let latest = self.epochs.get(panel)?;
        if latest.intent != intent {
            return None;
        }
        let result = f();
        drop(latest);
        Some(result)
    }
}

/// What [`Page::dispatch`] did with an event
#[derive(Debug)]
pub enum Dispatch {
    /// A trigger opened an instance
    Opened(OpenTicket),
    /// The current instance is closing (`None` if nothing was recorded)
    Closed(Option<CloseTicket>),
    /// The event had no lightbox meaning
    Ignored,
}

/// Builder for [`Page`]
///
/// Unset collaborators default to the headless implementations.
#[derive(Default)]
pub struct PageBuilder {
    document: Option<Arc<dyn Document>>,
    fade: Option<Arc<dyn FadeEffect>>,
    fetcher: Option<Arc<dyn Fetcher>>,
    config: Option<NerdboxConfig>,
}

impl PageBuilder {
    /// Set the document
    #[must_use]
    pub fn document(mut self, document: Arc<dyn Document>) -> Self {
        self.document = Some(document);
        self
    }

    /// Set the fade effect
    #[must_use]
    pub fn fade(mut self, fade: Arc<dyn FadeEffect>) -> Self {
        self.fade = Some(fade);
        self
    }

    /// Set the fetcher
    #[must_use]
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Set the configuration
    #[must_use]
    pub fn config(mut self, config: NerdboxConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the page
    #[must_use]
    pub fn build(self) -> Page {
        let document: Arc<dyn Document> = self
            .document
            .unwrap_or_else(|| Arc::new(HeadlessDocument::new()));
        let fade = self
            .fade
            .unwrap_or_else(|| Arc::new(TimedFade::new(Arc::clone(&document))));
        let fetcher = self
            .fetcher
            .unwrap_or_else(|| Arc::new(StaticFetcher::new()));
        let config = self.config.unwrap_or_default();
        let provider = config.provider();

        tracing::debug!(
            source = %config.source(),
            fade_duration_ms = provider.defaults().fade_duration_ms,
            "Page created"
        );

        Page {
            services: Arc::new(Services {
                resolver: ContentResolver::new(Arc::clone(&document), fetcher),
                registry: InstanceRegistry::new(provider.defaults()),
                bus: NotificationBus::default(),
                config: RwLock::new(provider),
                epochs: DashMap::new(),
                document,
                fade,
            }),
            instances: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

/// One document's lightbox state
///
/// Cheap to clone; clones share everything.
#[derive(Clone)]
pub struct Page {
    services: Arc<Services>,
    instances: Arc<RwLock<Vec<Nerdbox>>>,
}

impl Page {
    /// Start building a page
    #[must_use]
    pub fn builder() -> PageBuilder {
        PageBuilder::default()
    }

    /// Page with the headless collaborators and `config`
    #[must_use]
    pub fn headless(config: NerdboxConfig) -> Self {
        Self::builder().config(config).build()
    }

    /// The document
    #[must_use]
    pub fn document(&self) -> &Arc<dyn Document> {
        &self.services.document
    }

    /// The instance registry
    #[must_use]
    pub fn registry(&self) -> &InstanceRegistry {
        &self.services.registry
    }

    /// Current configuration provider
    #[must_use]
    pub fn config(&self) -> ConfigProvider {
        self.services.config()
    }

    /// Replace the defaults for instances created from now on
    ///
    /// Existing instances keep their snapshot.
    pub fn set_defaults(&self, overrides: &OptionsOverrides) {
        let provider = self.services.config().with_defaults(overrides);
        self.services.registry.set_defaults(provider.defaults());
        *self.services.config.write() = provider;
    }

    /// Instances in construction order
    ///
    /// The page holds every instance it created, including those from
    /// [`Page::open`], for as long as the page lives. Instances are never
    /// destroyed.
    #[must_use]
    pub fn instances(&self) -> Vec<Nerdbox> {
        self.instances.read().clone()
    }

    /// Create an instance
    pub fn create(&self, args: impl Into<InstanceArgs>) -> Nerdbox {
        let nerdbox = Nerdbox::new(Arc::clone(&self.services), args.into());
        self.instances.write().push(nerdbox.clone());
        nerdbox
    }

    /// Create a fresh instance from `overrides` and open it with `input`
    ///
    /// Each call adds one instance to [`Page::instances`] that stays there
    /// for the page's lifetime. Must be called from within a Tokio runtime.
    pub fn open(&self, input: impl Into<ContentInput>, overrides: OptionsOverrides) -> OpenTicket {
        self.create(overrides).open(input)
    }

    /// Close the current instance; `None` if nothing was ever opened
    ///
    /// Must be called from within a Tokio runtime.
    pub fn close(&self) -> Option<CloseTicket> {
        self.services.registry.close()
    }

    /// The current instance, or the defaults
    #[must_use]
    pub fn current(&self) -> Current {
        self.services.registry.current()
    }

    /// Register a page-wide listener
    pub fn on<F>(&self, event: impl Into<EventName>, listener: F)
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.services.bus.on(event, Arc::new(listener));
    }

    /// Receive every notification on this page as a stream
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.services.bus.subscribe()
    }

    /// Route a platform event
    ///
    /// Must be called from within a Tokio runtime.
    pub fn dispatch(&self, event: UiEvent) -> Dispatch {
        match event {
            UiEvent::Click { target } => self.dispatch_click(target),
            UiEvent::KeyUp { key: Key::Escape } => {
                if self.current().options().close_on_escape {
                    tracing::debug!("Escape pressed, closing current instance");
                    Dispatch::Closed(self.close())
                } else {
                    Dispatch::Ignored
                }
            }
            UiEvent::KeyUp { key: Key::Other(_) } => Dispatch::Ignored,
        }
    }

    fn dispatch_click(&self, target: ElementHandle) -> Dispatch {
        let document = &self.services.document;
        let dismiss = self.current().options().dismiss_selector();
        if document.closest(target, &dismiss).is_some() {
            tracing::debug!(target = %target, "Dismiss control clicked");
            return Dispatch::Closed(self.close());
        }

        let instances = self.instances();
        for nerdbox in instances {
            if let Some(trigger) = nerdbox.matching_trigger(target) {
                let href = document.attribute(trigger, "href").unwrap_or_default();
                tracing::debug!(
                    instance_id = %nerdbox.id(),
                    trigger = %trigger,
                    href = %href,
                    "Trigger activated"
                );
                return Dispatch::Opened(nerdbox.open(href));
            }
        }
        Dispatch::Ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NerdboxConfig;

    #[test]
    fn test_epochs_are_per_panel() {
        let page = Page::headless(NerdboxConfig::new());
        let services = &page.services;

        let a1 = services.advance_epoch("#box-a", PanelIntent::Open);
        let b1 = services.advance_epoch("#box-b", PanelIntent::Open);
        assert_eq!(services.if_current_epoch("#box-a", a1, || "ran"), Some("ran"));

        let a2 = services.advance_epoch("#box-a", PanelIntent::Closed);
        assert_eq!(services.if_current_epoch("#box-a", a1, || "ran"), None);
        assert_eq!(services.if_current_epoch("#box-a", a2, || "ran"), Some("ran"));
        assert_eq!(services.if_current_epoch("#box-b", b1, || "ran"), Some("ran"));
        assert_eq!(services.if_current_epoch("#box-c", 1, || "ran"), None);
    }

    #[test]
    fn test_latest_intent_follows_last_call() {
        let page = Page::headless(NerdboxConfig::new());
        let services = &page.services;

        assert_eq!(services.if_latest_intent("#box-a", PanelIntent::Open, || "ran"), None);

        services.advance_epoch("#box-a", PanelIntent::Closed);
        assert_eq!(services.if_latest_intent("#box-a", PanelIntent::Open, || "ran"), None);

        services.advance_epoch("#box-a", PanelIntent::Open);
        assert_eq!(
            services.if_latest_intent("#box-a", PanelIntent::Open, || "ran"),
            Some("ran")
        );
        assert_eq!(
            services.if_latest_intent("#box-a", PanelIntent::Closed, || "ran"),
            None
        );
    }

    #[tokio::test]
    async fn test_set_defaults_only_affects_new_instances() {
        let page = Page::headless(NerdboxConfig::new());
        let before = page.create(".a");

        page.set_defaults(&OptionsOverrides::new().with_fade_duration_ms(0));
        let after = page.create(".b");

        assert_eq!(before.options().fade_duration_ms, 200);
        assert_eq!(after.options().fade_duration_ms, 0);
        assert_eq!(page.current().options().fade_duration_ms, 0);
        assert_eq!(page.instances(), vec![before, after]);
    }

    #[tokio::test]
    async fn test_unrelated_events_are_ignored() {
        let page = Page::headless(NerdboxConfig::new());
        let body = page.document().body();
        assert!(matches!(page.dispatch(UiEvent::click(body)), Dispatch::Ignored));
        assert!(matches!(page.dispatch(UiEvent::key_up(13)), Dispatch::Ignored));
        assert!(matches!(
            page.dispatch(UiEvent::key_up(27)),
            Dispatch::Closed(None)
        ));
    }
}
