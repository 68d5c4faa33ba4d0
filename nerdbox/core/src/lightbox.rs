//! Lifecycle Controller
//!
//! A [`Nerdbox`] is one lightbox instance: a trigger selector, an optional
//! delegate, and a snapshot of options. Its panel moves through
//!
//! ```text
//!   ┌────────┐  open   ┌─────────┐ fade-in done ┌──────┐  close  ┌─────────┐
//!   │ Closed ├────────►│ Opening ├─────────────►│ Open ├────────►│ Closing │
//!   └───▲────┘         └─────────┘              └──────┘         └────┬────┘
//!       └─────────────────────── fade-out done ───────────────────────┘
//! ```
//!
//! `open` does its visible work synchronously (classes reset, loader
//! injected) and then starts two independent completions on the Tokio
//! runtime: the fade-in, which emits `opened` and records the instance as
//! current, and content resolution, which swaps the payload in and emits
//! `loaded`. Either may finish first.
//!
//! # Supersession
//!
//! Each panel selector carries an epoch that every `open` and `close`
//! advances. A resolution that completes after its epoch moved on is
//! discarded: nothing is written and `loaded` is not emitted. The fetch
//! itself is not aborted.
//!
//! A close whose fade-out finishes after a later `open` on the same panel
//! does not leave the panel hidden: it neither marks the instance closed
//! nor clears the content, and the panel is shown again.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::config::{Options, OptionsOverrides};
use crate::content::{ContentInput, ContentRef, Payload};
use crate::notify::{EventName, InstanceChannel, LifecycleEvent, Notification, UnknownEvent};
use crate::page::{PanelIntent, Services};
use crate::surface::ElementHandle;

/// Trigger selector used when none is given
pub const DEFAULT_SELECTOR: &str = ".nerdbox";

// =============================================================================
// Identity
// =============================================================================

/// Unique identifier for an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(u64);

impl InstanceId {
    /// Create a new unique instance ID
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw numeric value
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nerdbox-{}", self.0)
    }
}

// =============================================================================
// Construction Arguments
// =============================================================================

/// Constructor arguments
///
/// The accepted call shapes are expressed as `From` impls:
///
/// | Shape                              | Meaning                          |
/// |------------------------------------|----------------------------------|
/// | `".gallery a"`                     | selector                         |
/// | `(".item", "#list")`               | selector, delegate               |
/// | `(".item", "#list", overrides)`    | selector, delegate, options      |
/// | `(".item", overrides)`             | selector, options                |
/// | `overrides`                        | options, default selector        |
/// | `InstanceArgs::default()`          | default selector, no options     |
#[derive(Debug, Clone, Default)]
pub struct InstanceArgs {
    /// Trigger selector; [`DEFAULT_SELECTOR`] when `None`
    pub selector: Option<String>,
    /// Ancestor selector for delegated trigger handling
    pub delegate: Option<String>,
    /// Options laid over the defaults
    pub overrides: OptionsOverrides,
}

impl InstanceArgs {
    /// Arguments with a trigger selector
    #[must_use]
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            ..Self::default()
        }
    }

    /// Set delegate selector
    #[must_use]
    pub fn with_delegate(mut self, delegate: impl Into<String>) -> Self {
        self.delegate = Some(delegate.into());
        self
    }

    /// Set option overrides
    #[must_use]
    pub fn with_overrides(mut self, overrides: OptionsOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

impl From<&str> for InstanceArgs {
    fn from(selector: &str) -> Self {
        Self::new(selector)
    }
}

impl From<(&str, &str)> for InstanceArgs {
    fn from((selector, delegate): (&str, &str)) -> Self {
        Self::new(selector).with_delegate(delegate)
    }
}

impl From<(&str, &str, OptionsOverrides)> for InstanceArgs {
    fn from((selector, delegate, overrides): (&str, &str, OptionsOverrides)) -> Self {
        Self::new(selector)
            .with_delegate(delegate)
            .with_overrides(overrides)
    }
}

impl From<(&str, OptionsOverrides)> for InstanceArgs {
    fn from((selector, overrides): (&str, OptionsOverrides)) -> Self {
        Self::new(selector).with_overrides(overrides)
    }
}

impl From<OptionsOverrides> for InstanceArgs {
    fn from(overrides: OptionsOverrides) -> Self {
        Self::default().with_overrides(overrides)
    }
}

// =============================================================================
// State and Completions
// =============================================================================

/// Panel lifecycle state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Hidden (initial and terminal)
    #[default]
    Closed,
    /// Fading in
    Opening,
    /// Visible
    Open,
    /// Fading out
    Closing,
}

/// How content resolution for one `open` ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Payload displayed and `loaded` emitted
    Loaded,
    /// A later `open` or `close` took over the panel; nothing written
    Superseded,
    /// Resolution failed; the loader stays up
    Failed(String),
}

/// Completions of one `open` call
///
/// Both handles resolve exactly once. Dropping the ticket does not cancel
/// anything.
#[derive(Debug)]
pub struct OpenTicket {
    /// Fade-in finished, `opened` emitted, instance recorded as current
    pub opened: JoinHandle<()>,
    /// Content resolution finished
    pub loaded: JoinHandle<LoadOutcome>,
}

impl OpenTicket {
    /// Wait for both completions
    pub async fn settled(self) -> LoadOutcome {
        let (opened, loaded) = tokio::join!(self.opened, self.loaded);
        if let Err(e) = opened {
            tracing::warn!(error = %e, "Fade-in task failed");
        }
        loaded.unwrap_or_else(|e| LoadOutcome::Failed(e.to_string()))
    }
}

/// Completion of one `close` call
#[derive(Debug)]
pub struct CloseTicket {
    /// Fade-out finished, `closed` emitted, content cleared
    pub closed: JoinHandle<()>,
}

impl CloseTicket {
    /// Wait for the close to finish
    pub async fn wait(self) {
        if let Err(e) = self.closed.await {
            tracing::warn!(error = %e, "Fade-out task failed");
        }
    }
}

// =============================================================================
// Instance
// =============================================================================

/// Triggers an instance reacts to, fixed at construction
#[derive(Debug)]
enum Bindings {
    /// Elements that matched the selector at construction
    Direct(Vec<ElementHandle>),
    /// Delegate elements present at construction; any matching descendant triggers
    Delegated(Vec<ElementHandle>),
}

struct Inner {
    id: InstanceId,
    selector: String,
    delegate: Option<String>,
    options: Options,
    state: RwLock<LifecycleState>,
    bindings: Bindings,
    channel: InstanceChannel,
    services: Arc<Services>,
}

/// One lightbox instance
///
/// Cheap to clone; clones are the same instance.
#[derive(Clone)]
pub struct Nerdbox {
    inner: Arc<Inner>,
}

/// Non-owning reference held by the registry
#[derive(Clone)]
pub(crate) struct WeakNerdbox(Weak<Inner>);

impl WeakNerdbox {
    pub(crate) fn upgrade(&self) -> Option<Nerdbox> {
        self.0.upgrade().map(|inner| Nerdbox { inner })
    }
}

impl fmt::Debug for Nerdbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Nerdbox")
            .field("id", &self.inner.id)
            .field("selector", &self.inner.selector)
            .field("delegate", &self.inner.delegate)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl PartialEq for Nerdbox {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Nerdbox {}

impl Nerdbox {
    /// Build an instance: mount the panel if needed, bind triggers, emit `initialized`
    pub(crate) fn new(services: Arc<Services>, args: InstanceArgs) -> Self {
        let options = services.config().resolve(&args.overrides);
        let selector = args.selector.unwrap_or_else(|| DEFAULT_SELECTOR.to_string());
        let document = &services.document;

        if document.query_first(&options.panel_selector).is_none() {
            document.append_markup(document.body(), &options.panel_template);
            tracing::debug!(panel = %options.panel_selector, "Mounted panel");
        }

        let bindings = match &args.delegate {
            Some(delegate) => Bindings::Delegated(document.query(delegate)),
            None => Bindings::Direct(document.query(&selector)),
        };

        let nerdbox = Self {
            inner: Arc::new(Inner {
                id: InstanceId::new(),
                selector,
                delegate: args.delegate,
                options,
                state: RwLock::new(LifecycleState::Closed),
                bindings,
                channel: InstanceChannel::default(),
                services,
            }),
        };

        tracing::info!(
            instance_id = %nerdbox.id(),
            selector = %nerdbox.inner.selector,
            delegate = ?nerdbox.inner.delegate,
            panel = %nerdbox.options().panel_selector,
            "Lightbox instance created"
        );
        nerdbox.trigger(LifecycleEvent::Initialized);
        nerdbox
    }

    /// Instance identifier
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.inner.id
    }

    /// Trigger selector
    #[must_use]
    pub fn selector(&self) -> &str {
        &self.inner.selector
    }

    /// Delegate selector, if triggers are delegated
    #[must_use]
    pub fn delegate(&self) -> Option<&str> {
        self.inner.delegate.as_deref()
    }

    /// Options snapshot taken at construction
    #[must_use]
    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.inner.state.read()
    }

    /// Register `listener` on this instance
    ///
    /// Listeners for the bare name run before listeners for the namespaced
    /// name; both run before page-wide listeners.
    pub fn on<F>(&self, event: impl Into<EventName>, listener: F)
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.inner.channel.subscribe(event.into(), Arc::new(listener));
    }

    /// Register `listener` by event name (`"opened"` or `"nerdbox.opened"`)
    ///
    /// # Errors
    ///
    /// Returns [`UnknownEvent`] if `name` is not a lifecycle event.
    pub fn on_named<F>(&self, name: &str, listener: F) -> Result<(), UnknownEvent>
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        let event: EventName = name.parse()?;
        self.on(event, listener);
        Ok(())
    }

    /// Emit `event` on this instance's channel and then page-wide
    pub fn trigger(&self, event: LifecycleEvent) {
        let notification = Notification {
            event,
            instance: self.clone(),
        };
        self.inner
            .services
            .bus
            .emit(&self.inner.channel, &notification);
    }

    /// Open the panel with `input`
    ///
    /// Classes are reset and the loader is in the content area before this
    /// returns. Must be called from within a Tokio runtime.
    pub fn open(&self, input: impl Into<ContentInput>) -> OpenTicket {
        let options = self.options();
        let services = &self.inner.services;
        let document = &services.document;

        let reference = ContentRef::classify(input, &options.image_extensions);
        let epoch = services.advance_epoch(&options.panel_selector, PanelIntent::Open);
        self.set_state(LifecycleState::Opening);

        let panel = document.query_first(&options.panel_selector);
        if let Some(panel) = panel {
            let mut classes = options.classes.as_slice().to_vec();
            classes.push(options.loading_class.clone());
            document.clear_classes(panel);
            document.add_classes(panel, &classes);
        }
        if let Some(content) = document.query_first(&options.content_area_selector()) {
            document.set_inner_html(content, &options.loader_template);
        }

        tracing::debug!(
            instance_id = %self.id(),
            reference = %reference,
            epoch,
            "Opening"
        );

        let opened = tokio::spawn({
            let this = self.clone();
            async move {
                if let Some(panel) = panel {
                    let duration = this.options().fade_duration();
                    this.inner.services.fade.fade_in(panel, duration).await;
                }
                this.finish_open();
            }
        });
        let loaded = tokio::spawn({
            let this = self.clone();
            async move { this.load(reference, epoch).await }
        });

        OpenTicket { opened, loaded }
    }

    /// Close the panel
    ///
    /// Safe to call in any state, including when never opened. Must be
    /// called from within a Tokio runtime.
    pub fn close(&self) -> CloseTicket {
        let options = self.options();
        let services = &self.inner.services;

        let epoch = services.advance_epoch(&options.panel_selector, PanelIntent::Closed);
        self.set_state(LifecycleState::Closing);
        let panel = services.document.query_first(&options.panel_selector);

        tracing::debug!(instance_id = %self.id(), epoch, "Closing");

        let closed = tokio::spawn({
            let this = self.clone();
            async move {
                if let Some(panel) = panel {
                    let duration = this.options().fade_duration();
                    this.inner.services.fade.fade_out(panel, duration).await;
                }
                this.finish_close(epoch);
            }
        });
        CloseTicket { closed }
    }

    fn set_state(&self, state: LifecycleState) {
        let previous = std::mem::replace(&mut *self.inner.state.write(), state);
        if previous != state {
            tracing::debug!(
                instance_id = %self.id(),
                from = ?previous,
                to = ?state,
                "State transition"
            );
        }
    }

    fn finish_open(&self) {
        {
            let mut state = self.inner.state.write();
            if *state == LifecycleState::Opening {
                *state = LifecycleState::Open;
            }
        }
        self.inner.services.registry.record_opened(self);
        self.trigger(LifecycleEvent::Opened);
    }

    async fn load(&self, reference: ContentRef, epoch: u64) -> LoadOutcome {
        let services = &self.inner.services;
        let panel_selector = &self.options().panel_selector;

        let payload = match services.resolver.resolve(&reference).await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(
                    instance_id = %self.id(),
                    reference = %reference,
                    error = %e,
                    "Content resolution failed, loader stays displayed"
                );
                return LoadOutcome::Failed(e.to_string());
            }
        };

        let applied =
            services.if_current_epoch(panel_selector, epoch, || self.apply_payload(payload));
        if applied.is_none() {
            tracing::debug!(
                instance_id = %self.id(),
                reference = %reference,
                epoch,
                "Discarding superseded content"
            );
            return LoadOutcome::Superseded;
        }

        self.trigger(LifecycleEvent::Loaded);
        LoadOutcome::Loaded
    }

    fn apply_payload(&self, payload: Payload) {
        let options = self.options();
        let document = &self.inner.services.document;

        if let Some(content) = document.query_first(&options.content_area_selector()) {
            match payload {
                Payload::Markup(markup) => document.set_inner_html(content, &markup),
                Payload::Element(element) => {
                    document.empty(content);
                    document.append_element(content, element);
                }
            }
        }
        if let Some(panel) = document.query_first(&options.panel_selector) {
            document.remove_class(panel, &options.loading_class);
        }
    }

    fn finish_close(&self, epoch: u64) {
        let services = &self.inner.services;
        let panel_selector = &self.options().panel_selector;

        let current = services
            .if_current_epoch(panel_selector, epoch, || self.set_state(LifecycleState::Closed))
            .is_some();
        if !current {
            // The fade just hid a panel that a later open is showing
            services.if_latest_intent(panel_selector, PanelIntent::Open, || {
                if let Some(panel) = services.document.query_first(panel_selector) {
                    services.document.set_visible(panel, true);
                }
            });
        }
        self.trigger(LifecycleEvent::Closed);

        // A listener may have reopened the panel; leave its content alone
        let cleared = services.if_current_epoch(panel_selector, epoch, || {
            if let Some(content) = services
                .document
                .query_first(&self.options().content_area_selector())
            {
                services.document.empty(content);
            }
        });
        if !current || cleared.is_none() {
            tracing::debug!(instance_id = %self.id(), epoch, "Close superseded by a later call");
        }
    }

    /// The trigger `target` activates for this instance, if any
    ///
    /// Direct bindings accept `target` or an ancestor that was bound at
    /// construction. Delegated bindings accept the nearest ancestor-or-self
    /// matching the selector inside a delegate element.
    pub(crate) fn matching_trigger(&self, target: ElementHandle) -> Option<ElementHandle> {
        let document = &self.inner.services.document;
        let mut current = Some(target);

        match &self.inner.bindings {
            Bindings::Direct(bound) => {
                while let Some(candidate) = current {
                    if bound.contains(&candidate) {
                        return Some(candidate);
                    }
                    current = document.parent(candidate);
                }
                None
            }
            Bindings::Delegated(roots) => {
                while let Some(candidate) = current {
                    if roots.contains(&candidate) {
                        return None;
                    }
                    if document.matches(candidate, &self.inner.selector)
                        && roots.iter().any(|root| document.contains(*root, candidate))
                    {
                        return Some(candidate);
                    }
                    current = document.parent(candidate);
                }
                None
            }
        }
    }

    pub(crate) fn downgrade(&self) -> WeakNerdbox {
        WeakNerdbox(Arc::downgrade(&self.inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Page;
    use crate::config::NerdboxConfig;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    const TRIGGERS: &str = r##"<a class="nerdbox" href="#fragment">open</a><div id="fragment">Nerdbox Content</div>"##;

    fn instant_page(markup: &str) -> Page {
        let mut config = NerdboxConfig::new();
        config.apply_cli(&OptionsOverrides::new().with_fade_duration_ms(0));
        let page = Page::headless(config);
        page.document().append_markup(page.document().body(), markup);
        page
    }

    #[test]
    fn test_instance_ids_are_unique() {
        let a = InstanceId::new();
        let b = InstanceId::new();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("nerdbox-"));
    }

    #[test]
    fn test_args_call_shapes() {
        let args = InstanceArgs::from(".item");
        assert_eq!(args.selector.as_deref(), Some(".item"));
        assert!(args.delegate.is_none());

        let args = InstanceArgs::from((".item", "#list"));
        assert_eq!(args.delegate.as_deref(), Some("#list"));

        let overrides = OptionsOverrides::new().with_classes("winner");
        let args = InstanceArgs::from((".item", overrides.clone()));
        assert!(args.delegate.is_none());
        assert_eq!(args.overrides, overrides);

        let args = InstanceArgs::from(overrides.clone());
        assert!(args.selector.is_none());
        assert_eq!(args.overrides, overrides);

        let args = InstanceArgs::from((".item", "#list", overrides.clone()));
        assert_eq!(args.delegate.as_deref(), Some("#list"));
        assert_eq!(args.overrides, overrides);
    }

    #[tokio::test]
    async fn test_construction_mounts_panel_once_and_emits_initialized() {
        let page = instant_page(TRIGGERS);
        let seen = Arc::new(Mutex::new(Vec::new()));
        page.on(LifecycleEvent::Initialized, {
            let seen = seen.clone();
            move |n: &Notification| seen.lock().unwrap().push(n.instance.id())
        });

        let first = page.create(InstanceArgs::default());
        let second = page.create(".other");

        assert_eq!(page.document().query("#nerdbox").len(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![first.id(), second.id()]);
        assert_eq!(first.selector(), DEFAULT_SELECTOR);
        assert_eq!(first.state(), LifecycleState::Closed);
    }

    #[tokio::test]
    async fn test_open_runs_synchronous_prefix() {
        let page = instant_page(TRIGGERS);
        let nerdbox = page.create(("a", OptionsOverrides::new().with_classes("winner big")));
        let document = page.document();
        let panel = document.query_first("#nerdbox").unwrap();
        document.add_classes(panel, &["stale".to_string()]);

        let ticket = nerdbox.open("#fragment");

        assert_eq!(document.classes(panel), vec!["winner", "big", "loading"]);
        assert_eq!(document.query("#nerdbox .content #loader").len(), 1);
        assert_eq!(nerdbox.state(), LifecycleState::Opening);

        assert_eq!(ticket.settled().await, LoadOutcome::Loaded);
        let content = document.query_first("#nerdbox .content").unwrap();
        assert_eq!(document.inner_html(content).as_deref(), Some("Nerdbox Content"));
        assert_eq!(document.classes(panel), vec!["winner", "big"]);
        assert_eq!(nerdbox.state(), LifecycleState::Open);
        assert!(document.is_visible(panel));
    }

    #[tokio::test]
    async fn test_close_hides_and_clears() {
        let page = instant_page(TRIGGERS);
        let nerdbox = page.create(InstanceArgs::default());
        nerdbox.open("here is some text").settled().await;

        nerdbox.close().wait().await;

        let document = page.document();
        let panel = document.query_first("#nerdbox").unwrap();
        let content = document.query_first("#nerdbox .content").unwrap();
        assert!(!document.is_visible(panel));
        assert_eq!(document.inner_html(content).as_deref(), Some(""));
        assert_eq!(nerdbox.state(), LifecycleState::Closed);
    }

    #[tokio::test]
    async fn test_on_named_rejects_unknown_event() {
        let page = instant_page("");
        let nerdbox = page.create(InstanceArgs::default());
        assert!(nerdbox.on_named("nerdbox.opened", |_| {}).is_ok());
        assert_eq!(
            nerdbox.on_named("exploded", |_| {}),
            Err(UnknownEvent("exploded".to_string()))
        );
    }

    #[tokio::test]
    async fn test_direct_bindings_snapshot_construction_time() {
        let page = instant_page(r#"<a class="nerdbox" id="early" href="a"><img src="t.png"></a>"#);
        let nerdbox = page.create(InstanceArgs::default());
        let document = page.document();
        document.append_markup(document.body(), r#"<a class="nerdbox" id="late" href="b"></a>"#);

        let early = document.query_first("#early").unwrap();
        let img = document.query_first("#early img").unwrap();
        let late = document.query_first("#late").unwrap();

        assert_eq!(nerdbox.matching_trigger(img), Some(early));
        assert_eq!(nerdbox.matching_trigger(early), Some(early));
        assert_eq!(nerdbox.matching_trigger(late), None);
    }

    #[tokio::test]
    async fn test_delegated_bindings_accept_later_triggers() {
        let page = instant_page(r#"<ul id="list"></ul><a class="item" id="outside" href="x"></a>"#);
        let nerdbox = page.create((".item", "#list"));
        let document = page.document();
        let list = document.query_first("#list").unwrap();
        document.append_markup(list, r#"<li><a class="item" id="late" href="y"><b>go</b></a></li>"#);

        let late = document.query_first("#late").unwrap();
        let bold = document.query_first("#late b").unwrap();
        let outside = document.query_first("#outside").unwrap();

        assert_eq!(nerdbox.matching_trigger(bold), Some(late));
        assert_eq!(nerdbox.matching_trigger(outside), None);
        assert_eq!(nerdbox.matching_trigger(list), None);
    }
}
