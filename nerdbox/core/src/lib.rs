//! Nerdbox Core - Headless Lightbox Lifecycle
//!
//! This crate provides the lightbox logic behind Nerdbox, independent of any
//! browser binding. It classifies what should be shown, drives the panel
//! through its open/close lifecycle, tracks which instance is current, and
//! tells listeners what happened.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Host                                  │
//! │   clicks / key releases ──► Page::dispatch      listeners ◄──┐   │
//! └──────────────────────────────────┬───────────────────────────┼───┘
//!                                    │                           │
//! ┌──────────────────────────────────┼───────────────────────────┼───┐
//! │                          NERDBOX CORE                        │   │
//! │  ┌───────────────────────────────▼──────────────────────┐    │   │
//! │  │                  Nerdbox (Lifecycle)                  │    │   │
//! │  │  ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌────────┴─┐ │   │
//! │  │  │ Content  │  │ Instance │  │  Config  │  │  Notify  │ │   │
//! │  │  │ Resolver │  │ Registry │  │ Provider │  │   Bus    │ │   │
//! │  │  └────┬─────┘  └──────────┘  └──────────┘  └──────────┘ │   │
//! │  └───────┼────────────────────────────────────────────────┘   │
//! │          │                                                     │
//! │   Document · FadeEffect · Fetcher   (surface traits)           │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Page`]: owns the collaborators and shared state of one document
//! - [`Nerdbox`]: one lightbox instance and its lifecycle
//! - [`ContentRef`]: classified content reference
//! - [`InstanceRegistry`]: the most recently opened instance
//! - [`NotificationBus`]: page-wide lifecycle notifications
//! - [`ConfigProvider`]: immutable defaults and per-instance snapshots
//!
//! # Quick Start
//!
//! ```
//! use nerdbox_core::{Document, LifecycleEvent, LoadOutcome, NerdboxConfig, OptionsOverrides, Page};
//!
//! #[tokio::main]
//! async fn main() {
//!     let page = Page::headless(NerdboxConfig::new());
//!     page.document().append_markup(
//!         page.document().body(),
//!         r#"<div id="fragment">Nerdbox Content</div>"#,
//!     );
//!
//!     page.on(LifecycleEvent::Loaded, |n| println!("{} loaded", n.instance.id()));
//!
//!     let ticket = page.open("#fragment", OptionsOverrides::new().with_fade_duration_ms(0));
//!     assert_eq!(ticket.settled().await, LoadOutcome::Loaded);
//!
//!     if let Some(closing) = page.close() {
//!         closing.wait().await;
//!     }
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod content;
pub mod events;
pub mod lightbox;
pub mod notify;
pub mod page;
pub mod registry;
pub mod surface;

pub use config::{
    default_config_path, load_config, load_config_from_path, load_config_with_env, ClassList,
    ConfigError, ConfigProvider, ConfigSource, NerdboxConfig, Options, OptionsOverrides,
};
pub use content::{ContentError, ContentInput, ContentRef, ContentResolver, Payload};
pub use events::{Key, UiEvent};
pub use lightbox::{
    CloseTicket, InstanceArgs, InstanceId, LifecycleState, LoadOutcome, Nerdbox, OpenTicket,
    DEFAULT_SELECTOR,
};
pub use notify::{EventName, LifecycleEvent, Listener, NameForm, Notification, NotificationBus};
pub use page::{Dispatch, Page, PageBuilder};
pub use registry::{Current, InstanceRegistry};
pub use surface::{
    Document, ElementHandle, FadeEffect, FetchError, Fetcher, HeadlessDocument, HttpFetcher,
    StaticFetcher, TimedFade,
};
