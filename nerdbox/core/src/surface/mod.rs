//! Surface Collaborators
//!
//! The lightbox core never touches a real DOM, animation engine or network
//! stack directly. It consumes three capabilities, expressed as traits:
//!
//! - [`Document`]: query and mutate the element tree the panel lives in
//! - [`FadeEffect`]: transition an element's visibility over a duration
//! - [`Fetcher`]: retrieve remote text content
//!
//! # Architecture
//!
//! ```text
//!                  Lifecycle Controller
//!                 ┌────────────────────┐
//!                 │      Nerdbox       │
//!                 └───┬──────┬──────┬──┘
//!                     │      │      │
//!          ┌──────────▼┐ ┌───▼────┐ ┌▼─────────┐
//!          │ Document  │ │  Fade  │ │ Fetcher  │
//!          └─────┬─────┘ └───┬────┘ └────┬─────┘
//!                │           │           │
//!   HeadlessDocument     TimedFade   HttpFetcher / StaticFetcher
//!   (browser binding)   (CSS fade)   (XHR binding)
//! ```
//!
//! The headless implementations in this module are complete enough to run
//! the whole lifecycle in tests and from the command line.

mod fade;
mod fetch;
mod headless;
mod markup;
mod selector;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use fade::TimedFade;
pub use fetch::{HttpFetcher, StaticFetcher};
pub use headless::HeadlessDocument;

/// Opaque handle to an element owned by a [`Document`]
///
/// Handles are cheap to copy and stay valid until the element is removed
/// from the document. Operations on a stale handle are no-ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementHandle(u64);

impl ElementHandle {
    /// Create a handle from a raw id (for document implementations)
    #[must_use]
    pub fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw id
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "el-{}", self.0)
    }
}

/// Element tree the lightbox panel is mounted into
///
/// Selectors follow CSS syntax. Implementations decide how much of CSS they
/// support; an unsupported or malformed selector simply matches nothing.
pub trait Document: Send + Sync {
    /// The root element that mounted markup is appended to
    fn body(&self) -> ElementHandle;

    /// All attached elements matching `selector`, in document order
    fn query(&self, selector: &str) -> Vec<ElementHandle>;

    /// Whether `element` matches `selector`
    fn matches(&self, element: ElementHandle, selector: &str) -> bool;

    /// Parent element, if any
    fn parent(&self, element: ElementHandle) -> Option<ElementHandle>;

    /// Attribute value, if present
    fn attribute(&self, element: ElementHandle, name: &str) -> Option<String>;

    /// Serialized children of `element`
    fn inner_html(&self, element: ElementHandle) -> Option<String>;

    /// Serialized `element` including itself
    fn outer_html(&self, element: ElementHandle) -> Option<String>;

    /// Concatenated text of `element` and its descendants
    fn text_content(&self, element: ElementHandle) -> Option<String>;

    /// Replace the children of `element` with parsed `markup`
    fn set_inner_html(&self, element: ElementHandle, markup: &str);

    /// Parse `markup` and append it to `parent`, returning the new top-level elements
    fn append_markup(&self, parent: ElementHandle, markup: &str) -> Vec<ElementHandle>;

    /// Move `element` to the end of `parent`'s children
    fn append_element(&self, parent: ElementHandle, element: ElementHandle);

    /// Remove every child of `element`
    fn empty(&self, element: ElementHandle);

    /// Current class list
    fn classes(&self, element: ElementHandle) -> Vec<String>;

    /// Remove every class
    fn clear_classes(&self, element: ElementHandle);

    /// Add classes that are not already present
    fn add_classes(&self, element: ElementHandle, classes: &[String]);

    /// Remove one class
    fn remove_class(&self, element: ElementHandle, class: &str);

    /// Deep-copy `element` into a detached element
    fn clone_element(&self, element: ElementHandle) -> Option<ElementHandle>;

    /// Show or hide `element`
    fn set_visible(&self, element: ElementHandle, visible: bool);

    /// Whether `element` and all of its ancestors are shown and attached
    fn is_visible(&self, element: ElementHandle) -> bool;

    /// First attached element matching `selector`
    fn query_first(&self, selector: &str) -> Option<ElementHandle> {
        self.query(selector).into_iter().next()
    }

    /// Nearest ancestor-or-self of `element` matching `selector`
    fn closest(&self, element: ElementHandle, selector: &str) -> Option<ElementHandle> {
        let mut current = Some(element);
        while let Some(candidate) = current {
            if self.matches(candidate, selector) {
                return Some(candidate);
            }
            current = self.parent(candidate);
        }
        None
    }

    /// Whether `element` is a strict descendant of `ancestor`
    fn contains(&self, ancestor: ElementHandle, element: ElementHandle) -> bool {
        let mut current = self.parent(element);
        while let Some(candidate) = current {
            if candidate == ancestor {
                return true;
            }
            current = self.parent(candidate);
        }
        false
    }

    /// Whether `element` carries `class`
    fn has_class(&self, element: ElementHandle, class: &str) -> bool {
        self.classes(element).iter().any(|c| c == class)
    }
}

/// Visibility transition with a completion point
///
/// The returned future resolving is the completion callback: it must
/// resolve exactly once, and without waiting when `duration` is zero.
#[async_trait]
pub trait FadeEffect: Send + Sync {
    /// Transition `element` to visible
    async fn fade_in(&self, element: ElementHandle, duration: Duration);

    /// Transition `element` to hidden
    async fn fade_out(&self, element: ElementHandle, duration: Duration);
}

/// Remote text retrieval
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the body behind `url`
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Errors from a [`Fetcher`]
#[derive(Debug, Error)]
pub enum FetchError {
    /// The reference could not be turned into a URL
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl {
        /// The reference that was rejected
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// The HTTP request failed
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("Request for {url} returned status {status}")]
    Status {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Nothing is registered under the URL
    #[error("No content for {0}")]
    NotFound(String),
}
