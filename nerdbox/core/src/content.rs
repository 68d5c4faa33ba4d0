//! Content Resolver
//!
//! Turns whatever was handed to `open` into something the content area can
//! show. Classification is strictly priority ordered; the first rule that
//! matches wins:
//!
//! ```text
//! ContentInput ──► Element handle ─────────────► clone (original stays put)
//!                  text contains '#' ───────────► Fragment  (inner markup by id)
//!                  path ends in image extension ► ImageUrl  (<img src="..." />)
//!                  single token, no whitespace ─► RemoteUrl (Fetcher)
//!                  anything else ───────────────► Literal   (markup as given)
//! ```
//!
//! A reference containing whitespace is literal even when it looks like a
//! URL, and the empty string is an empty literal.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::surface::{Document, ElementHandle, FetchError, Fetcher};

/// Raw input to `open`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentInput {
    /// A reference string (fragment, URL or markup)
    Text(String),
    /// An element already present in the document
    Element(ElementHandle),
}

impl From<&str> for ContentInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for ContentInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&String> for ContentInput {
    fn from(text: &String) -> Self {
        Self::Text(text.clone())
    }
}

impl From<ElementHandle> for ContentInput {
    fn from(element: ElementHandle) -> Self {
        Self::Element(element)
    }
}

/// Classified content reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentRef {
    /// Clone of an existing element
    Element(ElementHandle),
    /// Id selector, from the first `#` of the reference onward
    Fragment(String),
    /// Image URL, embedded as written
    ImageUrl(String),
    /// URL fetched for its body
    RemoteUrl(String),
    /// Markup or text shown as is
    Literal(String),
}

impl ContentRef {
    /// Classify `input` against the configured image extensions
    #[must_use]
    pub fn classify(input: impl Into<ContentInput>, image_extensions: &[String]) -> Self {
        let text = match input.into() {
            ContentInput::Element(element) => return Self::Element(element),
            ContentInput::Text(text) => text,
        };

        if let Some(hash) = text.find('#') {
            return Self::Fragment(text[hash..].to_string());
        }
        if is_image_reference(&text, image_extensions) {
            return Self::ImageUrl(text);
        }
        if !text.is_empty() && !text.contains(char::is_whitespace) {
            return Self::RemoteUrl(text);
        }
        Self::Literal(text)
    }

    /// Short name of the variant, for logging
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Element(_) => "element",
            Self::Fragment(_) => "fragment",
            Self::ImageUrl(_) => "image",
            Self::RemoteUrl(_) => "remote",
            Self::Literal(_) => "literal",
        }
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Element(element) => write!(f, "element({element})"),
            Self::Fragment(value)
            | Self::ImageUrl(value)
            | Self::RemoteUrl(value)
            | Self::Literal(value) => write!(f, "{}({value:?})", self.kind()),
        }
    }
}

/// Whether `text` ends in `.<ext>`, optionally followed by a `?query`
///
/// Extensions compare ASCII case-insensitively and may be configured with
/// or without their leading dot.
fn is_image_reference(text: &str, image_extensions: &[String]) -> bool {
    let ends = text
        .char_indices()
        .filter(|(_, c)| *c == '?')
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()));

    for end in ends {
        let path = text[..end].as_bytes();
        for ext in image_extensions {
            let ext = ext.trim_start_matches('.').as_bytes();
            if ext.is_empty() || path.len() < ext.len() + 1 {
                continue;
            }
            let split = path.len() - ext.len();
            if path[split - 1] == b'.' && path[split..].eq_ignore_ascii_case(ext) {
                return true;
            }
        }
    }
    false
}

/// Markup embedding an image, URL inserted literally
#[must_use]
pub fn image_markup(url: &str) -> String {
    format!(r#"<img src="{url}" />"#)
}

/// Resolved content
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Markup for the content area
    Markup(String),
    /// Detached element to move into the content area
    Element(ElementHandle),
}

/// Errors from content resolution
#[derive(Debug, Error)]
pub enum ContentError {
    /// Remote content could not be fetched
    #[error("Failed to fetch remote content: {0}")]
    Fetch(#[from] FetchError),
}

/// Resolves a [`ContentRef`] into a [`Payload`]
#[derive(Clone)]
pub struct ContentResolver {
    document: Arc<dyn Document>,
    fetcher: Arc<dyn Fetcher>,
}

impl ContentResolver {
    /// Create a resolver over the given collaborators
    #[must_use]
    pub fn new(document: Arc<dyn Document>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { document, fetcher }
    }

    /// Resolve a reference
    ///
    /// Only the remote case suspends. A stale element handle and a fragment
    /// whose id is missing both resolve to empty markup.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Fetch`] if a remote reference cannot be fetched.
    pub async fn resolve(&self, reference: &ContentRef) -> Result<Payload, ContentError> {
        tracing::debug!(reference_kind = reference.kind(), "Resolving content");
        let payload = match reference {
            ContentRef::Element(element) => self
                .document
                .clone_element(*element)
                .map_or_else(|| Payload::Markup(String::new()), Payload::Element),
            ContentRef::Fragment(selector) => Payload::Markup(
                self.document
                    .query_first(selector)
                    .and_then(|found| self.document.inner_html(found))
                    .unwrap_or_default(),
            ),
            ContentRef::ImageUrl(url) => Payload::Markup(image_markup(url)),
            ContentRef::RemoteUrl(url) => Payload::Markup(self.fetcher.fetch(url).await?),
            ContentRef::Literal(text) => Payload::Markup(text.clone()),
        };
        Ok(payload)
    }
}
