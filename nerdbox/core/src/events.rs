//! Platform input events
//!
//! The host forwards clicks and key releases to [`crate::Page::dispatch`],
//! which decides whether they open or close a lightbox.

use serde::{Deserialize, Serialize};

use crate::surface::ElementHandle;

/// Key code of the Escape key
pub const ESCAPE_KEY_CODE: u32 = 27;

/// A key on the keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// Escape
    Escape,
    /// Any other key, by code
    Other(u32),
}

impl Key {
    /// Key for a platform key code
    #[must_use]
    pub fn from_code(code: u32) -> Self {
        if code == ESCAPE_KEY_CODE {
            Self::Escape
        } else {
            Self::Other(code)
        }
    }

    /// Platform key code
    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            Self::Escape => ESCAPE_KEY_CODE,
            Self::Other(code) => code,
        }
    }
}

/// Input forwarded by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    /// An element was activated
    Click {
        /// The innermost element under the pointer
        target: ElementHandle,
    },
    /// A key was released
    KeyUp {
        /// The released key
        key: Key,
    },
}

impl UiEvent {
    /// Click on `target`
    #[must_use]
    pub fn click(target: ElementHandle) -> Self {
        Self::Click { target }
    }

    /// Release of the key with platform code `code`
    #[must_use]
    pub fn key_up(code: u32) -> Self {
        Self::KeyUp {
            key: Key::from_code(code),
        }
    }
}
