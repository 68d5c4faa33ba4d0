//! Lightbox Configuration
//!
//! Defaults are an immutable [`Options`] record owned by a [`ConfigProvider`].
//! Each instance takes a snapshot of the defaults with its own
//! [`OptionsOverrides`] laid on top, so changing defaults later never
//! affects an instance that already exists.
//!
//! # Configuration Priority
//!
//! Defaults are loaded with the following priority (highest first):
//! 1. CLI arguments (via [`OptionsOverrides::apply`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Built-in values
//!
//! Per-instance overrides are applied on top of whatever the provider holds.
//!
//! # Example Configuration
//!
//! `$XDG_CONFIG_HOME/nerdbox/nerdbox.toml`:
//!
//! ```toml
//! [lightbox]
//! fade_duration_ms = 150
//! image_extensions = ["png", "jpg", "jpeg", "gif", "webp"]
//! classes = "gallery dark"
//! loading_class = "loading"
//! ```
//!
//! The original option names (`fadeDuration`, `imageExts`, `container`,
//! `loader`, `nerdboxSelector`, ...) are accepted as aliases in TOML and JSON.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Markup mounted once per panel selector when nothing matches it yet
pub const DEFAULT_PANEL_TEMPLATE: &str = r##"<div id="nerdbox" style="display: none;"><div class="overlay"></div><div class="wrapper"><div class="inner"><div class="content"></div></div><a href="#" class="close">x</a></div></div>"##;

/// Markup shown in the content area while a reference resolves
pub const DEFAULT_LOADER_TEMPLATE: &str = r#"<div id="loader"><div class="circle one"></div><div class="circle two"></div><div class="circle three"></div></div>"#;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to parse a JSON options record
    #[error("Failed to parse JSON options: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where the defaults came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Built-in value
    Default,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// Class List
// =============================================================================

/// Extra classes applied to the panel on open
///
/// Deserializes from either a space-delimited string (`"gallery dark"`) or a
/// list of strings. Empty entries are dropped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ClassList(Vec<String>);

impl ClassList {
    /// Build a class list from any sequence of names
    pub fn new<I, S>(classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            classes
                .into_iter()
                .flat_map(|c| {
                    c.as_ref()
                        .split_whitespace()
                        .map(str::to_string)
                        .collect::<Vec<_>>()
                })
                .collect(),
        )
    }

    /// Parse a space-delimited string
    #[must_use]
    pub fn parse(classes: &str) -> Self {
        Self::new([classes])
    }

    /// Class names in order
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl From<&str> for ClassList {
    fn from(classes: &str) -> Self {
        Self::parse(classes)
    }
}

impl From<Vec<String>> for ClassList {
    fn from(classes: Vec<String>) -> Self {
        Self::new(classes)
    }
}

impl<'de> Deserialize<'de> for ClassList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            List(Vec<String>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Text(text) => Self::parse(&text),
            Repr::List(list) => Self::new(list),
        })
    }
}

// =============================================================================
// Options
// =============================================================================

/// Resolved per-instance options
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Fade duration in milliseconds (0 disables the wait)
    pub fade_duration_ms: u64,

    /// File extensions classified as images, without the leading dot
    pub image_extensions: Vec<String>,

    /// Classes applied to the panel on open
    pub classes: ClassList,

    /// Selector of the panel element
    pub panel_selector: String,

    /// Selector of the overlay, relative to the panel
    pub overlay_selector: String,

    /// Selector of the content area, relative to the panel
    pub content_selector: String,

    /// Selector of the close control, relative to the panel
    pub close_selector: String,

    /// Panel markup mounted when the panel selector matches nothing
    pub panel_template: String,

    /// Markup shown while content resolves
    pub loader_template: String,

    /// Class carried by the panel while content resolves
    pub loading_class: String,

    /// Whether the Escape key closes the open instance
    pub close_on_escape: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            fade_duration_ms: 200,
            image_extensions: ["png", "jpg", "jpeg", "gif"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            classes: ClassList::default(),
            panel_selector: "#nerdbox".to_string(),
            overlay_selector: ".overlay".to_string(),
            content_selector: ".content".to_string(),
            close_selector: ".close".to_string(),
            panel_template: DEFAULT_PANEL_TEMPLATE.to_string(),
            loader_template: DEFAULT_LOADER_TEMPLATE.to_string(),
            loading_class: "loading".to_string(),
            close_on_escape: true,
        }
    }
}

impl Options {
    /// Fade duration as a [`Duration`]
    #[must_use]
    pub fn fade_duration(&self) -> Duration {
        Duration::from_millis(self.fade_duration_ms)
    }

    /// Selector of the content area inside the panel
    #[must_use]
    pub fn content_area_selector(&self) -> String {
        format!("{} {}", self.panel_selector, self.content_selector)
    }

    /// Selector matching the close control or overlay inside the panel
    #[must_use]
    pub fn dismiss_selector(&self) -> String {
        format!(
            "{panel} {close}, {panel} {overlay}",
            panel = self.panel_selector,
            close = self.close_selector,
            overlay = self.overlay_selector,
        )
    }

    /// Check the options for values the lifecycle cannot work with
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let selectors = [
            ("panel_selector", &self.panel_selector),
            ("overlay_selector", &self.overlay_selector),
            ("content_selector", &self.content_selector),
            ("close_selector", &self.close_selector),
        ];
        for (field, value) in selectors {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!("{field} is empty")));
            }
        }

        if self.image_extensions.is_empty() {
            return Err(ConfigError::ValidationError(
                "image_extensions is empty".to_string(),
            ));
        }
        if let Some(bad) = self
            .image_extensions
            .iter()
            .find(|ext| ext.trim_start_matches('.').is_empty() || ext.contains(char::is_whitespace))
        {
            return Err(ConfigError::ValidationError(format!(
                "invalid image extension {bad:?}"
            )));
        }

        if self.loading_class.is_empty() || self.loading_class.contains(char::is_whitespace) {
            return Err(ConfigError::ValidationError(format!(
                "invalid loading_class {:?}",
                self.loading_class
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Overrides
// =============================================================================

/// Partial options record
///
/// Used for per-instance overrides, the `[lightbox]` table of the TOML file,
/// JSON option records and CLI overrides alike. Unset fields leave the
/// underlying value alone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionsOverrides {
    /// Fade duration in milliseconds
    #[serde(alias = "fadeDuration", skip_serializing_if = "Option::is_none")]
    pub fade_duration_ms: Option<u64>,

    /// Image extensions
    #[serde(
        alias = "imageExts",
        alias = "imageExtensions",
        skip_serializing_if = "Option::is_none"
    )]
    pub image_extensions: Option<Vec<String>>,

    /// Panel classes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classes: Option<ClassList>,

    /// Panel selector
    #[serde(
        alias = "nerdboxSelector",
        alias = "panelSelector",
        skip_serializing_if = "Option::is_none"
    )]
    pub panel_selector: Option<String>,

    /// Overlay selector
    #[serde(alias = "overlaySelector", skip_serializing_if = "Option::is_none")]
    pub overlay_selector: Option<String>,

    /// Content area selector
    #[serde(alias = "contentSelector", skip_serializing_if = "Option::is_none")]
    pub content_selector: Option<String>,

    /// Close control selector
    #[serde(alias = "closeSelector", skip_serializing_if = "Option::is_none")]
    pub close_selector: Option<String>,

    /// Panel markup
    #[serde(
        alias = "container",
        alias = "panelTemplate",
        skip_serializing_if = "Option::is_none"
    )]
    pub panel_template: Option<String>,

    /// Loader markup
    #[serde(
        alias = "loader",
        alias = "loaderTemplate",
        skip_serializing_if = "Option::is_none"
    )]
    pub loader_template: Option<String>,

    /// Loading class
    #[serde(alias = "loadingClass", skip_serializing_if = "Option::is_none")]
    pub loading_class: Option<String>,

    /// Escape key handling
    #[serde(alias = "closeOnEscape", skip_serializing_if = "Option::is_none")]
    pub close_on_escape: Option<bool>,
}

impl OptionsOverrides {
    /// Create an empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON options record
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::JsonError`] if the record is malformed.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set fade duration override
    #[must_use]
    pub fn with_fade_duration_ms(mut self, ms: u64) -> Self {
        self.fade_duration_ms = Some(ms);
        self
    }

    /// Set image extensions override
    #[must_use]
    pub fn with_image_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.image_extensions = Some(extensions.into_iter().map(Into::into).collect());
        self
    }

    /// Set classes override
    #[must_use]
    pub fn with_classes(mut self, classes: impl Into<ClassList>) -> Self {
        self.classes = Some(classes.into());
        self
    }

    /// Set panel selector override
    #[must_use]
    pub fn with_panel_selector(mut self, selector: impl Into<String>) -> Self {
        self.panel_selector = Some(selector.into());
        self
    }

    /// Set panel template override
    #[must_use]
    pub fn with_panel_template(mut self, markup: impl Into<String>) -> Self {
        self.panel_template = Some(markup.into());
        self
    }

    /// Set loader template override
    #[must_use]
    pub fn with_loader_template(mut self, markup: impl Into<String>) -> Self {
        self.loader_template = Some(markup.into());
        self
    }

    /// Set loading class override
    #[must_use]
    pub fn with_loading_class(mut self, class: impl Into<String>) -> Self {
        self.loading_class = Some(class.into());
        self
    }

    /// Set Escape handling override
    #[must_use]
    pub fn with_close_on_escape(mut self, enabled: bool) -> Self {
        self.close_on_escape = Some(enabled);
        self
    }

    /// Whether no field is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply overrides to an options record
    pub fn apply(&self, options: &mut Options) {
        if let Some(ms) = self.fade_duration_ms {
            options.fade_duration_ms = ms;
        }
        if let Some(ref extensions) = self.image_extensions {
            options.image_extensions.clone_from(extensions);
        }
        if let Some(ref classes) = self.classes {
            options.classes = classes.clone();
        }
        if let Some(ref selector) = self.panel_selector {
            options.panel_selector.clone_from(selector);
        }
        if let Some(ref selector) = self.overlay_selector {
            options.overlay_selector.clone_from(selector);
        }
        if let Some(ref selector) = self.content_selector {
            options.content_selector.clone_from(selector);
        }
        if let Some(ref selector) = self.close_selector {
            options.close_selector.clone_from(selector);
        }
        if let Some(ref markup) = self.panel_template {
            options.panel_template.clone_from(markup);
        }
        if let Some(ref markup) = self.loader_template {
            options.loader_template.clone_from(markup);
        }
        if let Some(ref class) = self.loading_class {
            options.loading_class.clone_from(class);
        }
        if let Some(enabled) = self.close_on_escape {
            options.close_on_escape = enabled;
        }
    }
}

// =============================================================================
// Provider
// =============================================================================

/// Owner of the immutable defaults
///
/// Cheap to clone. Replacing defaults produces a new provider; instances
/// built from the old one keep their snapshot.
#[derive(Clone, Debug, Default)]
pub struct ConfigProvider {
    defaults: Arc<Options>,
}

impl ConfigProvider {
    /// Create a provider around `defaults`
    #[must_use]
    pub fn new(defaults: Options) -> Self {
        Self {
            defaults: Arc::new(defaults),
        }
    }

    /// Shared defaults
    #[must_use]
    pub fn defaults(&self) -> Arc<Options> {
        Arc::clone(&self.defaults)
    }

    /// Snapshot of the defaults with `overrides` applied
    #[must_use]
    pub fn resolve(&self, overrides: &OptionsOverrides) -> Options {
        let mut options = (*self.defaults).clone();
        overrides.apply(&mut options);
        options
    }

    /// New provider whose defaults are these defaults with `overrides` applied
    #[must_use]
    pub fn with_defaults(&self, overrides: &OptionsOverrides) -> Self {
        Self::new(self.resolve(overrides))
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NerdboxToml {
    /// Default lightbox options
    pub lightbox: OptionsOverrides,
}

/// Configuration loaded from file and environment
#[derive(Clone, Debug)]
pub struct NerdboxConfig {
    /// Resolved defaults
    pub defaults: Options,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for NerdboxConfig {
    fn default() -> Self {
        Self {
            defaults: Options::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl NerdboxConfig {
    /// Create a configuration with built-in defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Apply command-line overrides
    pub fn apply_cli(&mut self, overrides: &OptionsOverrides) {
        if !overrides.is_empty() {
            overrides.apply(&mut self.defaults);
            self.source = ConfigSource::Cli;
        }
    }

    /// Provider over the loaded defaults
    #[must_use]
    pub fn provider(&self) -> ConfigProvider {
        ConfigProvider::new(self.defaults.clone())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/nerdbox/nerdbox.toml` or
/// `~/.config/nerdbox/nerdbox.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("nerdbox").join("nerdbox.toml"))
}

/// Load configuration from the default path
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the resulting defaults are invalid.
pub fn load_config() -> Result<NerdboxConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path plus the process environment
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or if the resulting defaults are invalid. A missing file is not an error.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<NerdboxConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration with an explicit environment lookup
///
/// # Errors
///
/// Same as [`load_config_from_path`].
pub fn load_config_with_env<F>(path: Option<PathBuf>, env: F) -> Result<NerdboxConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = NerdboxConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: NerdboxToml = toml::from_str(&toml_content)?;
            toml_config.lightbox.apply(&mut config.defaults);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);
    config.defaults.validate()?;

    Ok(config)
}

/// Apply environment variable overrides to the config
fn apply_env_config<F>(config: &mut NerdboxConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(duration) = env("NERDBOX_FADE_DURATION") {
        if let Ok(ms) = duration.trim().parse::<u64>() {
            config.defaults.fade_duration_ms = ms;
            config.source = ConfigSource::Env;
        } else {
            tracing::warn!(value = %duration, "Ignoring invalid NERDBOX_FADE_DURATION");
        }
    }
    if let Some(extensions) = env("NERDBOX_IMAGE_EXTENSIONS") {
        config.defaults.image_extensions = extensions
            .split(',')
            .map(str::trim)
            .filter(|ext| !ext.is_empty())
            .map(str::to_string)
            .collect();
        config.source = ConfigSource::Env;
    }
    if let Some(classes) = env("NERDBOX_CLASSES") {
        config.defaults.classes = ClassList::parse(&classes);
        config.source = ConfigSource::Env;
    }
    if let Some(enabled) = env("NERDBOX_CLOSE_ON_ESCAPE") {
        config.defaults.close_on_escape = enabled != "0" && enabled.to_lowercase() != "false";
        config.source = ConfigSource::Env;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn toml_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    // =========================================================================
    // Defaults
    // =========================================================================

    #[test]
    fn test_default_options() {
        let options = Options::default();
        assert_eq!(options.fade_duration(), Duration::from_millis(200));
        assert_eq!(options.image_extensions, vec!["png", "jpg", "jpeg", "gif"]);
        assert!(options.classes.as_slice().is_empty());
        assert_eq!(options.panel_selector, "#nerdbox");
        assert_eq!(options.content_area_selector(), "#nerdbox .content");
        assert_eq!(
            options.dismiss_selector(),
            "#nerdbox .close, #nerdbox .overlay"
        );
        assert_eq!(options.loading_class, "loading");
        assert!(options.close_on_escape);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_default_config_path() {
        if let Some(p) = default_config_path() {
            assert!(p.ends_with("nerdbox/nerdbox.toml"));
        }
    }

    // =========================================================================
    // Class List
    // =========================================================================

    #[test]
    fn test_class_list_from_string_and_list() {
        let from_text: ClassList = serde_json::from_str(r#""winner  big""#).unwrap();
        let from_list: ClassList = serde_json::from_str(r#"["winner", "big"]"#).unwrap();
        assert_eq!(from_text, from_list);
        assert_eq!(from_text.as_slice(), ["winner", "big"]);
        assert!(ClassList::parse("   ").as_slice().is_empty());
    }

    // =========================================================================
    // Overrides and Provider
    // =========================================================================

    #[test]
    fn test_overrides_from_json_accepts_original_names() {
        let overrides = OptionsOverrides::from_json(
            r##"{"fadeDuration": 0, "imageExts": ["webp"], "classes": "winner", "nerdboxSelector": "#box-a"}"##,
        )
        .unwrap();
        assert_eq!(overrides.fade_duration_ms, Some(0));
        assert_eq!(overrides.image_extensions, Some(vec!["webp".to_string()]));
        assert_eq!(overrides.classes, Some(ClassList::parse("winner")));
        assert_eq!(overrides.panel_selector.as_deref(), Some("#box-a"));
    }

    #[test]
    fn test_overrides_from_json_rejects_malformed() {
        let err = OptionsOverrides::from_json("{ fadeDuration").unwrap_err();
        assert!(matches!(err, ConfigError::JsonError(_)));
    }

    #[test]
    fn test_overrides_is_empty() {
        let set = OptionsOverrides::new().with_fade_duration_ms(50);
        assert!(OptionsOverrides::new().is_empty());
        assert!(!set.is_empty());
    }

    #[test]
    fn test_provider_resolve_does_not_touch_defaults() {
        let provider = ConfigProvider::default();
        let resolved = provider.resolve(&OptionsOverrides::new().with_fade_duration_ms(0));
        assert_eq!(resolved.fade_duration_ms, 0);
        assert_eq!(provider.defaults().fade_duration_ms, 200);
    }

    #[test]
    fn test_with_defaults_produces_new_provider() {
        let provider = ConfigProvider::default();
        let snapshot = provider.resolve(&OptionsOverrides::new());

        let changed = provider.with_defaults(&OptionsOverrides::new().with_classes("dark"));
        assert_eq!(changed.defaults().classes, ClassList::parse("dark"));
        assert!(provider.defaults().classes.as_slice().is_empty());
        assert!(snapshot.classes.as_slice().is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut options = Options::default();
        options.content_selector = "  ".to_string();
        assert!(matches!(
            options.validate(),
            Err(ConfigError::ValidationError(msg)) if msg.contains("content_selector")
        ));

        let mut options = Options::default();
        options.image_extensions.clear();
        assert!(options.validate().is_err());

        let mut options = Options::default();
        options.image_extensions = vec![".".to_string()];
        assert!(options.validate().is_err());

        let mut options = Options::default();
        options.loading_class = "two words".to_string();
        assert!(options.validate().is_err());
    }

    // =========================================================================
    // Loading
    // =========================================================================

    #[test]
    fn test_load_toml_file() {
        let file = toml_file(
            r#"
[lightbox]
fade_duration_ms = 150
image_extensions = ["png", "webp"]
classes = "gallery dark"
"#,
        );
        let config = load_config_with_env(Some(file.path().to_path_buf()), no_env).unwrap();
        assert_eq!(config.defaults.fade_duration_ms, 150);
        assert_eq!(config.defaults.image_extensions, vec!["png", "webp"]);
        assert_eq!(config.defaults.classes.as_slice(), ["gallery", "dark"]);
        assert_eq!(config.defaults.panel_selector, "#nerdbox");
        assert_eq!(config.source(), ConfigSource::File);
        assert_eq!(config.config_file_path.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_load_toml_accepts_original_names() {
        let file = toml_file(
            r#"
[lightbox]
fadeDuration = 0
imageExts = ["gif"]
"#,
        );
        let config = load_config_with_env(Some(file.path().to_path_buf()), no_env).unwrap();
        assert_eq!(config.defaults.fade_duration_ms, 0);
        assert_eq!(config.defaults.image_extensions, vec!["gif"]);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = PathBuf::from("/nonexistent/path/nerdbox.toml");
        let config = load_config_with_env(Some(path), no_env).unwrap();
        assert_eq!(config.defaults, Options::default());
        assert_eq!(config.source(), ConfigSource::Default);
        assert!(config.config_file_path.is_none());
    }

    #[test]
    fn test_malformed_toml_error() {
        let file = toml_file("[lightbox\nfade_duration_ms = ");
        let result = load_config_with_env(Some(file.path().to_path_buf()), no_env);
        assert!(matches!(result.unwrap_err(), ConfigError::ParseError(_)));
    }

    #[test]
    fn test_invalid_file_values_fail_validation() {
        let file = toml_file("[lightbox]\npanel_selector = \"\"\n");
        let result = load_config_with_env(Some(file.path().to_path_buf()), no_env);
        assert!(matches!(result.unwrap_err(), ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_env_overrides_file() {
        let file = toml_file("[lightbox]\nfade_duration_ms = 150\n");
        let env = env_of(&[
            ("NERDBOX_FADE_DURATION", "75"),
            ("NERDBOX_IMAGE_EXTENSIONS", "png, svg ,"),
            ("NERDBOX_CLASSES", "from-env"),
            ("NERDBOX_CLOSE_ON_ESCAPE", "false"),
        ]);
        let config = load_config_with_env(Some(file.path().to_path_buf()), env).unwrap();
        assert_eq!(config.defaults.fade_duration_ms, 75);
        assert_eq!(config.defaults.image_extensions, vec!["png", "svg"]);
        assert_eq!(config.defaults.classes.as_slice(), ["from-env"]);
        assert!(!config.defaults.close_on_escape);
        assert_eq!(config.source(), ConfigSource::Env);
    }

    #[test]
    fn test_invalid_env_duration_is_ignored() {
        let env = env_of(&[("NERDBOX_FADE_DURATION", "soon")]);
        let config = load_config_with_env(None, env).unwrap();
        assert_eq!(config.defaults.fade_duration_ms, 200);
        assert_eq!(config.source(), ConfigSource::Default);
    }

    #[test]
    fn test_cli_overrides_apply_last() {
        let env = env_of(&[("NERDBOX_FADE_DURATION", "75")]);
        let mut config = load_config_with_env(None, env).unwrap();
        config.apply_cli(&OptionsOverrides::new().with_fade_duration_ms(5));
        assert_eq!(config.defaults.fade_duration_ms, 5);
        assert_eq!(config.source(), ConfigSource::Cli);
        assert_eq!(config.provider().defaults().fade_duration_ms, 5);
    }
}
