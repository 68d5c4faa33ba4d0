//! Nerdbox CLI - Headless Lightbox Driver
//!
//! Builds a headless page, opens one content reference in a lightbox and
//! prints every lifecycle notification followed by what ended up in the
//! content area. Useful for checking how a reference is classified and
//! what a remote fragment actually returns.
//!
//! # Usage
//!
//! ```bash
//! # Literal content
//! nerdbox "here is some text"
//!
//! # Fragment from a page file
//! nerdbox --page index.html "#gallery"
//!
//! # Remote content relative to a base URL, then close again
//! nerdbox --base-url http://localhost:8080/ support/fragment.html --close
//!
//! # Per-run options using the original option names
//! nerdbox --options '{"fadeDuration": 0, "classes": "winner"}' photo.png
//!
//! # Verbose logging
//! RUST_LOG=debug nerdbox photo.png
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use nerdbox_core::{
    default_config_path, load_config_with_env, Document, HeadlessDocument, HttpFetcher,
    LifecycleEvent, LoadOutcome, NerdboxConfig, Notification, OptionsOverrides, Page,
};

/// Nerdbox - open a content reference in a headless lightbox
#[derive(Parser, Debug)]
#[command(name = "nerdbox")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Content reference: fragment, image URL, remote URL or literal markup
    #[arg(default_value = "")]
    reference: String,

    /// HTML file appended to the page body before opening
    #[arg(short = 'p', long, value_name = "FILE")]
    page: Option<PathBuf>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "NERDBOX_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Option overrides as a JSON object
    #[arg(short = 'o', long, value_name = "JSON")]
    options: Option<String>,

    /// Base URL for relative remote references
    #[arg(short = 'b', long, env = "NERDBOX_BASE_URL", value_name = "URL")]
    base_url: Option<String>,

    /// How long to wait for the content to load, in milliseconds
    #[arg(short = 't', long, default_value_t = 10_000)]
    timeout_ms: u64,

    /// Close the lightbox after the content loaded
    #[arg(long)]
    close: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "NERDBOX_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("nerdbox={level},nerdbox_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file and `env`, then apply `--options`
fn load_configuration<F>(args: &Args, env: F) -> Result<NerdboxConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_with_env(path, env).context("Failed to load configuration")?;

    if let Some(ref json) = args.options {
        let overrides = OptionsOverrides::from_json(json).context("Invalid --options")?;
        config.apply_cli(&overrides);
        config
            .defaults
            .validate()
            .context("Invalid options after --options")?;
    }

    info!(
        source = %config.source(),
        path = ?config.config_file_path,
        "Configuration loaded"
    );
    Ok(config)
}

/// Read the markup of a `--page` file
fn read_page(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read page file: {path:?}"))
}

/// One line per notification
fn describe(notification: &Notification) -> String {
    format!(
        "{} {}",
        notification.event.namespaced(),
        notification.instance.id()
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = load_configuration(&args, |key| std::env::var(key).ok())?;

    let mut fetcher = HttpFetcher::with_timeout(Duration::from_millis(args.timeout_ms))
        .context("Failed to create HTTP client")?;
    if let Some(ref base) = args.base_url {
        fetcher = fetcher.with_base_url(base).context("Invalid --base-url")?;
    }

    let document = Arc::new(HeadlessDocument::new());
    if let Some(ref path) = args.page {
        document.load(&read_page(path)?);
    }

    let page = Page::builder()
        .document(document.clone())
        .fetcher(Arc::new(fetcher))
        .config(config)
        .build();

    for event in LifecycleEvent::ALL {
        page.on(event, |notification| println!("{}", describe(notification)));
    }

    let ticket = page.open(args.reference.as_str(), OptionsOverrides::new());
    let outcome = match tokio::time::timeout(Duration::from_millis(args.timeout_ms), ticket.settled())
        .await
    {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!(timeout_ms = args.timeout_ms, "Gave up waiting for content");
            LoadOutcome::Failed("timed out".to_string())
        }
    };

    let content_selector = page.current().options().content_area_selector();
    let content = document
        .query_first(&content_selector)
        .and_then(|area| document.inner_html(area))
        .unwrap_or_default();
    println!("{content}");

    if args.close {
        if let Some(closing) = page.close() {
            closing.wait().await;
        }
    }

    match outcome {
        LoadOutcome::Loaded | LoadOutcome::Superseded => Ok(()),
        LoadOutcome::Failed(reason) => anyhow::bail!("Content did not load: {reason}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["nerdbox"]).unwrap();
        assert_eq!(args.reference, "");
        assert_eq!(args.timeout_ms, 10_000);
        assert!(!args.close);
    }

    #[test]
    fn test_args_full() {
        let args = Args::try_parse_from([
            "nerdbox",
            "--page",
            "index.html",
            "--options",
            r#"{"fadeDuration": 0}"#,
            "--timeout-ms",
            "500",
            "--close",
            "photo.png",
        ])
        .unwrap();
        assert_eq!(args.reference, "photo.png");
        assert_eq!(args.page, Some(PathBuf::from("index.html")));
        assert_eq!(args.timeout_ms, 500);
        assert!(args.close);
    }

    #[test]
    fn test_load_configuration_applies_options() {
        let args = Args::try_parse_from([
            "nerdbox",
            "--config",
            "/nonexistent/nerdbox.toml",
            "--options",
            r#"{"fadeDuration": 0, "classes": "winner"}"#,
        ])
        .unwrap();
        let config = load_configuration(&args, |_| None).unwrap();
        assert_eq!(config.defaults.fade_duration_ms, 0);
        assert_eq!(config.defaults.classes.as_slice(), ["winner"]);
    }

    #[test]
    fn test_load_configuration_options_win_over_environment() {
        let args = Args::try_parse_from([
            "nerdbox",
            "--config",
            "/nonexistent/nerdbox.toml",
            "--options",
            r#"{"fadeDuration": 0}"#,
        ])
        .unwrap();
        let config = load_configuration(&args, |key| match key {
            "NERDBOX_FADE_DURATION" => Some("75".to_string()),
            "NERDBOX_CLASSES" => Some("from-env".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.defaults.fade_duration_ms, 0);
        assert_eq!(config.defaults.classes.as_slice(), ["from-env"]);
    }

    #[test]
    fn test_load_configuration_rejects_bad_options() {
        let args = Args::try_parse_from([
            "nerdbox",
            "--config",
            "/nonexistent/nerdbox.toml",
            "--options",
            r#"{"panelSelector": ""}"#,
        ])
        .unwrap();
        assert!(load_configuration(&args, |_| None).is_err());
    }

    #[test]
    fn test_read_page() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"<div id="fragment">Nerdbox Content</div>"#)
            .unwrap();
        let markup = read_page(file.path()).unwrap();
        assert!(markup.contains("Nerdbox Content"));
        assert!(read_page(Path::new("/nonexistent/page.html")).is_err());
    }
}
