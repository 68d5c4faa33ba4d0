//! Timed fade effect
//!
//! Visibility flips at the start of a fade-in and at the end of a fade-out,
//! so the element is on screen for the whole transition either way.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{Document, ElementHandle, FadeEffect};

/// [`FadeEffect`] that waits out the duration on the Tokio timer
#[derive(Clone)]
pub struct TimedFade {
    document: Arc<dyn Document>,
}

impl TimedFade {
    /// Create a fade effect acting on `document`
    #[must_use]
    pub fn new(document: Arc<dyn Document>) -> Self {
        Self { document }
    }
}

#[async_trait]
impl FadeEffect for TimedFade {
    async fn fade_in(&self, element: ElementHandle, duration: Duration) {
        self.document.set_visible(element, true);
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
        tracing::trace!(element = %element, ?duration, "Fade in complete");
    }

    async fn fade_out(&self, element: ElementHandle, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
        self.document.set_visible(element, false);
        tracing::trace!(element = %element, ?duration, "Fade out complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::HeadlessDocument;

    fn panel() -> (Arc<HeadlessDocument>, ElementHandle) {
        let document = Arc::new(HeadlessDocument::from_markup(
            r#"<div id="nerdbox" style="display: none;"></div>"#,
        ));
        let panel = document.query_first("#nerdbox").unwrap();
        (document, panel)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fade_in_shows_immediately_and_completes_after_duration() {
        let (document, panel) = panel();
        let fade = TimedFade::new(document.clone());

        let started = tokio::time::Instant::now();
        fade.fade_in(panel, Duration::from_millis(200)).await;
        assert!(document.is_visible(panel));
        assert_eq!(started.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fade_out_hides_at_completion() {
        let (document, panel) = panel();
        document.set_visible(panel, true);
        let fade = TimedFade::new(document.clone());

        let handle = tokio::spawn({
            let fade = fade.clone();
            async move { fade.fade_out(panel, Duration::from_millis(100)).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(document.is_visible(panel), "still visible mid-fade");

        handle.await.unwrap();
        assert!(!document.is_visible(panel));
    }

    #[tokio::test]
    async fn test_zero_duration_completes_without_waiting() {
        let (document, panel) = panel();
        let fade = TimedFade::new(document.clone());

        fade.fade_in(panel, Duration::ZERO).await;
        assert!(document.is_visible(panel));
        fade.fade_out(panel, Duration::ZERO).await;
        assert!(!document.is_visible(panel));
    }
}
