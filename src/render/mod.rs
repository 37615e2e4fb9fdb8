//! Turning diagram and image sources into cached artifacts.
//!
//! This module handles:
//! - The [`ArtifactRenderer`] seam and its two implementations
//! - Retry policy for transient renderer failures
//! - The [`RenderCoordinator`], which deduplicates work per cache key and
//!   runs it on a background worker pool

mod coordinator;
mod mermaid_ink;
mod raster;

pub use coordinator::{
    CoordinatorOptions, Delivery, DeliveryUpdate, RenderCoordinator, RenderJob, Renderers,
    TaskState,
};
pub use mermaid_ink::{DEFAULT_ENDPOINT, DEFAULT_TIMEOUT, MermaidInkRenderer};
pub use raster::ImageRenderer;

use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Output format of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum RenderFormat {
    #[default]
    Png,
    Svg,
}

impl RenderFormat {
    /// Stable name mixed into cache keys.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
        }
    }

    pub const fn extension(self) -> &'static str {
        self.name()
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        if ext.eq_ignore_ascii_case("png") {
            Some(Self::Png)
        } else if ext.eq_ignore_ascii_case("svg") {
            Some(Self::Svg)
        } else {
            None
        }
    }

    /// Whether `bytes` start like an artifact of this format.
    pub fn matches_header(self, bytes: &[u8]) -> bool {
        match self {
            Self::Png => bytes.starts_with(PNG_MAGIC),
            Self::Svg => {
                let text = String::from_utf8_lossy(bytes);
                let text = text.trim_start_matches('\u{feff}').trim_start();
                text.starts_with("<svg")
                    || text.starts_with("<?xml")
                    || text.starts_with("<!DOCTYPE svg")
            }
        }
    }
}

/// Why a render attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("network error: {0}")]
    Network(String),
    #[error("render timed out")]
    Timeout,
    #[error("invalid source: {0}")]
    InvalidSource(String),
    #[error("could not store artifact: {0}")]
    Storage(String),
}

impl RenderError {
    /// Transient failures worth another attempt.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout)
    }
}

/// Converts a source into artifact bytes.
///
/// One call is one attempt; retries belong to the caller. Implementations
/// run on worker threads and may block.
pub trait ArtifactRenderer: Send + Sync {
    /// Identifies the renderer's output. Changing it invalidates every
    /// artifact the renderer produced before.
    fn version_tag(&self) -> &str;

    /// Render `source` into `format`.
    ///
    /// # Errors
    ///
    /// Returns a [`RenderError`] describing why no artifact was produced.
    fn render(&self, source: &str, format: RenderFormat) -> Result<Vec<u8>, RenderError>;
}

/// Bounded retries with a fixed delay schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delays: vec![Duration::from_millis(250), Duration::from_millis(750)],
        }
    }
}

impl RetryPolicy {
    /// `delays[i]` is slept before attempt `i + 2`; the last delay repeats
    /// when there are more attempts than delays.
    pub fn new(max_attempts: u32, delays: Vec<Duration>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delays,
        }
    }

    /// Retries without sleeping.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Vec::new())
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn delay_before(&self, attempt: u32) -> Duration {
        let index = attempt.saturating_sub(2) as usize;
        self.delays
            .get(index)
            .or_else(|| self.delays.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. `op` receives the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// Returns the last error `op` produced.
    pub fn run<T>(
        &self,
        mut op: impl FnMut(u32) -> Result<T, RenderError>,
    ) -> Result<T, RenderError> {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    attempt += 1;
                    let delay = self.delay_before(attempt);
                    warn!(%err, attempt, ?delay, "render attempt failed, retrying");
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_header_detection() {
        assert!(RenderFormat::Png.matches_header(b"\x89PNG\r\n\x1a\n\0\0"));
        assert!(!RenderFormat::Png.matches_header(b"<html>"));
        assert!(!RenderFormat::Png.matches_header(b""));
    }

    #[test]
    fn test_svg_header_detection() {
        assert!(RenderFormat::Svg.matches_header(b"  <svg xmlns=\"\"></svg>"));
        assert!(RenderFormat::Svg.matches_header(b"<?xml version=\"1.0\"?><svg/>"));
        assert!(!RenderFormat::Svg.matches_header(b"\x89PNG"));
    }

    #[test]
    fn test_extension_round_trip() {
        assert_eq!(RenderFormat::from_extension("PNG"), Some(RenderFormat::Png));
        assert_eq!(RenderFormat::from_extension("svg"), Some(RenderFormat::Svg));
        assert_eq!(RenderFormat::from_extension("gif"), None);
    }

    #[test]
    fn test_only_transient_errors_retry() {
        assert!(RenderError::Network("reset".into()).is_retryable());
        assert!(RenderError::Timeout.is_retryable());
        assert!(!RenderError::InvalidSource("bad".into()).is_retryable());
        assert!(!RenderError::Storage("full".into()).is_retryable());
    }

    #[test]
    fn test_retry_stops_after_budget() {
        let policy = RetryPolicy::immediate(3);
        let mut calls = 0;
        let result: Result<(), _> = policy.run(|_| {
            calls += 1;
            Err(RenderError::Timeout)
        });
        assert_eq!(result, Err(RenderError::Timeout));
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_retry_gives_up_on_invalid_source() {
        let policy = RetryPolicy::immediate(3);
        let mut calls = 0;
        let result: Result<(), _> = policy.run(|_| {
            calls += 1;
            Err(RenderError::InvalidSource("syntax".into()))
        });
        assert!(matches!(result, Err(RenderError::InvalidSource(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_retry_returns_first_success() {
        let policy = RetryPolicy::immediate(3);
        let result = policy.run(|attempt| {
            if attempt < 2 {
                Err(RenderError::Network("flaky".into()))
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(result, Ok(2));
    }

    #[test]
    fn test_default_delay_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay_before(2), Duration::from_millis(250));
        assert_eq!(policy.delay_before(3), Duration::from_millis(750));
        assert_eq!(policy.delay_before(4), Duration::from_millis(750));
    }
}
