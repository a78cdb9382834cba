//! ScreenshotDONE
//!
//! An HTML to WebP screenshot service. A request carries an HTML document, the
//! service renders it in a fresh headless Chrome, crops the capture to the
//! `<body>` bounding box and returns the encoded image.
//!
//! # Features
//!
//! - **CDP Backend** (default): Uses Chrome DevTools Protocol via headless Chrome
//! - **One browser per request**: Sessions are never pooled or reused
//! - **Guaranteed release**: Every acquired session is closed on every exit path
//!
//! # Example
//!
//! ```no_run
//! use screenshotdone::{capture, RenderConfig, ScreenshotRequest};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = screenshotdone::new_backend(RenderConfig::default())?;
//! let request = ScreenshotRequest::from_json(br#"{"html": "<h1>Hi</h1>", "width": 800}"#)?;
//! let shot = capture::render_screenshot(&backend, &request)?;
//! std::fs::write("shot.webp", &shot.data)?;
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

pub mod error;
pub use error::{Error, Result};

pub mod capture;
pub mod crop;
pub mod request;

pub use crop::{BoundingBox, CapturePlan, ClipRegion};
pub use request::ScreenshotRequest;

#[cfg(feature = "cdp")]
pub mod cdp;

// Worker-thread bridge between the blocking pipeline and async handlers
pub mod async_api;

pub mod http;
pub mod server;

/// Smallest viewport width a request can ask for
pub const MIN_WIDTH: u32 = 320;
/// Largest viewport width a request can ask for
pub const MAX_WIDTH: u32 = 3840;
/// Viewport width used when the request omits `width`
pub const DEFAULT_WIDTH: u32 = 1280;
/// WebP quality used when the request omits `quality`
pub const DEFAULT_QUALITY: u8 = 80;
/// Nominal viewport height; content taller than this is still captured
pub const VIEWPORT_HEIGHT: u32 = 800;

/// Configuration shared by every render
///
/// Like the request payload, nothing here changes between requests. The
/// defaults mirror the hosted service: a 30s load budget followed by a short
/// settle delay for late fonts and images.
///
/// # Examples
///
/// ```
/// let cfg = screenshotdone::RenderConfig::default();
/// assert_eq!(cfg.load_timeout_ms, 30000);
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Viewport height handed to the browser
    pub viewport_height: u32,
    /// Upper bound on the network-idle wait in milliseconds
    pub load_timeout_ms: u64,
    /// Fixed delay after the page is idle, in milliseconds
    pub settle_delay_ms: u64,
    /// How long the page must stay quiet to count as idle, in milliseconds
    pub idle_window_ms: u64,
    /// Interval between readiness checks, in milliseconds
    pub poll_interval_ms: u64,
    /// Explicit Chrome/Chromium binary; autodetected when `None`
    pub chrome_path: Option<PathBuf>,
    /// Whether Chrome keeps its sandbox (containers usually need `false`)
    pub sandbox: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            viewport_height: VIEWPORT_HEIGHT,
            load_timeout_ms: 30000,
            settle_delay_ms: 500,
            idle_window_ms: 500,
            poll_interval_ms: 100,
            chrome_path: None,
            sandbox: true,
        }
    }
}

impl RenderConfig {
    /// Reject settings that would make the pipeline spin or never finish.
    pub fn validate(&self) -> Result<()> {
        if self.viewport_height == 0 {
            return Err(Error::ConfigError("viewport height must be positive".into()));
        }
        if self.load_timeout_ms == 0 {
            return Err(Error::ConfigError("load timeout must be positive".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::ConfigError("poll interval must be positive".into()));
        }
        Ok(())
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn idle_window(&self) -> Duration {
        Duration::from_millis(self.idle_window_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Viewport for a request of the given (already clamped) width
    pub fn viewport_for(&self, width: u32) -> Viewport {
        Viewport {
            width,
            height: self.viewport_height,
            device_scale_factor: 1.0,
        }
    }
}

/// Viewport dimensions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: VIEWPORT_HEIGHT,
            device_scale_factor: 1.0,
        }
    }
}

/// An open browser page, owned by exactly one request
///
/// Implementations are driven strictly in order: `load_html`, then
/// `body_bounding_box`, then `capture`, and finally `close`.
pub trait Session {
    /// Load an HTML string into the page and wait until network activity settles
    fn load_html(&mut self, html: &str, config: &RenderConfig) -> Result<()>;

    /// Measure the `<body>` element. `None` means the element has no box.
    fn body_bounding_box(&mut self) -> Result<Option<BoundingBox>>;

    /// Capture the page as WebP according to the plan
    fn capture(&mut self, plan: &CapturePlan, quality: u8) -> Result<Vec<u8>>;

    /// Close the page and its browser
    fn close(self) -> Result<()>;
}

/// Source of fresh browser sessions
///
/// `launch` is called once per request; sessions are never handed out twice.
pub trait Backend: Send + Sync + 'static {
    type Session: Session;

    /// Launch an isolated browser with the given viewport
    fn launch(&self, viewport: Viewport) -> Result<Self::Session>;

    /// Render settings applied to every session from this backend
    fn config(&self) -> &RenderConfig;
}

/// Create the default backend
///
/// This is the CDP backend when the `cdp` feature is enabled (default).
#[cfg(feature = "cdp")]
pub fn new_backend(config: RenderConfig) -> Result<cdp::CdpBackend> {
    cdp::CdpBackend::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RenderConfig::default();
        assert_eq!(config.viewport_height, 800);
        assert_eq!(config.settle_delay(), Duration::from_millis(500));
        assert!(config.sandbox);
        assert!(config.chrome_path.is_none());
    }

    #[test]
    fn test_viewport_for_uses_fixed_height_and_scale() {
        let viewport = RenderConfig::default().viewport_for(1920);
        assert_eq!(viewport.width, 1920);
        assert_eq!(viewport.height, VIEWPORT_HEIGHT);
        assert_eq!(viewport.device_scale_factor, 1.0);
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let cfg = RenderConfig { load_timeout_ms: 0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(Error::ConfigError(_))));

        let cfg = RenderConfig { poll_interval_ms: 0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(Error::ConfigError(_))));

        let cfg = RenderConfig { viewport_height: 0, ..Default::default() };
        assert!(matches!(cfg.validate(), Err(Error::ConfigError(_))));
    }
}
