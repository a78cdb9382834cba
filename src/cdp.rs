//! Chrome DevTools Protocol backend (uses the `headless_chrome` crate)
//!
//! Every request gets its own Chrome process. The process lives inside a
//! `CdpSession` and dies with it: dropping the session tears down the browser
//! even when `close` was never reached.

use crate::crop::{BoundingBox, CapturePlan, ClipRegion};
use crate::{Backend, Error, RenderConfig, Result, Session, Viewport};
use base64::Engine as Base64Engine;
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::{Emulation, Network, Page};
use headless_chrome::{Browser, LaunchOptions};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// Sessions currently holding a browser process
static LIVE_SESSIONS: AtomicUsize = AtomicUsize::new(0);

// Headroom on top of the load timeout before headless_chrome drops an idle connection
const IDLE_BROWSER_GRACE: Duration = Duration::from_secs(30);

const READINESS_SCRIPT: &str = r#"JSON.stringify({
    ready: document.readyState,
    fonts: document.fonts ? document.fonts.status : "loaded"
})"#;

const BODY_BOX_SCRIPT: &str = r#"(function() {
    const body = document.body;
    if (!body) return "null";
    const r = body.getBoundingClientRect();
    return JSON.stringify({ x: r.x, y: r.y, width: r.width, height: r.height });
})()"#;

const PAGE_SIZE_SCRIPT: &str = r#"(function() {
    const doc = document.documentElement;
    const body = document.body;
    return JSON.stringify({
        width: Math.max(doc.scrollWidth, body ? body.scrollWidth : 0, window.innerWidth),
        height: Math.max(doc.scrollHeight, body ? body.scrollHeight : 0, window.innerHeight)
    });
})()"#;

/// Number of CDP sessions whose browser has not been released yet.
pub fn live_sessions() -> usize {
    LIVE_SESSIONS.load(Ordering::SeqCst)
}

#[derive(Debug, Deserialize)]
struct Readiness {
    ready: String,
    fonts: String,
}

impl Readiness {
    fn settled(&self) -> bool {
        self.ready == "complete" && self.fonts == "loaded"
    }
}

/// Requests the page has started but not yet finished, fed by Network domain events.
#[derive(Debug, Default)]
struct NetworkTracker {
    in_flight: Mutex<HashSet<String>>,
    // Bumped on every start and finish, so short requests between two polls still count
    activity: AtomicU64,
}

impl NetworkTracker {
    fn request_started(&self, request_id: &str, url: &str) {
        // Inline payloads never emit a finish event
        if url.starts_with("data:") {
            return;
        }
        self.lock().insert(request_id.to_string());
        self.activity.fetch_add(1, Ordering::SeqCst);
    }

    fn request_finished(&self, request_id: &str) {
        if self.lock().remove(request_id) {
            self.activity.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn in_flight(&self) -> usize {
        self.lock().len()
    }

    fn activity(&self) -> u64 {
        self.activity.load(Ordering::SeqCst)
    }

    fn observe(&self, event: &Event) {
        match event {
            Event::NetworkRequestWillBeSent(e) => self.request_started(&e.params.request_id, &e.params.request.url),
            Event::NetworkLoadingFinished(e) => self.request_finished(&e.params.request_id),
            Event::NetworkLoadingFailed(e) => self.request_finished(&e.params.request_id),
            _ => {}
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Deserialize)]
struct PageSize {
    width: f64,
    height: f64,
}

/// Launches one headless Chrome per session
#[derive(Debug, Clone)]
pub struct CdpBackend {
    config: RenderConfig,
}

impl CdpBackend {
    pub fn new(config: RenderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl Backend for CdpBackend {
    type Session = CdpSession;

    fn launch(&self, viewport: Viewport) -> Result<CdpSession> {
        // Configure headless Chrome launch options
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(self.config.sandbox)
            .path(self.config.chrome_path.clone())
            .window_size(Some((viewport.width, viewport.height)))
            .idle_browser_timeout(self.config.load_timeout() + IDLE_BROWSER_GRACE)
            .build()
            .map_err(|e| Error::LaunchError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::LaunchError(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| Error::LaunchError(format!("Failed to create tab: {}", e)))?;

        LIVE_SESSIONS.fetch_add(1, Ordering::SeqCst);
        let session = CdpSession {
            _browser: browser,
            tab,
            network: Arc::new(NetworkTracker::default()),
        };

        // From here on an early return drops `session`, which releases the browser
        session.apply_viewport(viewport)?;
        session.track_network()?;
        Ok(session)
    }

    fn config(&self) -> &RenderConfig {
        &self.config
    }
}

/// A single page in a dedicated browser process
pub struct CdpSession {
    // Held for its Drop: the child Chrome process is killed with it
    _browser: Browser,
    tab: Arc<Tab>,
    network: Arc<NetworkTracker>,
}

impl CdpSession {
    fn track_network(&self) -> Result<()> {
        let network = self.network.clone();
        self.tab.add_event_listener(Arc::new(move |event: &Event| network.observe(event)))?;

        let enable: Network::Enable = protocol_command(json!({}))?;
        self.tab.call_method(enable)?;
        Ok(())
    }

    fn apply_viewport(&self, viewport: Viewport) -> Result<()> {
        let metrics: Emulation::SetDeviceMetricsOverride = protocol_command(json!({
            "width": viewport.width,
            "height": viewport.height,
            "deviceScaleFactor": viewport.device_scale_factor,
            "mobile": false
        }))?;

        self.tab
            .call_method(metrics)
            .map_err(|e| Error::LaunchError(format!("Failed to set viewport: {}", e)))?;
        Ok(())
    }

    /// Evaluate a script that returns a JSON string and decode it.
    fn eval_json<T: DeserializeOwned>(&self, script: &str) -> Result<T> {
        let eval = self
            .tab
            .evaluate(script, false)
            .map_err(|e| Error::RenderError(format!("Evaluation failed: {}", e)))?;

        match eval.value {
            Some(Value::String(s)) => serde_json::from_str(&s)
                .map_err(|e| Error::RenderError(format!("Unexpected script result: {}", e))),
            other => Err(Error::RenderError(format!("Script returned no string: {:?}", other))),
        }
    }

    /// Poll until the document is complete, fonts are loaded and no request
    /// has been in flight for one idle window.
    fn wait_for_network_idle(&self, config: &RenderConfig) -> Result<()> {
        let deadline = Instant::now() + config.load_timeout();
        let mut last_activity: Option<u64> = None;
        let mut quiet_since = Instant::now();

        loop {
            let readiness: Readiness = self.eval_json(READINESS_SCRIPT)?;
            let activity = self.network.activity();
            let in_flight = self.network.in_flight();
            let now = Instant::now();

            if !readiness.settled() || in_flight > 0 || last_activity != Some(activity) {
                last_activity = Some(activity);
                quiet_since = now;
            } else if now.duration_since(quiet_since) >= config.idle_window() {
                debug!("Page idle after {} network events", activity);
                return Ok(());
            }

            if now >= deadline {
                warn!("Network idle not reached before timeout ({:?}, {} in flight)", readiness, in_flight);
                return Err(Error::Timeout(config.load_timeout_ms));
            }
            std::thread::sleep(config.poll_interval());
        }
    }

    fn full_page_region(&self) -> Result<ClipRegion> {
        let size: PageSize = self.eval_json(PAGE_SIZE_SCRIPT)?;
        Ok(ClipRegion {
            x: 0,
            y: 0,
            width: size.width.ceil().max(1.0) as u32,
            height: size.height.ceil().max(1.0) as u32,
        })
    }
}

impl Session for CdpSession {
    fn load_html(&mut self, html: &str, config: &RenderConfig) -> Result<()> {
        // The document is written in place rather than navigated to
        let literal = serde_json::to_string(html)
            .map_err(|e| Error::LoadError(format!("Failed to encode HTML: {}", e)))?;
        let script = format!("document.open(); document.write({}); document.close(); true", literal);

        self.tab
            .evaluate(&script, false)
            .map_err(|e| Error::LoadError(format!("Failed to write document: {}", e)))?;

        self.wait_for_network_idle(config)
    }

    fn body_bounding_box(&mut self) -> Result<Option<BoundingBox>> {
        self.eval_json(BODY_BOX_SCRIPT)
    }

    fn capture(&mut self, plan: &CapturePlan, quality: u8) -> Result<Vec<u8>> {
        let region = match plan {
            CapturePlan::Clip(region) => *region,
            CapturePlan::FullPage => self.full_page_region()?,
        };

        let command: Page::CaptureScreenshot = protocol_command(json!({
            "format": "webp",
            "quality": quality,
            "clip": {
                "x": region.x,
                "y": region.y,
                "width": region.width,
                "height": region.height,
                "scale": 1
            },
            "fromSurface": true,
            "captureBeyondViewport": true
        }))?;

        let shot = self
            .tab
            .call_method(command)
            .map_err(|e| Error::CaptureError(format!("Screenshot failed: {}", e)))?;

        base64::engine::general_purpose::STANDARD
            .decode(shot.data)
            .map_err(|e| Error::CaptureError(format!("Invalid screenshot payload: {}", e)))
    }

    fn close(self) -> Result<()> {
        self.tab.close(false)?;
        Ok(())
    }
}

impl Drop for CdpSession {
    fn drop(&mut self) {
        LIVE_SESSIONS.fetch_sub(1, Ordering::SeqCst);
    }
}

// Protocol commands are built from their wire JSON so optional fields can be left out
fn protocol_command<C: DeserializeOwned>(params: Value) -> Result<C> {
    serde_json::from_value(params).map_err(|e| Error::CdpError(format!("Invalid protocol command: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_commands_accept_wire_json() {
        let _: Page::CaptureScreenshot = protocol_command(json!({
            "format": "webp",
            "quality": 80,
            "clip": { "x": 0, "y": 0, "width": 640, "height": 480, "scale": 1 },
            "fromSurface": true,
            "captureBeyondViewport": true
        }))
        .unwrap();

        let _: Emulation::SetDeviceMetricsOverride = protocol_command(json!({
            "width": 1280,
            "height": 800,
            "deviceScaleFactor": 1.0,
            "mobile": false
        }))
        .unwrap();
    }

    #[test]
    fn test_readiness_requires_complete_document_and_fonts() {
        let readiness: Readiness = serde_json::from_str(r#"{"ready": "interactive", "fonts": "loaded"}"#).unwrap();
        assert!(!readiness.settled());
        let readiness: Readiness = serde_json::from_str(r#"{"ready": "complete", "fonts": "loading"}"#).unwrap();
        assert!(!readiness.settled());
        let readiness: Readiness = serde_json::from_str(r#"{"ready": "complete", "fonts": "loaded"}"#).unwrap();
        assert!(readiness.settled());
    }

    #[test]
    fn test_network_tracker_counts_open_requests() {
        let tracker = NetworkTracker::default();
        tracker.request_started("1", "http://127.0.0.1/slow.png");
        tracker.request_started("2", "http://127.0.0.1/font.woff2");
        assert_eq!(tracker.in_flight(), 2);

        tracker.request_finished("1");
        assert_eq!(tracker.in_flight(), 1);
        tracker.request_finished("2");
        assert_eq!(tracker.in_flight(), 0);
        assert_eq!(tracker.activity(), 4);
    }

    #[test]
    fn test_network_tracker_redirects_and_unknown_ids() {
        let tracker = NetworkTracker::default();
        // A redirect re-announces the same request id
        tracker.request_started("7", "http://a.test/old");
        tracker.request_started("7", "http://a.test/new");
        assert_eq!(tracker.in_flight(), 1);

        tracker.request_finished("unknown");
        assert_eq!(tracker.in_flight(), 1);
        tracker.request_finished("7");
        assert_eq!(tracker.in_flight(), 0);
    }

    #[test]
    fn test_network_tracker_ignores_data_urls() {
        let tracker = NetworkTracker::default();
        tracker.request_started("3", "data:image/png;base64,iVBORw0KGgo=");
        assert_eq!(tracker.in_flight(), 0);
        assert_eq!(tracker.activity(), 0);
    }

    #[test]
    fn test_backend_rejects_invalid_config() {
        let cfg = RenderConfig { poll_interval_ms: 0, ..Default::default() };
        assert!(CdpBackend::new(cfg).is_err());
    }

    #[test]
    fn test_cdp_session_launch() {
        // This test requires Chrome to be installed, so we skip it in CI
        if std::env::var("CI").is_ok() {
            return;
        }
        let backend = CdpBackend::new(RenderConfig::default()).unwrap();
        let session = match backend.launch(Viewport::default()) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Skipping CDP launch test because Chrome is not available or failed to launch: {}", e);
                return;
            }
        };
        assert!(live_sessions() >= 1);
        session.close().ok();
    }
}
