//! Per-request render pipeline
//!
//! `render_screenshot` owns the one browser session of a request. The session
//! is acquired once and always closed, whether the pipeline finished, failed
//! or timed out. A failing close never replaces the pipeline's own result.

use crate::crop::{plan_capture, CapturePlan};
use crate::{Backend, Error, RenderConfig, Result, ScreenshotRequest, Session};
use log::debug;
use std::time::Instant;

/// Encoded image produced for one request
#[derive(Debug, Clone)]
pub struct Screenshot {
    /// WebP bytes
    pub data: Vec<u8>,
    /// How the capture region was chosen
    pub plan: CapturePlan,
}

/// Render a validated request into a cropped WebP screenshot.
pub fn render_screenshot<B: Backend>(backend: &B, request: &ScreenshotRequest) -> Result<Screenshot> {
    let config = backend.config();
    let viewport = config.viewport_for(request.width);
    let started = Instant::now();

    let mut session = backend.launch(viewport)?;
    debug!("Browser session opened ({}x{})", viewport.width, viewport.height);

    let result = drive(&mut session, request, config);

    if let Err(e) = session.close() {
        debug!("Ignoring browser cleanup failure: {}", e);
    }
    debug!("Browser session released after {:?}", started.elapsed());

    result
}

fn drive<S: Session>(session: &mut S, request: &ScreenshotRequest, config: &RenderConfig) -> Result<Screenshot> {
    session.load_html(&request.html, config)?;

    // Let late fonts and images finish painting
    let settle = config.settle_delay();
    if !settle.is_zero() {
        std::thread::sleep(settle);
    }

    let bbox = session.body_bounding_box()?;
    let plan = plan_capture(bbox);
    if plan == CapturePlan::FullPage {
        debug!("Body box unavailable ({:?}); capturing full page", bbox);
    }

    let data = session.capture(&plan, request.quality)?;
    if data.is_empty() {
        return Err(Error::CaptureError("browser returned an empty image".into()));
    }

    Ok(Screenshot { data, plan })
}
