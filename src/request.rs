//! Request payload parsing and validation
//!
//! Everything here runs before any browser is launched, so a rejected request
//! never costs a Chrome process.

use crate::{Error, Result, DEFAULT_QUALITY, DEFAULT_WIDTH, MAX_WIDTH, MIN_WIDTH};
use serde_json::{Map, Value};

pub const INVALID_BODY: &str = "Request body must be a JSON object.";
pub const INVALID_HTML: &str = "Missing or invalid \"html\" field. Must be a non-empty string.";
pub const INVALID_QUALITY: &str = "\"quality\" must be between 1 and 100.";
pub const INVALID_WIDTH: &str = "\"width\" must be a number.";

/// A validated screenshot request
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenshotRequest {
    /// HTML document to render (never empty)
    pub html: String,
    /// Viewport width, already clamped into `MIN_WIDTH..=MAX_WIDTH`
    pub width: u32,
    /// WebP quality in `1..=100`
    pub quality: u8,
}

impl ScreenshotRequest {
    /// Build a request with default width and quality.
    pub fn new(html: impl Into<String>) -> Result<Self> {
        Self::build(html.into(), None, None)
    }

    /// Build a request from CLI-style arguments, applying the same rules as the API.
    pub fn build(html: String, width: Option<f64>, quality: Option<f64>) -> Result<Self> {
        if html.is_empty() {
            return Err(Error::InvalidRequest(INVALID_HTML.into()));
        }
        let quality = match quality {
            Some(q) => quality_from_f64(q)?,
            None => DEFAULT_QUALITY,
        };
        let width = width.map(clamp_width).unwrap_or(DEFAULT_WIDTH);
        Ok(Self { html, width, quality })
    }

    /// Parse and validate a raw JSON request body.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let value: Value =
            serde_json::from_slice(body).map_err(|_| Error::InvalidRequest(INVALID_BODY.into()))?;
        match value {
            Value::Object(map) => Self::from_object(&map),
            _ => Err(Error::InvalidRequest(INVALID_BODY.into())),
        }
    }

    fn from_object(map: &Map<String, Value>) -> Result<Self> {
        let html = match map.get("html") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => return Err(Error::InvalidRequest(INVALID_HTML.into())),
        };

        let quality = match map.get("quality") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => n.as_f64(),
            Some(_) => return Err(Error::InvalidRequest(INVALID_QUALITY.into())),
        };

        let width = match map.get("width") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => n.as_f64(),
            Some(_) => return Err(Error::InvalidRequest(INVALID_WIDTH.into())),
        };

        Self::build(html, width, quality)
    }
}

/// Clamp a requested width into the supported range, rounding fractional pixels.
pub fn clamp_width(width: f64) -> u32 {
    if width.is_nan() {
        return DEFAULT_WIDTH;
    }
    width.round().clamp(MIN_WIDTH as f64, MAX_WIDTH as f64) as u32
}

fn quality_from_f64(quality: f64) -> Result<u8> {
    if quality.fract() != 0.0 || !(1.0..=100.0).contains(&quality) {
        return Err(Error::InvalidRequest(INVALID_QUALITY.into()));
    }
    Ok(quality as u8)
}
