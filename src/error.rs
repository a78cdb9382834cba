//! Error types for the screenshot service

use thiserror::Error;

/// Result type alias for screenshot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while validating or rendering a screenshot request
#[derive(Error, Debug)]
pub enum Error {
    /// The request payload was malformed or out of range
    #[error("{0}")]
    InvalidRequest(String),

    /// The request body was larger than the server accepts
    #[error("Request body exceeds the {0} byte limit.")]
    PayloadTooLarge(usize),

    /// Failed to launch the browser or open a page
    #[error("Browser launch failed: {0}")]
    LaunchError(String),

    /// Failed to load the HTML document
    #[error("Failed to load HTML: {0}")]
    LoadError(String),

    /// Failed to measure or lay out the rendered page
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Failed to capture or encode the image
    #[error("Capture failed: {0}")]
    CaptureError(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error was caused by the caller's input rather than by rendering.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::InvalidRequest(_) | Error::PayloadTooLarge(_))
    }
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_request_displays_bare_message() {
        let err = Error::InvalidRequest("\"quality\" must be between 1 and 100.".into());
        assert_eq!(err.to_string(), "\"quality\" must be between 1 and 100.");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_render_errors_are_not_client_errors() {
        assert!(!Error::Timeout(30000).is_client_error());
        assert!(!Error::LaunchError("no chrome".into()).is_client_error());
        assert_eq!(Error::Timeout(250).to_string(), "Operation timed out after 250ms");
    }

    #[test]
    fn test_oversized_body_is_a_client_error() {
        let err = Error::PayloadTooLarge(1024);
        assert!(err.is_client_error());
        assert_eq!(err.to_string(), "Request body exceeds the 1024 byte limit.");
    }

    #[cfg(feature = "cdp")]
    #[test]
    fn test_anyhow_errors_become_cdp_errors() {
        let err: Error = anyhow::anyhow!("Method not found").into();
        assert!(matches!(err, Error::CdpError(ref msg) if msg == "Method not found"));
        assert!(!err.is_client_error());
    }
}
