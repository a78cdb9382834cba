use crate::capture::{self, Screenshot};
use crate::{Backend, Error, Result, ScreenshotRequest};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;

/// Run the blocking render pipeline on a dedicated worker thread.
///
/// The browser API is synchronous, so each request gets its own thread that
/// owns the session from launch to release. The async caller only waits on
/// a oneshot for the result and never blocks the executor.
pub async fn render<B: Backend>(backend: Arc<B>, request: ScreenshotRequest) -> Result<Screenshot> {
    let (tx, rx) = oneshot::channel();

    thread::Builder::new()
        .name("render-worker".into())
        .spawn(move || {
            let res = capture::render_screenshot(backend.as_ref(), &request);
            let _ = tx.send(res);
        })
        .map_err(|e| Error::Other(format!("Failed to spawn render worker: {}", e)))?;

    rx.await
        .map_err(|e| Error::Other(format!("Render worker exited: {}", e)))?
}

/// Like [`render`], but gives up waiting after `budget`.
///
/// The worker is not interrupted; it finishes on its own and still releases
/// its browser session.
pub async fn render_with_timeout<B: Backend>(
    backend: Arc<B>,
    request: ScreenshotRequest,
    budget: Duration,
) -> Result<Screenshot> {
    match tokio::time::timeout(budget, render(backend, request)).await {
        Ok(res) => res,
        Err(_) => Err(Error::Timeout(budget.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::tests::{FailAt, MockBackend};
    use crate::RenderConfig;

    fn request() -> ScreenshotRequest {
        ScreenshotRequest::new("<p>worker</p>").unwrap()
    }

    #[tokio::test]
    async fn test_render_on_worker_thread() {
        let backend = Arc::new(MockBackend::new());
        let shot = render(backend.clone(), request()).await.unwrap();
        assert!(!shot.data.is_empty());
        assert_eq!(backend.stats.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_worker_errors_are_returned() {
        let backend = Arc::new(MockBackend::failing_at(FailAt::Capture));
        let err = render(backend, request()).await.unwrap_err();
        assert!(matches!(err, Error::CaptureError(_)));
    }

    #[tokio::test]
    async fn test_budget_expiry_still_releases_session() {
        let backend = Arc::new(MockBackend {
            config: RenderConfig { settle_delay_ms: 300, ..Default::default() },
            ..MockBackend::new()
        });
        let err = render_with_timeout(backend.clone(), request(), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(20)));

        // The worker keeps going and releases its session after the settle delay
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(backend.stats.open_sessions(), 0);
        assert_eq!(backend.stats.launched.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
