//! Bounded thumbnail capture.
//!
//! A thumbnail is taken from the next frame the runtime draws anyway. If no
//! frame arrives within the wait, a render is forced and the same bound
//! applies once more. Capture never blocks indefinitely.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::debug;

use rp_types::Thumbnail;

use crate::error::{SdkError, SdkResult};
use crate::runtime::DocumentRuntime;

pub async fn capture_thumbnail(runtime: &dyn DocumentRuntime, wait: Duration) -> SdkResult<Thumbnail> {
    let (reply, mut frame) = oneshot::channel();
    runtime.request_thumbnail(reply);

    match timeout(wait, &mut frame).await {
        Ok(Ok(thumbnail)) => return Ok(thumbnail),
        Ok(Err(_)) => return Err(timed_out(wait)),
        Err(_) => debug!(wait_ms = wait.as_millis() as u64, "no frame drawn; forcing a render"),
    }

    runtime.force_render();
    match timeout(wait, frame).await {
        Ok(Ok(thumbnail)) => Ok(thumbnail),
        Ok(Err(_)) | Err(_) => Err(timed_out(wait)),
    }
}

fn timed_out(wait: Duration) -> SdkError {
    SdkError::ThumbnailTimeout {
        waited_ms: (wait * 2).as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryDocument, RenderMode};

    const WAIT: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn running_document_answers_without_forcing() {
        let doc = MemoryDocument::new();
        let thumbnail = capture_thumbnail(&doc, WAIT).await.unwrap();
        assert_eq!(thumbnail.mime_type, "image/png");
        assert_eq!(doc.frames_rendered(), 1);
    }

    #[tokio::test]
    async fn idle_document_is_forced_to_render() {
        let doc = MemoryDocument::new();
        doc.set_render_mode(RenderMode::Idle);
        capture_thumbnail(&doc, WAIT).await.unwrap();
        assert_eq!(doc.frames_rendered(), 1);
        assert_eq!(doc.pending_thumbnails(), 0);
    }

    #[tokio::test]
    async fn frozen_document_times_out() {
        let doc = MemoryDocument::new();
        doc.set_render_mode(RenderMode::Frozen);
        let err = capture_thumbnail(&doc, WAIT).await.unwrap_err();
        assert!(matches!(err, SdkError::ThumbnailTimeout { waited_ms: 40 }));
    }
}
