// SPDX-License-Identifier: GPL-3.0-only

//! Captured photos and their single-shot completion

use crate::errors::CaptureError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Identifies one `capture_photo()` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CaptureRequestId(pub u64);

impl std::fmt::Display for CaptureRequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Encoded still image produced by one capture request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPhoto {
    pub request_id: CaptureRequestId,
    /// JPEG bytes
    pub data: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
}

/// Completion of a capture request
///
/// Resolves exactly once. Dropping it does not cancel the capture; the photo
/// is still taken and saved.
#[derive(Debug)]
pub struct PendingCapture {
    request_id: CaptureRequestId,
    receiver: oneshot::Receiver<Result<CapturedPhoto, CaptureError>>,
}

impl PendingCapture {
    pub(crate) fn new(
        request_id: CaptureRequestId,
        receiver: oneshot::Receiver<Result<CapturedPhoto, CaptureError>>,
    ) -> Self {
        Self {
            request_id,
            receiver,
        }
    }

    pub fn request_id(&self) -> CaptureRequestId {
        self.request_id
    }
}

impl Future for PendingCapture {
    type Output = Result<CapturedPhoto, CaptureError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|received| {
            // The sender only disappears unsent if the capture task was torn down
            received.unwrap_or_else(|_| {
                Err(CaptureError::CaptureFailed(
                    "capture task ended without a result".to_string(),
                ))
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dropped_sender_completes_with_failure() {
        let (tx, rx) = oneshot::channel();
        let pending = PendingCapture::new(CaptureRequestId(7), rx);
        drop(tx);

        assert_eq!(pending.request_id(), CaptureRequestId(7));
        assert!(matches!(pending.await, Err(CaptureError::CaptureFailed(_))));
    }
}
