// Capture source seam
//
// The platform capture service is injected through this trait so the session
// can be driven by a fake producer in tests. Delivery is an explicit
// message-passing boundary: the source pushes sample buffers onto a bounded
// channel that the session's drain task consumes one at a time.

use crate::frame::SampleBuffer;
use tokio::sync::{mpsc, oneshot};

/// Errors a capture source may report through its acknowledgments
///
/// These are logged and absorbed by the session, never propagated.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Capture source unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to start capture: {0}")]
    StartFailed(String),

    #[error("Failed to stop capture: {0}")]
    StopFailed(String),
}

/// A producer of sample buffers
///
/// Contract:
/// - `start` hands the source the only sender for the session's frame channel
///   and a oneshot for the start acknowledgment. The source acknowledges once
///   delivery is set up (or has failed to set up), then delivers buffers on an
///   execution context it controls, never two concurrently.
/// - `stop` requests cessation; after acknowledging, the source must stop
///   delivering and drop its sender so the consumer runs dry.
pub trait FrameSource: Send + Sync + 'static {
    fn start(
        &self,
        frames: mpsc::Sender<SampleBuffer>,
        ack: oneshot::Sender<Result<(), SourceError>>,
    );

    fn stop(&self, ack: oneshot::Sender<Result<(), SourceError>>);
}

impl<S: FrameSource> FrameSource for std::sync::Arc<S> {
    fn start(
        &self,
        frames: mpsc::Sender<SampleBuffer>,
        ack: oneshot::Sender<Result<(), SourceError>>,
    ) {
        (**self).start(frames, ack);
    }

    fn stop(&self, ack: oneshot::Sender<Result<(), SourceError>>) {
        (**self).stop(ack);
    }
}
