// Capture session lifecycle
//
// Single point of control over the injected capture source: start, stop, and
// the "is currently capturing" state. The session owns the source and
// guarantees it is never double-started or double-stopped.

use crate::config::CaptureConfig;
use crate::frame::SampleBuffer;
use crate::sink::{FrameSink, SinkStats};
use crate::source::FrameSource;
use crate::storage;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

/// Snapshot of a session's progress
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    /// Start timestamp (milliseconds since epoch), if a session ran
    pub started_at: Option<u64>,
    /// Seconds spent capturing
    pub duration: f64,
    /// Snapshots written
    pub written: u64,
    /// Video buffers skipped for missing pixel storage
    pub skipped: u64,
    /// Non-video buffers ignored
    pub ignored: u64,
    /// Frames lost to encode or write failures
    pub dropped: u64,
}

/// State behind the session mutex; the capturing flag lives outside so
/// `is_capturing` never blocks on an in-flight start or stop.
struct SessionInner {
    drain: Option<JoinHandle<()>>,
    stats: Arc<SinkStats>,
    started_at: Option<u64>,
    stopped_at: Option<u64>,
}

/// Owns the capture source and the frame drain task
pub struct CaptureSession<S: FrameSource> {
    source: S,
    config: CaptureConfig,
    capturing: AtomicBool,
    inner: Mutex<SessionInner>,
}

impl<S: FrameSource> CaptureSession<S> {
    /// Creates a session around an injected source; nothing starts until
    /// [`start`](Self::start) is called
    pub fn new(source: S, config: CaptureConfig) -> Self {
        Self {
            source,
            config,
            capturing: AtomicBool::new(false),
            inner: Mutex::new(SessionInner {
                drain: None,
                stats: Arc::new(SinkStats::default()),
                started_at: None,
                stopped_at: None,
            }),
        }
    }

    /// Whether a capture is currently running; safe to call from any context
    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    /// Directory that receives this session's snapshots
    ///
    /// Exists and holds only the current session's snapshots immediately
    /// after `start` returns; untouched after `stop`.
    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    /// Starts capture; a no-op when already capturing
    ///
    /// Resets the output directory strictly before the source is told to
    /// begin, then awaits the source's start acknowledgment. A source-reported
    /// start error is logged, not propagated: capture may still proceed, or
    /// the source may simply never deliver. The future resolving is the
    /// ready acknowledgment.
    pub async fn start(&self) {
        let mut inner = self.inner.lock().await;
        if self.is_capturing() {
            log::debug!("[Session] Start requested while already capturing, ignoring");
            return;
        }

        storage::reset_output_dir(&self.config.output_dir);

        let stats = Arc::new(SinkStats::default());
        let sink = FrameSink::new(
            self.config.output_dir.clone(),
            self.config.jpeg_quality_factor(),
            stats.clone(),
        );
        let (frame_tx, frame_rx) = mpsc::channel(self.config.queue_depth);
        inner.drain = Some(tokio::spawn(drain_frames(frame_rx, sink)));
        inner.stats = stats;

        let (ack_tx, ack_rx) = oneshot::channel();
        self.source.start(frame_tx, ack_tx);
        match ack_rx.await {
            Ok(Ok(())) => log::info!("[Session] Capture started"),
            Ok(Err(e)) => log::error!("[Session] Source reported start error: {}", e),
            Err(_) => log::error!("[Session] Source dropped its start acknowledgment"),
        }

        inner.started_at = Some(chrono::Utc::now().timestamp_millis() as u64);
        inner.stopped_at = None;
        self.capturing.store(true, Ordering::SeqCst);
    }

    /// Stops capture; a no-op when idle
    ///
    /// Requests the source stop, awaits its acknowledgment, then joins the
    /// drain task so frames already queued finish their writes. Errors during
    /// stop are logged, not propagated. The future resolving is the stopped
    /// acknowledgment.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        if !self.is_capturing() {
            log::debug!("[Session] Stop requested while idle, ignoring");
            return;
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        self.source.stop(ack_tx);
        match ack_rx.await {
            Ok(Ok(())) => log::info!("[Session] Capture stopped"),
            Ok(Err(e)) => log::error!("[Session] Source reported stop error: {}", e),
            Err(_) => log::error!("[Session] Source dropped its stop acknowledgment"),
        }

        // The source drops its sender after acknowledging stop, so the drain
        // task runs the queue dry and exits. In-flight writes complete.
        if let Some(drain) = inner.drain.take() {
            if let Err(e) = drain.await {
                log::error!("[Session] Frame drain task failed: {}", e);
            }
        }

        inner.stopped_at = Some(chrono::Utc::now().timestamp_millis() as u64);
        self.capturing.store(false, Ordering::SeqCst);
    }

    /// Current session counters and timing
    pub async fn stats(&self) -> SessionStats {
        let inner = self.inner.lock().await;
        let duration = match (inner.started_at, inner.stopped_at) {
            (Some(start), Some(end)) => (end.saturating_sub(start)) as f64 / 1000.0,
            (Some(start), None) => {
                let now = chrono::Utc::now().timestamp_millis() as u64;
                (now.saturating_sub(start)) as f64 / 1000.0
            }
            _ => 0.0,
        };
        SessionStats {
            started_at: inner.started_at,
            duration,
            written: inner.stats.written.load(Ordering::Relaxed),
            skipped: inner.stats.skipped.load(Ordering::Relaxed),
            ignored: inner.stats.ignored.load(Ordering::Relaxed),
            dropped: inner.stats.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Drains the frame channel one buffer at a time
///
/// Frame processing is serialized by this single consumer, so the sink needs
/// no locking of its own. A contract violation is a source-side programming
/// error: it halts a debug build and is logged loudly in release, the frame
/// abandoned either way.
async fn drain_frames(mut frames: mpsc::Receiver<SampleBuffer>, mut sink: FrameSink) {
    while let Some(buffer) = frames.recv().await {
        match sink.process(buffer) {
            Ok(outcome) => log::trace!("[Session] Frame outcome: {:?}", outcome),
            Err(violation) => {
                log::error!(
                    "[Session] Capture source violated its delivery contract: {}",
                    violation
                );
                debug_assert!(false, "capture source contract violated: {violation}");
            }
        }
    }
    log::debug!("[Session] Frame channel closed, drain task exiting");
}
