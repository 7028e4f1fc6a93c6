// Primary-monitor capture source built on xcap
//
// Produces contract-conforming sample buffers on a dedicated producer thread,
// paced at the configured frame rate and stamped with nanoseconds elapsed
// since the producer epoch.

use crate::frame::{PixelBuffer, SampleBuffer};
use crate::source::{FrameSource, SourceError};
use crate::timing::FramePacer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use xcap::Monitor;

/// Live screen-capture source for the primary monitor
pub struct DisplaySource {
    frame_rate: u32,
    running: Arc<AtomicBool>,
}

impl DisplaySource {
    pub fn new(frame_rate: u32) -> Self {
        Self {
            frame_rate,
            running: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Finds the primary monitor, falling back to the first one when none
/// reports itself primary
fn primary_monitor() -> Result<Monitor, SourceError> {
    let mut monitors = Monitor::all()
        .map_err(|e| SourceError::Unavailable(format!("Failed to enumerate monitors: {}", e)))?;

    if monitors.is_empty() {
        return Err(SourceError::Unavailable("No monitor found".to_string()));
    }

    let index = monitors
        .iter()
        .position(|m| m.is_primary().unwrap_or(false))
        .unwrap_or(0);
    Ok(monitors.swap_remove(index))
}

impl FrameSource for DisplaySource {
    fn start(
        &self,
        frames: mpsc::Sender<SampleBuffer>,
        ack: oneshot::Sender<Result<(), SourceError>>,
    ) {
        let running = self.running.clone();
        running.store(true, Ordering::SeqCst);
        let frame_rate = self.frame_rate;

        thread::spawn(move || {
            let monitor = match primary_monitor() {
                Ok(monitor) => monitor,
                Err(e) => {
                    log::error!("[Display] {}", e);
                    let _ = ack.send(Err(e));
                    return;
                }
            };

            log::info!("[Display] Capturing primary monitor at {} fps", frame_rate);
            let _ = ack.send(Ok(()));

            let epoch = Instant::now();
            let mut pacer = FramePacer::new(frame_rate);

            while running.load(Ordering::SeqCst) {
                let wait = pacer.until_next_frame();
                if !wait.is_zero() {
                    thread::sleep(wait);
                }

                match monitor.capture_image() {
                    Ok(image) => {
                        let (width, height) = (image.width(), image.height());
                        let pixels = PixelBuffer::new(width, height, image.into_raw());
                        let pts_nanos = epoch.elapsed().as_nanos() as i64;
                        let buffer = SampleBuffer::video(pixels, pts_nanos);

                        if frames.blocking_send(buffer).is_err() {
                            log::debug!("[Display] Frame channel closed, producer exiting");
                            break;
                        }
                        pacer.mark_captured();
                    }
                    Err(e) => {
                        log::warn!("[Display] Screen capture failed, dropping frame: {}", e);
                        pacer.mark_dropped();
                    }
                }
            }

            log::info!(
                "[Display] Producer stopped after {} frames ({} dropped, {:.1} fps)",
                pacer.captured(),
                pacer.dropped(),
                pacer.actual_fps()
            );
            // Sender drops here, closing the channel for the drain task.
        });
    }

    fn stop(&self, ack: oneshot::Sender<Result<(), SourceError>>) {
        self.running.store(false, Ordering::SeqCst);
        let _ = ack.send(Ok(()));
    }
}
