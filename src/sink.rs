// Frame sink: turns one delivered sample buffer into one snapshot file
//
// Runs on the session's drain task, one buffer at a time. Contract checks are
// returned as distinguished errors rather than asserted, so the failure path
// is testable; the drain loop decides how loudly to react.

use crate::frame::{MediaKind, SampleBuffer, NANOSECOND_TIMESCALE};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbaImage};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A violation of the capture source's delivery contract
///
/// These indicate a programming error on the source side, not a recoverable
/// runtime condition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameContractError {
    #[error("Buffer reports itself invalid")]
    NotValid,

    #[error("Buffer data is not ready")]
    NotReady,

    #[error("Presentation timestamp timescale is {timescale}, expected nanoseconds")]
    WrongTimescale { timescale: u32 },

    #[error("Output presentation timestamp differs from presentation timestamp")]
    ReorderedPresentation,

    #[error("Decode timestamp unexpectedly valid on progressive delivery")]
    UnexpectedDecodeTimestamp,

    #[error("Duration unexpectedly valid on single-sample delivery")]
    UnexpectedDuration,

    #[error("Buffer carries {count} timed samples, expected exactly 1")]
    WrongSampleCount { count: usize },

    #[error("Sample timing does not match buffer-level timing")]
    SampleTimingMismatch,

    #[error("Raster is {actual} bytes, expected {expected}")]
    BadRaster { expected: usize, actual: usize },
}

/// What the sink did with one delivered buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkOutcome {
    /// Snapshot written at the contained path
    Written(PathBuf),
    /// Non-video buffer, not processed
    Ignored,
    /// Video buffer with a null pixel handle, nothing to do
    Skipped,
    /// Encode or write failed; logged and the frame lost
    Dropped,
}

/// Per-session frame counters, shared with the session for its stats surface
#[derive(Debug, Default)]
pub struct SinkStats {
    pub written: AtomicU64,
    pub skipped: AtomicU64,
    pub ignored: AtomicU64,
    pub dropped: AtomicU64,
}

/// Writes each accepted frame as a JPEG named by its presentation timestamp
pub struct FrameSink {
    output_dir: PathBuf,
    /// JPEG quality factor, 1–100
    quality: u8,
    stats: Arc<SinkStats>,
}

impl FrameSink {
    pub fn new(output_dir: PathBuf, quality: u8, stats: Arc<SinkStats>) -> Self {
        Self {
            output_dir,
            quality,
            stats,
        }
    }

    /// Processes one delivered buffer
    ///
    /// Completes (or releases all frame resources) before returning, since the
    /// source may reuse the buffer storage afterwards. An `Err` means the
    /// source violated its delivery contract; every soft failure is logged and
    /// reported as a [`SinkOutcome`].
    pub fn process(&mut self, buffer: SampleBuffer) -> Result<SinkOutcome, FrameContractError> {
        self.process_buffer(&buffer)
    }

    /// Borrowing core of [`process`](Self::process); the buffer outlives the
    /// call, so the pixel lock state stays observable after a rejection
    fn process_buffer(&mut self, buffer: &SampleBuffer) -> Result<SinkOutcome, FrameContractError> {
        if buffer.kind != MediaKind::Video {
            self.stats.ignored.fetch_add(1, Ordering::Relaxed);
            return Ok(SinkOutcome::Ignored);
        }

        let Some(pixels) = buffer.pixels.as_ref() else {
            log::debug!("[Sink] Video buffer without pixel storage, skipping");
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            return Ok(SinkOutcome::Skipped);
        };

        // Guard scope covers validation and encode, so the read lock is
        // released on every exit path.
        let jpeg = {
            let raster = pixels.lock_read();
            validate_contract(buffer)?;

            if raster.len() != pixels.expected_len() {
                return Err(FrameContractError::BadRaster {
                    expected: pixels.expected_len(),
                    actual: raster.len(),
                });
            }

            match encode_jpeg(pixels.width(), pixels.height(), &raster, self.quality) {
                Ok(jpeg) => jpeg,
                Err(e) => {
                    log::error!("[Sink] JPEG encode failed: {}", e);
                    self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                    return Ok(SinkOutcome::Dropped);
                }
            }
        };

        // Filename: presentation seconds to exactly three decimals, standard
        // rounding. A later frame with an identical millisecond timestamp
        // overwrites the earlier snapshot.
        let filename = format!("{:.3}", buffer.pts.seconds());
        let path = self.output_dir.join(filename);

        match fs::write(&path, &jpeg) {
            Ok(()) => {
                self.stats.written.fetch_add(1, Ordering::Relaxed);
                Ok(SinkOutcome::Written(path))
            }
            Err(e) => {
                log::error!("[Sink] Failed to write {}: {}", path.display(), e);
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                Ok(SinkOutcome::Dropped)
            }
        }
    }
}

/// Checks the timing contract a well-formed video buffer must satisfy
fn validate_contract(buffer: &SampleBuffer) -> Result<(), FrameContractError> {
    if !buffer.is_valid {
        return Err(FrameContractError::NotValid);
    }
    if !buffer.data_ready {
        return Err(FrameContractError::NotReady);
    }
    if !buffer.pts.valid || buffer.pts.timescale != NANOSECOND_TIMESCALE {
        return Err(FrameContractError::WrongTimescale {
            timescale: buffer.pts.timescale,
        });
    }
    if buffer.output_pts != buffer.pts {
        return Err(FrameContractError::ReorderedPresentation);
    }
    if !buffer.dts.seconds().is_nan() || !buffer.output_dts.seconds().is_nan() {
        return Err(FrameContractError::UnexpectedDecodeTimestamp);
    }
    if !buffer.duration.seconds().is_nan() {
        return Err(FrameContractError::UnexpectedDuration);
    }
    if buffer.samples.len() != 1 {
        return Err(FrameContractError::WrongSampleCount {
            count: buffer.samples.len(),
        });
    }

    let timing = &buffer.samples[0];
    let decode_matches = timing.decode == buffer.dts
        || (timing.decode.is_invalid() && buffer.dts.is_invalid());
    let duration_matches = timing.duration == buffer.duration
        || (timing.duration.is_invalid() && buffer.duration.is_invalid());
    if timing.presentation != buffer.pts || !decode_matches || !duration_matches {
        return Err(FrameContractError::SampleTimingMismatch);
    }

    Ok(())
}

/// Encodes an RGBA raster as a JPEG at the given quality factor
///
/// The RGB conversion and encoder are dropped before the caller writes, so
/// transient buffers do not pile up under sustained frame rates.
fn encode_jpeg(width: u32, height: u32, rgba: &[u8], quality: u8) -> Result<Vec<u8>, String> {
    let raster = RgbaImage::from_raw(width, height, rgba.to_vec())
        .ok_or_else(|| format!("Raster does not fit {}x{}", width, height))?;
    let rgb = DynamicImage::ImageRgba8(raster).to_rgb8();

    let mut jpeg = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut jpeg, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| e.to_string())?;
    Ok(jpeg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{MediaTime, PixelBuffer, SampleTiming};
    use std::path::Path;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir =
            std::env::temp_dir().join(format!("screensnap-sink-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sink_for(dir: &Path) -> FrameSink {
        FrameSink::new(dir.to_path_buf(), 50, Arc::new(SinkStats::default()))
    }

    fn raster(width: u32, height: u32) -> PixelBuffer {
        PixelBuffer::new(width, height, vec![128u8; (width * height * 4) as usize])
    }

    #[test]
    fn writes_snapshot_named_by_rounded_pts() {
        let dir = scratch_dir("rounding");
        let mut sink = sink_for(&dir);

        // 12.3456 s rounds to 12.346
        let outcome = sink
            .process(SampleBuffer::video(raster(4, 4), 12_345_600_000))
            .unwrap();

        assert_eq!(outcome, SinkOutcome::Written(dir.join("12.346")));
        let bytes = fs::read(dir.join("12.346")).unwrap();
        assert!(image::load_from_memory(&bytes).is_ok());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn ignores_audio_buffers() {
        let dir = scratch_dir("audio");
        let mut sink = sink_for(&dir);

        let outcome = sink.process(SampleBuffer::audio(100_000_000)).unwrap();

        assert_eq!(outcome, SinkOutcome::Ignored);
        assert!(crate::storage::list_snapshots(&dir).is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn skips_video_buffer_without_pixels() {
        let dir = scratch_dir("no-pixels");
        let mut sink = sink_for(&dir);

        let mut buffer = SampleBuffer::video(raster(4, 4), 100_000_000);
        buffer.pixels = None;

        assert_eq!(sink.process(buffer).unwrap(), SinkOutcome::Skipped);
        assert!(crate::storage::list_snapshots(&dir).is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn rejects_non_nanosecond_timescale() {
        let dir = scratch_dir("timescale");
        let mut sink = sink_for(&dir);

        let mut buffer = SampleBuffer::video(raster(4, 4), 100_000_000);
        buffer.pts = MediaTime {
            value: 100,
            timescale: 1_000,
            valid: true,
        };
        buffer.output_pts = buffer.pts;
        buffer.samples[0].presentation = buffer.pts;

        assert_eq!(
            sink.process(buffer),
            Err(FrameContractError::WrongTimescale { timescale: 1_000 })
        );
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn rejects_valid_decode_timestamp() {
        let dir = scratch_dir("dts");
        let mut sink = sink_for(&dir);

        let mut buffer = SampleBuffer::video(raster(4, 4), 100_000_000);
        buffer.dts = MediaTime::nanos(90_000_000);

        assert_eq!(
            sink.process(buffer),
            Err(FrameContractError::UnexpectedDecodeTimestamp)
        );
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn rejects_wrong_sample_count() {
        let dir = scratch_dir("samples");
        let mut sink = sink_for(&dir);

        let mut buffer = SampleBuffer::video(raster(4, 4), 100_000_000);
        let timing = buffer.samples[0];
        buffer.samples.push(timing);

        assert_eq!(
            sink.process(buffer),
            Err(FrameContractError::WrongSampleCount { count: 2 })
        );
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn rejects_mismatched_sample_timing() {
        let dir = scratch_dir("timing");
        let mut sink = sink_for(&dir);

        let mut buffer = SampleBuffer::video(raster(4, 4), 100_000_000);
        buffer.samples[0] = SampleTiming {
            presentation: MediaTime::nanos(200_000_000),
            decode: MediaTime::invalid(),
            duration: MediaTime::invalid(),
        };

        assert_eq!(
            sink.process(buffer),
            Err(FrameContractError::SampleTimingMismatch)
        );
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn releases_read_lock_on_contract_rejection() {
        let dir = scratch_dir("lock-release");
        let mut sink = sink_for(&dir);

        let mut buffer = SampleBuffer::video(raster(4, 4), 100_000_000);
        buffer.dts = MediaTime::nanos(90_000_000);

        assert_eq!(
            sink.process_buffer(&buffer),
            Err(FrameContractError::UnexpectedDecodeTimestamp)
        );
        assert_eq!(buffer.pixels.as_ref().unwrap().active_locks(), 0);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn releases_read_lock_on_bad_raster() {
        let dir = scratch_dir("lock-raster");
        let mut sink = sink_for(&dir);

        let buffer = SampleBuffer::video(PixelBuffer::new(4, 4, vec![0u8; 8]), 100_000_000);

        assert!(sink.process_buffer(&buffer).is_err());
        assert_eq!(buffer.pixels.as_ref().unwrap().active_locks(), 0);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn releases_read_lock_after_write() {
        let dir = scratch_dir("lock-write");
        let mut sink = sink_for(&dir);

        let buffer = SampleBuffer::video(raster(4, 4), 100_000_000);

        assert_eq!(
            sink.process_buffer(&buffer),
            Ok(SinkOutcome::Written(dir.join("0.100")))
        );
        assert_eq!(buffer.pixels.as_ref().unwrap().active_locks(), 0);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn continues_after_contract_failure() {
        let dir = scratch_dir("continue");
        let mut sink = sink_for(&dir);

        let mut bad = SampleBuffer::video(raster(4, 4), 100_000_000);
        bad.is_valid = false;
        assert_eq!(sink.process(bad), Err(FrameContractError::NotValid));

        // A rejected frame leaves no snapshot behind and the sink keeps
        // accepting well-formed frames.
        assert!(crate::storage::list_snapshots(&dir).is_empty());
        let outcome = sink
            .process(SampleBuffer::video(raster(4, 4), 250_000_000))
            .unwrap();
        assert_eq!(outcome, SinkOutcome::Written(dir.join("0.250")));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn rejects_short_raster() {
        let dir = scratch_dir("raster");
        let mut sink = sink_for(&dir);

        let buffer = SampleBuffer::video(PixelBuffer::new(4, 4, vec![0u8; 8]), 100_000_000);

        assert_eq!(
            sink.process(buffer),
            Err(FrameContractError::BadRaster {
                expected: 64,
                actual: 8
            })
        );
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn identical_timestamp_overwrites() {
        let dir = scratch_dir("overwrite");
        let mut sink = sink_for(&dir);

        sink.process(SampleBuffer::video(raster(4, 4), 500_000_000))
            .unwrap();
        sink.process(SampleBuffer::video(raster(8, 8), 500_000_000))
            .unwrap();

        let snapshots = crate::storage::list_snapshots(&dir);
        assert_eq!(snapshots.len(), 1);
        let img = image::load_from_memory(&fs::read(&snapshots[0]).unwrap()).unwrap();
        assert_eq!(img.width(), 8);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn counts_written_frames() {
        let dir = scratch_dir("stats");
        let stats = Arc::new(SinkStats::default());
        let mut sink = FrameSink::new(dir.clone(), 50, stats.clone());

        sink.process(SampleBuffer::video(raster(4, 4), 100_000_000))
            .unwrap();
        sink.process(SampleBuffer::audio(150_000_000)).unwrap();

        assert_eq!(stats.written.load(Ordering::Relaxed), 1);
        assert_eq!(stats.ignored.load(Ordering::Relaxed), 1);
        fs::remove_dir_all(&dir).unwrap();
    }
}
