// Sample buffer data model for captured frames
//
// Models the capture source's delivery unit: a timed sample buffer carrying
// an optional pixel raster plus the timing metadata the sink validates

use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Timescale used by the capture source clock (ticks per second)
pub const NANOSECOND_TIMESCALE: u32 = 1_000_000_000;

/// A media timestamp: a tick count at a fixed timescale, or an invalid marker
///
/// Invalid times convert to NaN seconds, which is how the source reports
/// decode timestamps and durations for progressive single-sample delivery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaTime {
    /// Tick count
    pub value: i64,
    /// Ticks per second
    pub timescale: u32,
    /// Whether this time carries a meaningful value
    pub valid: bool,
}

impl MediaTime {
    /// Creates a valid timestamp at nanosecond timescale
    pub fn nanos(value: i64) -> Self {
        Self {
            value,
            timescale: NANOSECOND_TIMESCALE,
            valid: true,
        }
    }

    /// Creates the invalid marker (NaN seconds)
    pub fn invalid() -> Self {
        Self {
            value: 0,
            timescale: 0,
            valid: false,
        }
    }

    /// Converts to seconds; NaN if this time is invalid
    pub fn seconds(&self) -> f64 {
        if self.valid {
            self.value as f64 / self.timescale as f64
        } else {
            f64::NAN
        }
    }

    pub fn is_invalid(&self) -> bool {
        !self.valid
    }
}

/// Per-sample timing entry; for a well-formed buffer it must equal the
/// buffer-level timing fields exactly
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleTiming {
    pub presentation: MediaTime,
    pub decode: MediaTime,
    pub duration: MediaTime,
}

/// Media type of a delivered buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

/// An owned RGBA raster with scoped read-only access
///
/// Readers take a [`PixelReadGuard`]; the active-lock count is observable so
/// tests can verify the lock is released on every exit path, including
/// validation failures.
#[derive(Debug)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
    locks: AtomicUsize,
}

impl PixelBuffer {
    /// Creates a pixel buffer from raw RGBA bytes (4 bytes per pixel)
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
            locks: AtomicUsize::new(0),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Expected byte length for the declared dimensions
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    /// Acquires scoped read-only access to the raster
    pub fn lock_read(&self) -> PixelReadGuard<'_> {
        self.locks.fetch_add(1, Ordering::SeqCst);
        PixelReadGuard { buffer: self }
    }

    /// Number of currently held read locks
    pub fn active_locks(&self) -> usize {
        self.locks.load(Ordering::SeqCst)
    }
}

/// Read-only access to a [`PixelBuffer`]'s bytes; releases the lock on drop
pub struct PixelReadGuard<'a> {
    buffer: &'a PixelBuffer,
}

impl Deref for PixelReadGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buffer.data
    }
}

impl Drop for PixelReadGuard<'_> {
    fn drop(&mut self) {
        self.buffer.locks.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One delivered buffer plus its timing metadata
///
/// The source creates one per delivery; the sink consumes it synchronously and
/// nothing retains it afterwards.
#[derive(Debug)]
pub struct SampleBuffer {
    /// Media type; only video buffers are processed
    pub kind: MediaKind,
    /// Pixel raster; `None` models a null pixel-storage handle
    pub pixels: Option<PixelBuffer>,
    /// Buffer reports itself structurally valid
    pub is_valid: bool,
    /// Buffer data is ready for reading
    pub data_ready: bool,
    /// Presentation timestamp
    pub pts: MediaTime,
    /// Output presentation timestamp; equals `pts` (no reordering)
    pub output_pts: MediaTime,
    /// Decode timestamp; invalid for progressive delivery
    pub dts: MediaTime,
    /// Output decode timestamp; invalid for progressive delivery
    pub output_dts: MediaTime,
    /// Buffer duration; invalid for single-sample delivery
    pub duration: MediaTime,
    /// Per-sample timing; exactly one entry for a well-formed buffer
    pub samples: Vec<SampleTiming>,
}

impl SampleBuffer {
    /// Builds a well-formed video buffer for a raster presented at
    /// `pts_nanos` nanoseconds
    pub fn video(pixels: PixelBuffer, pts_nanos: i64) -> Self {
        let pts = MediaTime::nanos(pts_nanos);
        Self {
            kind: MediaKind::Video,
            pixels: Some(pixels),
            is_valid: true,
            data_ready: true,
            pts,
            output_pts: pts,
            dts: MediaTime::invalid(),
            output_dts: MediaTime::invalid(),
            duration: MediaTime::invalid(),
            samples: vec![SampleTiming {
                presentation: pts,
                decode: MediaTime::invalid(),
                duration: MediaTime::invalid(),
            }],
        }
    }

    /// Builds an audio buffer; the sink ignores these entirely
    pub fn audio(pts_nanos: i64) -> Self {
        let pts = MediaTime::nanos(pts_nanos);
        Self {
            kind: MediaKind::Audio,
            pixels: None,
            is_valid: true,
            data_ready: true,
            pts,
            output_pts: pts,
            dts: MediaTime::invalid(),
            output_dts: MediaTime::invalid(),
            duration: MediaTime::invalid(),
            samples: Vec::new(),
        }
    }
}
