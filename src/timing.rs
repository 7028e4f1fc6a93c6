// Frame pacing for paced capture sources

use std::time::{Duration, Instant};

/// Deadline-based pacer targeting a fixed frame rate
///
/// Deadlines accumulate from the first frame rather than from the previous
/// capture, so a slow frame does not push every later deadline back.
pub struct FramePacer {
    target_fps: u32,
    interval: Duration,
    next_due: Option<Instant>,
    started: Option<Instant>,
    captured: u64,
    dropped: u64,
}

impl FramePacer {
    pub fn new(target_fps: u32) -> Self {
        Self {
            target_fps,
            interval: Duration::from_micros(1_000_000 / target_fps.max(1) as u64),
            next_due: None,
            started: None,
            captured: 0,
            dropped: 0,
        }
    }

    /// Time to sleep before the next frame is due; zero for the first frame
    /// or when the deadline has already passed
    pub fn until_next_frame(&self) -> Duration {
        match self.next_due {
            Some(due) => due.saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }

    /// Records a captured frame and advances the deadline
    pub fn mark_captured(&mut self) {
        let now = Instant::now();
        self.started.get_or_insert(now);
        self.captured += 1;
        self.next_due = Some(match self.next_due {
            // Skip deadlines that already passed instead of bursting to
            // catch up.
            Some(due) if due + self.interval > now => due + self.interval,
            _ => now + self.interval,
        });
    }

    /// Records a frame lost to a capture error
    pub fn mark_dropped(&mut self) {
        self.dropped += 1;
    }

    pub fn target_fps(&self) -> u32 {
        self.target_fps
    }

    pub fn captured(&self) -> u64 {
        self.captured
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Measured frame rate since the first captured frame
    pub fn actual_fps(&self) -> f64 {
        match self.started {
            Some(started) if self.captured > 0 => {
                let elapsed = started.elapsed().as_secs_f64();
                if elapsed > 0.0 {
                    self.captured as f64 / elapsed
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }
}
