// Screen capture to timestamped JPEG snapshots
//
// A capture session owns an injected frame source and drains its sample
// buffers through a single-consumer channel into a frame sink, which
// validates each buffer's timing contract, encodes it as a JPEG, and writes
// it under a name derived from its presentation timestamp.

pub mod config;
pub mod display;
pub mod frame;
pub mod session;
pub mod sink;
pub mod source;
pub mod storage;
pub mod timing;

pub use config::CaptureConfig;
pub use display::DisplaySource;
pub use frame::{MediaKind, MediaTime, PixelBuffer, SampleBuffer, SampleTiming};
pub use session::{CaptureSession, SessionStats};
pub use sink::{FrameContractError, FrameSink, SinkOutcome};
pub use source::{FrameSource, SourceError};
pub use timing::FramePacer;
