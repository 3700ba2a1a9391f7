//! Colorrun turns an endless feed of palettes into an endless gradient video.
//!
//! - A [`palette::source::PaletteSource`] keeps fetching 5-color palettes, chaining each request
//!   on the previous palette so consecutive colors flow into each other.
//! - A [`synth::FrameSynthesizer`] interpolates every consecutive pair of colors into a fixed
//!   number of RGBA8 frames.
//! - A [`stream::StreamAdapter`] exposes the frames as one contiguous byte stream, ready to be
//!   piped into `ffmpeg` ([`encode::ffmpeg::FfmpegStreamer`]).
//!
//! [`pipeline::Pipeline`] wires the stages together with bounded queues and one cancel token.
#![forbid(unsafe_code)]

mod foundation;

/// Frame encoders and downstream consumers.
pub mod encode;
/// Streaming ingest lookup.
pub mod ingest;
/// Palette model, HTTP client and the fetching stage.
pub mod palette;
/// Stage wiring, error observation and shutdown.
pub mod pipeline;
/// Bounded, cancellable FIFO queues between stages.
pub mod queue;
/// Reference gradient strips.
pub mod reference;
/// Frames as a contiguous byte stream.
pub mod stream;
/// Frame synthesis from color pairs.
pub mod synth;

pub use crate::foundation::cancel::{CancelToken, StageState, StageStatus};
pub use crate::foundation::core::{Canvas, Frame, FrameIndex, Rgba8};
pub use crate::foundation::error::{
    ColorRunError, ColorRunResult, PaletteError, PipelineError, retry_delay,
};
pub use crate::foundation::math::{lerp_pos, mix, transition_ratio};

pub use crate::encode::ffmpeg::{FfmpegOpts, FfmpegStreamer, is_ffmpeg_on_path};
pub use crate::encode::{EncodeStage, EncodedFrame, FrameEncoder};
pub use crate::palette::colormind::ColormindClient;
pub use crate::palette::{ModelChoice, Palette, PaletteApi, Seed};
pub use crate::pipeline::{ErrorReporter, Pipeline, PipelineOpts, RunOutcome};
pub use crate::stream::{FrameSource, ReadStatus, StreamAdapter};
pub use crate::synth::{FrameSynthesizer, SynthesisMode, TransitionStrategy};
