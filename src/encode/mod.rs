//! Frame encoders and the consumers that sit downstream of the frame queue.

/// `ffmpeg` subprocess fed from the raw byte stream.
pub mod ffmpeg;

use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::cancel::{CancelToken, StageState, StageStatus};
use crate::foundation::core::{Frame, FrameIndex};
use crate::foundation::error::{ColorRunResult, PipelineError};
use crate::pipeline::ErrorReporter;
use crate::queue::{QueueReceiver, QueueSender};

/// Serializes one frame into a target format.
pub trait FrameEncoder: Send + Sync {
    /// File extension for the format, without the dot.
    fn extension(&self) -> &'static str;

    fn encode(&self, frame: &Frame) -> anyhow::Result<Vec<u8>>;
}

/// Pass-through: the frame's RGBA8 bytes as-is.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawRgbaEncoder;

impl FrameEncoder for RawRgbaEncoder {
    fn extension(&self) -> &'static str {
        "rgba"
    }

    fn encode(&self, frame: &Frame) -> anyhow::Result<Vec<u8>> {
        Ok(frame.data().to_vec())
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PngEncoder;

impl FrameEncoder for PngEncoder {
    fn extension(&self) -> &'static str {
        "png"
    }

    fn encode(&self, frame: &Frame) -> anyhow::Result<Vec<u8>> {
        let img = to_rgba_image(frame)?;
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png)
            .context("encode png")?;
        Ok(out.into_inner())
    }
}

/// JPEG has no alpha channel; alpha is dropped.
#[derive(Clone, Copy, Debug)]
pub struct JpegEncoder {
    pub quality: u8,
}

impl Default for JpegEncoder {
    fn default() -> Self {
        Self { quality: 90 }
    }
}

impl FrameEncoder for JpegEncoder {
    fn extension(&self) -> &'static str {
        "jpg"
    }

    fn encode(&self, frame: &Frame) -> anyhow::Result<Vec<u8>> {
        let rgb = image::DynamicImage::ImageRgba8(to_rgba_image(frame)?).to_rgb8();
        let mut out = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, self.quality.clamp(1, 100))
            .encode_image(&rgb)
            .context("encode jpeg")?;
        Ok(out)
    }
}

fn to_rgba_image(frame: &Frame) -> anyhow::Result<image::RgbaImage> {
    let canvas = frame.canvas();
    image::RgbaImage::from_raw(canvas.width, canvas.height, frame.data().to_vec())
        .context("frame buffer does not match its dimensions")
}

/// One encoded frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedFrame {
    pub index: FrameIndex,
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

impl EncodedFrame {
    /// Conventional file name, e.g. `frame_000042.png`.
    pub fn file_name(&self) -> String {
        format!("frame_{:06}.{}", self.index.0, self.extension)
    }
}

/// Applies a [`FrameEncoder`] to every frame of a queue.
///
/// A frame that fails to encode is reported and dropped; the stage keeps going.
pub struct EncodeStage {
    encoder: Box<dyn FrameEncoder>,
    errors: ErrorReporter,
    status: StageStatus,
}

impl EncodeStage {
    pub fn new(encoder: Box<dyn FrameEncoder>, errors: ErrorReporter) -> Self {
        Self {
            encoder,
            errors,
            status: StageStatus::new(),
        }
    }

    pub fn status(&self) -> StageStatus {
        self.status.clone()
    }

    pub fn run(
        self,
        cancel: CancelToken,
        input: QueueReceiver<Frame>,
        output: QueueSender<EncodedFrame>,
    ) {
        let mut encoded = 0u64;
        while let Some(frame) = input.pop() {
            let index = frame.index();
            let bytes = match self.encoder.encode(&frame) {
                Ok(b) => b,
                Err(e) => {
                    self.errors.report(PipelineError::Encode {
                        frame: index.0,
                        reason: format!("{e:#}"),
                    });
                    continue;
                }
            };
            let out = EncodedFrame {
                index,
                extension: self.encoder.extension(),
                bytes,
            };
            if output.push(out, &cancel).is_err() {
                break;
            }
            encoded += 1;
        }
        self.status.advance(StageState::Draining);
        output.close();
        self.status.advance(StageState::Closed);
        tracing::debug!(encoded, "encode stage closed");
    }
}

/// Write encoded frames into `dir` until the queue ends. Returns the written paths in order.
pub fn write_frames(
    dir: &Path,
    input: QueueReceiver<EncodedFrame>,
    limit: Option<usize>,
) -> ColorRunResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory '{}'", dir.display()))?;
    let mut written = Vec::new();
    while limit.is_none_or(|n| written.len() < n) {
        let Some(frame) = input.pop() else {
            break;
        };
        let path = dir.join(frame.file_name());
        std::fs::write(&path, &frame.bytes)
            .with_context(|| format!("write frame '{}'", path.display()))?;
        tracing::debug!(path = %path.display(), bytes = frame.bytes.len(), "wrote frame");
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/stage.rs"]
mod tests;
