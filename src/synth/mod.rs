//! Frame synthesis: turning a color sequence into interpolated transition frames.

pub mod fill;
pub mod sliding;

use std::collections::VecDeque;

use crate::foundation::cancel::{CancelToken, StageState, StageStatus};
use crate::foundation::core::{Canvas, Frame, FrameIndex, Rgba8};
use crate::foundation::error::{ColorRunError, ColorRunResult};
use crate::queue::{QueueReceiver, QueueSender};

pub use fill::GradientFill;
pub use sliding::SlidingGradient;

/// Pixel layout of one transition frame.
///
/// The synthesizer keeps a window of `window_len()` consecutive colors and asks the strategy for
/// `transition_frames` frames per window before sliding the window forward by one color.
pub trait TransitionStrategy: Send {
    fn window_len(&self) -> usize;

    /// Write frame `frame` (of `transition_frames`) for `window` into `out`.
    ///
    /// `window.len() == self.window_len()` and `out.len() == canvas.frame_bytes()`.
    fn render(
        &self,
        window: &[Rgba8],
        frame: usize,
        transition_frames: usize,
        canvas: Canvas,
        out: &mut [u8],
    );
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SynthesisMode {
    /// Whole frame filled with one interpolated color.
    #[default]
    Fill,
    /// Three-stop horizontal gradient sliding left.
    Sliding,
}

impl SynthesisMode {
    pub fn strategy(self) -> Box<dyn TransitionStrategy> {
        match self {
            Self::Fill => Box::new(GradientFill),
            Self::Sliding => Box::new(SlidingGradient),
        }
    }
}

pub struct FrameSynthesizer {
    canvas: Canvas,
    transition_frames: usize,
    strategy: Box<dyn TransitionStrategy>,
    status: StageStatus,
}

impl FrameSynthesizer {
    pub fn new(
        canvas: Canvas,
        transition_frames: usize,
        strategy: Box<dyn TransitionStrategy>,
    ) -> ColorRunResult<Self> {
        canvas.validate()?;
        if transition_frames == 0 {
            return Err(ColorRunError::validation(
                "transition frame count must be non-zero",
            ));
        }
        Ok(Self {
            canvas,
            transition_frames,
            strategy,
            status: StageStatus::new(),
        })
    }

    pub fn status(&self) -> StageStatus {
        self.status.clone()
    }

    /// Consume colors until `input` is closed and drained (or `cancel` fires while waiting on
    /// `output`), then close `output`.
    ///
    /// Only complete windows are rendered; trailing colors that never fill a window are dropped.
    pub fn run(self, cancel: CancelToken, input: QueueReceiver<Rgba8>, output: QueueSender<Frame>) {
        let need = self.strategy.window_len().max(1);
        let mut window = VecDeque::with_capacity(need);
        let mut next = FrameIndex(0);

        tracing::debug!(
            width = self.canvas.width,
            height = self.canvas.height,
            transition_frames = self.transition_frames,
            "frame synthesizer started"
        );
        'run: loop {
            while window.len() < need {
                match input.pop() {
                    Some(c) => window.push_back(c),
                    None => {
                        tracing::debug!(pending = window.len(), "color queue closed");
                        break 'run;
                    }
                }
            }

            let colors: &[Rgba8] = window.make_contiguous();
            for f in 0..self.transition_frames {
                let frame = Frame::render(next, self.canvas, |buf| {
                    self.strategy
                        .render(colors, f, self.transition_frames, self.canvas, buf)
                });
                if output.push(frame, &cancel).is_err() {
                    tracing::debug!(frame = next.0, "frame enqueue aborted");
                    break 'run;
                }
                next = next.next();
            }
            window.pop_front();
        }

        self.status.advance(StageState::Draining);
        output.close();
        self.status.advance(StageState::Closed);
        tracing::debug!(frames = next.0, "frame synthesizer closed");
    }
}

#[cfg(test)]
#[path = "../../tests/unit/synth/synthesizer.rs"]
mod tests;
