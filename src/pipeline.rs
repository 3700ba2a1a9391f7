//! Wiring for the palette → frame → byte-stream pipeline.
//!
//! [`Pipeline::start`] spawns the palette source and the frame synthesizer on their own threads
//! and hands the frame queue to the caller, either raw ([`Pipeline::take_frames`]) or wrapped
//! in a [`StreamAdapter`] ([`Pipeline::take_stream`]).
//!
//! Shutdown is driven by one [`CancelToken`]. Cancelling stops the palette source, which closes
//! the color queue; the synthesizer then drains, closes the frame queue, and the stream reaches
//! end-of-stream once the consumer has read what was already produced.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::foundation::cancel::{CancelToken, StageState, StageStatus};
use crate::foundation::core::{Canvas, Frame, Rgba8};
use crate::foundation::error::{ColorRunError, ColorRunResult, PipelineError};
use crate::palette::source::{PaletteSource, PaletteSourceOpts};
use crate::palette::{ModelChoice, PaletteApi};
use crate::queue::{QueueReceiver, bounded};
use crate::stream::StreamAdapter;
use crate::synth::{FrameSynthesizer, SynthesisMode};

const ERROR_POLL: Duration = Duration::from_millis(100);

/// Cloneable handle for pushing errors into the coordinator's single observation point.
#[derive(Clone, Debug)]
pub struct ErrorReporter {
    tx: Sender<PipelineError>,
}

impl ErrorReporter {
    /// Report an error. Reports after the coordinator is gone are dropped.
    pub fn report(&self, err: PipelineError) {
        let _ = self.tx.send(err);
    }
}

pub fn error_channel() -> (ErrorReporter, Receiver<PipelineError>) {
    let (tx, rx) = mpsc::channel();
    (ErrorReporter { tx }, rx)
}

#[derive(Clone, Debug)]
pub struct PipelineOpts {
    pub canvas: Canvas,
    /// Frames per color transition.
    pub transition_frames: usize,
    pub mode: SynthesisMode,
    pub model: ModelChoice,
    pub color_queue_capacity: usize,
    /// Defaults to `transition_frames * 3`.
    pub frame_queue_capacity: Option<usize>,
    pub source: PaletteSourceOpts,
}

impl Default for PipelineOpts {
    fn default() -> Self {
        Self {
            canvas: Canvas {
                width: 1280,
                height: 720,
            },
            transition_frames: 90,
            mode: SynthesisMode::Fill,
            model: ModelChoice::default(),
            color_queue_capacity: 15,
            frame_queue_capacity: None,
            source: PaletteSourceOpts::default(),
        }
    }
}

impl PipelineOpts {
    pub fn validate(&self) -> ColorRunResult<()> {
        self.canvas.validate()?;
        if self.transition_frames == 0 {
            return Err(ColorRunError::validation(
                "transition frame count must be non-zero",
            ));
        }
        if self.color_queue_capacity == 0 {
            return Err(ColorRunError::validation(
                "color queue capacity must be non-zero",
            ));
        }
        if self.frame_queue_capacity == Some(0) {
            return Err(ColorRunError::validation(
                "frame queue capacity must be non-zero",
            ));
        }
        Ok(())
    }

    pub fn frame_queue_capacity(&self) -> usize {
        self.frame_queue_capacity
            .unwrap_or(self.transition_frames.saturating_mul(3))
            .max(1)
    }
}

/// How [`Pipeline::run`] ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// Shutdown was requested through the cancel token.
    Cancelled,
    /// A fatal error arrived; the pipeline has been cancelled.
    Fatal(PipelineError),
    /// The caller's completion check passed (see [`Pipeline::run_until`]).
    Done,
}

/// Running pipeline: owns the stage threads, the cancel token and the error channel.
pub struct Pipeline {
    model: String,
    cancel: CancelToken,
    reporter: ErrorReporter,
    errors: Receiver<PipelineError>,
    frames: Option<QueueReceiver<Frame>>,
    source_status: StageStatus,
    synth_status: StageStatus,
    threads: Vec<JoinHandle<()>>,
    recoverable: u64,
}

impl Pipeline {
    /// Resolve the palette model and start both producer stages.
    pub fn start(api: Arc<dyn PaletteApi>, opts: PipelineOpts) -> ColorRunResult<Self> {
        opts.validate()?;
        let model = opts.model.resolve(api.as_ref())?;
        let cancel = CancelToken::new();
        let (reporter, errors) = error_channel();

        let (color_tx, color_rx) = bounded::<Rgba8>(opts.color_queue_capacity);
        let (frame_tx, frame_rx) = bounded::<Frame>(opts.frame_queue_capacity());

        let source = PaletteSource::new(api, model.clone(), opts.source.clone(), reporter.clone());
        let synth =
            FrameSynthesizer::new(opts.canvas, opts.transition_frames, opts.mode.strategy())?;
        let source_status = source.status();
        let synth_status = synth.status();

        let mut threads = Vec::with_capacity(2);
        let c = cancel.clone();
        threads.push(
            std::thread::Builder::new()
                .name("colorrun-palettes".to_string())
                .spawn(move || source.run(c, color_tx))?,
        );
        let c = cancel.clone();
        let spawned = std::thread::Builder::new()
            .name("colorrun-frames".to_string())
            .spawn(move || synth.run(c, color_rx, frame_tx));
        match spawned {
            Ok(h) => threads.push(h),
            Err(e) => {
                cancel.cancel();
                for h in threads {
                    let _ = h.join();
                }
                return Err(e.into());
            }
        }

        tracing::info!(
            model = %model,
            width = opts.canvas.width,
            height = opts.canvas.height,
            transition_frames = opts.transition_frames,
            mode = ?opts.mode,
            "pipeline started"
        );
        Ok(Self {
            model,
            cancel,
            reporter,
            errors,
            frames: Some(frame_rx),
            source_status,
            synth_status,
            threads,
            recoverable: 0,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Hand out the frame queue. Only the first call (of this or `take_stream`) gets it.
    pub fn take_frames(&mut self) -> Option<QueueReceiver<Frame>> {
        self.frames.take()
    }

    /// Hand out the frame queue wrapped as a byte stream.
    pub fn take_stream(&mut self) -> Option<StreamAdapter<QueueReceiver<Frame>>> {
        self.take_frames().map(StreamAdapter::new)
    }

    /// Reporter for downstream consumers (encoders, subprocesses) to feed the error channel.
    pub fn reporter(&self) -> ErrorReporter {
        self.reporter.clone()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn stage_states(&self) -> (StageState, StageState) {
        (self.source_status.get(), self.synth_status.get())
    }

    /// Recoverable errors observed so far by `run`/`poll_error`.
    pub fn recoverable_errors(&self) -> u64 {
        self.recoverable
    }

    /// Wait up to `timeout` for the next error and log it. Fatal errors cancel the pipeline.
    pub fn poll_error(&mut self, timeout: Duration) -> Option<PipelineError> {
        let err = match self.errors.recv_timeout(timeout) {
            Ok(err) => err,
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => return None,
        };
        if err.is_fatal() {
            tracing::error!(error = %err, "fatal pipeline error");
            self.cancel.cancel();
        } else {
            self.recoverable += 1;
            tracing::error!(error = %err, "pipeline error");
        }
        Some(err)
    }

    /// Observe errors until a fatal one arrives or shutdown is requested.
    pub fn run(&mut self) -> RunOutcome {
        self.run_until(|| false)
    }

    /// Like [`run`](Self::run), but also returns [`RunOutcome::Done`] once `done` reports true.
    ///
    /// `done` is checked between error polls, so a bounded consumer running on another thread can
    /// end the observation loop without cancelling the pipeline.
    pub fn run_until(&mut self, mut done: impl FnMut() -> bool) -> RunOutcome {
        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("shutting down");
                return RunOutcome::Cancelled;
            }
            if done() {
                return RunOutcome::Done;
            }
            if let Some(err) = self.poll_error(ERROR_POLL)
                && err.is_fatal()
            {
                return RunOutcome::Fatal(err);
            }
        }
    }

    /// Cancel and wait for both stage threads to finish.
    ///
    /// Anything still holding the frame queue sees end-of-stream after draining.
    pub fn shutdown(mut self) -> ColorRunResult<()> {
        self.cancel.cancel();
        self.join_threads()
    }

    fn join_threads(&mut self) -> ColorRunResult<()> {
        let mut panicked = false;
        for h in self.threads.drain(..) {
            let name = h.thread().name().unwrap_or("stage").to_string();
            if h.join().is_err() {
                tracing::error!(thread = %name, "pipeline stage panicked");
                panicked = true;
            }
        }
        if panicked {
            return Err(ColorRunError::Other(anyhow::anyhow!(
                "a pipeline stage panicked"
            )));
        }
        tracing::debug!("pipeline stopped");
        Ok(())
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if !self.threads.is_empty() {
            self.cancel.cancel();
            let _ = self.join_threads();
        }
    }
}
