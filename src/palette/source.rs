use std::sync::Arc;
use std::time::Duration;

use crate::foundation::cancel::{CancelToken, StageState, StageStatus};
use crate::foundation::core::Rgba8;
use crate::foundation::error::{PipelineError, retry_delay};
use crate::palette::{PaletteApi, SEED_LEN, Seed};
use crate::pipeline::ErrorReporter;
use crate::queue::QueueSender;

/// Tuning for the fetch loop.
#[derive(Clone, Debug)]
pub struct PaletteSourceOpts {
    /// Sleep after each of the first `pacing_iterations` successful fetches.
    pub pacing_interval: Duration,
    /// How many fetches are paced. `None` uses `queue capacity / 3`.
    pub pacing_iterations: Option<usize>,
    /// First retry delay after a failed fetch. Zero retries immediately.
    pub retry_backoff_base: Duration,
    /// Upper bound for the doubled retry delay.
    pub retry_backoff_max: Duration,
}

impl Default for PaletteSourceOpts {
    fn default() -> Self {
        Self {
            pacing_interval: Duration::from_secs(2),
            pacing_iterations: None,
            retry_backoff_base: Duration::ZERO,
            retry_backoff_max: Duration::from_secs(5),
        }
    }
}

/// Produces an endless, visually continuous color sequence from a [`PaletteApi`].
///
/// Each palette after the first is requested with the previous palette's last two colors as the
/// seed, and only its three new colors are emitted.
pub struct PaletteSource {
    api: Arc<dyn PaletteApi>,
    model: String,
    opts: PaletteSourceOpts,
    errors: ErrorReporter,
    status: StageStatus,
}

impl PaletteSource {
    pub fn new(
        api: Arc<dyn PaletteApi>,
        model: impl Into<String>,
        opts: PaletteSourceOpts,
        errors: ErrorReporter,
    ) -> Self {
        Self {
            api,
            model: model.into(),
            opts,
            errors,
            status: StageStatus::new(),
        }
    }

    pub fn status(&self) -> StageStatus {
        self.status.clone()
    }

    /// Fetch and enqueue colors until `cancel` fires, then close `queue`.
    ///
    /// A palette whose enqueue already started is finished while the queue has room; a palette
    /// that arrives after the cancel is dropped.
    pub fn run(self, cancel: CancelToken, queue: QueueSender<Rgba8>) {
        let mut seed: Option<Seed> = None;
        let mut paced_left = self
            .opts
            .pacing_iterations
            .unwrap_or(queue.capacity() / 3);
        let mut attempt = 0u64;
        let mut failures = 0u32;

        tracing::info!(model = %self.model, "palette source started");
        while !cancel.is_cancelled() {
            attempt += 1;
            tracing::debug!(attempt, paced_left, "getting palette");
            let palette = match self.api.fetch_palette(&self.model, seed.as_ref()) {
                Ok(p) => p,
                Err(source) => {
                    failures = failures.saturating_add(1);
                    self.errors
                        .report(PipelineError::Palette { attempt, source });
                    let delay = retry_delay(
                        failures,
                        self.opts.retry_backoff_base,
                        self.opts.retry_backoff_max,
                    );
                    if cancel.sleep(delay) {
                        break;
                    }
                    continue;
                }
            };
            failures = 0;
            if cancel.is_cancelled() {
                tracing::debug!(attempt, "cancelled during fetch; palette dropped");
                break;
            }

            let start = if seed.is_some() { SEED_LEN } else { 0 };
            let mut aborted = false;
            for &color in &palette.colors()[start..] {
                if queue.push(color, &cancel).is_err() {
                    aborted = true;
                    break;
                }
            }
            if aborted {
                tracing::debug!("color enqueue aborted");
                break;
            }
            seed = Some(palette.continuity_seed());

            if paced_left > 0 {
                paced_left -= 1;
                if cancel.sleep(self.opts.pacing_interval) {
                    break;
                }
            }
        }

        self.status.advance(StageState::Draining);
        queue.close();
        self.status.advance(StageState::Closed);
        tracing::debug!(attempts = attempt, "palette source closed");
    }
}

#[cfg(test)]
#[path = "../../tests/unit/palette/source.rs"]
mod tests;
