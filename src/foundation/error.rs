use std::time::Duration;

/// Convenience result type used across colorrun.
pub type ColorRunResult<T> = Result<T, ColorRunError>;

/// Configuration and setup failures surfaced by library entry points.
#[derive(thiserror::Error, Debug)]
pub enum ColorRunError {
    /// Invalid options (dimensions, frame counts, queue capacities, arguments).
    #[error("validation error: {0}")]
    Validation(String),

    /// The palette API failed before the pipeline could start (e.g. listing models).
    #[error("palette error: {0}")]
    Palette(#[from] PaletteError),

    /// The downstream frame consumer could not be started.
    #[error("consumer error: {0}")]
    Consumer(String),

    /// Thread spawning or filesystem failures.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped lower-level error from dependencies.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ColorRunError {
    /// Build a [`ColorRunError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`ColorRunError::Consumer`] value.
    pub fn consumer(msg: impl Into<String>) -> Self {
        Self::Consumer(msg.into())
    }
}

/// Failures talking to the palette API.
///
/// `Transport` covers connectivity (including the request timeout); every other variant is a
/// protocol-level failure where the service answered but not with a usable palette.
#[derive(thiserror::Error, Debug)]
pub enum PaletteError {
    /// Connection, TLS, or timeout failure; the service was not heard from.
    #[error("palette request failed: {0}")]
    Transport(String),

    /// Non-200 answer, with the trimmed response body.
    #[error("invalid response status {status}: {body}")]
    Status { status: u16, body: String },

    /// The service answered with no content (or its literal `empty body` text).
    #[error("response has empty body")]
    EmptyBody,

    /// The body was not the expected JSON shape.
    #[error("parsing response body: {0}")]
    Parse(String),

    /// A continuation request was attempted with no pinned colors.
    #[error("continuity seed may not be empty")]
    EmptySeed,

    /// Random model selection found an empty model list.
    #[error("palette api returned no models")]
    NoModels,
}

impl PaletteError {
    /// Build a [`PaletteError::Transport`] value.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Build a [`PaletteError::Parse`] value.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// `true` for errors where the service was reached but misbehaved.
    pub fn is_protocol(&self) -> bool {
        !matches!(self, Self::Transport(_))
    }
}

/// Everything that flows into the coordinator's error channel.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// One failed fetch. Recoverable: the source retries.
    #[error("getting palette (attempt {attempt}): {source}")]
    Palette {
        attempt: u64,
        #[source]
        source: PaletteError,
    },

    /// One frame failed to encode and was dropped. Recoverable.
    #[error("encoding frame {frame:06}: {reason}")]
    Encode { frame: u64, reason: String },

    /// The consumer process exited while the pipeline was running. Fatal.
    #[error("frame consumer exited: {0}")]
    ConsumerExited(String),

    /// Writing to the consumer failed. Fatal.
    #[error("frame consumer failed: {0}")]
    ConsumerFailed(String),
}

impl PipelineError {
    /// Fatal errors end the whole pipeline; everything else is reported and survived.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConsumerExited(_) | Self::ConsumerFailed(_))
    }
}

/// Delay before retrying after `failures` consecutive palette failures.
///
/// A zero `base` disables backoff entirely.
pub fn retry_delay(failures: u32, base: Duration, max: Duration) -> Duration {
    if base.is_zero() || failures == 0 {
        return Duration::ZERO;
    }
    let shift = failures.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << shift).min(max.max(base))
}
