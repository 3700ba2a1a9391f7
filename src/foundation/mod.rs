/// Cooperative cancellation and stage lifecycle.
pub mod cancel;
/// Color, canvas and frame types.
pub mod core;
/// Error types used across the crate.
pub mod error;
/// Color interpolation.
pub mod math;
