//! Palette retrieval: the remote API seam and the continuity-chaining fetch loop.

pub mod colormind;
pub mod source;

use crate::foundation::core::Rgba8;
use crate::foundation::error::PaletteError;

/// Number of colors in one palette.
pub const PALETTE_LEN: usize = 5;

/// Number of trailing colors carried into the next request.
pub const SEED_LEN: usize = 2;

/// Ordered set of colors returned by one API call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Palette(pub [Rgba8; PALETTE_LEN]);

impl Palette {
    pub fn colors(&self) -> &[Rgba8; PALETTE_LEN] {
        &self.0
    }

    /// Last two colors, used to request a visually connected next palette.
    pub fn continuity_seed(&self) -> Seed {
        Seed([
            Some(self.0[PALETTE_LEN - 2]),
            Some(self.0[PALETTE_LEN - 1]),
        ])
    }
}

/// Leading colors a continuation request pins in place. Empty slots are left for the model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Seed(pub [Option<Rgba8>; SEED_LEN]);

impl Seed {
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Option::is_none)
    }

    /// Reject a seed that pins nothing; such a request would not be a continuation.
    pub fn validate(&self) -> Result<(), PaletteError> {
        if self.is_empty() {
            return Err(PaletteError::EmptySeed);
        }
        Ok(())
    }
}

/// Remote palette generator.
pub trait PaletteApi: Send + Sync {
    /// Request a fresh palette, optionally continuing from `seed`.
    fn fetch_palette(&self, model: &str, seed: Option<&Seed>) -> Result<Palette, PaletteError>;

    /// Names of the models the service offers.
    fn list_models(&self) -> Result<Vec<String>, PaletteError>;
}

/// How the palette model is picked when the pipeline starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelChoice {
    Fixed(String),
    /// Uniformly random among the models the API lists.
    Random,
}

impl Default for ModelChoice {
    fn default() -> Self {
        Self::Fixed(DEFAULT_MODEL.to_string())
    }
}

pub const DEFAULT_MODEL: &str = "default";

impl ModelChoice {
    pub fn resolve(&self, api: &dyn PaletteApi) -> Result<String, PaletteError> {
        match self {
            Self::Fixed(name) => Ok(name.clone()),
            Self::Random => {
                use rand::seq::IndexedRandom as _;

                let models = api.list_models()?;
                let model = models
                    .choose(&mut rand::rng())
                    .cloned()
                    .ok_or(PaletteError::NoModels)?;
                tracing::debug!(model = %model, available = models.len(), "picked random model");
                Ok(model)
            }
        }
    }
}
