// Export main modules
pub mod batch;
pub mod config;
pub mod deck;
mod error;
pub mod spectrum;
pub mod synthesis;

// Re-export everything for public use
pub use batch::{BatchRunner, BatchSummary, SurfaceModel};
pub use config::{ComputationParameters, ConfigError, SurveyConfig};
pub use error::{BatchError, SurfaceError};
pub use spectrum::{compute_spectrum, SpectralParameters, Spectrum};
pub use synthesis::{smooth_surface, synthesize, SurfaceRealization, SurfaceSynthesizer};

pub mod prelude {
    pub use crate::batch::{BatchRunner, BatchSummary, SurfaceModel};
    pub use crate::config::{ComputationParameters, SurveyConfig};
    pub use crate::deck::{DeckPatch, RunFolder};
    pub use crate::error::{BatchError, SurfaceError};
    pub use crate::spectrum::{compute_spectrum, SpectralParameters, Spectrum};
    pub use crate::synthesis::{smooth_surface, synthesize, SurfaceRealization, SurfaceSynthesizer};
}
