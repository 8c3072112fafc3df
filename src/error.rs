use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Errors raised by the spectral model and the surface synthesizer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SurfaceError {
    /// An input is out of its physical or numerical domain
    #[error("invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// The spectrum carries no positive power
    #[error("spectrum carries no energy")]
    DegenerateSpectrum,

    /// A computed value went NaN or infinite
    #[error("non-finite {quantity} at index {index} ({context})")]
    NumericOverflow {
        quantity: &'static str,
        index: usize,
        context: String,
    },
}

impl SurfaceError {
    pub(crate) fn invalid(name: &'static str, value: f64, reason: &'static str) -> Self {
        SurfaceError::InvalidParameter { name, value, reason }
    }
}

/// Require a finite, strictly positive value.
pub(crate) fn ensure_positive(name: &'static str, value: f64) -> Result<f64, SurfaceError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(SurfaceError::invalid(name, value, "must be finite and positive"))
    }
}

/// Require a positive, even sample count.
pub(crate) fn ensure_even_samples(samples: usize) -> Result<usize, SurfaceError> {
    if samples == 0 {
        Err(SurfaceError::invalid("samples", 0.0, "must be positive"))
    } else if samples % 2 != 0 {
        Err(SurfaceError::invalid(
            "samples",
            samples as f64,
            "must be even for the Nyquist bin",
        ))
    } else {
        Ok(samples)
    }
}

/// Errors raised while staging and running a batch of solver runs.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error("realization {run} failed: {source}")]
    Realization {
        run: usize,
        #[source]
        source: SurfaceError,
    },

    #[error("worker count must be at least one")]
    NoWorkers,

    #[error("failed to launch solver {}: {source}", solver.display())]
    SolverLaunch {
        solver: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("solver exited with {status} on run {run}")]
    SolverFailed { run: usize, status: ExitStatus },
}

impl BatchError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> BatchError {
        let path = path.into();
        move |source| BatchError::Io { path, source }
    }
}
