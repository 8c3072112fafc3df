//! XML run configuration.
//!
//! ```xml
//! <configuration>
//!   <seaSurface>
//!     <dx>0.5</dx>
//!     <L>10000</L>
//!     <U10>10</U10>
//!     <age>0.84</age>
//!     <phi>0</phi>
//!     <useFilter>false</useFilter>
//!   </seaSurface>
//!   <computation>
//!     <H>10</H>
//!     <seed>56182189</seed>
//!     <nIterations>500</nIterations>
//!     <frequency>3000</frequency>
//!   </computation>
//! </configuration>
//! ```
//!
//! `phi`, `useFilter` and `frequency` may be omitted.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::error::{ensure_positive, SurfaceError};
use crate::spectrum::SpectralParameters;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration: {0}")]
    Parse(#[from] quick_xml::DeError),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] SurfaceError),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SurveyConfig {
    #[serde(rename = "seaSurface")]
    pub sea_surface: SeaSurfaceSection,
    pub computation: ComputationSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeaSurfaceSection {
    pub dx: f64, // Sample spacing (m)
    #[serde(rename = "L")]
    pub length: f64, // Surface length (m)
    #[serde(rename = "U10")]
    pub wind_speed: f64, // Wind speed at 10 m (m/s)
    pub age: f64, // Inverse wave age
    #[serde(default)]
    pub phi: f64, // Look angle to the wind (rad), 0 for none
    #[serde(rename = "useFilter", default)]
    pub use_filter: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ComputationSection {
    #[serde(rename = "H")]
    pub antenna_height: f64,
    pub seed: u64,
    #[serde(rename = "nIterations")]
    pub iterations: usize,
    #[serde(default)]
    pub frequency: Option<f64>,
}

/// Validated solver-side settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComputationParameters {
    pub antenna_height: f64,
    pub seed: u64,
    pub iterations: usize,
    pub frequency: Option<f64>,
}

impl SurveyConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_xml(&text)
    }

    pub fn from_xml(text: &str) -> Result<Self, ConfigError> {
        Ok(quick_xml::de::from_str(text)?)
    }

    /// Number of surface samples `floor(L/dx)`.
    ///
    /// A spacing that does not divide the length is truncated, not rounded,
    /// and the count may come out odd; an odd count is rejected later by
    /// [`SurveyConfig::spectral_parameters`].
    pub fn samples(&self) -> Result<usize, ConfigError> {
        let dx = ensure_positive("dx", self.sea_surface.dx)?;
        let length = ensure_positive("length", self.sea_surface.length)?;
        Ok((length / dx) as usize)
    }

    pub fn spectral_parameters(&self) -> Result<SpectralParameters, ConfigError> {
        let surface = &self.sea_surface;
        let params = SpectralParameters::new(
            surface.wind_speed,
            surface.age,
            surface.length,
            self.samples()?,
        )?
        .with_spreading(surface.phi)
        .with_filter(surface.use_filter);
        params.validate()?;
        Ok(params)
    }

    pub fn computation(&self) -> Result<ComputationParameters, ConfigError> {
        let comp = &self.computation;
        if !comp.antenna_height.is_finite() {
            return Err(SurfaceError::invalid(
                "antenna_height",
                comp.antenna_height,
                "must be finite",
            )
            .into());
        }
        if let Some(frequency) = comp.frequency {
            ensure_positive("frequency", frequency)?;
        }
        Ok(ComputationParameters {
            antenna_height: comp.antenna_height,
            seed: comp.seed,
            iterations: comp.iterations,
            frequency: comp.frequency,
        })
    }

    /// Default run file prefix, e.g. `10mps`.
    pub fn file_prefix(&self) -> String {
        format!("{}mps", self.sea_surface.wind_speed as i64)
    }
}
