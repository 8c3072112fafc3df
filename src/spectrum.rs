//! Elfouhaily unified wind-wave spectrum.
//!
//! Produces the one-sided wavenumber power spectral density of a wind sea,
//! optionally weighted by the directional spreading function for a fixed
//! look angle relative to the wind, and optionally band-limited around the
//! spectral peak.

use std::f64::consts::{LN_2, PI};

use tracing::trace;

use crate::error::{ensure_even_samples, ensure_positive, SurfaceError};

/// Gravitational acceleration (m/s^2)
pub const GRAVITY: f64 = 9.81;

/// Neutral drag coefficient at 10 m
const DRAG_COEFFICIENT: f64 = 0.00144;

/// Wavenumber of the phase speed minimum (rad/m)
const KM: f64 = 370.0;

/// Minimum phase speed at `KM` (m/s)
const CM: f64 = 0.23;

/// Zero wavenumbers are replaced with this before evaluation.
pub const WAVENUMBER_FLOOR: f64 = 1e-10;

/// Fraction of the peak power that bounds the filtered band.
pub const FILTER_THRESHOLD: f64 = 0.5;

/// Inputs for one spectrum configuration.
///
/// Built once per path configuration and shared by every realization drawn
/// from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralParameters {
    pub wind_speed: f64,              // U10 wind speed (m/s)
    pub wave_age: f64,                // Inverse wave age U10/cp
    pub length: f64,                  // Surface length L (m)
    pub samples: usize,               // Sample count N (even)
    pub spreading_angle: Option<f64>, // Look angle to the wind (rad)
    pub filter: bool,                 // Band-limit around the peak
}

impl SpectralParameters {
    pub fn new(
        wind_speed: f64,
        wave_age: f64,
        length: f64,
        samples: usize,
    ) -> Result<Self, SurfaceError> {
        let params = Self {
            wind_speed,
            wave_age,
            length,
            samples,
            spreading_angle: None,
            filter: false,
        };
        params.validate()?;
        Ok(params)
    }

    /// Apply directional spreading at `phi` radians. Zero disables spreading.
    pub fn with_spreading(mut self, phi: f64) -> Self {
        self.spreading_angle = if phi == 0.0 { None } else { Some(phi) };
        self
    }

    pub fn with_filter(mut self, filter: bool) -> Self {
        self.filter = filter;
        self
    }

    pub fn validate(&self) -> Result<(), SurfaceError> {
        ensure_positive("wind_speed", self.wind_speed)?;
        ensure_positive("wave_age", self.wave_age)?;
        ensure_positive("length", self.length)?;
        ensure_even_samples(self.samples)?;
        if let Some(phi) = self.spreading_angle {
            if !phi.is_finite() {
                return Err(SurfaceError::invalid("spreading_angle", phi, "must be finite"));
            }
        }
        Ok(())
    }

    /// Wavenumber bin width `2π/L`.
    pub fn dk(&self) -> f64 {
        2.0 * PI / self.length
    }

    /// Spatial sample spacing `L/N`.
    pub fn sample_spacing(&self) -> f64 {
        self.length / self.samples as f64
    }

    /// Wavenumber grid `i*dk` for `i in 0..N/2`.
    pub fn wavenumbers(&self) -> Vec<f64> {
        let dk = self.dk();
        (0..self.samples / 2).map(|i| i as f64 * dk).collect()
    }

    pub fn spectrum(&self) -> Result<Spectrum, SurfaceError> {
        self.validate()?;
        compute_spectrum(
            &self.wavenumbers(),
            self.wind_speed,
            self.wave_age,
            self.spreading_angle,
            self.filter,
        )
    }
}

/// Shape parameters of the Elfouhaily spectrum for one sea state.
#[derive(Debug, Clone, Copy)]
pub struct Elfouhaily {
    wave_age: f64,
    friction_velocity: f64,
    sigma: f64,
    alphap: f64,
    alpham: f64,
    kp: f64,
    cp: f64,
    gamma: f64,
}

impl Elfouhaily {
    pub fn new(wind_speed: f64, wave_age: f64) -> Result<Self, SurfaceError> {
        ensure_positive("wind_speed", wind_speed)?;
        ensure_positive("wave_age", wave_age)?;

        let friction_velocity = DRAG_COEFFICIENT.sqrt() * wind_speed;
        let sigma = 0.08 * (1.0 + 4.0 * wave_age.powi(-3));
        let alphap = 0.006 * wave_age.powf(0.55);
        let kp = GRAVITY / (wind_speed * wind_speed) * wave_age * wave_age;
        let cp = (GRAVITY / kp).sqrt();

        let ratio = (friction_velocity / CM).ln();
        let alpham = if friction_velocity <= CM {
            0.01 * (1.0 + ratio)
        } else {
            0.01 * (1.0 + 3.0 * ratio)
        };

        let gamma = if wave_age <= 1.0 {
            1.7
        } else {
            1.7 + 6.0 * wave_age.ln()
        };

        Ok(Self {
            wave_age,
            friction_velocity,
            sigma,
            alphap,
            // Goes negative below roughly 2.2 m/s; a negative curvature term has no physical meaning
            alpham: alpham.max(0.0),
            kp,
            cp,
            gamma,
        })
    }

    /// Wavenumber of the spectral peak (rad/m).
    pub fn peak_wavenumber(&self) -> f64 {
        self.kp
    }

    /// Gravity-capillary phase speed.
    pub fn phase_speed(k: f64) -> f64 {
        ((GRAVITY / k) * (1.0 + (k / KM).powi(2))).sqrt()
    }

    /// Omnidirectional density `S(k) = (Bl + Bh) / k^3`.
    pub fn omnidirectional(&self, k: f64) -> f64 {
        let c = Self::phase_speed(k);
        let root = (k / self.kp).sqrt();

        let lpm = (-1.25 * (self.kp / k).powi(2)).exp();
        let gam = (-(root - 1.0).powi(2) / (2.0 * self.sigma * self.sigma)).exp();
        let jp = self.gamma.powf(gam);
        let fp = lpm * jp * (-(self.wave_age / 10f64.sqrt()) * (root - 1.0)).exp();
        let fm = lpm * jp * (-0.25 * (k / KM - 1.0).powi(2)).exp();

        let bl = 0.5 * self.alphap * (self.cp / c) * fp;
        let bh = 0.5 * self.alpham * (CM / c) * fm;

        (bl + bh) / k.powi(3)
    }

    /// Directional weight `0.5 (1 + Δ(k) cos 2φ)`.
    pub fn spreading_factor(&self, k: f64, phi: f64) -> f64 {
        let c = Self::phase_speed(k);
        let a0 = LN_2 / 2.0;
        let ap = 4.0;
        let am = 0.13 * self.friction_velocity / CM;
        let delk = (a0 + ap * (c / self.cp).powf(2.5) + am * (CM / c).powf(2.5)).tanh();
        0.5 * (1.0 + delk * (2.0 * phi).cos())
    }
}

/// One-sided wavenumber spectrum sampled at `k[i] = i*dk`, `i = 0..=N/2`.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    values: Vec<f64>,
}

impl Spectrum {
    /// Wrap caller-supplied spectral samples.
    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// A spectrum with no energy in any of `len` bins.
    pub fn zeros(len: usize) -> Self {
        Self {
            values: vec![0.0; len],
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Index and value of the largest sample (first one on ties).
    pub fn peak(&self) -> Result<(usize, f64), SurfaceError> {
        let (index, value) = self
            .values
            .iter()
            .copied()
            .enumerate()
            .fold((0, f64::NEG_INFINITY), |best, (i, s)| {
                if s > best.1 {
                    (i, s)
                } else {
                    best
                }
            });

        if value.is_finite() && value > 0.0 {
            Ok((index, value))
        } else {
            Err(SurfaceError::DegenerateSpectrum)
        }
    }

    /// Zero everything outside the band where the spectrum first rises to
    /// `threshold * peak` and where it first drops back below it after the
    /// peak. A spectrum without a positive peak is left untouched.
    pub fn apply_band_filter(&mut self, threshold: f64) {
        let (peak_index, peak) = match self.peak() {
            Ok(peak) => peak,
            Err(_) => {
                trace!("band filter skipped on degenerate spectrum");
                return;
            }
        };

        let cutoff = threshold * peak;
        let first = self
            .values
            .iter()
            .position(|&s| s >= cutoff)
            .unwrap_or(peak_index);
        let second = self.values[peak_index..]
            .iter()
            .position(|&s| s < cutoff)
            .map_or(self.values.len(), |offset| peak_index + offset);

        trace!(first, second, peak_index, "band filter");

        for (i, s) in self.values.iter_mut().enumerate() {
            if i < first || i >= second {
                *s = 0.0;
            }
        }
    }

    pub fn filtered(mut self, threshold: f64) -> Self {
        self.apply_band_filter(threshold);
        self
    }
}

/// Evaluate the Elfouhaily spectrum on `wavenumbers`.
///
/// The result has one more sample than the grid: the trailing entry is the
/// Nyquist bin, evaluated at the next uniformly spaced wavenumber. Sample 0 is
/// always forced to zero. `spreading_angle` of `None` or zero gives the
/// omnidirectional spectrum.
pub fn compute_spectrum(
    wavenumbers: &[f64],
    wind_speed: f64,
    wave_age: f64,
    spreading_angle: Option<f64>,
    apply_filter: bool,
) -> Result<Spectrum, SurfaceError> {
    let model = Elfouhaily::new(wind_speed, wave_age)?;

    let spreading = spreading_angle.filter(|phi| *phi != 0.0);
    if let Some(phi) = spreading {
        if !phi.is_finite() {
            return Err(SurfaceError::invalid("spreading_angle", phi, "must be finite"));
        }
    }

    let n = wavenumbers.len();
    let nyquist = if n >= 2 {
        Some(2.0 * wavenumbers[n - 1] - wavenumbers[n - 2])
    } else {
        None
    };

    let mut values = Vec::with_capacity(n + 1);
    for (index, &k) in wavenumbers.iter().chain(nyquist.iter()).enumerate() {
        if k.is_nan() || k < 0.0 {
            return Err(SurfaceError::invalid("wavenumber", k, "must be non-negative"));
        }
        let k = k.max(WAVENUMBER_FLOOR);

        let mut s = model.omnidirectional(k);
        if let Some(phi) = spreading {
            s *= model.spreading_factor(k, phi);
        }

        if !s.is_finite() {
            return Err(SurfaceError::NumericOverflow {
                quantity: "spectral density",
                index,
                context: format!("k = {k}, U10 = {wind_speed}, age = {wave_age}"),
            });
        }
        values.push(s);
    }
    if nyquist.is_none() {
        values.push(0.0);
    }

    // Mean height carries no information
    values[0] = 0.0;

    let mut spectrum = Spectrum::from_values(values);
    if apply_filter {
        spectrum.apply_band_filter(FILTER_THRESHOLD);
    }
    Ok(spectrum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn grid(samples: usize, length: f64) -> Vec<f64> {
        SpectralParameters::new(10.0, 0.84, length, samples)
            .unwrap()
            .wavenumbers()
    }

    #[test]
    fn test_length_and_dc() {
        let k = grid(200, 100.0);
        let s = compute_spectrum(&k, 10.0, 0.84, None, false).unwrap();
        assert_eq!(s.len(), k.len() + 1);
        assert_eq!(s.values()[0], 0.0);
    }

    #[test]
    fn test_non_negative_over_sea_states() {
        let k = grid(4000, 2000.0);
        for &u10 in &[1.0, 2.0, 5.0, 10.0, 20.0] {
            for &age in &[0.5, 0.84, 1.0, 2.0, 5.0] {
                for &phi in &[None, Some(0.3), Some(PI / 2.0)] {
                    let s = compute_spectrum(&k, u10, age, phi, false).unwrap();
                    assert_eq!(s.values()[0], 0.0);
                    assert!(
                        s.values().iter().all(|&v| v >= 0.0 && v.is_finite()),
                        "negative or non-finite sample for U10={u10}, age={age}, phi={phi:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_reference_sea_state_peak() {
        let params = SpectralParameters::new(10.0, 0.84, 10000.0, 20000).unwrap();
        let s = params.spectrum().unwrap();
        assert_eq!(s.len(), 10001);

        let kp = GRAVITY / 100.0 * 0.84 * 0.84;
        assert_relative_eq!(kp, 0.0692, epsilon = 1e-4);

        let (index, value) = s.peak().unwrap();
        assert!(value > 0.0);
        let k_peak = index as f64 * params.dk();
        assert!(
            (k_peak - kp).abs() / kp < 0.15,
            "peak at {k_peak}, expected near {kp}"
        );
    }

    #[test]
    fn test_spreading_bounds() {
        let model = Elfouhaily::new(10.0, 0.84).unwrap();
        for &k in &[0.01, 0.07, 1.0, 100.0] {
            let downwind = model.spreading_factor(k, 0.0);
            let crosswind = model.spreading_factor(k, PI / 2.0);
            assert!(downwind > 0.5 && downwind <= 1.0);
            assert!(crosswind >= 0.0 && crosswind < 0.5);
            assert_relative_eq!(downwind + crosswind, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_zero_angle_means_omnidirectional() {
        let k = grid(400, 200.0);
        let omni = compute_spectrum(&k, 8.0, 1.2, None, false).unwrap();
        let zero = compute_spectrum(&k, 8.0, 1.2, Some(0.0), false).unwrap();
        assert_eq!(omni, zero);

        let params = SpectralParameters::new(8.0, 1.2, 200.0, 400)
            .unwrap()
            .with_spreading(0.0);
        assert_eq!(params.spreading_angle, None);
    }

    #[test]
    fn test_invalid_inputs() {
        let k = grid(20, 10.0);
        assert!(matches!(
            compute_spectrum(&k, 0.0, 0.84, None, false),
            Err(SurfaceError::InvalidParameter { name: "wind_speed", .. })
        ));
        assert!(matches!(
            compute_spectrum(&k, 10.0, -1.0, None, false),
            Err(SurfaceError::InvalidParameter { name: "wave_age", .. })
        ));
        assert!(matches!(
            compute_spectrum(&[0.0, -0.1], 10.0, 0.84, None, false),
            Err(SurfaceError::InvalidParameter { name: "wavenumber", .. })
        ));
        assert!(matches!(
            SpectralParameters::new(10.0, 0.84, 100.0, 201),
            Err(SurfaceError::InvalidParameter { name: "samples", .. })
        ));
        assert!(matches!(
            SpectralParameters::new(10.0, 0.84, 0.0, 200),
            Err(SurfaceError::InvalidParameter { name: "length", .. })
        ));
    }

    #[test]
    fn test_overflow_reports_index() {
        // kp underflows to zero at this wind speed, so the density is NaN
        let k = grid(20, 10.0);
        let err = compute_spectrum(&k, 1e200, 0.84, None, false).unwrap_err();
        match err {
            SurfaceError::NumericOverflow {
                quantity, index, ..
            } => {
                assert_eq!(quantity, "spectral density");
                assert_eq!(index, 0);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_short_grids() {
        let s = compute_spectrum(&[], 10.0, 0.84, None, false).unwrap();
        assert_eq!(s.values(), &[0.0]);
        let s = compute_spectrum(&[0.0], 10.0, 0.84, None, true).unwrap();
        assert_eq!(s.values(), &[0.0, 0.0]);
    }

    #[test]
    fn test_filter_band() {
        let mut s = Spectrum::from_values(vec![0.0, 0.2, 0.6, 1.0, 0.7, 0.4, 0.9, 0.1]);
        s.apply_band_filter(0.5);
        assert_eq!(s.values(), &[0.0, 0.0, 0.6, 1.0, 0.7, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_filter_idempotent() {
        let params = SpectralParameters::new(10.0, 0.84, 10000.0, 20000)
            .unwrap()
            .with_spreading(PI / 3.0);
        let once = params.with_filter(true).spectrum().unwrap();
        let twice = once.clone().filtered(FILTER_THRESHOLD);
        assert_eq!(once, twice);
        assert!(once.peak().is_ok());

        let unfiltered = params.spectrum().unwrap();
        assert!(once.values().iter().filter(|&&v| v > 0.0).count()
            < unfiltered.values().iter().filter(|&&v| v > 0.0).count());
    }

    #[test]
    fn test_filter_degenerate_untouched() {
        let mut s = Spectrum::zeros(16);
        assert_eq!(s.peak(), Err(SurfaceError::DegenerateSpectrum));
        s.apply_band_filter(FILTER_THRESHOLD);
        assert_eq!(s, Spectrum::zeros(16));
    }

    #[test]
    fn test_filter_band_runs_to_end() {
        let s = Spectrum::from_values(vec![0.0, 0.1, 0.8, 1.0, 0.9]).filtered(0.5);
        assert_eq!(s.values(), &[0.0, 0.0, 0.8, 1.0, 0.9]);
    }
}
