use std::f64::consts::PI;
use std::fmt;
use std::sync::Arc;

use num_complex::Complex64;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use rustfft::{Fft, FftPlanner};

use crate::error::{ensure_even_samples, ensure_positive, SurfaceError};
use crate::spectrum::{SpectralParameters, Spectrum};

/// Spatial frequency of the smooth reference surface (cycles/m)
const SMOOTH_SURFACE_FREQUENCY: f64 = 0.001;

/// One realization of the surface elevation profile.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceRealization {
    pub elevation: Vec<f64>, // Height above mean sea level (m)
    pub position: Vec<f64>,  // Downrange distance (m)
}

impl SurfaceRealization {
    pub fn len(&self) -> usize {
        self.elevation.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elevation.is_empty()
    }

    /// `(position, elevation)` pairs in sample order.
    pub fn samples(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.position.iter().copied().zip(self.elevation.iter().copied())
    }

    /// Root-mean-square elevation about zero.
    pub fn rms_height(&self) -> f64 {
        if self.elevation.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.elevation.iter().map(|h| h * h).sum();
        (sum / self.elevation.len() as f64).sqrt()
    }

    /// Lowest and highest elevation.
    pub fn height_range(&self) -> (f64, f64) {
        self.elevation
            .iter()
            .fold((f64::MAX, f64::MIN), |(lo, hi), &h| (lo.min(h), hi.max(h)))
    }
}

/// Draws surface realizations of a fixed length and sample count.
///
/// The inverse FFT plan is built once and shared; the synthesizer is `Sync`
/// so a single instance can serve every worker in a batch.
#[derive(Clone)]
pub struct SurfaceSynthesizer {
    length: f64,
    samples: usize,
    dk: f64,
    ifft: Arc<dyn Fft<f64>>,
}

impl fmt::Debug for SurfaceSynthesizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceSynthesizer")
            .field("length", &self.length)
            .field("samples", &self.samples)
            .field("dk", &self.dk)
            .finish()
    }
}

impl SurfaceSynthesizer {
    /// Synthesizer with the natural bin width `2π/L`.
    pub fn new(length: f64, samples: usize) -> Result<Self, SurfaceError> {
        ensure_positive("length", length)?;
        Self::with_bin_width(length, samples, 2.0 * PI / length)
    }

    pub fn with_bin_width(length: f64, samples: usize, dk: f64) -> Result<Self, SurfaceError> {
        ensure_positive("length", length)?;
        ensure_positive("dk", dk)?;
        ensure_even_samples(samples)?;

        let mut planner = FftPlanner::new();
        let ifft = planner.plan_fft_inverse(samples);

        Ok(Self {
            length,
            samples,
            dk,
            ifft,
        })
    }

    pub fn from_parameters(params: &SpectralParameters) -> Result<Self, SurfaceError> {
        params.validate()?;
        Self::new(params.length, params.samples)
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn dk(&self) -> f64 {
        self.dk
    }

    /// Downrange sample positions `i*L/N`.
    pub fn positions(&self) -> Vec<f64> {
        let dx = self.length / self.samples as f64;
        (0..self.samples).map(|i| i as f64 * dx).collect()
    }

    /// Draw one realization whose expected power follows `spectrum`.
    pub fn synthesize<R: Rng + ?Sized>(
        &self,
        spectrum: &Spectrum,
        rng: &mut R,
    ) -> Result<SurfaceRealization, SurfaceError> {
        let mut coefficients = self.random_coefficients(spectrum, rng)?;

        // rustfft leaves the inverse unnormalised, which is ifft(V) * N
        self.ifft.process(&mut coefficients);

        let mut elevation = Vec::with_capacity(self.samples);
        for (index, c) in coefficients.iter().enumerate() {
            if !c.re.is_finite() {
                return Err(SurfaceError::NumericOverflow {
                    quantity: "elevation",
                    index,
                    context: format!("L = {}, N = {}, dk = {}", self.length, self.samples, self.dk),
                });
            }
            elevation.push(c.re);
        }

        Ok(SurfaceRealization {
            elevation,
            position: self.positions(),
        })
    }

    /// Hermitian coefficient sequence with `E|V[i]|^2` matched to `S[i]*dk`.
    fn random_coefficients<R: Rng + ?Sized>(
        &self,
        spectrum: &Spectrum,
        rng: &mut R,
    ) -> Result<Vec<Complex64>, SurfaceError> {
        let n = self.samples;
        let half = n / 2;
        let s = spectrum.values();

        if s.len() != half + 1 {
            return Err(SurfaceError::invalid(
                "spectrum",
                s.len() as f64,
                "length must be N/2 + 1",
            ));
        }
        if let Some(&bad) = s.iter().find(|v| !(v.is_finite() && **v >= 0.0)) {
            return Err(SurfaceError::invalid(
                "spectrum",
                bad,
                "samples must be finite and non-negative",
            ));
        }

        let w: Vec<f64> = (0..half).map(|_| StandardNormal.sample(rng)).collect();
        let u: Vec<f64> = (0..half).map(|_| StandardNormal.sample(rng)).collect();
        let amplitude = |i: usize| (s[i] * self.dk).sqrt();

        let mut v = vec![Complex64::new(0.0, 0.0); n];
        v[0] = Complex64::new(amplitude(0) * w[0], 0.0);
        for i in 1..half {
            v[i] = Complex64::new(w[i], u[i]) * (0.5 * amplitude(i));
            v[n - i] = v[i].conj();
        }
        v[half] = Complex64::new(amplitude(half) * u[0], 0.0);

        Ok(v)
    }
}

/// Draw one surface realization of length `length` with `samples` points.
///
/// Convenience wrapper that plans a fresh transform; prefer a shared
/// [`SurfaceSynthesizer`] when drawing many realizations.
pub fn synthesize<R: Rng + ?Sized>(
    length: f64,
    samples: usize,
    spectrum: &Spectrum,
    dk: f64,
    rng: &mut R,
) -> Result<SurfaceRealization, SurfaceError> {
    SurfaceSynthesizer::with_bin_width(length, samples, dk)?.synthesize(spectrum, rng)
}

/// Deterministic sinusoidal reference surface on the same grid.
pub fn smooth_surface(length: f64, samples: usize) -> Result<SurfaceRealization, SurfaceError> {
    ensure_positive("length", length)?;
    if samples == 0 {
        return Err(SurfaceError::invalid("samples", 0.0, "must be positive"));
    }

    let dx = length / samples as f64;
    let position: Vec<f64> = (0..samples).map(|i| i as f64 * dx).collect();
    let elevation = position
        .iter()
        .map(|x| (2.0 * PI * SMOOTH_SURFACE_FREQUENCY * x).sin())
        .collect();

    Ok(SurfaceRealization {
        elevation,
        position,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn single_bin(half: usize, bin: usize, value: f64) -> Spectrum {
        let mut values = vec![0.0; half + 1];
        values[bin] = value;
        Spectrum::from_values(values)
    }

    #[test]
    fn test_deterministic_for_seed() {
        let params = SpectralParameters::new(10.0, 0.84, 1000.0, 2000).unwrap();
        let spectrum = params.spectrum().unwrap();
        let synth = SurfaceSynthesizer::from_parameters(&params).unwrap();

        let a = synth
            .synthesize(&spectrum, &mut StdRng::seed_from_u64(56182189))
            .unwrap();
        let b = synth
            .synthesize(&spectrum, &mut StdRng::seed_from_u64(56182189))
            .unwrap();
        assert_eq!(a, b);

        let c = synthesize(1000.0, 2000, &spectrum, params.dk(), &mut StdRng::seed_from_u64(56182189))
            .unwrap();
        assert_eq!(a, c);

        let d = synth
            .synthesize(&spectrum, &mut StdRng::seed_from_u64(1))
            .unwrap();
        assert_ne!(a.elevation, d.elevation);
    }

    #[test]
    fn test_positions_evenly_spaced() {
        let synth = SurfaceSynthesizer::new(250.0, 100).unwrap();
        let surface = synth
            .synthesize(&Spectrum::zeros(51), &mut StdRng::seed_from_u64(3))
            .unwrap();

        assert_eq!(surface.position.len(), 100);
        assert_eq!(surface.position[0], 0.0);
        for pair in surface.position.windows(2) {
            assert_relative_eq!(pair[1] - pair[0], 2.5, epsilon = 1e-9);
        }
        assert!(*surface.position.last().unwrap() < 250.0);
    }

    #[test]
    fn test_zero_spectrum_gives_flat_surface() {
        let synth = SurfaceSynthesizer::new(100.0, 64).unwrap();
        let surface = synth
            .synthesize(&Spectrum::zeros(33), &mut StdRng::seed_from_u64(9))
            .unwrap();
        assert!(surface.elevation.iter().all(|&h| h == 0.0));
        assert_eq!(surface.rms_height(), 0.0);
    }

    #[test]
    fn test_fully_filtered_spectrum_gives_flat_surface() {
        let mut spectrum = Spectrum::zeros(33);
        spectrum.apply_band_filter(0.5);
        let surface = synthesize(100.0, 64, &spectrum, 2.0 * PI / 100.0, &mut StdRng::seed_from_u64(9))
            .unwrap();
        assert!(surface.elevation.iter().all(|&h| h == 0.0));
    }

    #[test]
    fn test_single_bin_variance() {
        let n = 64;
        let length = 64.0;
        let s0 = 1.0;
        let synth = SurfaceSynthesizer::new(length, n).unwrap();
        let spectrum = single_bin(n / 2, 5, s0);
        let mut rng = StdRng::seed_from_u64(2024);

        let realizations = 10_000;
        let mut total = 0.0;
        for _ in 0..realizations {
            let surface = synth.synthesize(&spectrum, &mut rng).unwrap();
            total += surface.rms_height().powi(2);
        }
        let variance = total / realizations as f64;

        assert_relative_eq!(variance, s0 * synth.dk(), max_relative = 0.05);
    }

    #[test]
    fn test_output_is_real_sinusoid() {
        // Bin 4 of 32 is a single cosine with an 8 sample period
        let n = 32;
        let synth = SurfaceSynthesizer::new(32.0, n).unwrap();
        let surface = synth
            .synthesize(&single_bin(n / 2, 4, 2.0), &mut StdRng::seed_from_u64(11))
            .unwrap();
        assert!(surface.rms_height() > 0.0);
        for i in 0..n - 4 {
            assert_relative_eq!(surface.elevation[i], -surface.elevation[i + 4], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_reference_sea_state_surface() {
        let params = SpectralParameters::new(10.0, 0.84, 10000.0, 20000).unwrap();
        let spectrum = params.spectrum().unwrap();
        let synth = SurfaceSynthesizer::from_parameters(&params).unwrap();
        let surface = synth
            .synthesize(&spectrum, &mut StdRng::seed_from_u64(42))
            .unwrap();

        assert_eq!(surface.len(), 20000);
        assert_eq!(surface.position[0], 0.0);
        assert!(*surface.position.last().unwrap() < 10000.0);
        assert!(surface.elevation.iter().all(|h| h.is_finite()));

        let rms = surface.rms_height();
        assert!(rms > 0.01 && rms < 10.0, "implausible rms height {rms}");
    }

    #[test]
    fn test_invalid_shapes() {
        assert!(matches!(
            SurfaceSynthesizer::new(100.0, 63),
            Err(SurfaceError::InvalidParameter { name: "samples", .. })
        ));
        assert!(matches!(
            SurfaceSynthesizer::new(-1.0, 64),
            Err(SurfaceError::InvalidParameter { name: "length", .. })
        ));

        let synth = SurfaceSynthesizer::new(100.0, 64).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            synth.synthesize(&Spectrum::zeros(10), &mut rng),
            Err(SurfaceError::InvalidParameter { name: "spectrum", .. })
        ));
        assert!(matches!(
            synth.synthesize(&single_bin(32, 3, -1.0), &mut rng),
            Err(SurfaceError::InvalidParameter { name: "spectrum", .. })
        ));
    }

    #[test]
    fn test_smooth_surface() {
        let surface = smooth_surface(1000.0, 4).unwrap();
        assert_eq!(surface.position, vec![0.0, 250.0, 500.0, 750.0]);
        assert_relative_eq!(surface.elevation[0], 0.0);
        assert_relative_eq!(surface.elevation[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(surface.elevation[3], -1.0, epsilon = 1e-12);
        assert!(smooth_surface(1000.0, 0).is_err());
    }
}
