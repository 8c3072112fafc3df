use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use sea_surface::prelude::*;

fn main() {
    println!("Running Sea Surface Benchmarks");
    println!("==============================");

    // (length in m, sample count)
    let grids = [
        (1_000.0, 2_000),    // 0.5 m spacing, short path
        (10_000.0, 20_000),  // reference 10 km path
        (40_000.0, 131_072), // long path, power-of-two transform
    ];

    for &(length, samples) in &grids {
        println!("\nSurface: {} m with {} samples", length, samples);

        let params = SpectralParameters::new(10.0, 0.84, length, samples)
            .unwrap()
            .with_spreading(0.3)
            .with_filter(true);

        // Benchmark spectrum evaluation
        let start = Instant::now();
        let spectrum = params.spectrum().unwrap();
        println!("  Spectrum: {:.2?}", start.elapsed());

        // Benchmark transform planning
        let start = Instant::now();
        let synthesizer = SurfaceSynthesizer::from_parameters(&params).unwrap();
        println!("  FFT planning: {:.2?}", start.elapsed());

        // Benchmark realizations with a shared plan
        let mut rng = StdRng::seed_from_u64(42);
        let realizations = 50;
        let start = Instant::now();
        let mut rms = 0.0;
        for _ in 0..realizations {
            let surface = synthesizer.synthesize(&spectrum, &mut rng).unwrap();
            rms += surface.rms_height();
        }
        let elapsed = start.elapsed();
        println!(
            "  Synthesis: {:.2?} per realization (mean rms height {:.4} m)",
            elapsed / realizations,
            rms / realizations as f64
        );
    }
}
