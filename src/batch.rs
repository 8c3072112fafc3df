//! Monte Carlo batch runs.
//!
//! Realization indices are split into contiguous ranges, one per worker. Each
//! worker owns its own seeded random source and writes files whose names embed
//! the realization index, so workers share nothing but the read-only spectrum
//! and transform plan, computed once per batch for the model in use.

use std::collections::HashSet;
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::process::Command;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::ComputationParameters;
use crate::deck::{self, DeckPatch, RunFolder};
use crate::error::BatchError;
use crate::spectrum::{SpectralParameters, Spectrum};
use crate::synthesis::{smooth_surface, SurfaceRealization, SurfaceSynthesizer};

/// Which surface each run is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SurfaceModel {
    /// Random Elfouhaily realization
    #[default]
    Random,
    /// Deterministic sinusoid baseline
    Smooth,
    /// No surface file; the solver's own generator draws the surface from a
    /// per-run seed patched into the deck
    Osg,
}

/// Per-batch state shared read-only by every worker.
enum SurfaceSource {
    Random {
        spectrum: Spectrum,
        synthesizer: SurfaceSynthesizer,
    },
    Smooth(SurfaceRealization),
    Osg,
}

/// Work assigned to one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerPlan {
    pub id: usize,
    pub seed: u64,
    pub runs: Range<usize>,
}

/// Runs completed by one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub id: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub workers: Vec<WorkerReport>,
}

impl BatchSummary {
    pub fn completed(&self) -> usize {
        self.workers.iter().map(|w| w.completed).sum()
    }
}

/// Split `iterations` into `workers` contiguous ranges; the last worker takes
/// the remainder.
pub fn partition(iterations: usize, workers: usize) -> Vec<Range<usize>> {
    if workers == 0 {
        return Vec::new();
    }
    let per_worker = iterations / workers;
    (0..workers)
        .map(|i| {
            let start = i * per_worker;
            let stop = if i == workers - 1 {
                iterations
            } else {
                start + per_worker
            };
            start..stop
        })
        .collect()
}

/// Derive pairwise distinct worker seeds from `initial`.
///
/// Seeds are drawn from `[0.5*initial, 3.5*initial)`; collisions are bumped
/// to the next free value.
pub fn worker_seeds(initial: u64, workers: usize) -> Vec<u64> {
    let mut rng = StdRng::seed_from_u64(initial);
    let base = initial as f64;
    let mut seen = HashSet::with_capacity(workers);
    let mut seeds = Vec::with_capacity(workers);

    for _ in 0..workers {
        let mut seed = (0.5 * base + 3.0 * base * rng.gen::<f64>()).floor() as u64;
        while !seen.insert(seed) {
            seed = seed.wrapping_add(1);
        }
        seeds.push(seed);
    }
    seeds
}

pub fn plan(iterations: usize, workers: usize, initial_seed: u64) -> Vec<WorkerPlan> {
    partition(iterations, workers)
        .into_iter()
        .zip(worker_seeds(initial_seed, workers))
        .enumerate()
        .map(|(i, (runs, seed))| WorkerPlan {
            id: i + 1,
            seed,
            runs,
        })
        .collect()
}

/// Stages and runs a batch of solver realizations in a run folder.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    params: SpectralParameters,
    computation: ComputationParameters,
    folder: RunFolder,
    prefix: String,
    solver: Option<PathBuf>,
    model: SurfaceModel,
}

impl BatchRunner {
    pub fn new(
        params: SpectralParameters,
        computation: ComputationParameters,
        folder: RunFolder,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            params,
            computation,
            folder,
            prefix: prefix.into(),
            solver: None,
            model: SurfaceModel::Random,
        }
    }

    /// Invoke `solver` on every deck. Without one only the files are written.
    pub fn with_solver(mut self, solver: Option<PathBuf>) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_model(mut self, model: SurfaceModel) -> Self {
        self.model = model;
        self
    }

    pub fn folder(&self) -> &RunFolder {
        &self.folder
    }

    /// Run every realization across `workers` parallel workers.
    pub fn run(&self, workers: usize) -> Result<BatchSummary, BatchError> {
        if workers == 0 {
            return Err(BatchError::NoWorkers);
        }

        let source = self.surface_source()?;
        let plans = plan(self.computation.iterations, workers, self.computation.seed);

        info!(
            workers,
            iterations = self.computation.iterations,
            samples = self.params.samples,
            dk = self.params.dk(),
            model = ?self.model,
            "starting batch"
        );

        let reports = plans
            .par_iter()
            .map(|plan| self.run_worker(plan, &source))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BatchSummary { workers: reports })
    }

    /// Everything a run needs that depends only on the sea state, computed
    /// once per batch.
    fn surface_source(&self) -> Result<SurfaceSource, BatchError> {
        Ok(match self.model {
            SurfaceModel::Random => SurfaceSource::Random {
                spectrum: self.params.spectrum()?,
                synthesizer: SurfaceSynthesizer::from_parameters(&self.params)?,
            },
            SurfaceModel::Smooth => {
                SurfaceSource::Smooth(smooth_surface(self.params.length, self.params.samples)?)
            }
            SurfaceModel::Osg => {
                let input = self.folder.osg_input();
                if !input.is_file() {
                    let missing = io::Error::new(io::ErrorKind::NotFound, "OSG input not staged");
                    return Err(BatchError::io(input)(missing));
                }
                SurfaceSource::Osg
            }
        })
    }

    fn run_worker(
        &self,
        plan: &WorkerPlan,
        source: &SurfaceSource,
    ) -> Result<WorkerReport, BatchError> {
        let mut rng = StdRng::seed_from_u64(plan.seed);
        let total = plan.runs.len();

        for (done, run) in plan.runs.clone().enumerate() {
            info!(worker = plan.id, run = done + 1, of = total, "run");
            let (deck_path, surface_path) = self.folder.run_files(&self.prefix, run);
            let patch = DeckPatch::new(self.computation.antenna_height, self.params.length)
                .with_frequency(self.computation.frequency);

            let patch = match source {
                SurfaceSource::Random {
                    spectrum,
                    synthesizer,
                } => {
                    let surface = synthesizer
                        .synthesize(spectrum, &mut rng)
                        .map_err(|source| BatchError::Realization { run, source })?;
                    self.write_surface(run, &surface_path, &surface)?;
                    patch.with_surface_file(file_name(&surface_path))
                }
                SurfaceSource::Smooth(surface) => {
                    self.write_surface(run, &surface_path, surface)?;
                    patch.with_surface_file(file_name(&surface_path))
                }
                SurfaceSource::Osg => {
                    let seed = (self.computation.seed as f64 * rng.gen::<f64>()) as u64;
                    debug!(run, seed, "osg seed");
                    patch.with_osg_seed(seed)
                }
            };

            deck::write_input_deck(&self.folder.deck_template, &deck_path, &patch)?;
            self.call_solver(run, &deck_path)?;
        }

        Ok(WorkerReport {
            id: plan.id,
            completed: total,
        })
    }

    fn write_surface(
        &self,
        run: usize,
        path: &Path,
        surface: &SurfaceRealization,
    ) -> Result<(), BatchError> {
        let (low, high) = surface.height_range();
        debug!(run, rms = surface.rms_height(), low, high, "surface generated");
        deck::write_surface_file(&self.folder.surface_template, path, surface)
    }

    /// Run the solver on `deck` from inside the run folder, if one is set.
    fn call_solver(&self, run: usize, deck: &Path) -> Result<(), BatchError> {
        let Some(solver) = &self.solver else {
            return Ok(());
        };
        debug!(run, solver = %solver.display(), "calling solver");
        let status = Command::new(solver)
            .arg(file_name(deck))
            .args(["-b", "-q"])
            .current_dir(&self.folder.dir)
            .status()
            .map_err(|source| BatchError::SolverLaunch {
                solver: solver.clone(),
                source,
            })?;
        if !status.success() {
            return Err(BatchError::SolverFailed { run, status });
        }
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_covers_all() {
        assert_eq!(partition(10, 3), vec![0..3, 3..6, 6..10]);
        assert_eq!(partition(9, 3), vec![0..3, 3..6, 6..9]);
        assert_eq!(partition(2, 3), vec![0..0, 0..0, 0..2]);
        assert_eq!(partition(5, 1), vec![0..5]);
        assert!(partition(5, 0).is_empty());
    }

    #[test]
    fn test_worker_seeds_distinct_and_reproducible() {
        let seeds = worker_seeds(56182189, 8);
        assert_eq!(seeds, worker_seeds(56182189, 8));
        let unique: HashSet<_> = seeds.iter().collect();
        assert_eq!(unique.len(), 8);
        for &s in &seeds {
            assert!(s >= 56182189 / 2 && s <= 56182189 * 7 / 2);
        }
    }

    #[test]
    fn test_worker_seeds_degenerate_initial() {
        let seeds = worker_seeds(0, 4);
        assert_eq!(seeds, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_plan() {
        let plans = plan(7, 2, 11);
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].id, 1);
        assert_eq!(plans[0].runs, 0..3);
        assert_eq!(plans[1].id, 2);
        assert_eq!(plans[1].runs, 3..7);
        assert_ne!(plans[0].seed, plans[1].seed);
    }

    #[test]
    fn test_summary_total() {
        let summary = BatchSummary {
            workers: vec![
                WorkerReport { id: 1, completed: 3 },
                WorkerReport { id: 2, completed: 4 },
            ],
        };
        assert_eq!(summary.completed(), 7);
    }
}
