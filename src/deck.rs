//! Solver input files: surface records, input deck patching and run folder
//! staging.
//!
//! Deck templates are patched as raw bytes. Lines that are not replaced pass
//! through untouched, whatever their encoding.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::BatchError;
use crate::synthesis::SurfaceRealization;

pub const ANTENNA_HEIGHT_LABEL: &str = "Antenna height [ft|m]";
pub const MAX_RANGE_LABEL: &str = "Maximum problem range [nmi|km]";
pub const SURFACE_FILE_LABEL: &str =
    "Surface param file (200 char max) (ter type 1,2,3; surf type 3; rough surf 2):";
pub const FREQUENCY_LABEL: &str = "Frequency [MHz]";
pub const OSG_SEED_LABEL: &str = "OSG realization random seed (integer)";

/// Auxiliary files every run folder needs next to the input deck.
pub const SUPPORT_FILES: [&str; 2] = ["Sector.pat", "stdatm.ref"];

/// Name the solver expects for the ocean surface generator input.
pub const OSG_INPUT_FILE: &str = "osgInputFile.osgin";

/// Values substituted into an input deck template. Unset optional values
/// leave their template lines as they are.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckPatch {
    pub antenna_height: f64,
    pub range_km: f64,
    pub surface_file: Option<String>,
    pub frequency: Option<f64>,
    pub osg_seed: Option<u64>,
}

impl DeckPatch {
    pub fn new(antenna_height: f64, length_m: f64) -> Self {
        Self {
            antenna_height,
            range_km: length_m / 1000.0,
            surface_file: None,
            frequency: None,
            osg_seed: None,
        }
    }

    pub fn with_surface_file(mut self, surface_file: impl Into<String>) -> Self {
        self.surface_file = Some(surface_file.into());
        self
    }

    pub fn with_frequency(mut self, frequency: Option<f64>) -> Self {
        self.frequency = frequency;
        self
    }

    /// Seed for the solver's built-in ocean surface generator.
    pub fn with_osg_seed(mut self, seed: u64) -> Self {
        self.osg_seed = Some(seed);
        self
    }
}

/// Split a line into content and its terminator (`\r\n`, `\n` or nothing).
fn split_terminator(line: &[u8]) -> (&[u8], &[u8]) {
    if let Some(body) = line.strip_suffix(b"\r\n") {
        (body, &b"\r\n"[..])
    } else if let Some(body) = line.strip_suffix(b"\n") {
        (body, &b"\n"[..])
    } else {
        (line, &b""[..])
    }
}

fn has_label(line: &[u8], label: &str) -> bool {
    line.windows(label.len()).any(|window| window == label.as_bytes())
}

/// Copy `template` to `out` line by line, letting `edit` replace line bodies.
/// Replaced lines keep the terminator of the line they replace.
fn rewrite_lines<R, W, F>(mut template: R, out: &mut W, mut edit: F) -> io::Result<()>
where
    R: BufRead,
    W: Write,
    F: FnMut(&[u8]) -> Option<String>,
{
    let mut line = Vec::new();
    loop {
        line.clear();
        if template.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        let (body, terminator) = split_terminator(&line);
        match edit(body) {
            Some(replacement) => {
                out.write_all(replacement.as_bytes())?;
                out.write_all(terminator)?;
            }
            None => out.write_all(&line)?,
        }
    }
    Ok(())
}

fn labelled(value: impl std::fmt::Display, label: &str) -> String {
    format!("{value}          {label}")
}

/// Patch antenna height, problem range, frequency, OSG seed and the surface
/// file name into an input deck. The surface file name replaces the line that
/// follows the surface-param label.
pub fn patch_input_deck<R: BufRead, W: Write>(
    template: R,
    out: &mut W,
    patch: &DeckPatch,
) -> io::Result<()> {
    let mut replace_next = false;
    rewrite_lines(template, out, |line| {
        if replace_next {
            replace_next = false;
            patch.surface_file.clone()
        } else if has_label(line, ANTENNA_HEIGHT_LABEL) {
            Some(labelled(patch.antenna_height, ANTENNA_HEIGHT_LABEL))
        } else if has_label(line, MAX_RANGE_LABEL) {
            Some(labelled(patch.range_km, MAX_RANGE_LABEL))
        } else if has_label(line, SURFACE_FILE_LABEL) {
            replace_next = true;
            None
        } else if has_label(line, FREQUENCY_LABEL) {
            patch.frequency.map(|f| labelled(f, FREQUENCY_LABEL))
        } else if has_label(line, OSG_SEED_LABEL) {
            patch.osg_seed.map(|seed| format!("{seed}   {OSG_SEED_LABEL}"))
        } else {
            None
        }
    })
}

/// Write one `"<x_km>  <h_m>    0 0 0"` record per sample, in sample order.
pub fn write_surface_records<W: Write>(out: &mut W, surface: &SurfaceRealization) -> io::Result<()> {
    for (x, h) in surface.samples() {
        writeln!(out, "{}  {}    0 0 0", x / 1000.0, h)?;
    }
    Ok(())
}

/// Create `dest` from the surface template with the realization appended.
pub fn write_surface_file(
    template: &Path,
    dest: &Path,
    surface: &SurfaceRealization,
) -> Result<(), BatchError> {
    fs::copy(template, dest).map_err(BatchError::io(template))?;

    let file = fs::OpenOptions::new()
        .append(true)
        .open(dest)
        .map_err(BatchError::io(dest))?;
    let mut out = BufWriter::new(file);
    writeln!(out)
        .and_then(|_| write_surface_records(&mut out, surface))
        .and_then(|_| out.flush())
        .map_err(BatchError::io(dest))
}

/// Create `dest` from the input deck template with `patch` applied.
pub fn write_input_deck(template: &Path, dest: &Path, patch: &DeckPatch) -> Result<(), BatchError> {
    let reader = BufReader::new(File::open(template).map_err(BatchError::io(template))?);
    let mut out = BufWriter::new(File::create(dest).map_err(BatchError::io(dest))?);
    patch_input_deck(reader, &mut out, patch)
        .and_then(|_| out.flush())
        .map_err(BatchError::io(dest))
}

/// A staged run folder holding the templates and support files.
#[derive(Debug, Clone, PartialEq)]
pub struct RunFolder {
    pub dir: PathBuf,
    pub deck_template: PathBuf,
    pub surface_template: PathBuf,
}

impl RunFolder {
    /// Copy the support files and both templates from `inputs` into `dir`.
    pub fn stage(
        inputs: &Path,
        dir: &Path,
        deck_template: &str,
        surface_template: &str,
    ) -> Result<Self, BatchError> {
        fs::create_dir_all(dir).map_err(BatchError::io(dir))?;

        let templates = [deck_template, surface_template];
        for name in SUPPORT_FILES.iter().copied().chain(templates) {
            let src = inputs.join(name);
            fs::copy(&src, dir.join(name)).map_err(BatchError::io(&src))?;
            debug!(file = %src.display(), "staged");
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            deck_template: dir.join(deck_template),
            surface_template: dir.join(surface_template),
        })
    }

    /// Copy the ocean surface generator input `template` from `inputs` into
    /// the folder under the name the solver reads.
    pub fn stage_osg_input(&self, inputs: &Path, template: &str) -> Result<PathBuf, BatchError> {
        let src = inputs.join(template);
        let dest = self.osg_input();
        fs::copy(&src, &dest).map_err(BatchError::io(&src))?;
        debug!(file = %src.display(), "staged");
        Ok(dest)
    }

    pub fn osg_input(&self) -> PathBuf {
        self.dir.join(OSG_INPUT_FILE)
    }

    /// Paths of the input deck and surface file for realization `run`.
    pub fn run_files(&self, prefix: &str, run: usize) -> (PathBuf, PathBuf) {
        (
            self.dir.join(format!("{prefix}run_{run}.in")),
            self.dir.join(format!("{prefix}run_{run}.srf")),
        )
    }
}
