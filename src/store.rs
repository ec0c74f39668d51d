//! The legacy fit store: a JSON file mapping each parameter name to its
//! optimal value and covariance row.
//!
//! ```json
//! {"m": [2.0, [0.01, 0.0, 0.0]], "b": [1.0, [0.0, 0.02, 0.0]], ...}
//! ```
//!
//! Infinite covariance entries, produced when the fit has no spare degrees of
//! freedom, are stored as `null` and read back as `+inf`. NaN and `-inf`
//! entries have no representation and are refused when writing.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::engine::FitResult;
use crate::error::{FitError, Result};

/// File name used when no path is given.
pub const DEFAULT_FIT_FILE: &str = "FitData.json";

type Entry = (f64, Vec<Option<f64>>);

#[derive(Serialize, Deserialize)]
#[serde(transparent)]
struct FitFile {
    #[serde(with = "crate::utils::ordered_map")]
    entries: Vec<(String, Entry)>,
}

/// Parameter values and covariance read back from a fit file.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFit {
    pub popt: Array1<f64>,
    pub pcov: Array2<f64>,
    pub values: Vec<(String, f64)>,
}

impl StoredFit {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }
}

/// Reads and writes fit files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FitStore {
    path: PathBuf,
}

impl Default for FitStore {
    fn default() -> Self {
        Self::new(DEFAULT_FIT_FILE)
    }
}

impl FitStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether an earlier fit was saved at this path.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Save values and covariance under their parameter names.
    pub fn save(&self, names: &[String], values: &Array1<f64>, covariance: &Array2<f64>) -> Result<()> {
        let file = File::create(&self.path)?;
        write_fit(BufWriter::new(file), names, values, covariance)?;
        info!(path = %self.path.display(), parameters = names.len(), "saved fit data");
        Ok(())
    }

    pub fn save_result(&self, result: &FitResult) -> Result<()> {
        self.save(result.names(), result.values(), result.covariance())
    }

    /// Load `(popt, pcov, name -> value)`.
    pub fn load(&self) -> Result<StoredFit> {
        let file = File::open(&self.path)?;
        let stored = read_fit(BufReader::new(file))?;
        info!(path = %self.path.display(), parameters = stored.values.len(), "loaded fit data");
        Ok(stored)
    }
}

/// Write the fit file format to any writer.
pub fn write_fit<W: Write>(
    mut writer: W,
    names: &[String],
    values: &Array1<f64>,
    covariance: &Array2<f64>,
) -> Result<()> {
    let n = names.len();
    if values.len() != n || covariance.dim() != (n, n) {
        return Err(FitError::DimensionMismatch(format!(
            "{} names, {} values, {:?} covariance",
            n,
            values.len(),
            covariance.dim()
        )));
    }
    if let Some(i) = values.iter().position(|v| !v.is_finite()) {
        return Err(FitError::Serialization(format!(
            "parameter '{}' has non-finite value {}",
            names[i], values[i]
        )));
    }
    if let Some(((i, j), c)) = covariance
        .indexed_iter()
        .find(|(_, c)| c.is_nan() || **c == f64::NEG_INFINITY)
    {
        return Err(FitError::Serialization(format!(
            "covariance entry ({}, {}) for '{}' is {}",
            i, j, names[i], c
        )));
    }

    let entries = names
        .iter()
        .zip(values.iter())
        .zip(covariance.outer_iter())
        .map(|((name, value), row)| {
            let row = row.iter().map(|c| c.is_finite().then_some(*c)).collect();
            (name.clone(), (*value, row))
        })
        .collect();
    serde_json::to_writer(&mut writer, &FitFile { entries })?;
    writer.flush()?;
    Ok(())
}

/// Read the fit file format from any reader.
pub fn read_fit<R: Read>(reader: R) -> Result<StoredFit> {
    let file: FitFile = serde_json::from_reader(reader)?;
    let n = file.entries.len();

    let mut popt = Array1::zeros(n);
    let mut pcov = Array2::zeros((n, n));
    let mut values = Vec::with_capacity(n);
    for (i, (name, (value, row))) in file.entries.into_iter().enumerate() {
        if row.len() != n {
            return Err(FitError::DimensionMismatch(format!(
                "covariance row for '{}' has {} entries, expected {}",
                name,
                row.len(),
                n
            )));
        }
        popt[i] = value;
        for (j, c) in row.into_iter().enumerate() {
            pcov[[i, j]] = c.unwrap_or(f64::INFINITY);
        }
        values.push((name, value));
    }
    Ok(StoredFit { popt, pcov, values })
}
