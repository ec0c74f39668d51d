//! Datasets and the fit window applied to them.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FitError, Result};

/// Paired x/y samples. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    xs: Array1<f64>,
    ys: Array1<f64>,
}

impl Dataset {
    /// Build a dataset; `xs` and `ys` must have the same length.
    pub fn new(xs: Array1<f64>, ys: Array1<f64>) -> Result<Self> {
        if xs.len() != ys.len() {
            return Err(FitError::DimensionMismatch(format!(
                "dataset has {} x values but {} y values",
                xs.len(),
                ys.len()
            )));
        }
        Ok(Self { xs, ys })
    }

    pub fn from_vecs(xs: Vec<f64>, ys: Vec<f64>) -> Result<Self> {
        Self::new(Array1::from_vec(xs), Array1::from_vec(ys))
    }

    pub fn xs(&self) -> &Array1<f64> {
        &self.xs
    }

    pub fn ys(&self) -> &Array1<f64> {
        &self.ys
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Smallest and largest x, ignoring NaN. `None` for an empty dataset.
    pub fn x_extent(&self) -> Option<(f64, f64)> {
        extent(self.xs.iter().copied())
    }

    pub fn y_extent(&self) -> Option<(f64, f64)> {
        extent(self.ys.iter().copied())
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.xs.iter().copied().zip(self.ys.iter().copied())
    }
}

pub(crate) fn extent(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values.filter(|v| !v.is_nan()).fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// The x-window used for fitting and plotting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitRange {
    pub min: f64,
    pub max: f64,
}

impl FitRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Range spanning the whole x extent of `dataset`.
    pub fn covering(dataset: &Dataset) -> Option<Self> {
        dataset.x_extent().map(|(min, max)| Self { min, max })
    }

    /// Order the ends so that `min <= max`.
    pub fn normalized(self) -> Self {
        if self.min > self.max {
            Self {
                min: self.max,
                max: self.min,
            }
        } else {
            self
        }
    }

    /// Strictly inside the window; boundary points are outside.
    pub fn contains(&self, x: f64) -> bool {
        self.min < x && x < self.max
    }
}

/// Selects the points of a dataset that fall inside a fit range.
pub struct RangeFilter;

impl RangeFilter {
    /// Keep the points with `range.min < x < range.max`.
    ///
    /// Both ends are exclusive, so points lying exactly on a boundary are
    /// dropped. With the default range spanning the data, that includes the
    /// first and last sample.
    ///
    /// # Examples
    ///
    /// ```
    /// use actfit::data::{Dataset, FitRange, RangeFilter};
    ///
    /// let data = Dataset::from_vecs(vec![0.0, 1.0, 2.0, 3.0], vec![5.0, 6.0, 7.0, 8.0]).unwrap();
    /// let inside = RangeFilter::filter(&data, FitRange::new(0.0, 3.0)).unwrap();
    /// assert_eq!(inside.xs().to_vec(), vec![1.0, 2.0]);
    /// ```
    pub fn filter(dataset: &Dataset, range: FitRange) -> Result<Dataset> {
        let (xs, ys): (Vec<f64>, Vec<f64>) =
            dataset.iter().filter(|(x, _)| range.contains(*x)).unzip();

        if xs.is_empty() {
            return Err(FitError::EmptyRange {
                min: range.min,
                max: range.max,
            });
        }

        debug!(
            kept = xs.len(),
            total = dataset.len(),
            min = range.min,
            max = range.max,
            "filtered dataset"
        );
        Ok(Dataset {
            xs: Array1::from_vec(xs),
            ys: Array1::from_vec(ys),
        })
    }
}
