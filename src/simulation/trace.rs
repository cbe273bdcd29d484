//! Immutable simulation output.

use serde::{Deserialize, Serialize};

use crate::model::{CurrentKind, CurrentSnapshot};
use crate::protocol::PacingInfo;

/// Accepted samples of one successful run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    times: Vec<f64>,
    voltages: Vec<f64>,
    currents: Option<Vec<CurrentSnapshot>>,
    pacing_info: Option<PacingInfo>,
}

impl Trace {
    pub fn new(
        times: Vec<f64>,
        voltages: Vec<f64>,
        currents: Option<Vec<CurrentSnapshot>>,
        pacing_info: Option<PacingInfo>,
    ) -> Self {
        debug_assert_eq!(times.len(), voltages.len());
        Self {
            times,
            voltages,
            currents,
            pacing_info,
        }
    }

    /// Sample times (s), strictly increasing
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Membrane voltage (V), parallel to `times`
    pub fn voltages(&self) -> &[f64] {
        &self.voltages
    }

    pub fn currents(&self) -> Option<&[CurrentSnapshot]> {
        self.currents.as_deref()
    }

    pub fn pacing_info(&self) -> Option<&PacingInfo> {
        self.pacing_info.as_ref()
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// `(t, V)` pairs in time order
    pub fn samples(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.times.iter().copied().zip(self.voltages.iter().copied())
    }

    /// `(min, max)` voltage, or `None` for an empty trace
    pub fn voltage_range(&self) -> Option<(f64, f64)> {
        if self.voltages.is_empty() {
            return None;
        }
        let min = self.voltages.iter().copied().fold(f64::INFINITY, f64::min);
        let max = self.voltages.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some((min, max))
    }

    /// Piecewise-linear voltage at `t_sec`, held constant beyond either end
    pub fn interpolate_voltage(&self, t_sec: f64) -> Option<f64> {
        interpolate(&self.times, &self.voltages, t_sec)
    }

    /// Total membrane current (A/F) per sample
    pub fn summed_currents(&self) -> Option<Vec<f64>> {
        self.currents
            .as_ref()
            .map(|snapshots| snapshots.iter().map(CurrentSnapshot::total).collect())
    }

    /// One current's values per sample
    pub fn current_series(&self, kind: CurrentKind) -> Option<Vec<f64>> {
        self.currents
            .as_ref()
            .map(|snapshots| snapshots.iter().map(|s| s.get(kind)).collect())
    }
}

/// Linear interpolation over increasing `xs`, clamped at both ends
pub(crate) fn interpolate(xs: &[f64], ys: &[f64], x: f64) -> Option<f64> {
    let (first, last) = (xs.first()?, xs.last()?);
    if x <= *first {
        return ys.first().copied();
    }
    if x >= *last {
        return ys.last().copied();
    }
    // First index with xs[i] > x; 1 <= i < len here
    let i = xs.partition_point(|&xi| xi <= x);
    let (x0, x1) = (xs[i - 1], xs[i]);
    let (y0, y1) = (ys[i - 1], ys[i]);
    Some(y0 + (y1 - y0) * (x - x0) / (x1 - x0))
}
