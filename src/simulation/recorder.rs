//! Per-run sample accumulation.
//!
//! Two histories are kept:
//! - raw: one sample per RHS evaluation, including rejected trial stages and
//!   Jacobian probes, so times are not monotonic
//! - accepted: one sample per accepted integrator step, strictly increasing

use crate::model::{CurrentSnapshot, MembraneCurrents};
use crate::protocol::PacingInfo;

use super::trace::Trace;

/// One RHS evaluation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub t_sec: f64,
    pub voltage_V: f64,
    /// Intrinsic dV/dt (V/s), before protocol forcing
    pub dv_dt: f64,
}

/// Accumulates samples for one run and packages them into a [`Trace`]
#[derive(Debug, Clone, Default)]
pub struct ResponseRecorder {
    record_currents: bool,
    raw: Vec<RawSample>,
    raw_currents: Vec<CurrentSnapshot>,
    times: Vec<f64>,
    voltages: Vec<f64>,
    currents: Vec<CurrentSnapshot>,
}

impl ResponseRecorder {
    pub fn new(record_currents: bool) -> Self {
        Self {
            record_currents,
            ..Default::default()
        }
    }

    /// Whether current snapshots are being kept
    pub fn records_currents(&self) -> bool {
        self.record_currents
    }

    /// Append an RHS evaluation
    pub fn record_raw(&mut self, t_sec: f64, voltage_V: f64, dv_dt: f64, currents: &MembraneCurrents) {
        self.raw.push(RawSample {
            t_sec,
            voltage_V,
            dv_dt,
        });
        if self.record_currents {
            self.raw_currents.push(currents.snapshot());
        }
    }

    /// Append an accepted step
    ///
    /// The snapshot is dropped when current recording is off.
    pub fn record_accepted(&mut self, t_sec: f64, voltage_V: f64, currents: Option<CurrentSnapshot>) {
        self.times.push(t_sec);
        self.voltages.push(voltage_V);
        if self.record_currents {
            if let Some(snapshot) = currents {
                self.currents.push(snapshot);
            }
        }
    }

    pub fn raw_samples(&self) -> &[RawSample] {
        &self.raw
    }

    /// Move the raw history out, leaving it empty
    pub fn take_raw_samples(&mut self) -> Vec<RawSample> {
        std::mem::take(&mut self.raw)
    }

    pub fn raw_currents(&self) -> &[CurrentSnapshot] {
        &self.raw_currents
    }

    /// Number of accepted samples so far
    pub fn accepted_len(&self) -> usize {
        self.times.len()
    }

    /// Consume the recorder into an immutable trace of accepted samples
    pub fn into_trace(self, pacing_info: Option<PacingInfo>) -> Trace {
        let currents = if self.record_currents && self.currents.len() == self.times.len() {
            Some(self.currents)
        } else {
            None
        };
        Trace::new(self.times, self.voltages, currents, pacing_info)
    }
}
