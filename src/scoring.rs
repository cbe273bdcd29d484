//! Trace comparison used by parameter-fitting harnesses.
//!
//! Errors are sums of squared differences evaluated at the individual's
//! sample times, with the baseline linearly interpolated onto them. Single
//! action potential and pacing runs compare voltage; voltage clamp compares
//! the summed membrane current.

use thiserror::Error;

use crate::protocol::Protocol;
use crate::simulation::trace::interpolate;
use crate::simulation::Trace;

/// A trace lacks what its protocol is scored on
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("{0} trace has no current snapshots")]
    MissingCurrents(&'static str),

    #[error("baseline trace needs at least two samples, has {0}")]
    BaselineTooShort(usize),
}

fn squared_error(
    baseline_times: &[f64],
    baseline_values: &[f64],
    times: &[f64],
    values: &[f64],
) -> Result<f64, ScoringError> {
    if baseline_times.len() < 2 {
        return Err(ScoringError::BaselineTooShort(baseline_times.len()));
    }
    let error = times
        .iter()
        .zip(values)
        .filter_map(|(&t, &v)| interpolate(baseline_times, baseline_values, t).map(|b| (v - b).powi(2)))
        .sum();
    Ok(error)
}

/// Σ (V_individual − V_baseline(t))²
pub fn voltage_error(baseline: &Trace, individual: &Trace) -> Result<f64, ScoringError> {
    squared_error(
        baseline.times(),
        baseline.voltages(),
        individual.times(),
        individual.voltages(),
    )
}

/// Σ (I_individual − I_baseline(t))² over summed membrane current
pub fn current_error(baseline: &Trace, individual: &Trace) -> Result<f64, ScoringError> {
    let baseline_currents = baseline
        .summed_currents()
        .ok_or(ScoringError::MissingCurrents("baseline"))?;
    let individual_currents = individual
        .summed_currents()
        .ok_or(ScoringError::MissingCurrents("individual"))?;
    squared_error(
        baseline.times(),
        &baseline_currents,
        individual.times(),
        &individual_currents,
    )
}

/// Error appropriate to `protocol`
pub fn protocol_error(
    protocol: &Protocol,
    baseline: &Trace,
    individual: &Trace,
) -> Result<f64, ScoringError> {
    match protocol {
        Protocol::SingleActionPotential(_) | Protocol::IrregularPacing(_) => {
            voltage_error(baseline, individual)
        }
        Protocol::VoltageClamp(_) => current_error(baseline, individual),
    }
}

/// Σ V² of the baseline; the penalty for a failed individual
pub fn max_error(baseline: &Trace) -> f64 {
    baseline.voltages().iter().map(|v| v * v).sum()
}

/// Error scaled by [`max_error`]; a missing individual scores 1.0
pub fn normalized_error(
    protocol: &Protocol,
    baseline: &Trace,
    individual: Option<&Trace>,
) -> Result<f64, ScoringError> {
    let Some(individual) = individual else {
        return Ok(1.0);
    };
    let max = max_error(baseline);
    let error = protocol_error(protocol, baseline, individual)?;
    if max > 0.0 {
        Ok(error / max)
    } else {
        Ok(error)
    }
}
