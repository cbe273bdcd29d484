//! Experimental protocols.
//!
//! A protocol decides how the cell ODE is forced:
//! - Single action potential: free-running from a zero-biased state
//! - Irregular pacing: stimulus delivered a chosen offset after each APD90
//! - Voltage clamp: membrane voltage held at a sequence of command steps

pub mod driver;
pub mod pacing;

pub(crate) use driver::DriverState;
pub use driver::{create_driver, ProtocolDriver};
pub use pacing::{PacingConfig, PacingEvent, PacingInfo, PacingScheduler};

use serde::Serialize;
use thiserror::Error;

/// Invalid protocol construction
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    #[error("protocol duration must be positive and finite, got {0}")]
    InvalidDuration(f64),

    #[error("stimulation offset {index} must be non-negative and finite, got {offset}")]
    InvalidOffset { index: usize, offset: f64 },

    #[error("voltage clamp needs at least one step")]
    EmptyClamp,

    #[error("voltage clamp step {index} is invalid (duration {duration_sec} s, voltage {voltage_V} V)")]
    InvalidStep {
        index: usize,
        duration_sec: f64,
        voltage_V: f64,
    },
}

fn check_duration(duration_sec: f64) -> Result<(), ProtocolError> {
    if duration_sec.is_finite() && duration_sec > 0.0 {
        Ok(())
    } else {
        Err(ProtocolError::InvalidDuration(duration_sec))
    }
}

/// Free-running action potential
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SingleActionPotentialProtocol {
    duration_sec: f64,
}

impl SingleActionPotentialProtocol {
    pub fn new(duration_sec: f64) -> Result<Self, ProtocolError> {
        check_duration(duration_sec)?;
        Ok(Self { duration_sec })
    }

    pub fn duration(&self) -> f64 {
        self.duration_sec
    }
}

/// Closed-loop pacing: each offset is the delay from an APD90 to the next stimulus
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrregularPacingProtocol {
    duration_sec: f64,
    stimulation_offsets_sec: Vec<f64>,
}

impl IrregularPacingProtocol {
    pub fn new(duration_sec: f64, stimulation_offsets_sec: Vec<f64>) -> Result<Self, ProtocolError> {
        check_duration(duration_sec)?;
        for (index, &offset) in stimulation_offsets_sec.iter().enumerate() {
            if !offset.is_finite() || offset < 0.0 {
                return Err(ProtocolError::InvalidOffset { index, offset });
            }
        }
        Ok(Self {
            duration_sec,
            stimulation_offsets_sec,
        })
    }

    pub fn duration(&self) -> f64 {
        self.duration_sec
    }

    pub fn stimulation_offsets(&self) -> &[f64] {
        &self.stimulation_offsets_sec
    }
}

/// One command step of a voltage clamp
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VoltageClampStep {
    pub duration_sec: f64,
    pub voltage_V: f64,
}

impl VoltageClampStep {
    pub fn new(duration_sec: f64, voltage_V: f64) -> Self {
        Self {
            duration_sec,
            voltage_V,
        }
    }
}

/// Ordered clamp steps; step `i` holds on `[start_i, start_i + duration_i)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoltageClampProtocol {
    steps: Vec<VoltageClampStep>,
}

impl VoltageClampProtocol {
    pub fn new(steps: Vec<VoltageClampStep>) -> Result<Self, ProtocolError> {
        if steps.is_empty() {
            return Err(ProtocolError::EmptyClamp);
        }
        for (index, step) in steps.iter().enumerate() {
            let valid = step.duration_sec.is_finite()
                && step.duration_sec > 0.0
                && step.voltage_V.is_finite();
            if !valid {
                return Err(ProtocolError::InvalidStep {
                    index,
                    duration_sec: step.duration_sec,
                    voltage_V: step.voltage_V,
                });
            }
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[VoltageClampStep] {
        &self.steps
    }

    /// Sum of step durations
    pub fn duration(&self) -> f64 {
        self.steps.iter().map(|s| s.duration_sec).sum()
    }

    /// Command voltage at `t_sec`
    ///
    /// Boundaries belong to the later step; times at or past the end hold the
    /// last step and times before zero hold the first.
    pub fn voltage_at(&self, t_sec: f64) -> f64 {
        let mut end = 0.0;
        for step in &self.steps {
            end += step.duration_sec;
            if t_sec < end {
                return step.voltage_V;
            }
        }
        // Constructor guarantees at least one step
        self.steps.last().map_or(0.0, |s| s.voltage_V)
    }
}

/// The three supported experiments
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Protocol {
    SingleActionPotential(SingleActionPotentialProtocol),
    IrregularPacing(IrregularPacingProtocol),
    VoltageClamp(VoltageClampProtocol),
}

impl Protocol {
    /// 2 s free-running action potential
    pub fn baseline_single_action_potential() -> Self {
        Protocol::SingleActionPotential(SingleActionPotentialProtocol { duration_sec: 2.0 })
    }

    /// 10 s of pacing over eight offsets
    pub fn baseline_irregular_pacing() -> Self {
        Protocol::IrregularPacing(IrregularPacingProtocol {
            duration_sec: 10.0,
            stimulation_offsets_sec: vec![0.6, 0.4, 1.0, 0.1, 0.2, 0.0, 0.8, 0.9],
        })
    }

    /// Six-step clamp spanning -120 mV to +40 mV
    pub fn baseline_voltage_clamp() -> Self {
        let steps = [
            (0.1, -0.08),
            (0.1, -0.12),
            (0.5, -0.06),
            (0.05, -0.04),
            (0.15, 0.02),
            (0.3, 0.04),
        ]
        .into_iter()
        .map(|(d, v)| VoltageClampStep::new(d, v))
        .collect();
        Protocol::VoltageClamp(VoltageClampProtocol { steps })
    }

    pub fn duration(&self) -> f64 {
        match self {
            Protocol::SingleActionPotential(p) => p.duration(),
            Protocol::IrregularPacing(p) => p.duration(),
            Protocol::VoltageClamp(p) => p.duration(),
        }
    }

    /// Integration span `(0, duration)`
    pub fn time_span(&self) -> (f64, f64) {
        (0.0, self.duration())
    }

    pub fn title(&self) -> &'static str {
        match self {
            Protocol::SingleActionPotential(_) => "Single Action Potential",
            Protocol::IrregularPacing(_) => "Irregular Pacing",
            Protocol::VoltageClamp(_) => "Voltage Clamp",
        }
    }

    /// Voltage clamp is scored on currents; the others on voltage
    pub fn records_currents_by_default(&self) -> bool {
        matches!(self, Protocol::VoltageClamp(_))
    }
}

impl From<SingleActionPotentialProtocol> for Protocol {
    fn from(p: SingleActionPotentialProtocol) -> Self {
        Protocol::SingleActionPotential(p)
    }
}

impl From<IrregularPacingProtocol> for Protocol {
    fn from(p: IrregularPacingProtocol) -> Self {
        Protocol::IrregularPacing(p)
    }
}

impl From<VoltageClampProtocol> for Protocol {
    fn from(p: VoltageClampProtocol) -> Self {
        Protocol::VoltageClamp(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_durations() {
        assert!(SingleActionPotentialProtocol::new(0.0).is_err());
        assert!(SingleActionPotentialProtocol::new(f64::NAN).is_err());
        assert!(IrregularPacingProtocol::new(-1.0, vec![]).is_err());
        assert_eq!(
            IrregularPacingProtocol::new(1.0, vec![0.1, -0.2]),
            Err(ProtocolError::InvalidOffset {
                index: 1,
                offset: -0.2
            })
        );
    }

    #[test]
    fn test_clamp_validation() {
        assert_eq!(VoltageClampProtocol::new(vec![]), Err(ProtocolError::EmptyClamp));
        assert!(VoltageClampProtocol::new(vec![VoltageClampStep::new(0.0, -0.08)]).is_err());
        assert!(VoltageClampProtocol::new(vec![VoltageClampStep::new(0.1, 1000.0)]).is_ok());
    }

    #[test]
    fn test_clamp_voltage_at_boundaries() {
        let clamp = VoltageClampProtocol::new(vec![
            VoltageClampStep::new(0.1, -0.08),
            VoltageClampStep::new(0.2, 0.02),
        ])
        .unwrap();
        assert_eq!(clamp.voltage_at(0.0), -0.08);
        assert_eq!(clamp.voltage_at(0.0999), -0.08);
        assert_eq!(clamp.voltage_at(0.1), 0.02);
        assert_eq!(clamp.voltage_at(0.3), 0.02);
        assert_eq!(clamp.voltage_at(5.0), 0.02);
        assert!((clamp.duration() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_baselines() {
        assert_eq!(Protocol::baseline_single_action_potential().duration(), 2.0);
        assert_eq!(Protocol::baseline_irregular_pacing().time_span(), (0.0, 10.0));
        let clamp = Protocol::baseline_voltage_clamp();
        assert!((clamp.duration() - 1.2).abs() < 1e-12);
        assert!(clamp.records_currents_by_default());
        assert!(!Protocol::baseline_single_action_potential().records_currents_by_default());
    }
}
