//! Protocol drivers: how each protocol forces the cell RHS.
//!
//! A driver is built once per run from the [`Protocol`] variant and owns all
//! per-run protocol state (the pacing scheduler in particular).

use crate::model::{slot, PaciModel, StateVector, STATE_SIZE};
use crate::simulation::ResponseRecorder;

use super::pacing::{PacingConfig, PacingInfo, PacingScheduler};
use super::{IrregularPacingProtocol, Protocol, VoltageClampProtocol};

/// Run lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DriverState {
    Configured,
    Running,
    Completed,
    Failed,
}

/// Protocol-specific forcing of the cell ODE
pub trait ProtocolDriver {
    /// Integration span `(t0, t1)` in seconds
    fn time_span(&self) -> (f64, f64);

    fn initial_state(&self) -> StateVector;

    /// Sub-intervals integrated one after another, covering `time_span`
    ///
    /// Segment boundaries are where the forcing is discontinuous in time.
    fn segments(&self) -> Vec<(f64, f64)> {
        vec![self.time_span()]
    }

    /// Called before integrating segment `index`
    fn enter_segment(&mut self, _index: usize) {}

    /// Forced derivative of `y` at `t_sec`; records through the model
    fn evaluate(
        &mut self,
        model: &PaciModel,
        t_sec: f64,
        y: &[f64],
        dydt: &mut [f64],
        recorder: &mut ResponseRecorder,
    );

    /// The cell state as seen by the experiment at an accepted point or
    /// segment start
    fn observed_state(&self, _t_sec: f64, y: &[f64]) -> StateVector {
        StateVector::from_slice(y)
    }

    /// Detector history, for protocols that have one
    fn into_pacing_info(self: Box<Self>) -> Option<PacingInfo> {
        None
    }
}

/// Build the driver for `protocol`
pub fn create_driver(protocol: &Protocol, pacing: PacingConfig) -> Box<dyn ProtocolDriver> {
    match protocol {
        Protocol::SingleActionPotential(p) => Box::new(SingleActionPotentialDriver {
            duration_sec: p.duration(),
        }),
        Protocol::IrregularPacing(p) => Box::new(IrregularPacingDriver::new(p, pacing)),
        Protocol::VoltageClamp(p) => Box::new(VoltageClampDriver::new(p.clone())),
    }
}

/// Unforced RHS from the zero-biased state
#[derive(Debug, Clone)]
pub struct SingleActionPotentialDriver {
    duration_sec: f64,
}

impl ProtocolDriver for SingleActionPotentialDriver {
    fn time_span(&self) -> (f64, f64) {
        (0.0, self.duration_sec)
    }

    fn initial_state(&self) -> StateVector {
        StateVector::zero_biased()
    }

    fn evaluate(
        &mut self,
        model: &PaciModel,
        t_sec: f64,
        y: &[f64],
        dydt: &mut [f64],
        recorder: &mut ResponseRecorder,
    ) {
        model.evaluate(t_sec, y, dydt, recorder);
    }
}

/// RHS plus a scheduled stimulus, driven by the online detector
#[derive(Debug, Clone)]
pub struct IrregularPacingDriver {
    duration_sec: f64,
    scheduler: PacingScheduler,
}

impl IrregularPacingDriver {
    pub fn new(protocol: &IrregularPacingProtocol, config: PacingConfig) -> Self {
        Self {
            duration_sec: protocol.duration(),
            scheduler: PacingScheduler::new(config, protocol.stimulation_offsets().to_vec()),
        }
    }

    pub fn scheduler(&self) -> &PacingScheduler {
        &self.scheduler
    }
}

impl ProtocolDriver for IrregularPacingDriver {
    fn time_span(&self) -> (f64, f64) {
        (0.0, self.duration_sec)
    }

    fn initial_state(&self) -> StateVector {
        StateVector::physiological()
    }

    fn evaluate(
        &mut self,
        model: &PaciModel,
        t_sec: f64,
        y: &[f64],
        dydt: &mut [f64],
        recorder: &mut ResponseRecorder,
    ) {
        model.evaluate(t_sec, y, dydt, recorder);
        self.scheduler.observe(t_sec, y[slot::VM], dydt[slot::VM]);
        if self.scheduler.should_stimulate(t_sec) {
            dydt[slot::VM] += self
                .scheduler
                .stimulus_current(model.parameters().constants.cm_F);
        }
    }

    fn into_pacing_info(self: Box<Self>) -> Option<PacingInfo> {
        Some(self.scheduler.into_info())
    }
}

/// Voltage held at the command step; the remaining 22 slots evolve freely
///
/// Each step is its own integration segment, started from the observed state
/// so the voltage slot holds the command. Inside a segment the RHS sees that
/// step's voltage at every evaluated time, including the closing boundary;
/// recorded samples follow the half-open step intervals.
#[derive(Debug, Clone)]
pub struct VoltageClampDriver {
    protocol: VoltageClampProtocol,
    active_step: usize,
    clamped: [f64; STATE_SIZE],
}

impl VoltageClampDriver {
    pub fn new(protocol: VoltageClampProtocol) -> Self {
        Self {
            protocol,
            active_step: 0,
            clamped: [0.0; STATE_SIZE],
        }
    }

    fn active_voltage(&self) -> f64 {
        self.protocol.steps()[self.active_step].voltage_V
    }
}

impl ProtocolDriver for VoltageClampDriver {
    fn time_span(&self) -> (f64, f64) {
        (0.0, self.protocol.duration())
    }

    fn initial_state(&self) -> StateVector {
        StateVector::physiological()
    }

    fn segments(&self) -> Vec<(f64, f64)> {
        let mut start = 0.0;
        self.protocol
            .steps()
            .iter()
            .map(|step| {
                let segment = (start, start + step.duration_sec);
                start = segment.1;
                segment
            })
            .collect()
    }

    fn enter_segment(&mut self, index: usize) {
        self.active_step = index.min(self.protocol.steps().len() - 1);
    }

    fn evaluate(
        &mut self,
        model: &PaciModel,
        t_sec: f64,
        y: &[f64],
        dydt: &mut [f64],
        recorder: &mut ResponseRecorder,
    ) {
        self.clamped.copy_from_slice(y);
        self.clamped[slot::VM] = self.active_voltage();
        model.evaluate(t_sec, &self.clamped, dydt, recorder);
        // Command waveform is piecewise constant
        dydt[slot::VM] = 0.0;
    }

    fn observed_state(&self, t_sec: f64, y: &[f64]) -> StateVector {
        let mut state = StateVector::from_slice(y);
        state[slot::VM] = self.protocol.voltage_at(t_sec);
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::VoltageClampStep;

    #[test]
    fn test_factory_selects_initial_state() {
        let cfg = PacingConfig::default();
        let sap = create_driver(&Protocol::baseline_single_action_potential(), cfg.clone());
        let ip = create_driver(&Protocol::baseline_irregular_pacing(), cfg.clone());
        let vc = create_driver(&Protocol::baseline_voltage_clamp(), cfg);

        assert_eq!(sap.initial_state(), StateVector::zero_biased());
        assert_eq!(ip.initial_state(), StateVector::physiological());
        assert_eq!(vc.initial_state(), StateVector::physiological());
        assert_eq!(sap.time_span(), (0.0, 2.0));
        assert!(sap.into_pacing_info().is_none());
        assert!(ip.into_pacing_info().is_some());
    }

    #[test]
    fn test_clamp_overrides_voltage() {
        let clamp = VoltageClampProtocol::new(vec![
            VoltageClampStep::new(0.1, -0.08),
            VoltageClampStep::new(0.1, 0.02),
        ])
        .unwrap();
        let mut driver = VoltageClampDriver::new(clamp);
        let model = PaciModel::default();
        let mut recorder = ResponseRecorder::new(false);
        let y = StateVector::physiological();
        let mut dydt = [0.0; STATE_SIZE];

        driver.enter_segment(1);
        driver.evaluate(&model, 0.15, y.as_slice(), &mut dydt, &mut recorder);
        assert_eq!(dydt[slot::VM], 0.0);
        assert_eq!(recorder.raw_samples()[0].voltage_V, 0.02);
        assert_eq!(driver.observed_state(0.05, y.as_slice()).voltage(), -0.08);
        assert_eq!(driver.observed_state(0.1, y.as_slice()).voltage(), 0.02);
    }

    #[test]
    fn test_clamp_segments_follow_steps() {
        let driver = VoltageClampDriver::new(
            VoltageClampProtocol::new(vec![
                VoltageClampStep::new(0.25, -0.08),
                VoltageClampStep::new(0.5, 0.02),
            ])
            .unwrap(),
        );
        assert_eq!(driver.segments(), vec![(0.0, 0.25), (0.25, 0.75)]);

        let sap = SingleActionPotentialDriver { duration_sec: 2.0 };
        assert_eq!(sap.segments(), vec![(0.0, 2.0)]);
    }

    #[test]
    fn test_pacing_adds_stimulus_in_window() {
        let protocol = IrregularPacingProtocol::new(1.0, vec![0.1]).unwrap();
        let mut driver = IrregularPacingDriver::new(&protocol, PacingConfig::default());
        assert!(!driver.scheduler().should_stimulate(0.5), "nothing scheduled yet");
        driver.scheduler.info_mut().stimulation_times_sec.push(0.5);
        assert!(driver.scheduler().should_stimulate(0.5));

        let model = PaciModel::default();
        let mut recorder = ResponseRecorder::new(false);
        let y = StateVector::physiological();
        let mut unforced = [0.0; STATE_SIZE];
        let mut forced = [0.0; STATE_SIZE];

        model.derivatives(0.501, y.as_slice(), &mut unforced);
        driver.evaluate(&model, 0.501, y.as_slice(), &mut forced, &mut recorder);
        let stimulus = 5.5e-10 / model.parameters().constants.cm_F;
        assert!((forced[slot::VM] - unforced[slot::VM] - stimulus).abs() < 1e-9);
        // Recorded derivative is the intrinsic one
        assert_eq!(recorder.raw_samples()[0].dv_dt, unforced[slot::VM]);
    }
}
