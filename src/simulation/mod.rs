//! Simulation façade: wires a protocol driver and the cell model into the
//! stiff integrator and packages the result.
//!
//! A run owns its driver, recorder and detector state, so independent runs
//! can execute on separate threads without coordination.

pub mod integrator;
pub mod recorder;
pub mod trace;

pub use integrator::{
    IntegrationError, IntegratorConfig, IntegratorStats, StiffIntegrator, StiffSystem,
};
pub use recorder::{RawSample, ResponseRecorder};
pub use trace::Trace;

use crate::config::{ModelParameters, TunableParameter};
use crate::model::{PaciModel, STATE_SIZE};
use crate::protocol::{create_driver, DriverState, PacingConfig, Protocol, ProtocolDriver};

/// Everything produced by one successful run
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub trace: Trace,
    pub stats: IntegratorStats,
    /// Every RHS evaluation, in call order
    pub raw_samples: Vec<RawSample>,
}

/// A configured simulator for one parameter set
#[derive(Debug, Clone)]
pub struct Simulation {
    model: PaciModel,
    integrator: IntegratorConfig,
    pacing: PacingConfig,
    /// Overrides the protocol's default when set
    record_currents: Option<bool>,
}

impl Simulation {
    pub fn new(params: ModelParameters) -> Self {
        Self {
            model: PaciModel::new(params),
            integrator: IntegratorConfig::default(),
            pacing: PacingConfig::default(),
            record_currents: None,
        }
    }

    pub fn with_integrator(mut self, config: IntegratorConfig) -> Self {
        self.integrator = config;
        self
    }

    pub fn with_pacing(mut self, config: PacingConfig) -> Self {
        self.pacing = config;
        self
    }

    /// Force current snapshots on or off regardless of protocol
    pub fn with_current_recording(mut self, enabled: bool) -> Self {
        self.record_currents = Some(enabled);
        self
    }

    pub fn model(&self) -> &PaciModel {
        &self.model
    }

    /// Run `protocol`; `None` if integration fails
    pub fn run(&self, protocol: &Protocol) -> Option<Trace> {
        match self.run_detailed(protocol) {
            Ok(report) => Some(report.trace),
            Err(e) => {
                log::warn!("{} run failed: {}", protocol.title(), e);
                None
            }
        }
    }

    /// Run `protocol`, returning solver statistics and the raw history too
    pub fn run_detailed(&self, protocol: &Protocol) -> Result<SimulationReport, IntegrationError> {
        let record_currents = self
            .record_currents
            .unwrap_or_else(|| protocol.records_currents_by_default());
        let driver = create_driver(protocol, self.pacing.clone());
        let mut cell = DrivenCell::new(&self.model, driver, ResponseRecorder::new(record_currents));

        let (t0, t1) = cell.driver.time_span();
        log::info!(
            "Running {} over [{}, {}] s (currents: {})",
            protocol.title(),
            t0,
            t1,
            record_currents
        );

        let mut integrator = StiffIntegrator::new(self.integrator.clone());
        let stats = cell.integrate(&mut integrator)?;
        let report = cell.into_report(stats);
        log::info!(
            "{} complete: {} samples, {} RHS evaluations",
            protocol.title(),
            report.trace.len(),
            stats.rhs_evaluations
        );
        Ok(report)
    }
}

/// Driver, model and recorder presented to the integrator as one system
struct DrivenCell<'a> {
    model: &'a PaciModel,
    driver: Box<dyn ProtocolDriver>,
    recorder: ResponseRecorder,
    state: DriverState,
    /// Latest accepted integrator state; seeds the next segment
    current_state: Vec<f64>,
    last_recorded_sec: Option<f64>,
}

impl<'a> DrivenCell<'a> {
    fn new(model: &'a PaciModel, driver: Box<dyn ProtocolDriver>, recorder: ResponseRecorder) -> Self {
        let current_state = driver.initial_state().as_slice().to_vec();
        Self {
            model,
            driver,
            recorder,
            state: DriverState::Configured,
            current_state,
            last_recorded_sec: None,
        }
    }

    /// Integrate every driver segment in order, moving through the lifecycle
    ///
    /// Each segment starts from the last accepted state as the driver observes
    /// it, so a clamped voltage slot carries the new command.
    fn integrate(&mut self, integrator: &mut StiffIntegrator) -> Result<IntegratorStats, IntegrationError> {
        let mut stats = IntegratorStats::default();
        self.state = DriverState::Running;

        for (index, (start, end)) in self.driver.segments().into_iter().enumerate() {
            self.driver.enter_segment(index);
            let y0 = self.driver.observed_state(start, &self.current_state);
            let segment = integrator.solve(&mut *self, start, end, y0.as_slice());
            stats.accumulate(&integrator.stats());
            if let Err(e) = segment {
                log::debug!("Segment {} ({} to {} s) failed: {}", index, start, end, e);
                self.state = DriverState::Failed;
                return Err(e);
            }
        }

        self.state = DriverState::Completed;
        Ok(stats)
    }

    fn into_report(self, stats: IntegratorStats) -> SimulationReport {
        debug_assert_eq!(self.state, DriverState::Completed);
        let mut recorder = self.recorder;
        let raw_samples = recorder.take_raw_samples();
        let pacing_info = self.driver.into_pacing_info();
        SimulationReport {
            trace: recorder.into_trace(pacing_info),
            stats,
            raw_samples,
        }
    }
}

impl StiffSystem for DrivenCell<'_> {
    fn dimension(&self) -> usize {
        STATE_SIZE
    }

    fn rhs(&mut self, t: f64, y: &[f64], dydt: &mut [f64]) {
        self.driver
            .evaluate(self.model, t, y, dydt, &mut self.recorder);
    }

    fn accept_step(&mut self, t: f64, y: &[f64]) {
        self.current_state.copy_from_slice(y);
        // Segment starts repeat the previous segment's last point
        if self.last_recorded_sec.is_some_and(|last| t <= last) {
            return;
        }
        self.last_recorded_sec = Some(t);

        let observed = self.driver.observed_state(t, y);
        let currents = if self.recorder.records_currents() {
            Some(self.model.currents(t, observed.as_slice()).snapshot())
        } else {
            None
        };
        self.recorder.record_accepted(t, observed.voltage(), currents);
    }
}

/// Harness entry point: run `protocol` with tunable conductances overridden
/// positionally by `values`
///
/// No overrides are applied when either list is empty or absent.
pub fn generate_trace(
    protocol: &Protocol,
    tunable_parameters: &[TunableParameter],
    values: Option<&[f64]>,
) -> Option<Trace> {
    let mut params = ModelParameters::default();
    if let Some(values) = values {
        if values.len() != tunable_parameters.len() {
            log::warn!(
                "{} tunable parameters but {} values; extra entries ignored",
                tunable_parameters.len(),
                values.len()
            );
        }
        for (tunable, &value) in tunable_parameters.iter().zip(values) {
            params.conductances.set(tunable.name, value);
        }
    }
    Simulation::new(params).run(protocol)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::slot;
    use crate::protocol::{SingleActionPotentialProtocol, VoltageClampProtocol, VoltageClampStep};

    fn driven_cell<'a>(model: &'a PaciModel, protocol: &Protocol) -> DrivenCell<'a> {
        let driver = create_driver(protocol, PacingConfig::default());
        DrivenCell::new(model, driver, ResponseRecorder::new(false))
    }

    #[test]
    fn test_lifecycle_completes() {
        let model = PaciModel::default();
        let protocol: Protocol = SingleActionPotentialProtocol::new(0.05).unwrap().into();
        let mut cell = driven_cell(&model, &protocol);
        assert_eq!(cell.state, DriverState::Configured);

        let stats = cell.integrate(&mut StiffIntegrator::default()).unwrap();
        assert_eq!(cell.state, DriverState::Completed);
        assert!(stats.accepted_steps > 0);
    }

    #[test]
    fn test_lifecycle_records_failure() {
        let model = PaciModel::default();
        let protocol: Protocol = VoltageClampProtocol::new(vec![VoltageClampStep::new(0.1, 1000.0)])
            .unwrap()
            .into();
        let mut cell = driven_cell(&model, &protocol);

        assert!(cell.integrate(&mut StiffIntegrator::default()).is_err());
        assert_eq!(cell.state, DriverState::Failed);
    }

    #[test]
    fn test_clamp_slot_follows_command() {
        let model = PaciModel::default();
        let protocol: Protocol = VoltageClampProtocol::new(vec![
            VoltageClampStep::new(0.02, -0.08),
            VoltageClampStep::new(0.02, -0.04),
        ])
        .unwrap()
        .into();
        let mut cell = driven_cell(&model, &protocol);

        cell.integrate(&mut StiffIntegrator::default()).unwrap();
        assert_eq!(
            cell.current_state[slot::VM],
            -0.04,
            "solver voltage slot ends on the last command"
        );
    }
}
