//! Paci 2018 hiPSC-derived cardiomyocyte model.
//!
//! The model advances a 23-slot state (membrane voltage, SR and cytosolic
//! Ca2+, intracellular Na+ and 19 gating variables) under 13 membrane
//! currents and three SR fluxes.
//!
//! Units: V, s, mM. Currents are capacitance-normalised so that
//! `dV/dt = -Σ I` directly.
//!
//! Reference: Paci M et al. Biophys J. 2018;115:1042-1055

pub mod currents;
pub mod gating;
pub mod state;

pub use currents::{
    CurrentKind, CurrentSnapshot, MembraneCurrents, ReversalPotentials, SrFluxes, CURRENT_COUNT,
};
pub use gating::Gate;
pub use state::{slot, StateVector, STATE_NAMES, STATE_SIZE};

use crate::config::ModelParameters;
use crate::simulation::ResponseRecorder;

/// The right-hand side of the cell ODE for one parameter set
#[derive(Debug, Clone)]
pub struct PaciModel {
    params: ModelParameters,
    /// Xr1 half-activation (mV); depends only on fixed constants
    xr1_v_half_mV: f64,
}

impl PaciModel {
    pub fn new(params: ModelParameters) -> Self {
        let xr1_v_half_mV = gating::xr1_half_activation_mV(
            params.constants.rt_over_f(),
            params.constants.cao_mM,
        );
        Self {
            params,
            xr1_v_half_mV,
        }
    }

    pub fn parameters(&self) -> &ModelParameters {
        &self.params
    }

    /// Membrane currents for state `y`, without computing derivatives
    pub fn currents(&self, t_sec: f64, y: &[f64]) -> MembraneCurrents {
        MembraneCurrents::compute(&self.params, t_sec, y)
    }

    /// Fill `dydt` with the time derivative of `y` and return the currents used
    ///
    /// `dydt[slot::VM]` is the intrinsic dV/dt, before any protocol forcing.
    pub fn derivatives(&self, t_sec: f64, y: &[f64], dydt: &mut [f64]) -> MembraneCurrents {
        debug_assert_eq!(y.len(), STATE_SIZE);
        debug_assert_eq!(dydt.len(), STATE_SIZE);

        let c = &self.params.constants;
        let v = y[slot::VM];
        let ca_sr = y[slot::CA_SR];
        let cai = y[slot::CAI];

        let i = self.currents(t_sec, y);
        let sr = SrFluxes::compute(c, y);

        // Gates
        dydt[slot::D] = gating::d_gate(v).rate(y[slot::D]);
        dydt[slot::F1] = gating::f1_gate(v, cai, y[slot::F1]).rate(y[slot::F1]);
        dydt[slot::F2] = gating::f2_gate(v).rate(y[slot::F2]);
        dydt[slot::F_CA] = gating::f_ca_rate(v, cai, y[slot::F_CA]);
        dydt[slot::XR1] = gating::xr1_gate(v, self.xr1_v_half_mV).rate(y[slot::XR1]);
        dydt[slot::XR2] = gating::xr2_gate(v).rate(y[slot::XR2]);
        dydt[slot::XS] = gating::xs_gate(v).rate(y[slot::XS]);
        dydt[slot::H] = gating::h_gate(v).rate(y[slot::H]);
        dydt[slot::J] = gating::j_gate(v).rate(y[slot::J]);
        dydt[slot::M] = gating::m_gate(v).rate(y[slot::M]);
        dydt[slot::XF] = gating::xf_gate(v).rate(y[slot::XF]);
        dydt[slot::Q] = gating::q_gate(v).rate(y[slot::Q]);
        dydt[slot::R] = gating::r_gate(v).rate(y[slot::R]);
        dydt[slot::M_L] = gating::m_l_gate(v).rate(y[slot::M_L]);
        dydt[slot::H_L] = gating::h_l_gate(v).rate(y[slot::H_L]);

        // RyR
        let ryr_a = y[slot::RYR_A];
        dydt[slot::RYR_A] = gating::ryr_a_gate(cai, c.ry_ra_1_uM, c.ry_ra_2_uM, c.ry_rahalf_uM)
            .rate(ryr_a);
        dydt[slot::RYR_O] = gating::ryr_o_gate(cai, ryr_a, c.ry_rohalf_uM, y[slot::RYR_O])
            .rate(y[slot::RYR_O]);
        dydt[slot::RYR_C] = gating::ryr_c_gate(cai, ryr_a, c.ry_rchalf_uM, y[slot::RYR_C])
            .rate(y[slot::RYR_C]);

        // Ion balances
        let f = c.faraday_C_per_mol;
        let vc_m3 = c.vc_um3 * 1.0e-18;

        dydt[slot::NAI] = -c.cm_F
            * (i.i_na + i.i_na_l + i.i_b_na + 3.0 * i.i_na_k + 3.0 * i.i_na_ca + i.i_f_na)
            / (f * vc_m3);

        let buf_c = 1.0 / (1.0 + 0.25 * 0.001 / (cai + 0.001).powi(2));
        let buf_sr = 1.0 / (1.0 + 10.0 * 0.3 / (ca_sr + 0.3).powi(2));

        dydt[slot::CAI] = buf_c
            * (sr.i_leak - sr.i_up + sr.i_rel
                - (i.i_ca_l + i.i_b_ca + i.i_p_ca - 2.0 * i.i_na_ca) * c.cm_F / (2.0 * vc_m3 * f));
        dydt[slot::CA_SR] = buf_sr * c.vc_um3 / c.v_sr_um3 * (sr.i_up - (sr.i_rel + sr.i_leak));

        dydt[slot::G] = 0.0;
        dydt[slot::VM] = -i.total();

        i
    }

    /// `derivatives` plus the raw-history side effect on `recorder`
    pub fn evaluate(
        &self,
        t_sec: f64,
        y: &[f64],
        dydt: &mut [f64],
        recorder: &mut ResponseRecorder,
    ) -> MembraneCurrents {
        let currents = self.derivatives(t_sec, y, dydt);
        recorder.record_raw(t_sec, y[slot::VM], dydt[slot::VM], &currents);
        currents
    }
}

impl Default for PaciModel {
    fn default() -> Self {
        Self::new(ModelParameters::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivative_shape() {
        let model = PaciModel::default();
        let y = StateVector::physiological();
        let mut dydt = [1.0; STATE_SIZE];
        model.derivatives(0.0, y.as_slice(), &mut dydt);
        assert_eq!(dydt[slot::G], 0.0);
        assert!(dydt.iter().all(|d| d.is_finite()));
    }

    #[test]
    fn test_voltage_derivative_is_negative_current_sum() {
        let model = PaciModel::default();
        let y = StateVector::zero_biased();
        let mut dydt = [0.0; STATE_SIZE];
        let currents = model.derivatives(0.0, y.as_slice(), &mut dydt);
        assert_eq!(dydt[slot::VM], -currents.total());
    }

    #[test]
    fn test_near_rest_on_limit_cycle() {
        // The physiological state sits in diastole: slow depolarisation, well under 1 V/s
        let model = PaciModel::default();
        let y = StateVector::physiological();
        let mut dydt = [0.0; STATE_SIZE];
        model.derivatives(0.0, y.as_slice(), &mut dydt);
        assert!(dydt[slot::VM].abs() < 1.0, "dV/dt = {}", dydt[slot::VM]);
    }

    #[test]
    fn test_evaluate_records_raw_sample() {
        let model = PaciModel::default();
        let y = StateVector::physiological();
        let mut dydt = [0.0; STATE_SIZE];
        let mut recorder = ResponseRecorder::new(true);
        model.evaluate(0.25, y.as_slice(), &mut dydt, &mut recorder);
        let raw = recorder.raw_samples();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].t_sec, 0.25);
        assert_eq!(raw[0].voltage_V, y.voltage());
        assert_eq!(raw[0].dv_dt, dydt[slot::VM]);
        assert_eq!(recorder.raw_currents().len(), 1);
    }

    #[test]
    fn test_scaled_conductances_change_derivatives() {
        let y = StateVector::zero_biased();
        let mut base = [0.0; STATE_SIZE];
        let mut scaled = [0.0; STATE_SIZE];
        PaciModel::default().derivatives(0.0, y.as_slice(), &mut base);

        let mut params = ModelParameters::default();
        params.conductances = params.conductances.scaled(0.7);
        PaciModel::new(params).derivatives(0.0, y.as_slice(), &mut scaled);
        assert_ne!(base[slot::VM], scaled[slot::VM]);
    }
}
