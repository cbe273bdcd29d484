//! Transmembrane currents, SR fluxes and reversal potentials.
//!
//! All membrane currents are capacitance-normalised (A/F); SR fluxes are in mM/s.
//!
//! Currents:
//! - I_Na, I_NaL: fast and late sodium
//! - I_f: funny current (mixed Na+/K+); I_fNa is its Na+ component
//! - I_CaL: L-type calcium (GHK flux form)
//! - I_to, I_Ks, I_Kr, I_K1: potassium currents
//! - I_NaCa, I_NaK: exchanger and pump
//! - I_pCa, I_bNa, I_bCa: sarcolemmal Ca2+ pump and background leaks
//!
//! References:
//! - Paci M et al. Biophys J. 2018;115:1042-1055
//! - Paci M et al. Ann Biomed Eng. 2013;41:2334-2348

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{CellConstants, ModelParameters};

use super::state::slot;

/// Number of membrane currents summed into dV/dt
pub const CURRENT_COUNT: usize = 13;

/// The membrane currents, in recording order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CurrentKind {
    #[serde(rename = "I_K1")]
    IK1,
    #[serde(rename = "I_to")]
    Ito,
    #[serde(rename = "I_Kr")]
    IKr,
    #[serde(rename = "I_Ks")]
    IKs,
    #[serde(rename = "I_CaL")]
    ICaL,
    #[serde(rename = "I_NaK")]
    INaK,
    #[serde(rename = "I_Na")]
    INa,
    #[serde(rename = "I_NaL")]
    INaL,
    #[serde(rename = "I_NaCa")]
    INaCa,
    #[serde(rename = "I_pCa")]
    IpCa,
    #[serde(rename = "I_f")]
    If,
    #[serde(rename = "I_bNa")]
    IbNa,
    #[serde(rename = "I_bCa")]
    IbCa,
}

impl CurrentKind {
    pub const ALL: [CurrentKind; CURRENT_COUNT] = [
        CurrentKind::IK1,
        CurrentKind::Ito,
        CurrentKind::IKr,
        CurrentKind::IKs,
        CurrentKind::ICaL,
        CurrentKind::INaK,
        CurrentKind::INa,
        CurrentKind::INaL,
        CurrentKind::INaCa,
        CurrentKind::IpCa,
        CurrentKind::If,
        CurrentKind::IbNa,
        CurrentKind::IbCa,
    ];

    /// Position in `ALL`
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Snake-case name used in recorded snapshots, e.g. `i_k1`
    pub fn name(&self) -> &'static str {
        match self {
            CurrentKind::IK1 => "i_k1",
            CurrentKind::Ito => "i_to",
            CurrentKind::IKr => "i_kr",
            CurrentKind::IKs => "i_ks",
            CurrentKind::ICaL => "i_ca_l",
            CurrentKind::INaK => "i_na_k",
            CurrentKind::INa => "i_na",
            CurrentKind::INaL => "i_na_l",
            CurrentKind::INaCa => "i_na_ca",
            CurrentKind::IpCa => "i_p_ca",
            CurrentKind::If => "i_f",
            CurrentKind::IbNa => "i_b_na",
            CurrentKind::IbCa => "i_b_ca",
        }
    }

    /// Display label, e.g. `I_K1`
    pub fn label(&self) -> &'static str {
        match self {
            CurrentKind::IK1 => "I_K1",
            CurrentKind::Ito => "I_to",
            CurrentKind::IKr => "I_Kr",
            CurrentKind::IKs => "I_Ks",
            CurrentKind::ICaL => "I_CaL",
            CurrentKind::INaK => "I_NaK",
            CurrentKind::INa => "I_Na",
            CurrentKind::INaL => "I_NaL",
            CurrentKind::INaCa => "I_NaCa",
            CurrentKind::IpCa => "I_pCa",
            CurrentKind::If => "I_f",
            CurrentKind::IbNa => "I_bNa",
            CurrentKind::IbCa => "I_bCa",
        }
    }

    /// Parse a label or snake-case name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.label() == name || k.name() == name)
    }
}

impl fmt::Display for CurrentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Nernst reversal potentials (V)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReversalPotentials {
    pub e_na: f64,
    /// Two-electron form
    pub e_ca: f64,
    pub e_k: f64,
    /// Mixed Na+/K+ with pKNa = 0.03
    pub e_ks: f64,
}

impl ReversalPotentials {
    /// No guard against non-positive concentrations; NaN propagates
    pub fn compute(constants: &CellConstants, nai_mM: f64, cai_mM: f64) -> Self {
        const P_K_NA: f64 = 0.03;
        let rtf = constants.rt_over_f();
        Self {
            e_na: rtf * (constants.nao_mM / nai_mM).ln(),
            e_ca: 0.5 * rtf * (constants.cao_mM / cai_mM).ln(),
            e_k: rtf * (constants.ko_mM / constants.ki_mM).ln(),
            e_ks: rtf
                * ((constants.ko_mM + P_K_NA * constants.nao_mM)
                    / (constants.ki_mM + P_K_NA * nai_mM))
                    .ln(),
        }
    }
}

/// All membrane currents at one instant (A/F)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MembraneCurrents {
    pub i_na: f64,
    pub i_na_l: f64,
    pub i_f: f64,
    /// Na+ component of I_f; enters the Na+ balance only
    pub i_f_na: f64,
    pub i_ca_l: f64,
    pub i_to: f64,
    pub i_ks: f64,
    pub i_kr: f64,
    pub i_k1: f64,
    pub i_na_ca: f64,
    pub i_na_k: f64,
    pub i_p_ca: f64,
    pub i_b_na: f64,
    pub i_b_ca: f64,
}

impl MembraneCurrents {
    /// Evaluate every current for state `y` at time `t_sec`
    pub fn compute(params: &ModelParameters, t_sec: f64, y: &[f64]) -> Self {
        let c = &params.constants;
        let g = &params.conductances;
        let scales = &params.current_scales;
        let drug = params.drug.factors_at(t_sec);

        let v = y[slot::VM];
        let cai = y[slot::CAI];
        let nai = y[slot::NAI];
        let e = ReversalPotentials::compute(c, nai, cai);

        let f = c.faraday_C_per_mol;
        let rt = c.gas_constant_J_per_mol_K * c.temperature_K;
        let vf_rt = v * f / rt;
        let k_ratio = (c.ko_mM / 5.4).sqrt();

        let i_na = drug.i_na
            * g.g_na
            * y[slot::M].powi(3)
            * y[slot::H]
            * y[slot::J]
            * (v - e.e_na);

        let i_na_l = g.g_na_l * y[slot::M_L].powi(3) * y[slot::H_L] * (v - e.e_na);

        // I_f reversal fixed at -17 mV
        let i_f = g.g_f * y[slot::XF] * (v + 0.017);
        let i_f_na = 0.42 * g.g_f * y[slot::XF] * (v - e.e_na);

        let ca_l_gates = y[slot::D] * y[slot::F1] * y[slot::F2] * y[slot::F_CA];
        let i_ca_l = drug.i_ca_l * g.g_ca_l * ghk_calcium_flux(v, cai, c.cao_mM, f, rt) * ca_l_gates;

        let i_to = 29.9038 * (v - e.e_k) * y[slot::Q] * y[slot::R];

        let i_ks = drug.i_ks
            * g.g_ks
            * (v - e.e_ks)
            * y[slot::XS].powi(2)
            * (1.0 + 0.6 / (1.0 + (3.8e-5 / cai).powf(1.4)));

        let i_kr = drug.i_kr * g.g_kr * (v - e.e_k) * y[slot::XR1] * y[slot::XR2] * k_ratio;

        let i_k1 = {
            let u = v * 1000.0 - e.e_k * 1000.0;
            let alpha = 3.91 / (1.0 + (0.5942 * (u - 200.0)).exp());
            let beta = (-1.509 * (0.0002 * (u + 100.0)).exp() + (0.5886 * (u - 10.0)).exp())
                / (1.0 + (0.4547 * u).exp());
            g.g_k1 * alpha / (alpha + beta) * (v - e.e_k) * k_ratio
        };

        let i_na_ca = {
            const KM_CA: f64 = 1.38;
            const KM_NA: f64 = 87.5;
            const K_SAT: f64 = 0.1;
            const GAMMA: f64 = 0.35;
            let forward = (GAMMA * vf_rt).exp() * nai.powi(3) * c.cao_mM;
            let reverse = ((GAMMA - 1.0) * vf_rt).exp() * c.nao_mM.powi(3) * cai * c.alpha_na_ca;
            c.k_na_ca_A_per_F * (forward - reverse)
                / ((KM_NA.powi(3) + c.nao_mM.powi(3))
                    * (KM_CA + c.cao_mM)
                    * (1.0 + K_SAT * ((GAMMA - 1.0) * vf_rt).exp()))
        };

        let i_na_k = {
            const KM_K: f64 = 1.0;
            const KM_NA: f64 = 40.0;
            c.p_na_k_A_per_F * c.ko_mM / (c.ko_mM + KM_K) * nai / (nai + KM_NA)
                / (1.0 + 0.1245 * (-0.1 * vf_rt).exp() + 0.0353 * (-vf_rt).exp())
        };

        let i_p_ca = g.g_p_ca * cai / (cai + 0.0005);
        let i_b_na = g.g_b_na * (v - e.e_na);
        let i_b_ca = g.g_b_ca * (v - e.e_ca);

        let scale = |kind: CurrentKind| scales.scale(kind);
        Self {
            i_na: i_na * scale(CurrentKind::INa),
            i_na_l: i_na_l * scale(CurrentKind::INaL),
            i_f: i_f * scale(CurrentKind::If),
            i_f_na: i_f_na * scale(CurrentKind::If),
            i_ca_l: i_ca_l * scale(CurrentKind::ICaL),
            i_to: i_to * scale(CurrentKind::Ito),
            i_ks: i_ks * scale(CurrentKind::IKs),
            i_kr: i_kr * scale(CurrentKind::IKr),
            i_k1: i_k1 * scale(CurrentKind::IK1),
            i_na_ca: i_na_ca * scale(CurrentKind::INaCa),
            i_na_k: i_na_k * scale(CurrentKind::INaK),
            i_p_ca: i_p_ca * scale(CurrentKind::IpCa),
            i_b_na: i_b_na * scale(CurrentKind::IbNa),
            i_b_ca: i_b_ca * scale(CurrentKind::IbCa),
        }
    }

    pub fn get(&self, kind: CurrentKind) -> f64 {
        match kind {
            CurrentKind::IK1 => self.i_k1,
            CurrentKind::Ito => self.i_to,
            CurrentKind::IKr => self.i_kr,
            CurrentKind::IKs => self.i_ks,
            CurrentKind::ICaL => self.i_ca_l,
            CurrentKind::INaK => self.i_na_k,
            CurrentKind::INa => self.i_na,
            CurrentKind::INaL => self.i_na_l,
            CurrentKind::INaCa => self.i_na_ca,
            CurrentKind::IpCa => self.i_p_ca,
            CurrentKind::If => self.i_f,
            CurrentKind::IbNa => self.i_b_na,
            CurrentKind::IbCa => self.i_b_ca,
        }
    }

    /// Sum of the 13 membrane currents; dV/dt is its negation
    pub fn total(&self) -> f64 {
        CurrentKind::ALL.iter().map(|&k| self.get(k)).sum()
    }

    pub fn snapshot(&self) -> CurrentSnapshot {
        let mut values = [0.0; CURRENT_COUNT];
        for kind in CurrentKind::ALL {
            values[kind.index()] = self.get(kind);
        }
        CurrentSnapshot(values)
    }
}

/// GHK calcium flux term of I_CaL, `4vF²/RT · (cai·e^{2vF/RT} − 0.341·cao) / (e^{2vF/RT} − 1)`
///
/// At v = 0 the expression is 0/0; the limit `2F·(cai − 0.341·cao)` is used
/// inside a small window around zero.
fn ghk_calcium_flux(v: f64, cai_mM: f64, cao_mM: f64, faraday: f64, rt: f64) -> f64 {
    if v.abs() < 1e-9 {
        return 2.0 * faraday * (cai_mM - 0.341 * cao_mM);
    }
    let exp_2vf_rt = (2.0 * v * faraday / rt).exp();
    4.0 * v * faraday * faraday / rt * (cai_mM * exp_2vf_rt - 0.341 * cao_mM) / (exp_2vf_rt - 1.0)
}

/// SR calcium fluxes (mM/s)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SrFluxes {
    /// SERCA uptake
    pub i_up: f64,
    /// Passive leak SR → cytosol
    pub i_leak: f64,
    /// RyR release
    pub i_rel: f64,
}

impl SrFluxes {
    pub fn compute(constants: &CellConstants, y: &[f64]) -> Self {
        let ca_sr = y[slot::CA_SR];
        let cai = y[slot::CAI];
        let i_up = constants.vmax_up_mM_per_sec
            / (1.0 + constants.k_up_mM.powi(2) / cai.powi(2));
        let i_leak = (ca_sr - cai) * constants.v_leak_per_sec;
        let sr_ca_factor = 1.0 - 1.0 / (1.0 + ((ca_sr - 0.3) / 0.1).exp());
        let i_rel = constants.g_irel_max_mM_per_sec
            * sr_ca_factor
            * y[slot::RYR_O]
            * y[slot::RYR_C]
            * (ca_sr - cai);
        Self { i_up, i_leak, i_rel }
    }
}

/// Ordered current values for one recorded instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrentSnapshot(pub [f64; CURRENT_COUNT]);

impl CurrentSnapshot {
    #[inline]
    pub fn get(&self, kind: CurrentKind) -> f64 {
        self.0[kind.index()]
    }

    /// `(kind, value)` pairs in recording order
    pub fn iter(&self) -> impl Iterator<Item = (CurrentKind, f64)> + '_ {
        CurrentKind::ALL.into_iter().zip(self.0.iter().copied())
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StateVector;

    #[test]
    fn test_current_kind_order_and_names() {
        for (i, kind) in CurrentKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), i);
            assert_eq!(CurrentKind::from_name(kind.name()), Some(*kind));
            assert_eq!(CurrentKind::from_name(kind.label()), Some(*kind));
        }
        assert_eq!(CurrentKind::ALL[0].name(), "i_k1");
        assert_eq!(CurrentKind::ALL[12].name(), "i_b_ca");
    }

    #[test]
    fn test_reversal_potentials_physiological() {
        let c = CellConstants::default();
        let e = ReversalPotentials::compute(&c, 8.6, 3.8e-5);
        // E_K about -93 mV, E_Na about +75 mV
        assert!(e.e_k < -0.085 && e.e_k > -0.1, "E_K = {}", e.e_k);
        assert!(e.e_na > 0.06 && e.e_na < 0.09, "E_Na = {}", e.e_na);
        assert!(e.e_ca > e.e_na);
        assert!(e.e_ks > e.e_k);
    }

    #[test]
    fn test_reversal_potentials_nan_on_zero_sodium() {
        let c = CellConstants::default();
        let e = ReversalPotentials::compute(&c, -1.0, 3.8e-5);
        assert!(e.e_na.is_nan());
    }

    #[test]
    fn test_ghk_continuous_at_zero() {
        let c = CellConstants::default();
        let rt = c.gas_constant_J_per_mol_K * c.temperature_K;
        let f = c.faraday_C_per_mol;
        let at_zero = ghk_calcium_flux(0.0, 1e-4, 1.8, f, rt);
        let near_zero = ghk_calcium_flux(1e-6, 1e-4, 1.8, f, rt);
        assert!(at_zero.is_finite());
        assert!(((at_zero - near_zero) / at_zero).abs() < 1e-3);
    }

    #[test]
    fn test_resting_currents_finite() {
        let params = ModelParameters::default();
        let y = StateVector::physiological();
        let currents = MembraneCurrents::compute(&params, 0.0, y.as_slice());
        for kind in CurrentKind::ALL {
            assert!(currents.get(kind).is_finite(), "{} not finite", kind);
        }
        // I_CaL is inward, I_K1 outward at rest
        assert!(currents.i_ca_l <= 0.0);
        assert!(currents.i_k1 > 0.0);
    }

    #[test]
    fn test_current_scale_applied() {
        let y = StateVector::physiological();
        let base = MembraneCurrents::compute(&ModelParameters::default(), 0.0, y.as_slice());

        let mut blocked = ModelParameters::default();
        blocked.current_scales.set(CurrentKind::IK1, 0.4);
        let scaled = MembraneCurrents::compute(&blocked, 0.0, y.as_slice());

        assert!((scaled.i_k1 - 0.4 * base.i_k1).abs() < 1e-12);
        assert_eq!(scaled.i_kr, base.i_kr);
    }

    #[test]
    fn test_drug_applies_after_onset() {
        let y = StateVector::physiological();
        let mut params = ModelParameters::default();
        params.drug.onset_sec = 1.0;
        params.drug.i_kr_factor = 0.0;

        let before = MembraneCurrents::compute(&params, 0.5, y.as_slice());
        let after = MembraneCurrents::compute(&params, 1.5, y.as_slice());
        assert!(before.i_kr != 0.0);
        assert_eq!(after.i_kr, 0.0);
        assert_eq!(before.i_k1, after.i_k1);
    }

    #[test]
    fn test_snapshot_matches_currents() {
        let y = StateVector::physiological();
        let currents = MembraneCurrents::compute(&ModelParameters::default(), 0.0, y.as_slice());
        let snapshot = currents.snapshot();
        assert_eq!(snapshot.get(CurrentKind::INaCa), currents.i_na_ca);
        assert!((snapshot.total() - currents.total()).abs() < 1e-15);
        assert_eq!(snapshot.iter().count(), CURRENT_COUNT);
    }

    #[test]
    fn test_sr_fluxes_direction() {
        let c = CellConstants::default();
        let y = StateVector::physiological();
        let fluxes = SrFluxes::compute(&c, y.as_slice());
        assert!(fluxes.i_up > 0.0);
        // SR is loaded relative to cytosol
        assert!(fluxes.i_leak > 0.0);
        assert!(fluxes.i_rel >= 0.0);
    }
}
