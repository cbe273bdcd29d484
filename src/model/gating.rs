//! Gating kinetics for the Paci 2018 channels.
//!
//! Every gate relaxes to its steady state as `dx/dt = (x_inf - x) / tau`.
//! Voltages are passed in volts; the published fits are in millivolts and
//! milliseconds, so each function converts on entry and returns `tau` in seconds.
//!
//! References:
//! - Paci M et al. Biophys J. 2018;115:1042-1055
//! - Paci M et al. Ann Biomed Eng. 2013;41:2334-2348 (current formulations)

/// Steady state and time constant of one gate at one instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gate {
    /// Steady-state value (dimensionless)
    pub steady_state: f64,
    /// Relaxation time constant (s)
    pub tau_sec: f64,
}

impl Gate {
    #[inline]
    pub fn new(steady_state: f64, tau_sec: f64) -> Self {
        Self { steady_state, tau_sec }
    }

    /// First-order relaxation rate for current value `x`
    #[inline]
    pub fn rate(&self, x: f64) -> f64 {
        (self.steady_state - x) / self.tau_sec
    }
}

#[inline]
fn millivolts(v: f64) -> f64 {
    v * 1000.0
}

// === I_Na ===

/// Fast Na+ inactivation `h`
pub fn h_gate(v: f64) -> Gate {
    let v_mV = millivolts(v);
    let h_inf = 1.0 / (1.0 + ((v_mV + 72.1) / 5.7).exp()).sqrt();
    let alpha_h = 0.057 * (-(v_mV + 80.0) / 6.8).exp();
    let beta_h = 2.7 * (0.079 * v_mV).exp() + 3.1e5 * (0.3485 * v_mV).exp();
    let tau_h = if v < -0.0385 {
        1.5 / ((alpha_h + beta_h) * 1000.0)
    } else {
        1.5 * 1.6947 / 1000.0
    };
    Gate::new(h_inf, tau_h)
}

/// Slow Na+ inactivation `j`
pub fn j_gate(v: f64) -> Gate {
    let v_mV = millivolts(v);
    let j_inf = 1.0 / (1.0 + ((v_mV + 72.1) / 5.7).exp()).sqrt();
    let (alpha_j, beta_j) = if v < -0.04 {
        let alpha = (-25428.0 * (0.2444 * v_mV).exp() - 6.948e-6 * (-0.04391 * v_mV).exp())
            * (v_mV + 37.78)
            / (1.0 + (0.311 * (v_mV + 79.23)).exp());
        let beta = 0.02424 * (-0.01052 * v_mV).exp() / (1.0 + (-0.1378 * (v_mV + 40.14)).exp());
        (alpha, beta)
    } else {
        let beta = 0.6 * (0.057 * v_mV).exp() / (1.0 + (-0.1 * (v_mV + 32.0)).exp());
        (0.0, beta)
    };
    Gate::new(j_inf, 7.0 / ((alpha_j + beta_j) * 1000.0))
}

/// Na+ activation `m`
pub fn m_gate(v: f64) -> Gate {
    let v_mV = millivolts(v);
    let m_inf = 1.0 / (1.0 + ((-v_mV - 34.1) / 5.9).exp()).powf(1.0 / 3.0);
    let alpha_m = 1.0 / (1.0 + ((-v_mV - 60.0) / 5.0).exp());
    let beta_m =
        0.1 / (1.0 + ((v_mV + 35.0) / 5.0).exp()) + 0.1 / (1.0 + ((v_mV - 50.0) / 200.0).exp());
    Gate::new(m_inf, alpha_m * beta_m / 1000.0)
}

// === I_NaL ===

/// Late Na+ activation `m_L`
pub fn m_l_gate(v: f64) -> Gate {
    let v_mV = millivolts(v);
    let m_inf = 1.0 / (1.0 + (-(v_mV + 42.85) / 5.264).exp());
    let alpha = 1.0 / (1.0 + ((-60.0 - v_mV) / 5.0).exp());
    let beta =
        0.1 / (1.0 + ((v_mV + 35.0) / 5.0).exp()) + 0.1 / (1.0 + ((v_mV - 50.0) / 200.0).exp());
    Gate::new(m_inf, alpha * beta / 1000.0)
}

/// Late Na+ inactivation `h_L`; fixed 200 ms time constant
pub fn h_l_gate(v: f64) -> Gate {
    let v_mV = millivolts(v);
    let h_inf = 1.0 / (1.0 + ((v_mV + 87.61) / 7.488).exp());
    Gate::new(h_inf, 200.0 / 1000.0)
}

// === I_f ===

/// Funny current activation `Xf`
pub fn xf_gate(v: f64) -> Gate {
    let v_mV = millivolts(v);
    let xf_inf = 1.0 / (1.0 + ((v_mV + 77.85) / 5.0).exp());
    let tau = 1900.0 / (1.0 + ((v_mV + 15.0) / 10.0).exp()) / 1000.0;
    Gate::new(xf_inf, tau)
}

// === I_CaL ===

/// L-type Ca2+ activation `d`
pub fn d_gate(v: f64) -> Gate {
    let v_mV = millivolts(v);
    let d_inf = 1.0 / (1.0 + (-(v_mV + 9.1) / 7.0).exp());
    let alpha_d = 0.25 + 1.4 / (1.0 + ((-v_mV - 35.0) / 13.0).exp());
    let beta_d = 1.4 / (1.0 + ((v_mV + 5.0) / 5.0).exp());
    let gamma_d = 1.0 / (1.0 + ((-v_mV + 50.0) / 20.0).exp());
    Gate::new(d_inf, (alpha_d * beta_d + gamma_d) / 1000.0)
}

/// Fast voltage inactivation `f1`
///
/// While the gate is recovering (`f1_inf > f1`), its time constant is
/// stretched by cytosolic Ca2+ above 50 nM.
pub fn f1_gate(v: f64, cai_mM: f64, f1: f64) -> Gate {
    let v_mV = millivolts(v);
    let f1_inf = 1.0 / (1.0 + ((v_mV + 26.0) / 3.0).exp());
    let const_f1 = if f1_inf - f1 > 0.0 {
        1.0 + 1433.0 * (cai_mM - 50.0e-6)
    } else {
        1.0
    };
    let tau = (20.0
        + 1102.5 * (-((v_mV + 27.0).powi(2) / 15.0).powi(2)).exp()
        + 200.0 / (1.0 + ((13.0 - v_mV) / 10.0).exp())
        + 180.0 / (1.0 + ((30.0 + v_mV) / 10.0).exp()))
        * const_f1
        / 1000.0;
    Gate::new(f1_inf, tau)
}

/// Slow voltage inactivation `f2`
pub fn f2_gate(v: f64) -> Gate {
    let v_mV = millivolts(v);
    let f2_inf = 0.33 + 0.67 / (1.0 + ((v_mV + 32.0) / 4.0).exp());
    let tau = (600.0 * (-(v_mV + 25.0).powi(2) / 170.0).exp()
        + 31.0 / (1.0 + ((25.0 - v_mV) / 10.0).exp())
        + 16.0 / (1.0 + ((30.0 + v_mV) / 10.0).exp()))
        / 1000.0;
    Gate::new(f2_inf, tau)
}

/// Ca2+-dependent inactivation `fCa`; 2 ms time constant
pub fn f_ca_gate(cai_mM: f64) -> Gate {
    let alpha = 1.0 / (1.0 + (cai_mM / 0.0006).powi(8));
    let beta = 0.1 / (1.0 + ((cai_mM - 0.0009) / 0.0001).exp());
    let gamma = 0.3 / (1.0 + ((cai_mM - 0.00075) / 0.0008).exp());
    Gate::new((alpha + beta + gamma) / 1.3156, 0.002)
}

/// `fCa` derivative: held while depolarised above -60 mV and recovering
pub fn f_ca_rate(v: f64, cai_mM: f64, f_ca: f64) -> f64 {
    let gate = f_ca_gate(cai_mM);
    if v > -0.06 && gate.steady_state > f_ca {
        0.0
    } else {
        gate.rate(f_ca)
    }
}

// === I_to ===

/// Transient outward inactivation `q`
pub fn q_gate(v: f64) -> Gate {
    let v_mV = millivolts(v);
    let q_inf = 1.0 / (1.0 + ((v_mV + 53.0) / 13.0).exp());
    let tau = (6.06
        + 39.102
            / (0.57 * (-0.08 * (v_mV + 44.0)).exp() + 0.065 * (0.1 * (v_mV + 45.93)).exp()))
        / 1000.0;
    Gate::new(q_inf, tau)
}

/// Transient outward activation `r`
pub fn r_gate(v: f64) -> Gate {
    let v_mV = millivolts(v);
    let r_inf = 1.0 / (1.0 + (-(v_mV - 22.3) / 18.75).exp());
    let tau = (2.75352
        + 14.40516
            / (1.037 * (0.09 * (v_mV + 30.61)).exp() + 0.369 * (-0.12 * (v_mV + 23.84)).exp()))
        / 1000.0;
    Gate::new(r_inf, tau)
}

// === I_Ks ===

/// Slow delayed rectifier activation `Xs`
pub fn xs_gate(v: f64) -> Gate {
    let v_mV = millivolts(v);
    let xs_inf = 1.0 / (1.0 + ((-v_mV - 20.0) / 16.0).exp());
    let alpha = 1100.0 / (1.0 + ((-10.0 - v_mV) / 6.0).exp()).sqrt();
    let beta = 1.0 / (1.0 + ((-60.0 + v_mV) / 20.0).exp());
    Gate::new(xs_inf, alpha * beta / 1000.0)
}

// === I_Kr ===

/// Half-activation of `Xr1` (mV), shifted by extracellular Ca2+
///
/// Uses L0 = 0.025 and Q = 2.3.
pub fn xr1_half_activation_mV(rt_over_f: f64, cao_mM: f64) -> f64 {
    const L0: f64 = 0.025;
    const Q: f64 = 2.3;
    1000.0
        * (-rt_over_f / Q
            * ((1.0 + cao_mM / 2.6).powi(4) / (L0 * (1.0 + cao_mM / 0.58).powi(4))).ln()
            - 0.019)
}

/// Rapid delayed rectifier activation `Xr1`
pub fn xr1_gate(v: f64, v_half_mV: f64) -> Gate {
    let v_mV = millivolts(v);
    let xr1_inf = 1.0 / (1.0 + ((v_half_mV - v_mV) / 4.9).exp());
    let alpha = 450.0 / (1.0 + ((-45.0 - v_mV) / 10.0).exp());
    let beta = 6.0 / (1.0 + ((30.0 + v_mV) / 11.5).exp());
    Gate::new(xr1_inf, alpha * beta / 1000.0)
}

/// Rapid delayed rectifier inactivation `Xr2`
pub fn xr2_gate(v: f64) -> Gate {
    let v_mV = millivolts(v);
    let xr2_inf = 1.0 / (1.0 + ((v_mV + 88.0) / 50.0).exp());
    let alpha = 3.0 / (1.0 + ((-60.0 - v_mV) / 20.0).exp());
    let beta = 1.12 / (1.0 + ((-60.0 + v_mV) / 20.0).exp());
    Gate::new(xr2_inf, alpha * beta / 1000.0)
}

// === RyR ===

/// RyR adaptation state `RyRa`; 1 s time constant
pub fn ryr_a_gate(cai_mM: f64, ry_ra_1_uM: f64, ry_ra_2_uM: f64, ry_rahalf_uM: f64) -> Gate {
    let inf = ry_ra_1_uM - ry_ra_2_uM / (1.0 + ((1000.0 * cai_mM - ry_rahalf_uM) / 0.0082).exp());
    Gate::new(inf, 1.0)
}

/// RyR open state `RyRo`; opening is 10x slower than closing
pub fn ryr_o_gate(cai_mM: f64, ryr_a: f64, ry_rohalf_uM: f64, ryr_o: f64) -> Gate {
    let inf = 1.0 - 1.0 / (1.0 + ((1000.0 * cai_mM - (ryr_a + ry_rohalf_uM)) / 0.003).exp());
    let tau = if inf >= ryr_o { 18.75e-3 } else { 0.1 * 18.75e-3 };
    Gate::new(inf, tau)
}

/// RyR closed (available) state `RyRc`
pub fn ryr_c_gate(cai_mM: f64, ryr_a: f64, ry_rchalf_uM: f64, ryr_c: f64) -> Gate {
    let inf = 1.0 / (1.0 + ((1000.0 * cai_mM - (ryr_a + ry_rchalf_uM)) / 0.001).exp());
    let tau = if inf >= ryr_c { 2.0 * 87.5e-3 } else { 87.5e-3 };
    Gate::new(inf, tau)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOLTAGES: [f64; 7] = [-0.12, -0.08, -0.06, -0.04, -0.02, 0.0, 0.04];

    #[test]
    fn test_steady_states_bounded() {
        for &v in &VOLTAGES {
            for gate in [
                h_gate(v),
                j_gate(v),
                m_gate(v),
                m_l_gate(v),
                h_l_gate(v),
                xf_gate(v),
                d_gate(v),
                f2_gate(v),
                q_gate(v),
                r_gate(v),
                xs_gate(v),
                xr2_gate(v),
            ] {
                assert!(
                    (0.0..=1.0).contains(&gate.steady_state),
                    "steady state {} out of range at {} V",
                    gate.steady_state,
                    v
                );
                assert!(gate.tau_sec > 0.0 && gate.tau_sec.is_finite());
            }
        }
    }

    #[test]
    fn test_activation_increases_with_depolarisation() {
        assert!(m_gate(-0.02).steady_state > m_gate(-0.08).steady_state);
        assert!(d_gate(0.0).steady_state > d_gate(-0.06).steady_state);
        assert!(h_gate(-0.02).steady_state < h_gate(-0.08).steady_state);
    }

    #[test]
    fn test_relaxation_sign() {
        let gate = Gate::new(0.8, 0.01);
        assert!(gate.rate(0.2) > 0.0);
        assert!(gate.rate(0.9) < 0.0);
        assert_eq!(gate.rate(0.8), 0.0);
    }

    #[test]
    fn test_h_tau_branch() {
        // Constant time constant above -38.5 mV
        assert_eq!(h_gate(-0.02).tau_sec, h_gate(0.01).tau_sec);
        assert!((h_gate(0.0).tau_sec - 1.5 * 1.6947e-3).abs() < 1e-15);
    }

    #[test]
    fn test_f_ca_hold_when_depolarised() {
        // Low Ca2+ pushes fCa_inf towards 1; a depolarised cell cannot recover
        let cai = 1e-5;
        assert!(f_ca_gate(cai).steady_state > 0.5);
        assert_eq!(f_ca_rate(-0.02, cai, 0.5), 0.0);
        assert!(f_ca_rate(-0.08, cai, 0.5) > 0.0);
    }

    #[test]
    fn test_f1_calcium_slowing_only_while_recovering() {
        let v = -0.08;
        let recovering_low = f1_gate(v, 1e-4, 0.0);
        let recovering_high = f1_gate(v, 1e-3, 0.0);
        assert!(recovering_high.tau_sec > recovering_low.tau_sec);

        let inactivating_low = f1_gate(0.02, 1e-4, 1.0);
        let inactivating_high = f1_gate(0.02, 1e-3, 1.0);
        assert_eq!(inactivating_low.tau_sec, inactivating_high.tau_sec);
    }

    #[test]
    fn test_xr1_half_activation_physiological() {
        let rt_f = 8.314472 * 310.0 / 96485.3415;
        let v_half = xr1_half_activation_mV(rt_f, 1.8);
        assert!(v_half < 0.0 && v_half > -60.0, "v_half = {}", v_half);
    }

    #[test]
    fn test_ryr_asymmetric_time_constants() {
        let opening = ryr_o_gate(1e-3, 0.0, 0.01042, 0.0);
        let closing = ryr_o_gate(1e-6, 0.0, 0.01042, 1.0);
        assert!(opening.tau_sec > closing.tau_sec);
    }
}
