//! The 23-slot cell state vector.

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// Number of state variables
pub const STATE_SIZE: usize = 23;

/// Slot indices into the state vector
pub mod slot {
    /// Membrane voltage (V)
    pub const VM: usize = 0;
    /// SR Ca2+ (mM)
    pub const CA_SR: usize = 1;
    /// Cytosolic Ca2+ (mM)
    pub const CAI: usize = 2;
    /// Constant placeholder; derivative is always zero
    pub const G: usize = 3;
    pub const D: usize = 4;
    pub const F1: usize = 5;
    pub const F2: usize = 6;
    pub const F_CA: usize = 7;
    pub const XR1: usize = 8;
    pub const XR2: usize = 9;
    pub const XS: usize = 10;
    pub const H: usize = 11;
    pub const J: usize = 12;
    pub const M: usize = 13;
    pub const XF: usize = 14;
    pub const Q: usize = 15;
    pub const R: usize = 16;
    /// Intracellular Na+ (mM)
    pub const NAI: usize = 17;
    pub const M_L: usize = 18;
    pub const H_L: usize = 19;
    pub const RYR_A: usize = 20;
    pub const RYR_O: usize = 21;
    pub const RYR_C: usize = 22;
}

/// Slot names, in slot order
pub const STATE_NAMES: [&str; STATE_SIZE] = [
    "Vm", "Ca_SR", "Cai", "g", "d", "f1", "f2", "fCa", "Xr1", "Xr2", "Xs", "h", "j", "m", "Xf",
    "q", "r", "Nai", "m_L", "h_L", "RyRa", "RyRo", "RyRc",
];

/// Full cell state
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateVector(pub [f64; STATE_SIZE]);

impl StateVector {
    /// Limit-cycle initial condition used by pacing and voltage-clamp runs
    pub fn physiological() -> Self {
        Self([
            -0.0749228904740065,
            0.0936532528714175,
            3.79675694306440e-05,
            0.0,
            8.25220533963093e-05,
            0.741143500777858,
            0.999983958619179,
            0.997742015033076,
            0.266113517200784,
            0.434907203275640,
            0.0314334976383401,
            0.745356534740988,
            0.0760523580322096,
            0.0995891726023512,
            0.0249102482276486,
            0.841714924246004,
            0.00558005376429710,
            8.64821066193476,
            0.00225383437957339,
            0.0811507312565017,
            0.0387066722172937,
            0.0260449185736275,
            0.0785849084330126,
        ])
    }

    /// Zero-biased initial condition used by single action potential runs
    pub fn zero_biased() -> Self {
        Self([
            -0.070, 0.32, 0.0002, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.75, 0.75, 0.0, 0.1,
            1.0, 0.0, 9.2, 0.0, 0.75, 0.3, 0.9, 0.1,
        ])
    }

    /// Copy the first `STATE_SIZE` values of a solver slice
    pub fn from_slice(values: &[f64]) -> Self {
        debug_assert_eq!(values.len(), STATE_SIZE);
        let mut state = [0.0; STATE_SIZE];
        state.copy_from_slice(&values[..STATE_SIZE]);
        Self(state)
    }

    #[inline]
    pub fn voltage(&self) -> f64 {
        self.0[slot::VM]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.0
    }

    pub fn len(&self) -> usize {
        STATE_SIZE
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Index<usize> for StateVector {
    type Output = f64;

    fn index(&self, idx: usize) -> &f64 {
        &self.0[idx]
    }
}

impl IndexMut<usize> for StateVector {
    fn index_mut(&mut self, idx: usize) -> &mut f64 {
        &mut self.0[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_names_line_up() {
        assert_eq!(STATE_NAMES[slot::VM], "Vm");
        assert_eq!(STATE_NAMES[slot::CAI], "Cai");
        assert_eq!(STATE_NAMES[slot::NAI], "Nai");
        assert_eq!(STATE_NAMES[slot::RYR_C], "RyRc");
    }

    #[test]
    fn test_initial_conditions() {
        let phys = StateVector::physiological();
        let zero = StateVector::zero_biased();
        assert!((phys.voltage() + 0.0749).abs() < 1e-3);
        assert_eq!(zero.voltage(), -0.070);
        assert_eq!(phys[slot::G], 0.0);
        assert_eq!(zero[slot::G], 0.0);
        assert!(phys[slot::CAI] > 0.0 && zero[slot::CAI] > 0.0);
    }

    #[test]
    fn test_from_slice() {
        let phys = StateVector::physiological();
        let copy = StateVector::from_slice(phys.as_slice());
        assert_eq!(copy, phys);
    }
}
