//! Model parameter structures with citation metadata.
//!
//! Default values are the published Paci 2018 hiPSC-CM values.
//! Reference: Paci M et al. Biophys J. 2018;115:1042-1055

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::model::CurrentKind;

/// Top-level parameters container for one simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ModelParameters {
    /// Tunable maximal conductances / permeabilities
    pub conductances: Conductances,
    /// Fixed physical and geometric constants
    pub constants: CellConstants,
    /// Step-onset drug attenuation of I_Na, I_CaL, I_Kr and I_Ks
    #[serde(default)]
    pub drug: DrugEffect,
    /// Non-selective block scales applied to individual currents
    #[serde(default)]
    pub current_scales: CurrentScales,
}

impl ModelParameters {
    /// Load parameters from a JSON file or return defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(params) => {
                    log::info!("Loaded model parameters from {:?}", path.as_ref());
                    params
                }
                Err(e) => {
                    log::warn!("Failed to parse model parameters: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("Model parameters file not found, using defaults");
                Self::default()
            }
        }
    }

    /// Defaults with the given conductances replaced
    pub fn with_overrides(overrides: &[(Conductance, f64)]) -> Self {
        let mut params = Self::default();
        for &(name, value) in overrides {
            params.conductances.set(name, value);
        }
        params
    }
}

/// Names of the tunable conductances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Conductance {
    #[serde(rename = "G_Na")]
    GNa,
    #[serde(rename = "G_CaL")]
    GCaL,
    #[serde(rename = "G_F")]
    GF,
    #[serde(rename = "G_Ks")]
    GKs,
    #[serde(rename = "G_Kr")]
    GKr,
    #[serde(rename = "G_K1")]
    GK1,
    #[serde(rename = "G_pCa")]
    GpCa,
    #[serde(rename = "G_bNa")]
    GbNa,
    #[serde(rename = "G_bCa")]
    GbCa,
    #[serde(rename = "G_NaL")]
    GNaL,
}

impl Conductance {
    pub const ALL: [Conductance; 10] = [
        Conductance::GNa,
        Conductance::GCaL,
        Conductance::GF,
        Conductance::GKs,
        Conductance::GKr,
        Conductance::GK1,
        Conductance::GpCa,
        Conductance::GbNa,
        Conductance::GbCa,
        Conductance::GNaL,
    ];

    /// Harness-facing name, e.g. `G_Na`
    pub fn name(&self) -> &'static str {
        match self {
            Conductance::GNa => "G_Na",
            Conductance::GCaL => "G_CaL",
            Conductance::GF => "G_F",
            Conductance::GKs => "G_Ks",
            Conductance::GKr => "G_Kr",
            Conductance::GK1 => "G_K1",
            Conductance::GpCa => "G_pCa",
            Conductance::GbNa => "G_bNa",
            Conductance::GbCa => "G_bCa",
            Conductance::GNaL => "G_NaL",
        }
    }

    /// Model-side name, e.g. `g_na`
    pub fn model_name(&self) -> &'static str {
        match self {
            Conductance::GNa => "g_na",
            Conductance::GCaL => "g_ca_l",
            Conductance::GF => "g_f_s",
            Conductance::GKs => "g_ks_s",
            Conductance::GKr => "g_kr_s",
            Conductance::GK1 => "g_k1_s",
            Conductance::GpCa => "g_p_ca",
            Conductance::GbNa => "g_b_na",
            Conductance::GbCa => "g_b_ca",
            Conductance::GNaL => "g_na_lmax",
        }
    }

    /// Parse either naming scheme
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name() == name || c.model_name() == name)
    }
}

impl fmt::Display for Conductance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A tunable parameter as seen by an optimizer: a name and its default value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TunableParameter {
    pub name: Conductance,
    pub default_value: f64,
}

impl TunableParameter {
    pub fn new(name: Conductance, default_value: f64) -> Self {
        Self { name, default_value }
    }

    /// All ten conductances at their published defaults
    pub fn all_defaults() -> Vec<Self> {
        let defaults = Conductances::default();
        Conductance::ALL
            .into_iter()
            .map(|name| Self::new(name, defaults.get(name)))
            .collect()
    }
}

/// Maximal conductances (capacitance-normalised)
///
/// Source: Paci et al. 2018, Table S1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Conductances {
    /// Fast Na+ conductance (S/F)
    pub g_na: f64,
    /// L-type Ca2+ permeability (m³/(F·s))
    pub g_ca_l: f64,
    /// Funny current conductance (S/F)
    pub g_f: f64,
    /// Slow delayed rectifier conductance (S/F)
    pub g_ks: f64,
    /// Rapid delayed rectifier conductance (S/F)
    pub g_kr: f64,
    /// Inward rectifier conductance (S/F)
    pub g_k1: f64,
    /// Sarcolemmal Ca2+ pump maximal current (A/F)
    pub g_p_ca: f64,
    /// Background Na+ conductance (S/F)
    pub g_b_na: f64,
    /// Background Ca2+ conductance (S/F)
    pub g_b_ca: f64,
    /// Late Na+ conductance (S/F)
    pub g_na_l: f64,
}

impl Default for Conductances {
    fn default() -> Self {
        Self {
            g_na: 3671.2302,
            g_ca_l: 8.635702e-5,
            g_f: 30.10312,
            g_ks: 2.041,
            g_kr: 29.8667,
            g_k1: 28.1492,
            g_p_ca: 0.4125,
            g_b_na: 0.95,
            g_b_ca: 0.727272,
            g_na_l: 17.25,
        }
    }
}

impl Conductances {
    pub fn get(&self, name: Conductance) -> f64 {
        match name {
            Conductance::GNa => self.g_na,
            Conductance::GCaL => self.g_ca_l,
            Conductance::GF => self.g_f,
            Conductance::GKs => self.g_ks,
            Conductance::GKr => self.g_kr,
            Conductance::GK1 => self.g_k1,
            Conductance::GpCa => self.g_p_ca,
            Conductance::GbNa => self.g_b_na,
            Conductance::GbCa => self.g_b_ca,
            Conductance::GNaL => self.g_na_l,
        }
    }

    pub fn set(&mut self, name: Conductance, value: f64) {
        let slot = match name {
            Conductance::GNa => &mut self.g_na,
            Conductance::GCaL => &mut self.g_ca_l,
            Conductance::GF => &mut self.g_f,
            Conductance::GKs => &mut self.g_ks,
            Conductance::GKr => &mut self.g_kr,
            Conductance::GK1 => &mut self.g_k1,
            Conductance::GpCa => &mut self.g_p_ca,
            Conductance::GbNa => &mut self.g_b_na,
            Conductance::GbCa => &mut self.g_b_ca,
            Conductance::GNaL => &mut self.g_na_l,
        };
        *slot = value;
    }

    /// Every conductance multiplied by `factor`
    pub fn scaled(&self, factor: f64) -> Self {
        let mut scaled = *self;
        for name in Conductance::ALL {
            scaled.set(name, self.get(name) * factor);
        }
        scaled
    }
}

/// Fixed physical, geometric and kinetic constants
///
/// These never change within a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellConstants {
    // Physical constants
    /// Faraday constant (C/mol)
    pub faraday_C_per_mol: f64,
    /// Gas constant (J/(mol·K))
    pub gas_constant_J_per_mol_K: f64,
    /// Temperature (K)
    pub temperature_K: f64,

    // Cell geometry
    /// SR volume (μm³)
    pub v_sr_um3: f64,
    /// Cytosolic volume (μm³)
    pub vc_um3: f64,
    /// Membrane capacitance (F)
    pub cm_F: f64,

    // Concentrations
    /// Extracellular Na+ (mM)
    pub nao_mM: f64,
    /// Extracellular K+ (mM)
    pub ko_mM: f64,
    /// Extracellular Ca2+ (mM)
    pub cao_mM: f64,
    /// Intracellular K+ (mM), held constant
    pub ki_mM: f64,

    // SR and RyR kinetics (optimizer-fitted in the 2018 revision)
    /// SERCA maximal uptake (mM/s)
    pub vmax_up_mM_per_sec: f64,
    /// Maximal RyR release rate (mM/s)
    pub g_irel_max_mM_per_sec: f64,
    pub ry_ra_1_uM: f64,
    pub ry_ra_2_uM: f64,
    pub ry_rahalf_uM: f64,
    pub ry_rohalf_uM: f64,
    pub ry_rchalf_uM: f64,
    /// SERCA half-saturation (mM)
    pub k_up_mM: f64,
    /// SR leak rate constant (1/s)
    pub v_leak_per_sec: f64,

    // Exchanger and pump
    /// Na+/Ca2+ exchanger maximal current (A/F)
    pub k_na_ca_A_per_F: f64,
    /// Na+/K+ pump maximal current (A/F)
    pub p_na_k_A_per_F: f64,
    /// NCX inward scaling factor
    pub alpha_na_ca: f64,
}

impl Default for CellConstants {
    fn default() -> Self {
        Self {
            faraday_C_per_mol: 96485.3415,
            gas_constant_J_per_mol_K: 8.314472,
            temperature_K: 310.0,

            v_sr_um3: 583.73,
            vc_um3: 8800.0,
            cm_F: 9.87109e-11,

            nao_mM: 151.0,
            ko_mM: 5.4,
            cao_mM: 1.8,
            ki_mM: 150.0,

            vmax_up_mM_per_sec: 0.5113,
            g_irel_max_mM_per_sec: 62.5434,
            ry_ra_1_uM: 0.05354,
            ry_ra_2_uM: 0.0488,
            ry_rahalf_uM: 0.02427,
            ry_rohalf_uM: 0.01042,
            ry_rchalf_uM: 0.00144,
            k_up_mM: 3.1928e-4,
            v_leak_per_sec: 4.7279e-4,

            k_na_ca_A_per_F: 3917.0463,
            p_na_k_A_per_F: 2.6351,
            alpha_na_ca: 2.5371,
        }
    }
}

impl CellConstants {
    /// RT/F (V)
    #[inline]
    pub fn rt_over_f(&self) -> f64 {
        self.gas_constant_J_per_mol_K * self.temperature_K / self.faraday_C_per_mol
    }
}

/// Drug application: a step change of four channel scales at `onset_sec`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrugEffect {
    /// Application time (s)
    pub onset_sec: f64,
    pub i_na_factor: f64,
    pub i_ca_l_factor: f64,
    pub i_kr_factor: f64,
    pub i_ks_factor: f64,
}

impl Default for DrugEffect {
    fn default() -> Self {
        Self {
            onset_sec: 10000.0,
            i_na_factor: 1.0,
            i_ca_l_factor: 1.0,
            i_kr_factor: 1.0,
            i_ks_factor: 1.0,
        }
    }
}

/// Reduction factors in effect at one instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrugFactors {
    pub i_na: f64,
    pub i_ca_l: f64,
    pub i_kr: f64,
    pub i_ks: f64,
}

impl DrugEffect {
    /// Factors at time `t_sec`; not smoothed across the onset
    pub fn factors_at(&self, t_sec: f64) -> DrugFactors {
        if t_sec < self.onset_sec {
            DrugFactors {
                i_na: 1.0,
                i_ca_l: 1.0,
                i_kr: 1.0,
                i_ks: 1.0,
            }
        } else {
            DrugFactors {
                i_na: self.i_na_factor,
                i_ca_l: self.i_ca_l_factor,
                i_kr: self.i_kr_factor,
                i_ks: self.i_ks_factor,
            }
        }
    }
}

/// Per-current multiplicative block, e.g. `{"I_CaL": 0.4, "I_NaCa": 0.4}`
///
/// Currents not listed keep a scale of 1.0.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CurrentScales(BTreeMap<CurrentKind, f64>);

impl CurrentScales {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: CurrentKind, scale: f64) -> Self {
        self.0.insert(kind, scale);
        self
    }

    pub fn set(&mut self, kind: CurrentKind, scale: f64) {
        self.0.insert(kind, scale);
    }

    #[inline]
    pub fn scale(&self, kind: CurrentKind) -> f64 {
        self.0.get(&kind).copied().unwrap_or(1.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
