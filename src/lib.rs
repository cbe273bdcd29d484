//! paci-sim - single-cell cardiac action potential engine
//!
//! This library simulates the Paci 2018 hiPSC-derived cardiomyocyte model
//! under free-running, closed-loop irregular pacing and voltage-clamp
//! protocols, producing traces for parameter-fitting harnesses.

// Allow non-snake-case for unit suffixes in field names (mM, V, F, etc.)
// This follows the project convention of including units in names.
#![allow(non_snake_case)]

pub mod config;
pub mod export;
pub mod model;
pub mod protocol;
pub mod scoring;
pub mod simulation;

pub use config::{Conductance, CurrentScales, ModelParameters, TunableParameter};
pub use model::{CurrentKind, CurrentSnapshot, PaciModel, StateVector, STATE_SIZE};
pub use protocol::{
    IrregularPacingProtocol, PacingInfo, Protocol, ProtocolError, SingleActionPotentialProtocol,
    VoltageClampProtocol, VoltageClampStep,
};
pub use scoring::ScoringError;
pub use simulation::{generate_trace, IntegrationError, Simulation, Trace};
