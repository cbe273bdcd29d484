//! Configuration module for model parameters.
//!
//! Tunable conductances can be overridden per run; everything else is fixed.

mod parameters;

pub use parameters::{
    CellConstants, Conductance, Conductances, CurrentScales, DrugEffect, DrugFactors,
    ModelParameters, TunableParameter,
};
