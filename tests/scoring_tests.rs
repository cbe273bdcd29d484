//! Integration tests for trace scoring
//!
//! Tests validate:
//! - Identical runs score zero
//! - Failed individuals receive the maximum normalized error
//! - Voltage clamp is scored on summed currents

use paci_sim::config::ModelParameters;
use paci_sim::scoring::{max_error, normalized_error, protocol_error, voltage_error};
use paci_sim::{Protocol, ScoringError, Simulation, SingleActionPotentialProtocol, Trace};

fn short_action_potential() -> Protocol {
    SingleActionPotentialProtocol::new(0.3).unwrap().into()
}

#[test]
fn test_self_comparison_scores_zero() {
    let protocol = short_action_potential();
    let baseline = Simulation::new(ModelParameters::default())
        .run(&protocol)
        .unwrap();

    let error = normalized_error(&protocol, &baseline, Some(&baseline)).unwrap();
    assert!(error.abs() < 1e-20, "self error {}", error);
}

#[test]
fn test_perturbed_individual_scores_positive() {
    let protocol = short_action_potential();
    let baseline = Simulation::new(ModelParameters::default())
        .run(&protocol)
        .unwrap();

    let mut params = ModelParameters::default();
    params.conductances = params.conductances.scaled(0.7);
    let individual = Simulation::new(params).run(&protocol).unwrap();

    let error = normalized_error(&protocol, &baseline, Some(&individual)).unwrap();
    assert!(error > 0.0, "perturbed individual should score worse than baseline");
}

#[test]
fn test_failed_individual_scores_one() {
    let baseline = Trace::new(vec![0.0, 1.0], vec![-0.08, -0.07], None, None);
    let error = normalized_error(&short_action_potential(), &baseline, None).unwrap();
    assert_eq!(error, 1.0);
}

#[test]
fn test_voltage_error_sums_squares() {
    let baseline = Trace::new(vec![0.0, 1.0, 2.0], vec![0.0, 0.0, 0.0], None, None);
    let individual = Trace::new(vec![0.5, 1.5], vec![0.1, -0.2], None, None);

    let error = voltage_error(&baseline, &individual).unwrap();
    assert!((error - 0.05).abs() < 1e-15, "0.1² + 0.2², got {}", error);
    assert!((max_error(&individual) - 0.05).abs() < 1e-15);
}

#[test]
fn test_clamp_requires_currents() {
    let clamp = Protocol::baseline_voltage_clamp();
    let trace = Trace::new(vec![0.0, 1.0], vec![-0.08, -0.08], None, None);

    assert!(matches!(
        protocol_error(&clamp, &trace, &trace),
        Err(ScoringError::MissingCurrents(_))
    ));
}

#[test]
fn test_short_baseline_rejected() {
    let baseline = Trace::new(vec![0.0], vec![-0.08], None, None);
    assert_eq!(
        voltage_error(&baseline, &baseline),
        Err(ScoringError::BaselineTooShort(1))
    );
}
