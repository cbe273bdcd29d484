//! Adaptive implicit integration for stiff cell models.
//!
//! The cell ODE mixes sub-millisecond Na+ gating with second-scale Ca2+
//! handling, so explicit schemes are limited by stability rather than
//! accuracy. This module implements an L-stable two-stage SDIRK method with
//! an embedded first-order error estimate and simplified Newton iteration.
//!
//! Tableau (γ = 1 − 1/√2):
//! ```text
//!   γ | γ      0
//!   1 | 1-γ    γ
//!  ---+-----------
//!     | 1-γ    γ     (order 2)
//!     | 1      0     (order 1, error estimate)
//! ```
//!
//! Reference: Hairer E, Wanner G. Solving Ordinary Differential Equations II,
//! 2nd ed., Springer 1996, Section IV.6

use nalgebra::linalg::LU;
use nalgebra::{DMatrix, DVector, Dyn};
use thiserror::Error;

/// A system `dy/dt = f(t, y)` whose evaluation may have side effects
///
/// `rhs` is called for every stage, Newton iterate and Jacobian probe, in no
/// particular time order. `accept_step` is called once at `t0` and once per
/// accepted step, with strictly increasing times.
pub trait StiffSystem {
    /// Number of state variables
    fn dimension(&self) -> usize;

    /// Evaluate `f(t, y)` into `dydt`
    fn rhs(&mut self, t: f64, y: &[f64], dydt: &mut [f64]);

    /// Notification of an accepted solution point
    fn accept_step(&mut self, _t: f64, _y: &[f64]) {}
}

/// Configuration for the stiff integrator
#[derive(Debug, Clone)]
pub struct IntegratorConfig {
    /// Relative tolerance
    pub rtol: f64,
    /// Absolute tolerance
    pub atol: f64,
    /// First trial step (s)
    pub initial_step_sec: f64,
    /// Upper bound on any step (s)
    pub max_step_sec: f64,
    /// Steps below this size abort the run (s)
    pub min_step_sec: f64,
    /// Maximum number of step attempts, accepted or not
    pub max_steps: usize,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            rtol: 1e-3,
            atol: 1e-6,
            initial_step_sec: 1e-5,
            max_step_sec: 1e-3,   // 1 ms keeps the stimulus window resolved
            min_step_sec: 1e-10,
            max_steps: 200_000,
        }
    }
}

/// Reasons an integration can fail
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrationError {
    #[error("invalid time span [{t0}, {t1}]")]
    InvalidSpan { t0: f64, t1: f64 },

    #[error("initial state has {actual} entries, system expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("step size underflow at t = {t_sec:.6e} s (h = {step_sec:.3e} s)")]
    StepSizeUnderflow { t_sec: f64, step_sec: f64 },

    #[error("exceeded {max_steps} step attempts at t = {t_sec:.6e} s")]
    MaxStepsExceeded { max_steps: usize, t_sec: f64 },
}

/// Counters from the most recent `solve`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntegratorStats {
    pub accepted_steps: usize,
    pub rejected_steps: usize,
    pub rhs_evaluations: usize,
    pub jacobian_evaluations: usize,
    pub lu_factorizations: usize,
}

impl IntegratorStats {
    /// Add the counters of another solve
    pub fn accumulate(&mut self, other: &IntegratorStats) {
        self.accepted_steps += other.accepted_steps;
        self.rejected_steps += other.rejected_steps;
        self.rhs_evaluations += other.rhs_evaluations;
        self.jacobian_evaluations += other.jacobian_evaluations;
        self.lu_factorizations += other.lu_factorizations;
    }
}

const MAX_NEWTON_ITERATIONS: usize = 10;
/// Newton convergence threshold on the scaled stage increment
const NEWTON_TOLERANCE: f64 = 0.01;
/// Iteration count above which the Jacobian is refreshed for the next step
const SLOW_NEWTON_ITERATIONS: usize = 4;
const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 4.0;

enum NewtonOutcome {
    Converged { iterations: usize },
    Failed,
}

/// L-stable SDIRK2 integrator with adaptive step size
pub struct StiffIntegrator {
    pub config: IntegratorConfig,
    stats: IntegratorStats,
}

impl StiffIntegrator {
    pub fn new(config: IntegratorConfig) -> Self {
        Self {
            config,
            stats: IntegratorStats::default(),
        }
    }

    pub fn stats(&self) -> IntegratorStats {
        self.stats
    }

    /// Integrate `system` from `t0` to `t1` starting at `y0`
    ///
    /// Solution points are delivered through [`StiffSystem::accept_step`].
    /// Returns the number of accepted steps.
    pub fn solve<S: StiffSystem>(
        &mut self,
        system: &mut S,
        t0: f64,
        t1: f64,
        y0: &[f64],
    ) -> Result<usize, IntegrationError> {
        self.stats = IntegratorStats::default();

        if !t0.is_finite() || !t1.is_finite() || t1 < t0 {
            return Err(IntegrationError::InvalidSpan { t0, t1 });
        }
        let n = system.dimension();
        if y0.len() != n {
            return Err(IntegrationError::DimensionMismatch {
                expected: n,
                actual: y0.len(),
            });
        }

        let cfg = self.config.clone();
        let gamma = 1.0 - std::f64::consts::FRAC_1_SQRT_2;

        let mut t = t0;
        let mut y = DVector::from_column_slice(y0);
        system.accept_step(t, y.as_slice());

        let mut h = cfg.initial_step_sec.min(cfg.max_step_sec);
        let mut f0 = DVector::<f64>::zeros(n);
        let mut jac = DMatrix::<f64>::zeros(n, n);
        let mut jacobian_current = false;
        let mut lu: Option<LU<f64, Dyn, Dyn>> = None;
        let mut cached_hg = 0.0;
        let mut attempts = 0usize;

        while t < t1 {
            if attempts >= cfg.max_steps {
                return Err(IntegrationError::MaxStepsExceeded {
                    max_steps: cfg.max_steps,
                    t_sec: t,
                });
            }
            attempts += 1;

            let remaining = t1 - t;
            h = h.min(cfg.max_step_sec).min(remaining);
            if h < cfg.min_step_sec && remaining > cfg.min_step_sec {
                return Err(IntegrationError::StepSizeUnderflow {
                    t_sec: t,
                    step_sec: h,
                });
            }
            let last_step = h >= remaining;

            system.rhs(t, y.as_slice(), f0.as_mut_slice());
            self.stats.rhs_evaluations += 1;
            if !all_finite(&f0) {
                h = self.reject(h);
                jacobian_current = false;
                continue;
            }

            if !jacobian_current {
                if !self.numerical_jacobian(system, t, &y, &f0, &mut jac) {
                    h = self.reject(h);
                    continue;
                }
                jacobian_current = true;
                lu = None;
            }

            let hg = h * gamma;
            let refactor = match lu {
                None => true,
                Some(_) => (hg - cached_hg).abs() > 0.2 * cached_hg,
            };
            if refactor {
                let iteration_matrix = DMatrix::<f64>::identity(n, n) - &jac * hg;
                let factored = iteration_matrix.lu();
                self.stats.lu_factorizations += 1;
                if !factored.is_invertible() {
                    lu = None;
                    jacobian_current = false;
                    h = self.reject(h);
                    continue;
                }
                lu = Some(factored);
                cached_hg = hg;
            }
            // May have been factored for a nearby step size
            let Some(factored) = lu.as_ref() else {
                continue;
            };

            let scale = y.map(|yi| cfg.atol + cfg.rtol * yi.abs());

            // Stage 1: k1 = f(t + γh, y + hγ·k1), starting from f(t, y)
            let mut k1 = f0.clone();
            let stage1 = self.newton_stage(system, factored, t + hg, &y, hg, &mut k1, &scale);
            let NewtonOutcome::Converged { iterations: it1 } = stage1 else {
                jacobian_current = false;
                h = self.reject(h);
                continue;
            };

            // Stage 2: k2 = f(t + h, y + h(1-γ)·k1 + hγ·k2)
            let t_end = if last_step { t1 } else { t + h };
            let base = &y + &k1 * (h * (1.0 - gamma));
            let mut k2 = k1.clone();
            let stage2 = self.newton_stage(system, factored, t_end, &base, hg, &mut k2, &scale);
            let NewtonOutcome::Converged { iterations: it2 } = stage2 else {
                jacobian_current = false;
                h = self.reject(h);
                continue;
            };

            let y_new = &y + (&k1 * (1.0 - gamma) + &k2 * gamma) * h;

            let mut err_sq = 0.0;
            for i in 0..n {
                let e = hg * (k2[i] - k1[i]);
                let sc = cfg.atol + cfg.rtol * y[i].abs().max(y_new[i].abs());
                err_sq += (e / sc) * (e / sc);
            }
            let err = (err_sq / n as f64).sqrt();
            if !err.is_finite() || !all_finite(&y_new) {
                jacobian_current = false;
                h = self.reject(h);
                continue;
            }

            if err <= 1.0 {
                t = t_end;
                y = y_new;
                self.stats.accepted_steps += 1;
                system.accept_step(t, y.as_slice());
                if it1.max(it2) > SLOW_NEWTON_ITERATIONS {
                    jacobian_current = false;
                }
            } else {
                self.stats.rejected_steps += 1;
                jacobian_current = false;
            }

            // Order-2 controller
            let factor = if err == 0.0 {
                MAX_FACTOR
            } else {
                (SAFETY * err.powf(-0.5)).clamp(MIN_FACTOR, MAX_FACTOR)
            };
            h *= factor;
        }

        log::debug!(
            "Integration finished: {} accepted, {} rejected, {} RHS evaluations",
            self.stats.accepted_steps,
            self.stats.rejected_steps,
            self.stats.rhs_evaluations
        );
        Ok(self.stats.accepted_steps)
    }

    fn reject(&mut self, h: f64) -> f64 {
        self.stats.rejected_steps += 1;
        0.5 * h
    }

    /// Forward-difference Jacobian around `(t, y)` with `f0 = f(t, y)`
    ///
    /// Returns false when any entry is not finite.
    fn numerical_jacobian<S: StiffSystem>(
        &mut self,
        system: &mut S,
        t: f64,
        y: &DVector<f64>,
        f0: &DVector<f64>,
        jac: &mut DMatrix<f64>,
    ) -> bool {
        let n = y.len();
        let sqrt_eps = f64::EPSILON.sqrt();
        let mut probe = y.clone();
        let mut f_probe = DVector::<f64>::zeros(n);

        for j in 0..n {
            let original = probe[j];
            let delta = sqrt_eps * (1.0 + original.abs());
            probe[j] = original + delta;
            system.rhs(t, probe.as_slice(), f_probe.as_mut_slice());
            self.stats.rhs_evaluations += 1;
            probe[j] = original;
            for i in 0..n {
                jac[(i, j)] = (f_probe[i] - f0[i]) / delta;
            }
        }
        self.stats.jacobian_evaluations += 1;
        jac.iter().all(|v| v.is_finite())
    }

    /// Simplified Newton for `k = f(t_stage, base + hγ·k)`
    #[allow(clippy::too_many_arguments)]
    fn newton_stage<S: StiffSystem>(
        &mut self,
        system: &mut S,
        lu: &LU<f64, Dyn, Dyn>,
        t_stage: f64,
        base: &DVector<f64>,
        hg: f64,
        k: &mut DVector<f64>,
        scale: &DVector<f64>,
    ) -> NewtonOutcome {
        let n = k.len();
        let mut f_stage = DVector::<f64>::zeros(n);
        let mut previous_norm = f64::INFINITY;

        for iteration in 0..MAX_NEWTON_ITERATIONS {
            let stage_y = base + &*k * hg;
            system.rhs(t_stage, stage_y.as_slice(), f_stage.as_mut_slice());
            self.stats.rhs_evaluations += 1;

            let residual = &f_stage - &*k;
            let Some(delta) = lu.solve(&residual) else {
                return NewtonOutcome::Failed;
            };
            *k += &delta;

            let norm = ((delta * hg).component_div(scale).norm_squared() / n as f64).sqrt();
            if !norm.is_finite() {
                return NewtonOutcome::Failed;
            }
            if norm < NEWTON_TOLERANCE {
                return NewtonOutcome::Converged {
                    iterations: iteration + 1,
                };
            }
            // Diverging
            if iteration > 0 && norm > 2.0 * previous_norm {
                return NewtonOutcome::Failed;
            }
            previous_norm = norm;
        }
        NewtonOutcome::Failed
    }
}

impl Default for StiffIntegrator {
    fn default() -> Self {
        Self::new(IntegratorConfig::default())
    }
}

fn all_finite(v: &DVector<f64>) -> bool {
    v.iter().all(|x| x.is_finite())
}
