//! Online peak / APD90 detection and stimulus scheduling.
//!
//! The scheduler is fed one `(t, V, dV/dt)` sample per RHS evaluation. Since
//! an implicit integrator revisits earlier times (rejected steps, Jacobian
//! probes), only samples strictly later than the last consumed one are used.
//!
//! Detection rules:
//! - Peak: two rising derivatives followed by a non-rising one, with no APD90
//!   pending and the voltage at least `min_peak_amplitude_V` above baseline
//! - APD90: voltage falls through `peak - 0.9·|baseline - peak|`
//! - Each APD90 schedules a stimulus at `t + offset`, drawing offsets in order

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Stimulus and detector settings
#[derive(Debug, Clone, PartialEq)]
pub struct PacingConfig {
    /// Stimulus amplitude (A); divided by membrane capacitance
    pub stimulus_amplitude_A: f64,
    /// Stimulus duration (s)
    pub stimulus_duration_sec: f64,
    /// Baseline estimate before any beat (V)
    pub initial_baseline_V: f64,
    /// Minimum peak height above baseline (V)
    pub min_peak_amplitude_V: f64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            stimulus_amplitude_A: 5.5e-10,
            stimulus_duration_sec: 0.005,
            initial_baseline_V: -0.075,
            min_peak_amplitude_V: 0.04,
        }
    }
}

/// Detector state and event history of one pacing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacingInfo {
    /// Resting voltage estimate (V)
    pub baseline_V: f64,
    pub last_peak_time_sec: Option<f64>,
    /// Pending APD90 crossing voltage; `Some` between a peak and its APD90
    pub apd90_target_V: Option<f64>,
    pub peak_times_sec: Vec<f64>,
    pub apd90_times_sec: Vec<f64>,
    pub stimulation_times_sec: Vec<f64>,
    /// Index of the next offset to draw
    pub next_offset_index: usize,
}

impl PacingInfo {
    pub fn new(baseline_V: f64) -> Self {
        Self {
            baseline_V,
            last_peak_time_sec: None,
            apd90_target_V: None,
            peak_times_sec: Vec::new(),
            apd90_times_sec: Vec::new(),
            stimulation_times_sec: Vec::new(),
            next_offset_index: 0,
        }
    }
}

/// Detector output for one consumed sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PacingEvent {
    Peak {
        t_sec: f64,
        voltage_V: f64,
        apd90_target_V: f64,
    },
    Apd90 {
        t_sec: f64,
        /// `None` once the offsets are exhausted
        stimulation_sec: Option<f64>,
    },
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    voltage_V: f64,
    dv_dt: f64,
}

/// Stateful peak/APD90 detector and stimulus scheduler
#[derive(Debug, Clone)]
pub struct PacingScheduler {
    config: PacingConfig,
    offsets_sec: Vec<f64>,
    info: PacingInfo,
    /// Last three consumed samples, oldest first
    recent: VecDeque<Sample>,
    last_consumed_sec: Option<f64>,
}

impl PacingScheduler {
    pub fn new(config: PacingConfig, offsets_sec: Vec<f64>) -> Self {
        let info = PacingInfo::new(config.initial_baseline_V);
        Self {
            config,
            offsets_sec,
            info,
            recent: VecDeque::with_capacity(3),
            last_consumed_sec: None,
        }
    }

    pub fn config(&self) -> &PacingConfig {
        &self.config
    }

    pub fn info(&self) -> &PacingInfo {
        &self.info
    }

    pub fn into_info(self) -> PacingInfo {
        self.info
    }

    #[cfg(test)]
    pub(crate) fn info_mut(&mut self) -> &mut PacingInfo {
        &mut self.info
    }

    /// Feed one sample; `dv_dt` is the intrinsic derivative without stimulus
    pub fn observe(&mut self, t_sec: f64, voltage_V: f64, dv_dt: f64) -> Option<PacingEvent> {
        if let Some(last) = self.last_consumed_sec {
            if t_sec <= last {
                return None;
            }
        }
        self.last_consumed_sec = Some(t_sec);

        let previous_V = self.recent.back().map(|s| s.voltage_V);
        if self.recent.len() == 3 {
            self.recent.pop_front();
        }
        self.recent.push_back(Sample { voltage_V, dv_dt });

        if let Some(target) = self.info.apd90_target_V {
            let crossed = previous_V.is_some_and(|prev| prev > target) && voltage_V <= target;
            if crossed {
                return Some(self.record_apd90(t_sec, voltage_V));
            }
            return None;
        }

        // Resting: track the maximum diastolic potential
        if voltage_V < self.info.baseline_V {
            self.info.baseline_V = voltage_V;
        }

        if self.is_peak(voltage_V) {
            return Some(self.record_peak(t_sec, voltage_V));
        }
        None
    }

    fn is_peak(&self, voltage_V: f64) -> bool {
        if self.recent.len() < 3 {
            return false;
        }
        let rising_then_falling =
            self.recent[0].dv_dt > 0.0 && self.recent[1].dv_dt > 0.0 && self.recent[2].dv_dt <= 0.0;
        rising_then_falling && voltage_V > self.info.baseline_V + self.config.min_peak_amplitude_V
    }

    fn record_peak(&mut self, t_sec: f64, voltage_V: f64) -> PacingEvent {
        let amplitude = (self.info.baseline_V - voltage_V).abs();
        let target = voltage_V - 0.9 * amplitude;
        self.info.peak_times_sec.push(t_sec);
        self.info.last_peak_time_sec = Some(t_sec);
        self.info.apd90_target_V = Some(target);
        log::debug!(
            "Peak at t = {:.4} s, V = {:.1} mV, APD90 target {:.1} mV",
            t_sec,
            voltage_V * 1000.0,
            target * 1000.0
        );
        PacingEvent::Peak {
            t_sec,
            voltage_V,
            apd90_target_V: target,
        }
    }

    fn record_apd90(&mut self, t_sec: f64, voltage_V: f64) -> PacingEvent {
        self.info.apd90_times_sec.push(t_sec);
        self.info.apd90_target_V = None;
        self.info.baseline_V = voltage_V;

        let stimulation_sec = self
            .offsets_sec
            .get(self.info.next_offset_index)
            .map(|offset| t_sec + offset);
        if let Some(s) = stimulation_sec {
            self.info.next_offset_index += 1;
            self.info.stimulation_times_sec.push(s);
            log::debug!("APD90 at t = {:.4} s, stimulus scheduled at {:.4} s", t_sec, s);
        } else {
            log::debug!("APD90 at t = {:.4} s, offsets exhausted", t_sec);
        }
        PacingEvent::Apd90 {
            t_sec,
            stimulation_sec,
        }
    }

    /// Whether `t_sec` lies in the window of the most recent scheduled stimulus
    pub fn should_stimulate(&self, t_sec: f64) -> bool {
        self.info
            .stimulation_times_sec
            .last()
            .is_some_and(|&s| s <= t_sec && t_sec < s + self.config.stimulus_duration_sec)
    }

    /// Stimulus contribution to dV/dt (V/s) for membrane capacitance `cm_F`
    pub fn stimulus_current(&self, cm_F: f64) -> f64 {
        self.config.stimulus_amplitude_A / cm_F
    }
}
