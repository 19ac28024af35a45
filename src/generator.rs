//! Simulated sensor values.
//!
//! Every metric follows a smooth periodic wave around a base value plus a
//! bounded uniform perturbation, hard-clamped to the metric's range:
//!
//! ```text
//! clamp(base + amplitude * sin(2π t / period + phase) + U(-noise, noise), min, max)
//! ```
//!
//! The generator keeps no memory of earlier samples; the only state is the
//! device's random number generator, which can be seeded for reproducible runs.

use crate::error::{Error, Result};
use crate::registry::MetricDefinition;
use crate::types::{DataType, MetricValue};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

fn default_period() -> f64 {
    60.0
}

/// Range and waveform parameters for one simulated metric.
///
/// These parameters only shape the simulated values; none of them travel on
/// the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationProfile {
    /// Lowest value the metric may ever report.
    pub min: f64,
    /// Highest value the metric may ever report.
    pub max: f64,
    /// Centre of the wave; the midpoint of the range when absent.
    #[serde(default)]
    pub base: Option<f64>,
    /// Peak deviation of the periodic component.
    #[serde(default)]
    pub amplitude: f64,
    /// Period of the periodic component in seconds.
    #[serde(default = "default_period")]
    pub period_secs: f64,
    /// Bound of the uniform random perturbation.
    #[serde(default)]
    pub noise: f64,
}

impl SimulationProfile {
    /// Creates a flat profile over `[min, max]` centred on the midpoint.
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            base: None,
            amplitude: 0.0,
            period_secs: default_period(),
            noise: 0.0,
        }
    }

    /// Sets the centre of the wave.
    pub fn with_base(mut self, base: f64) -> Self {
        self.base = Some(base);
        self
    }

    /// Sets the amplitude and period of the periodic component.
    pub fn with_wave(mut self, amplitude: f64, period_secs: f64) -> Self {
        self.amplitude = amplitude;
        self.period_secs = period_secs;
        self
    }

    /// Sets the bound of the random perturbation.
    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    /// Midpoint of the configured range.
    pub fn midpoint(&self) -> f64 {
        self.min + (self.max - self.min) / 2.0
    }

    /// Centre of the wave.
    pub fn base(&self) -> f64 {
        self.base.unwrap_or_else(|| self.midpoint())
    }

    /// The deterministic part of the signal, before noise and clamping.
    ///
    /// Falls back to the base value when the phase computation overflows.
    pub fn waveform(&self, elapsed_secs: f64, phase: f64) -> f64 {
        let angle = TAU * elapsed_secs / self.period_secs + phase;
        let value = self.base() + self.amplitude * angle.sin();
        if value.is_finite() {
            value
        } else {
            self.base()
        }
    }

    /// Truncates a value into `[min, max]`.
    pub fn clamp(&self, value: f64) -> f64 {
        let value = if value.is_nan() { self.base() } else { value };
        value.max(self.min).min(self.max)
    }

    /// Checks that the profile can be sampled for a metric of `datatype`.
    pub(crate) fn validate(&self, name: &str, datatype: DataType) -> Result<()> {
        let invalid = || Error::InvalidRange {
            name: name.to_string(),
            min: self.min,
            max: self.max,
        };

        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(invalid());
        }
        let params = [self.base(), self.amplitude, self.noise, self.period_secs];
        if params.iter().any(|p| !p.is_finite())
            || self.amplitude < 0.0
            || self.noise < 0.0
            || self.period_secs <= 0.0
        {
            return Err(invalid());
        }
        if let Some((lo, hi)) = self.integer_window(datatype) {
            if lo > hi {
                return Err(invalid());
            }
        }
        if datatype == DataType::Float {
            let (lo, hi) = self.float_window();
            if !lo.is_finite() || !hi.is_finite() || lo > hi {
                return Err(invalid());
            }
        }
        Ok(())
    }

    // Single-precision values inside the configured range. Bounds that f32
    // cannot represent exactly are rounded inward.
    fn float_window(&self) -> (f32, f32) {
        let mut lo = self.min as f32;
        if f64::from(lo) < self.min {
            lo = next_f32_up(lo);
        }
        let mut hi = self.max as f32;
        if f64::from(hi) > self.max {
            hi = next_f32_down(hi);
        }
        (lo, hi)
    }

    // Whole numbers inside both the configured range and the type's domain.
    fn integer_window(&self, datatype: DataType) -> Option<(f64, f64)> {
        let (type_min, type_max) = datatype.integer_bounds()?;
        Some((self.min.ceil().max(type_min), self.max.floor().min(type_max)))
    }
}

/// Per-device source of simulated values.
pub struct ValueGenerator {
    rng: StdRng,
    phase: f64,
}

impl ValueGenerator {
    /// Creates a generator with a fixed seed, or OS entropy when `seed` is `None`.
    pub fn new(seed: Option<u64>, phase: f64) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rng, phase }
    }

    /// Samples a raw value for `profile` at `elapsed_secs` since session start.
    ///
    /// The result always lies within `[profile.min, profile.max]`.
    pub fn sample(&mut self, profile: &SimulationProfile, elapsed_secs: f64) -> f64 {
        let perturbation = if profile.noise > 0.0 {
            self.rng.random_range(-profile.noise..=profile.noise)
        } else {
            0.0
        };
        profile.clamp(profile.waveform(elapsed_secs, self.phase) + perturbation)
    }

    /// Samples a value for `metric` typed according to its declared data type.
    pub fn sample_value(&mut self, metric: &MetricDefinition, elapsed_secs: f64) -> MetricValue {
        let raw = self.sample(&metric.profile, elapsed_secs);
        typed_value(metric.datatype, &metric.profile, raw)
    }
}

/// Converts a clamped raw sample into a value of `datatype`.
///
/// Integer types are rounded and kept inside the whole numbers of the range.
pub(crate) fn typed_value(datatype: DataType, profile: &SimulationProfile, raw: f64) -> MetricValue {
    if let Some((lo, hi)) = profile.integer_window(datatype) {
        let v = raw.round().clamp(lo, hi);
        return match datatype {
            DataType::Int8 => MetricValue::Int8(v as i8),
            DataType::Int16 => MetricValue::Int16(v as i16),
            DataType::Int32 => MetricValue::Int32(v as i32),
            DataType::Int64 => MetricValue::Int64(v as i64),
            DataType::UInt8 => MetricValue::UInt8(v as u8),
            DataType::UInt16 => MetricValue::UInt16(v as u16),
            DataType::UInt32 => MetricValue::UInt32(v as u32),
            _ => MetricValue::UInt64(v as u64),
        };
    }

    match datatype {
        DataType::Float => {
            let (lo, hi) = profile.float_window();
            MetricValue::Float((raw as f32).max(lo).min(hi))
        }
        DataType::Boolean => MetricValue::Boolean(raw > profile.midpoint()),
        // Registry construction rejects everything else.
        _ => MetricValue::Double(raw),
    }
}

// Adjacent representable f32 towards +inf. Only called with finite values.
fn next_f32_up(v: f32) -> f32 {
    if v == 0.0 {
        f32::from_bits(1)
    } else if v > 0.0 {
        f32::from_bits(v.to_bits() + 1)
    } else {
        f32::from_bits(v.to_bits() - 1)
    }
}

fn next_f32_down(v: f32) -> f32 {
    -next_f32_up(-v)
}
