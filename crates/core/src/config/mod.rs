use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{PhysicalMediaError, Result};

/// Top-level configuration structure for a viewer instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default)]
    pub animation: AnimationConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl ViewerConfig {
    /// Parses a JSON document. Missing sections and fields fall back to their
    /// defaults.
    pub fn from_json_str(source: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_json_str(&source)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.animation.validate()?;
        self.refresh.validate()?;
        self.fetch.validate()
    }
}

/// Timing and geometry of the rotation animator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Pointer points per unit of rotation while dragging.
    pub drag_sensitivity: f32,
    pub return_duration_ms: u64,
    pub return_steps: u32,
    /// Quiet time after the return-home animation before the attract loop starts.
    pub idle_delay_ms: u64,
    pub attract_duration_ms: u64,
    pub attract_steps: u32,
    /// Peak `y_angle` reached by the attract oscillation.
    pub attract_amplitude: f32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            drag_sensitivity: 200.0,
            return_duration_ms: 1_000,
            return_steps: 60,
            idle_delay_ms: 4_000,
            attract_duration_ms: 12_000,
            attract_steps: 576,
            attract_amplitude: 0.25,
        }
    }
}

impl AnimationConfig {
    pub fn return_period(&self) -> Duration {
        step_period(self.return_duration_ms, self.return_steps)
    }

    pub fn attract_period(&self) -> Duration {
        step_period(self.attract_duration_ms, self.attract_steps)
    }

    pub fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }

    fn validate(&self) -> Result<()> {
        if !self.drag_sensitivity.is_finite() || self.drag_sensitivity <= 0.0 {
            return Err(invalid("animation.drag_sensitivity must be positive"));
        }
        if !self.attract_amplitude.is_finite() || self.attract_amplitude <= 0.0 {
            return Err(invalid("animation.attract_amplitude must be positive"));
        }
        if self.return_steps == 0 || self.attract_steps == 0 {
            return Err(invalid("animation step counts must be non-zero"));
        }
        if self.return_duration_ms == 0 || self.attract_duration_ms == 0 {
            return Err(invalid("animation durations must be non-zero"));
        }
        if self.return_period().is_zero() || self.attract_period().is_zero() {
            return Err(invalid("animation steps are shorter than a nanosecond"));
        }
        Ok(())
    }
}

/// Debounce timing for appearance changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub quiet_period_ms: u64,
    /// How long the "refreshing" flag stays raised after a refresh fires.
    pub settle_delay_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: 300,
            settle_delay_ms: 250,
        }
    }
}

impl RefreshConfig {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.quiet_period_ms == 0 {
            return Err(invalid("refresh.quiet_period_ms must be non-zero"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Upper bound on retrieving the raw bytes of one piece of album art.
    pub transport_timeout_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            transport_timeout_ms: 15_000,
        }
    }
}

impl FetchConfig {
    pub fn transport_timeout(&self) -> Duration {
        Duration::from_millis(self.transport_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.transport_timeout_ms == 0 {
            return Err(invalid("fetch.transport_timeout_ms must be non-zero"));
        }
        Ok(())
    }
}

fn step_period(duration_ms: u64, steps: u32) -> Duration {
    Duration::from_millis(duration_ms) / steps.max(1)
}

fn invalid(reason: &str) -> PhysicalMediaError {
    PhysicalMediaError::Config(reason.to_string())
}
