//! System configuration parameters
//!
//! Loaded once from NVS before the control loop starts and handed to the
//! core as an immutable snapshot.  Nothing in the loop mutates it.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which optional downstream sinks are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Cloud telemetry (EmonCMS-style HTTP input API).
    pub cloud_enabled: bool,
    /// MQTT message broker.
    pub broker_enabled: bool,
    /// Solar / grid-import current diversion.
    pub divert_enabled: bool,
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub features: FeatureFlags,

    // --- Timing ---
    /// Readiness query interval while the EVSE is starting/unresponsive (ms)
    pub status_poll_interval_ms: u32,
    /// Live value refresh interval once the EVSE is ready (ms)
    pub fast_interval_ms: u32,
    /// Telemetry publish interval (ms)
    pub slow_interval_ms: u32,
    /// A loop pass longer than this is logged (ms)
    pub loop_budget_ms: u32,

    // --- RAPI ---
    /// Seed for the RAPI sequence id counter; the first command uses seed + 1.
    pub sequence_id_seed: u8,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            features: FeatureFlags::default(),

            // Timing
            status_poll_interval_ms: 1_000,
            fast_interval_ms: 2_000,
            slow_interval_ms: 30_000,
            loop_budget_ms: 10,

            // RAPI
            sequence_id_seed: 0,
        }
    }
}

impl SystemConfig {
    /// Range-check every field.  Invalid values are rejected, not clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(100..=60_000).contains(&self.status_poll_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "status_poll_interval_ms must be 100–60000",
            ));
        }
        if !(250..=60_000).contains(&self.fast_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "fast_interval_ms must be 250–60000",
            ));
        }
        if !(1_000..=3_600_000).contains(&self.slow_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "slow_interval_ms must be 1000–3600000",
            ));
        }
        if self.slow_interval_ms < self.fast_interval_ms {
            return Err(ConfigError::ValidationFailed(
                "slow_interval_ms must not be shorter than fast_interval_ms",
            ));
        }
        if self.loop_budget_ms == 0 {
            return Err(ConfigError::ValidationFailed("loop_budget_ms must be > 0"));
        }
        Ok(())
    }
}
