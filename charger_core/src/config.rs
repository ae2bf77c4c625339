//! Runtime settings for the charge loop.
//!
//! These are the core-side counterparts of `charger_config::ChargeCfg`; see
//! `conversions` for the mapping.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ChargeSettings {
    /// Tick interval at 1C; the loop waits `tick_base / c_rate` between ticks.
    pub tick_base: Duration,
    /// Resolution requested from the resting-voltage probe (V).
    pub probe_tolerance_v: f32,
    /// Slice length of the abortable inter-tick wait.
    pub abort_poll: Duration,
    /// Hard cap on one session; `None` disables.
    pub max_run: Option<Duration>,
}

impl Default for ChargeSettings {
    fn default() -> Self {
        Self {
            tick_base: Duration::from_secs(120),
            probe_tolerance_v: 0.001,
            abort_poll: Duration::from_millis(250),
            max_run: None,
        }
    }
}
