//! `From` implementations and lookups bridging `charger_config` types to
//! `charger_core` types.

use std::collections::BTreeMap;
use std::time::Duration;

use charger_config::RawProfile;

use crate::config::ChargeSettings;
use crate::error::ConfigError;
use crate::profile::BatteryProfile;

impl From<&charger_config::ChargeCfg> for ChargeSettings {
    fn from(c: &charger_config::ChargeCfg) -> Self {
        Self {
            tick_base: Duration::from_millis(c.tick_base_ms),
            probe_tolerance_v: c.probe_tolerance_v,
            abort_poll: Duration::from_millis(c.abort_poll_ms),
            max_run: (c.max_run_s > 0).then(|| Duration::from_secs(c.max_run_s)),
        }
    }
}

/// Look up `name` and load it, applying a capacity override first.
pub fn resolve_profile(
    profiles: &BTreeMap<String, RawProfile>,
    name: &str,
    capacity_ah: Option<f32>,
) -> Result<BatteryProfile, ConfigError> {
    let raw = profiles
        .get(name)
        .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))?;
    match capacity_ah {
        Some(c) => BatteryProfile::load(&raw.clone().with_capacity(c)),
        None => BatteryProfile::load(raw),
    }
}
