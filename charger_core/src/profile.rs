//! Validated battery parameters with derived current limits.
//!
//! A `BatteryProfile` is built once from a `charger_config::RawProfile` and
//! never mutated. SOC tables are stored as fixed arrays indexed by
//! `bucket / 10`, so every lookup is bounds-checked by construction.

use std::collections::BTreeMap;
use std::time::Duration;

use charger_config::{RawProfile, SOC_BUCKETS};

use crate::error::ConfigError;

/// Number of SOC buckets (0, 10, ..., 100).
pub const BUCKETS: usize = SOC_BUCKETS.len();

/// Highest SOC bucket.
pub const SOC_FULL: u8 = 100;

/// Distance between adjacent SOC buckets.
pub const SOC_STEP: u8 = 10;

#[inline]
pub(crate) fn bucket_index(bucket: u8) -> usize {
    usize::from(bucket.min(SOC_FULL) / SOC_STEP)
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatteryProfile {
    capacity_ah: f32,
    voltage_min: f32,
    voltage_max: f32,
    soc_ocv: [f32; BUCKETS],
    soc_charge_rate: [f32; BUCKETS],
    current_cutoff_rate: f32,
    current_max_rate: f32,

    // Derived at load time.
    current_at: [f32; BUCKETS],
    current_cutoff: f32,
    current_max: f32,
    current_min: f32,
}

impl BatteryProfile {
    /// Validate raw parameters and derive the per-bucket current schedule.
    pub fn load(raw: &RawProfile) -> Result<Self, ConfigError> {
        let capacity_ah = raw.capacity_ah.ok_or(ConfigError::MissingCapacity)?;
        if !(capacity_ah.is_finite() && capacity_ah > 0.0) {
            return Err(ConfigError::InvalidCapacity(capacity_ah));
        }

        let (vmin, vmax) = (raw.voltage_min, raw.voltage_max);
        if !(vmin.is_finite() && vmax.is_finite() && vmin > 0.0 && vmin < vmax) {
            return Err(ConfigError::InvalidVoltageWindow {
                min: vmin,
                max: vmax,
            });
        }

        let soc_ocv = table_to_array("SOC_OCV", &raw.soc_ocv)?;
        for w in SOC_BUCKETS.windows(2) {
            let (lo, hi) = (soc_ocv[bucket_index(w[0])], soc_ocv[bucket_index(w[1])]);
            if !(hi > lo) {
                return Err(ConfigError::NonMonotonicTable { bucket: w[1] });
            }
        }

        let soc_charge_rate = table_to_array("SOC_CR", &raw.soc_charge_rate)?;
        if soc_charge_rate.iter().any(|r| !valid_rate(*r)) {
            return Err(ConfigError::InvalidRate {
                field: "soc_charge_rate",
            });
        }
        if !valid_rate(raw.c_charge_cutoff) {
            return Err(ConfigError::InvalidRate {
                field: "c_charge_cutoff",
            });
        }
        if !valid_rate(raw.c_charge_max) {
            return Err(ConfigError::InvalidRate {
                field: "c_charge_max",
            });
        }
        if raw.c_charge_cutoff >= raw.c_charge_max {
            return Err(ConfigError::CutoffAboveMax);
        }
        if let Some(pos) = soc_charge_rate.iter().position(|r| *r > raw.c_charge_max) {
            return Err(ConfigError::RateAboveMax {
                bucket: SOC_BUCKETS[pos],
            });
        }

        // The minimum current is derived from the cutoff rate, not from
        // `c_charge_min`. Surface disagreement instead of guessing.
        if let Some(min_rate) = raw.c_charge_min
            && (min_rate - raw.c_charge_cutoff).abs() > f32::EPSILON
        {
            tracing::warn!(
                c_charge_min = min_rate,
                c_charge_cutoff = raw.c_charge_cutoff,
                "c_charge_min differs from c_charge_cutoff; current_min follows the cutoff rate"
            );
        }

        let current_at = soc_charge_rate.map(|rate| rate * capacity_ah);
        let current_cutoff = raw.c_charge_cutoff * capacity_ah;

        Ok(Self {
            capacity_ah,
            voltage_min: vmin,
            voltage_max: vmax,
            soc_ocv,
            soc_charge_rate,
            current_cutoff_rate: raw.c_charge_cutoff,
            current_max_rate: raw.c_charge_max,
            current_at,
            current_cutoff,
            current_max: raw.c_charge_max * capacity_ah,
            current_min: current_cutoff,
        })
    }

    pub fn capacity_ah(&self) -> f32 {
        self.capacity_ah
    }

    pub fn voltage_min(&self) -> f32 {
        self.voltage_min
    }

    pub fn voltage_max(&self) -> f32 {
        self.voltage_max
    }

    /// Open-circuit voltage threshold of `bucket`.
    pub fn ocv_at(&self, bucket: u8) -> f32 {
        self.soc_ocv[bucket_index(bucket)]
    }

    /// C-rate scheduled for `bucket`.
    pub fn charge_rate_at(&self, bucket: u8) -> f32 {
        self.soc_charge_rate[bucket_index(bucket)]
    }

    /// Constant-current setpoint (A) scheduled for `bucket`.
    pub fn current_at(&self, bucket: u8) -> f32 {
        self.current_at[bucket_index(bucket)]
    }

    pub fn current_cutoff(&self) -> f32 {
        self.current_cutoff
    }

    pub fn current_max(&self) -> f32 {
        self.current_max
    }

    /// Lower current bound enforced by the safety guard. Equal to
    /// `current_cutoff` by construction.
    pub fn current_min(&self) -> f32 {
        self.current_min
    }

    pub fn current_cutoff_rate(&self) -> f32 {
        self.current_cutoff_rate
    }

    pub fn current_max_rate(&self) -> f32 {
        self.current_max_rate
    }

    pub fn soc_ocv(&self) -> &[f32; BUCKETS] {
        &self.soc_ocv
    }

    /// Wait between ticks while charging at `bucket`: `base / c_rate`.
    ///
    /// Higher C-rates are sampled more often. Saturates at `Duration::MAX`
    /// for rates too small to represent; the controller caps the wait with
    /// `max_run` and keeps it abortable.
    pub fn tick_interval(&self, bucket: u8, base: Duration) -> Duration {
        let rate = f64::from(self.charge_rate_at(bucket));
        Duration::try_from_secs_f64(base.as_secs_f64() / rate).unwrap_or(Duration::MAX)
    }
}

impl TryFrom<&RawProfile> for BatteryProfile {
    type Error = ConfigError;
    fn try_from(raw: &RawProfile) -> Result<Self, Self::Error> {
        Self::load(raw)
    }
}

#[inline]
fn valid_rate(r: f32) -> bool {
    r.is_finite() && r > 0.0
}

fn table_to_array(
    table: &'static str,
    entries: &BTreeMap<u8, f32>,
) -> Result<[f32; BUCKETS], ConfigError> {
    if let Some(bucket) = entries.keys().find(|b| !SOC_BUCKETS.contains(b)) {
        return Err(ConfigError::UnexpectedBucket {
            table,
            bucket: *bucket,
        });
    }
    let mut out = [0.0_f32; BUCKETS];
    for bucket in SOC_BUCKETS {
        let v = entries
            .get(&bucket)
            .copied()
            .ok_or(ConfigError::MissingBucket { table, bucket })?;
        out[bucket_index(bucket)] = v;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawProfile {
        RawProfile {
            capacity_ah: Some(2.0),
            voltage_min: 3.0,
            voltage_max: 4.2,
            soc_ocv: SOC_BUCKETS
                .iter()
                .zip([3.0, 3.4, 3.5, 3.6, 3.65, 3.7, 3.75, 3.8, 3.9, 4.0, 4.2])
                .map(|(b, v)| (*b, v))
                .collect(),
            soc_charge_rate: SOC_BUCKETS.iter().map(|b| (*b, 0.5)).collect(),
            c_charge_cutoff: 0.05,
            c_charge_max: 1.0,
            c_charge_min: None,
            table_csv: None,
        }
    }

    #[test]
    fn derives_currents_from_capacity() {
        let p = BatteryProfile::load(&raw()).unwrap();
        assert_eq!(p.current_at(0), 1.0);
        assert!((p.current_cutoff() - 0.1).abs() < 1e-6);
        assert_eq!(p.current_max(), 2.0);
        assert_eq!(p.current_min(), p.current_cutoff());
    }

    #[test]
    fn missing_capacity_is_reported() {
        let mut r = raw();
        r.capacity_ah = None;
        assert_eq!(BatteryProfile::load(&r), Err(ConfigError::MissingCapacity));
    }

    #[test]
    fn flat_ocv_table_is_non_monotonic() {
        let mut r = raw();
        r.soc_ocv.insert(50, 3.65);
        assert_eq!(
            BatteryProfile::load(&r),
            Err(ConfigError::NonMonotonicTable { bucket: 50 })
        );
    }

    #[test]
    fn tick_interval_scales_inversely_with_rate() {
        let p = BatteryProfile::load(&raw()).unwrap();
        assert_eq!(
            p.tick_interval(0, Duration::from_secs(120)),
            Duration::from_secs(240)
        );
    }

    #[test]
    fn tick_interval_saturates_for_tiny_rates() {
        let mut r = raw();
        r.soc_charge_rate.insert(30, 1e-20);
        let p = BatteryProfile::load(&r).unwrap();
        assert_eq!(p.tick_interval(30, Duration::from_secs(120)), Duration::MAX);
        assert_eq!(p.tick_interval(30, Duration::ZERO), Duration::ZERO);
    }
}
