//! Open-circuit voltage to SOC bucket mapping.

use crate::profile::{BatteryProfile, SOC_FULL, SOC_STEP};

#[derive(Debug, Clone, Copy, Default)]
pub struct SocEstimator;

impl SocEstimator {
    /// Bucket for a resting voltage, scanning up from 0.
    ///
    /// Voltages below `soc_ocv[0]` map to 0.
    pub fn estimate(ocv: f32, profile: &BatteryProfile) -> u8 {
        Self::advance(0, ocv, profile)
    }

    /// Continue the scan from `from`; the result is never below `from`.
    ///
    /// Advances while `ocv > soc_ocv[bucket + 10]` and stops at 100. A
    /// voltage exactly on a threshold does not cross it.
    pub fn advance(from: u8, ocv: f32, profile: &BatteryProfile) -> u8 {
        let mut bucket = from.min(SOC_FULL) / SOC_STEP * SOC_STEP;
        while bucket < SOC_FULL && ocv > profile.ocv_at(bucket + SOC_STEP) {
            bucket += SOC_STEP;
        }
        bucket
    }
}
