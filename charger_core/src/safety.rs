//! Safety gate in front of every setpoint write.
//!
//! The guard judges the *present measured* state, not the value about to be
//! written: a setpoint may only be issued while the last observed voltage
//! (or current) is inside the profile envelope.

use crate::error::SafetyError;
use crate::profile::BatteryProfile;

#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyGuard;

impl SafetyGuard {
    pub fn new() -> Self {
        Self
    }

    /// Pass iff `voltage_min <= observed <= voltage_max`. `target` is not
    /// inspected.
    pub fn check_voltage(
        &self,
        target: f32,
        observed: f32,
        profile: &BatteryProfile,
    ) -> Result<(), SafetyError> {
        let (min, max) = (profile.voltage_min(), profile.voltage_max());
        if (min..=max).contains(&observed) {
            Ok(())
        } else {
            tracing::warn!(target_v = target, observed, min, max, "voltage gate rejected");
            Err(SafetyError::VoltageOutOfRange { observed, min, max })
        }
    }

    /// Pass iff `current_min <= observed <= current_max`. `target` is not
    /// inspected.
    pub fn check_current(
        &self,
        target: f32,
        observed: f32,
        profile: &BatteryProfile,
    ) -> Result<(), SafetyError> {
        let (min, max) = (profile.current_min(), profile.current_max());
        if (min..=max).contains(&observed) {
            Ok(())
        } else {
            tracing::warn!(target_a = target, observed, min, max, "current gate rejected");
            Err(SafetyError::CurrentOutOfRange { observed, min, max })
        }
    }

    /// Current gate for the controller. Before the output has been enabled
    /// and read back there is no observation to judge, and the gate passes.
    pub fn gate_current(
        &self,
        target: f32,
        observed: Option<f32>,
        profile: &BatteryProfile,
    ) -> Result<(), SafetyError> {
        match observed {
            Some(i) => self.check_current(target, i, profile),
            None => Ok(()),
        }
    }
}
