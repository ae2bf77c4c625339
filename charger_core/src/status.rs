//! Charge state machine states and the status snapshot exposed to callers.

use crate::error::ChargerError;
use crate::telemetry::Sample;

/// Why a session ended normally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Voltage or current fell below its completion threshold.
    Complete,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ChargeState {
    /// No session running; a profile may or may not be selected.
    #[default]
    Idle,
    /// Probing the resting voltage with output disabled.
    Validating,
    /// Programming initial setpoints.
    Setup,
    /// Tick loop active; output enabled.
    Charging,
    /// Normal end; output disabled.
    Terminated(TerminationReason),
    /// Session failed; output disabled (best-effort for hardware faults).
    Aborted(ChargerError),
}

impl ChargeState {
    /// True once the session has reached an exit state.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Terminated(_) | Self::Aborted(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Validating => "Validating",
            Self::Setup => "Setup",
            Self::Charging => "Charging",
            Self::Terminated(_) => "Terminated",
            Self::Aborted(_) => "Aborted",
        }
    }
}

/// Point-in-time view of a controller.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChargeStatus {
    pub state: ChargeState,
    pub soc: Option<u8>,
    pub last_sample: Option<Sample>,
}

/// Result of a single `ChargeController::step`.
#[derive(Debug)]
pub enum StepStatus {
    /// Keep going; one tick was taken.
    Charging,
    /// Completion threshold reached; output already disabled.
    Complete,
    /// Aborted with a typed error; output has been asked to disable.
    Aborted(ChargerError),
}
