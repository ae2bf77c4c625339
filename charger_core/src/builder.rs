//! Type-state builder for `ChargeController`.
//!
//! `build()` only exists once a power supply has been provided. The profile
//! stays optional: a controller without one is valid and reports
//! `NotConfigured` when started.

use std::sync::Arc;

use charger_traits::PowerSupply;
use charger_traits::clock::{Clock, MonotonicClock};

use crate::config::ChargeSettings;
use crate::controller::ChargeController;
use crate::error::{BuildError, Result};
use crate::handle::AbortHandle;
use crate::profile::BatteryProfile;

/// Type-state marker for a builder with no PSU yet.
pub struct Missing;

pub struct ChargeControllerBuilder<P> {
    psu: P,
    profile: Option<BatteryProfile>,
    settings: Option<ChargeSettings>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    abort: Option<AbortHandle>,
}

impl Default for ChargeControllerBuilder<Missing> {
    fn default() -> Self {
        Self {
            psu: Missing,
            profile: None,
            settings: None,
            clock: None,
            abort: None,
        }
    }
}

impl ChargeControllerBuilder<Missing> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_psu<P: PowerSupply>(self, psu: P) -> ChargeControllerBuilder<P> {
        ChargeControllerBuilder {
            psu,
            profile: self.profile,
            settings: self.settings,
            clock: self.clock,
            abort: self.abort,
        }
    }
}

/// Chainable setters that do not affect type-state.
impl<P> ChargeControllerBuilder<P> {
    pub fn with_profile(mut self, profile: BatteryProfile) -> Self {
        self.profile = Some(profile);
        self
    }
    pub fn with_settings(mut self, settings: ChargeSettings) -> Self {
        self.settings = Some(settings);
        self
    }
    /// Provide a custom clock; defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
    /// Share an abort flag created ahead of the controller (e.g. by a
    /// signal handler).
    pub fn with_abort_handle(mut self, abort: AbortHandle) -> Self {
        self.abort = Some(abort);
        self
    }
}

impl<P: PowerSupply> ChargeControllerBuilder<P> {
    /// Validate settings and build the controller in `Idle`.
    pub fn build(self) -> Result<ChargeController<P>> {
        let settings = self.settings.unwrap_or_default();
        if settings.tick_base.is_zero() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "tick_base must be > 0",
            )));
        }
        if settings.abort_poll.is_zero() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "abort_poll must be > 0",
            )));
        }
        if !(settings.probe_tolerance_v.is_finite() && settings.probe_tolerance_v > 0.0) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "probe_tolerance_v must be a positive voltage",
            )));
        }
        if settings.max_run.is_some_and(|d| d.is_zero()) {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "max_run must be > 0 when set",
            )));
        }

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(b) => Arc::from(b),
            None => Arc::new(MonotonicClock::new()),
        };

        Ok(ChargeController::from_parts(
            self.psu,
            self.profile,
            settings,
            clock,
            self.abort.unwrap_or_default(),
        ))
    }
}
