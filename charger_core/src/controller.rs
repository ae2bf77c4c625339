//! The charge state machine.
//!
//! `Idle → Validating → Setup → Charging → Terminated`, with `Aborted`
//! reachable from every active state. Every exit disables the PSU output.

use std::sync::Arc;
use std::time::Duration;

use charger_traits::{Clock, HwResult, PowerSupply};
use crossbeam_channel as xch;

use crate::config::ChargeSettings;
use crate::error::{ChargerError, Report, Result};
use crate::handle::{AbortHandle, StatusHandle};
use crate::hw_error::map_hw_error;
use crate::profile::BatteryProfile;
use crate::safety::SafetyGuard;
use crate::session::ChargeSession;
use crate::soc::SocEstimator;
use crate::status::{ChargeState, ChargeStatus, StepStatus, TerminationReason};
use crate::telemetry::{Sample, TelemetryRecorder};

type Flow<T> = std::result::Result<T, ChargerError>;

/// Outcome of a completed session.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeSummary {
    pub start_soc: u8,
    pub final_soc: u8,
    pub ticks: u64,
    pub samples: usize,
    pub elapsed: Duration,
    pub last_sample: Option<Sample>,
}

pub struct ChargeController<P: PowerSupply> {
    psu: P,
    profile: Option<BatteryProfile>,
    settings: ChargeSettings,
    guard: SafetyGuard,
    clock: Arc<dyn Clock + Send + Sync>,
    state: ChargeState,
    session: Option<ChargeSession>,
    telemetry: TelemetryRecorder,
    abort: AbortHandle,
    status_handle: StatusHandle,
}

impl<P: PowerSupply> core::fmt::Debug for ChargeController<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChargeController")
            .field("state", &self.state)
            .field("soc", &self.session.as_ref().map(|s| s.soc))
            .field("samples", &self.telemetry.len())
            .finish()
    }
}

fn hw<T>(res: HwResult<T>, op: &'static str) -> Flow<T> {
    res.map_err(|e| {
        tracing::error!(op, error = %e, "power supply call failed");
        map_hw_error(&*e)
    })
}

impl<P: PowerSupply> ChargeController<P> {
    pub(crate) fn from_parts(
        psu: P,
        profile: Option<BatteryProfile>,
        settings: ChargeSettings,
        clock: Arc<dyn Clock + Send + Sync>,
        abort: AbortHandle,
    ) -> Self {
        let ctl = Self {
            psu,
            profile,
            settings,
            guard: SafetyGuard::new(),
            clock,
            state: ChargeState::Idle,
            session: None,
            telemetry: TelemetryRecorder::new(),
            abort,
            status_handle: StatusHandle::default(),
        };
        ctl.publish();
        ctl
    }

    /// Select the battery for the next session. Rejected while a session
    /// is active.
    pub fn select_profile(&mut self, profile: BatteryProfile) -> Result<()> {
        if self.in_session() {
            return Err(Report::new(ChargerError::State(format!(
                "cannot change profile in state {}",
                self.state.name()
            ))));
        }
        tracing::info!(
            capacity_ah = profile.capacity_ah(),
            voltage_min = profile.voltage_min(),
            voltage_max = profile.voltage_max(),
            "battery profile selected"
        );
        self.profile = Some(profile);
        self.state = ChargeState::Idle;
        self.session = None;
        self.publish();
        Ok(())
    }

    pub fn profile(&self) -> Option<&BatteryProfile> {
        self.profile.as_ref()
    }

    pub fn settings(&self) -> &ChargeSettings {
        &self.settings
    }

    pub fn state(&self) -> &ChargeState {
        &self.state
    }

    /// Snapshot of state, SOC and last sample. Pure read.
    pub fn status(&self) -> ChargeStatus {
        ChargeStatus {
            state: self.state.clone(),
            soc: self.session.as_ref().map(|s| s.soc),
            last_sample: self.telemetry.last(),
        }
    }

    pub fn status_handle(&self) -> StatusHandle {
        self.status_handle.clone()
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn subscribe_telemetry(&mut self) -> xch::Receiver<Sample> {
        self.telemetry.subscribe()
    }

    pub fn samples(&self) -> &[Sample] {
        self.telemetry.samples()
    }

    /// Run a whole session: validate, set up, then step until the charge
    /// terminates or aborts.
    pub fn start(&mut self) -> Result<ChargeSummary> {
        self.begin()?;
        loop {
            match self.step()? {
                StepStatus::Charging => {}
                StepStatus::Complete => return self.summary(),
                StepStatus::Aborted(e) => return Err(Report::new(e)),
            }
        }
    }

    /// Validate the battery and program the initial setpoints. On success
    /// the controller is `Charging` with output enabled.
    pub fn begin(&mut self) -> Result<()> {
        let Some(profile) = self.profile.clone() else {
            return Err(Report::new(ChargerError::NotConfigured));
        };
        if self.in_session() {
            return Err(Report::new(ChargerError::State(format!(
                "session already active ({})",
                self.state.name()
            ))));
        }
        self.telemetry.clear();
        self.session = None;
        if self.abort.is_aborted() {
            tracing::warn!("abort requested before start; output left untouched");
            let e = ChargerError::Cancelled;
            self.transition(ChargeState::Aborted(e.clone()));
            return Err(Report::new(e));
        }

        let res = self
            .validate(&profile)
            .and_then(|v| self.setup(&profile, v));
        res.map_err(|e| self.fail(e))
    }

    /// One iteration of the charge loop: termination check, abortable wait,
    /// then a tick.
    pub fn step(&mut self) -> Result<StepStatus> {
        if self.state != ChargeState::Charging {
            return Err(Report::new(ChargerError::State(format!(
                "step in state {}",
                self.state.name()
            ))));
        }
        let (Some(profile), Some(session)) = (self.profile.clone(), self.session.as_ref()) else {
            return Err(Report::new(ChargerError::State("no active session".into())));
        };

        let keep_going = session.measured_voltage >= profile.voltage_min()
            && session
                .measured_current
                .is_some_and(|i| i >= profile.current_cutoff());
        if !keep_going {
            return self.terminate();
        }

        let interval = profile.tick_interval(session.soc, self.settings.tick_base);
        let wait_for = match self.remaining_run() {
            Some(left) => interval.min(left),
            None => interval,
        };
        tracing::debug!(
            soc = session.soc,
            interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            "waiting for next tick"
        );
        if self.wait(wait_for) {
            tracing::warn!("abort requested");
            return Ok(self.abort_with(ChargerError::Cancelled));
        }
        if self.remaining_run().is_some_and(|left| left.is_zero()) {
            return Ok(self.abort_with(ChargerError::MaxRuntime));
        }

        match self.tick(&profile) {
            Ok(()) => {
                self.publish();
                Ok(StepStatus::Charging)
            }
            Err(e @ ChargerError::OutOfRange(_)) => Ok(self.abort_with(e)),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Release the PSU. Rejected while a session is active.
    pub fn close(&mut self) -> Result<()> {
        if self.in_session() {
            return Err(Report::new(ChargerError::State(
                "close during an active session".into(),
            )));
        }
        hw(self.psu.close(), "close").map_err(Report::new)
    }

    fn in_session(&self) -> bool {
        matches!(
            self.state,
            ChargeState::Validating | ChargeState::Setup | ChargeState::Charging
        )
    }

    fn validate(&mut self, profile: &BatteryProfile) -> Flow<f32> {
        self.transition(ChargeState::Validating);
        hw(self.psu.disable_output(), "disable_output")?;
        let v = hw(
            self.psu
                .probe_rest_voltage(profile.voltage_max(), self.settings.probe_tolerance_v),
            "probe_rest_voltage",
        )?;
        tracing::info!(voltage_v = v, "resting voltage probed");
        self.guard.check_voltage(v, v, profile)?;
        Ok(v)
    }

    fn setup(&mut self, profile: &BatteryProfile, battery_voltage: f32) -> Flow<()> {
        self.transition(ChargeState::Setup);
        let soc = SocEstimator::estimate(battery_voltage, profile);
        self.session = Some(ChargeSession::new(battery_voltage, soc, self.clock.now()));

        hw(self.psu.disable_output(), "disable_output")?;
        self.gate(profile, soc)?;
        hw(self.psu.set_current(profile.current_at(soc)), "set_current")?;
        self.gate(profile, soc)?;
        hw(self.psu.set_voltage(profile.voltage_max()), "set_voltage")?;
        hw(self.psu.enable_output(), "enable_output")?;
        let first = self.measure()?;

        tracing::info!(
            soc,
            setpoint_a = profile.current_at(soc),
            setpoint_v = profile.voltage_max(),
            voltage_v = first.voltage_v,
            current_a = first.current_a,
            "charge started"
        );
        self.transition(ChargeState::Charging);
        Ok(())
    }

    fn tick(&mut self, profile: &BatteryProfile) -> Flow<()> {
        let ocv = hw(
            self.psu
                .probe_rest_voltage(profile.voltage_max(), self.settings.probe_tolerance_v),
            "probe_rest_voltage",
        )?;
        let Some(session) = self.session.as_mut() else {
            return Err(ChargerError::State("no active session".into()));
        };
        session.battery_voltage = ocv;
        let prev = session.soc;
        if session.raise_soc(SocEstimator::advance(prev, ocv, profile)) {
            tracing::info!(from = prev, soc = session.soc, battery_v = ocv, "soc advanced");
        }
        let soc = session.soc;

        self.gate(profile, soc)?;
        hw(self.psu.set_current(profile.current_at(soc)), "set_current")?;
        self.measure()?;
        if let Some(s) = self.session.as_mut() {
            s.ticks += 1;
        }
        Ok(())
    }

    /// Both safety gates against the last observation, ahead of a write.
    fn gate(&self, profile: &BatteryProfile, soc: u8) -> Flow<()> {
        let Some(s) = self.session.as_ref() else {
            return Err(ChargerError::State("no active session".into()));
        };
        self.guard
            .check_voltage(profile.voltage_max(), s.measured_voltage, profile)?;
        self.guard
            .gate_current(profile.current_at(soc), s.measured_current, profile)?;
        Ok(())
    }

    /// Read back current and voltage and append a sample.
    fn measure(&mut self) -> Flow<Sample> {
        let current_a = hw(self.psu.read_output_current(), "read_output_current")?;
        let voltage_v = hw(self.psu.read_output_voltage(), "read_output_voltage")?;
        let Some(session) = self.session.as_mut() else {
            return Err(ChargerError::State("no active session".into()));
        };
        session.measured_current = Some(current_a);
        session.measured_voltage = voltage_v;
        let sample = Sample {
            t_ms: self.clock.ms_since(session.epoch),
            voltage_v,
            current_a,
            soc: session.soc,
        };
        tracing::info!(
            t_ms = sample.t_ms,
            soc = sample.soc,
            voltage_v,
            current_a,
            "sample"
        );
        self.telemetry.record(sample);
        Ok(sample)
    }

    /// Sleep `total` in `abort_poll` slices. Returns true if an abort was
    /// requested before or during the wait.
    fn wait(&self, total: Duration) -> bool {
        let slice = self.settings.abort_poll.max(Duration::from_millis(1));
        let mut left = total;
        while !left.is_zero() {
            if self.abort.is_aborted() {
                return true;
            }
            let d = left.min(slice);
            self.clock.sleep(d);
            left -= d;
        }
        self.abort.is_aborted()
    }

    fn remaining_run(&self) -> Option<Duration> {
        let max = self.settings.max_run?;
        let epoch = self.session.as_ref()?.epoch;
        let elapsed = Duration::from_millis(self.clock.ms_since(epoch));
        Some(max.saturating_sub(elapsed))
    }

    fn terminate(&mut self) -> Result<StepStatus> {
        match hw(self.psu.disable_output(), "disable_output") {
            Ok(()) => {
                self.transition(ChargeState::Terminated(TerminationReason::Complete));
                let soc = self.session.as_ref().map(|s| s.soc);
                tracing::info!(?soc, samples = self.telemetry.len(), "charge complete");
                Ok(StepStatus::Complete)
            }
            Err(e) => {
                let e = ChargerError::Hardware(format!("output not disabled after charge: {e}"));
                self.transition(ChargeState::Aborted(e.clone()));
                Err(Report::new(e))
            }
        }
    }

    /// Exit action for every abort: disable output (best-effort), record the
    /// reason.
    fn shutdown(&mut self, e: &ChargerError) {
        if let Err(err) = self.psu.disable_output() {
            tracing::error!(error = %err, "failed to disable output during abort");
        }
        tracing::error!(reason = e.reason_name(), error = %e, "charge aborted");
        self.transition(ChargeState::Aborted(e.clone()));
    }

    fn abort_with(&mut self, e: ChargerError) -> StepStatus {
        self.shutdown(&e);
        StepStatus::Aborted(e)
    }

    fn fail(&mut self, e: ChargerError) -> Report {
        self.shutdown(&e);
        Report::new(e)
    }

    fn summary(&self) -> Result<ChargeSummary> {
        let Some(s) = self.session.as_ref() else {
            return Err(Report::new(ChargerError::State("no session to summarize".into())));
        };
        Ok(ChargeSummary {
            start_soc: s.start_soc,
            final_soc: s.soc,
            ticks: s.ticks,
            samples: self.telemetry.len(),
            elapsed: Duration::from_millis(self.clock.ms_since(s.epoch)),
            last_sample: self.telemetry.last(),
        })
    }

    fn transition(&mut self, next: ChargeState) {
        tracing::debug!(from = self.state.name(), to = next.name(), "state change");
        // A request is consumed by the session it ended or preempted.
        if next.is_final() {
            self.abort.reset();
        }
        self.state = next;
        self.publish();
    }

    fn publish(&self) {
        self.status_handle.publish(self.status());
    }
}

impl<P: PowerSupply> Drop for ChargeController<P> {
    fn drop(&mut self) {
        if self.in_session() {
            if let Err(e) = self.psu.disable_output() {
                tracing::error!(error = %e, "failed to disable output on drop");
            }
        }
    }
}
