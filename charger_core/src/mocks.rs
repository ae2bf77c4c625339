//! Test and helper mocks for charger_core

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use charger_traits::{HwResult, PowerSupply};

/// One call made on a `ScriptedPsu`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PsuCall {
    SetVoltage(f32),
    SetCurrent(f32),
    ReadCurrent,
    ReadVoltage,
    Probe { ceiling: f32, tolerance: f32 },
    EnableOutput,
    DisableOutput,
    Close,
}

/// Operation selector for fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PsuOp {
    SetVoltage,
    SetCurrent,
    ReadCurrent,
    ReadVoltage,
    Probe,
    EnableOutput,
    DisableOutput,
}

/// Shared view of everything a `ScriptedPsu` was asked to do.
#[derive(Debug, Clone, Default)]
pub struct PsuLog {
    calls: Arc<Mutex<Vec<PsuCall>>>,
}

impl PsuLog {
    pub fn calls(&self) -> Vec<PsuCall> {
        self.calls.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn count(&self, f: impl Fn(&PsuCall) -> bool) -> usize {
        self.calls().iter().filter(|c| f(c)).count()
    }

    /// Output state implied by the enable/disable calls so far.
    pub fn output_enabled(&self) -> bool {
        self.calls()
            .iter()
            .rev()
            .find_map(|c| match c {
                PsuCall::EnableOutput => Some(true),
                PsuCall::DisableOutput => Some(false),
                _ => None,
            })
            .unwrap_or(false)
    }

    /// Every current setpoint written, in order.
    pub fn current_setpoints(&self) -> Vec<f32> {
        self.calls()
            .iter()
            .filter_map(|c| match c {
                PsuCall::SetCurrent(a) => Some(*a),
                _ => None,
            })
            .collect()
    }

    fn push(&self, call: PsuCall) {
        if let Ok(mut g) = self.calls.lock() {
            g.push(call);
        }
    }
}

/// A supply that replays scripted measurements. Each queue repeats its last
/// value once exhausted.
#[derive(Debug, Default)]
pub struct ScriptedPsu {
    log: PsuLog,
    probes: VecDeque<f32>,
    currents: VecDeque<f32>,
    voltages: VecDeque<f32>,
    fail: Option<(PsuOp, usize)>,
    seen: Vec<PsuOp>,
}

impl ScriptedPsu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probes(mut self, v: impl IntoIterator<Item = f32>) -> Self {
        self.probes = v.into_iter().collect();
        self
    }

    pub fn currents(mut self, v: impl IntoIterator<Item = f32>) -> Self {
        self.currents = v.into_iter().collect();
        self
    }

    pub fn voltages(mut self, v: impl IntoIterator<Item = f32>) -> Self {
        self.voltages = v.into_iter().collect();
        self
    }

    /// Fail the `nth` (0-based) call of `op` and every one after it.
    pub fn fail_on(mut self, op: PsuOp, nth: usize) -> Self {
        self.fail = Some((op, nth));
        self
    }

    pub fn log(&self) -> PsuLog {
        self.log.clone()
    }

    fn enter(&mut self, op: PsuOp, call: PsuCall) -> HwResult<()> {
        self.log.push(call);
        let n = self.seen.iter().filter(|o| **o == op).count();
        self.seen.push(op);
        match self.fail {
            Some((f, nth)) if f == op && n >= nth => Err(Box::new(std::io::Error::other(format!(
                "scripted {op:?} failure"
            )))),
            _ => Ok(()),
        }
    }

    fn next(q: &mut VecDeque<f32>) -> f32 {
        if q.len() > 1 {
            q.pop_front().unwrap_or_default()
        } else {
            q.front().copied().unwrap_or_default()
        }
    }
}

impl PowerSupply for ScriptedPsu {
    fn set_voltage(&mut self, volts: f32) -> HwResult<()> {
        self.enter(PsuOp::SetVoltage, PsuCall::SetVoltage(volts))
    }

    fn set_current(&mut self, amps: f32) -> HwResult<()> {
        self.enter(PsuOp::SetCurrent, PsuCall::SetCurrent(amps))
    }

    fn read_output_current(&mut self) -> HwResult<f32> {
        self.enter(PsuOp::ReadCurrent, PsuCall::ReadCurrent)?;
        Ok(Self::next(&mut self.currents))
    }

    fn read_output_voltage(&mut self) -> HwResult<f32> {
        self.enter(PsuOp::ReadVoltage, PsuCall::ReadVoltage)?;
        Ok(Self::next(&mut self.voltages))
    }

    fn probe_rest_voltage(&mut self, ceiling: f32, tolerance: f32) -> HwResult<f32> {
        self.enter(PsuOp::Probe, PsuCall::Probe { ceiling, tolerance })?;
        Ok(Self::next(&mut self.probes))
    }

    fn enable_output(&mut self) -> HwResult<()> {
        self.enter(PsuOp::EnableOutput, PsuCall::EnableOutput)
    }

    fn disable_output(&mut self) -> HwResult<()> {
        self.enter(PsuOp::DisableOutput, PsuCall::DisableOutput)
    }

    fn close(&mut self) -> HwResult<()> {
        self.log.push(PsuCall::Close);
        Ok(())
    }
}
