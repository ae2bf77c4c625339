//! Driver for Korad/Tenma-style single-channel bench supplies (KA3005P and
//! clones) speaking the plain-ASCII serial protocol.
//!
//! Commands carry no terminator; query replies are fixed-width ASCII
//! numbers (`"1.234"` for `IOUT1?`, `"04.20"` for `VOUT1?`).

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

use charger_traits::{HwResult, PowerSupply};

use crate::error::{HwError, Result};
use crate::util::read_exact_with_timeout;

const REPLY_LEN: usize = 5;
const MAX_VOLTS: f32 = 30.0;
const MAX_AMPS: f32 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub struct KoradSettings {
    /// Pause after each setpoint change before measuring.
    pub settle: Duration,
    /// Current limit applied while probing the resting voltage.
    pub probe_current_a: f32,
    pub reply_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for KoradSettings {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(200),
            probe_current_a: 0.01,
            reply_timeout: Duration::from_millis(500),
            poll_interval: Duration::from_millis(2),
        }
    }
}

pub struct KoradPsu<T: Read + Write> {
    port: T,
    settings: KoradSettings,
    v_set: f32,
    i_set: f32,
    output: bool,
    closed: bool,
}

impl KoradPsu<File> {
    /// Open a serial device node. Line settings (9600 8N1) are expected to
    /// be configured on the port already.
    pub fn open(path: &Path, settings: KoradSettings) -> Result<Self> {
        let port = OpenOptions::new().read(true).write(true).open(path)?;
        tracing::info!(port = %path.display(), "opened power supply");
        Ok(Self::new(port, settings))
    }
}

impl<T: Read + Write> KoradPsu<T> {
    pub fn new(port: T, settings: KoradSettings) -> Self {
        Self {
            port,
            settings,
            v_set: 0.0,
            i_set: 0.0,
            output: false,
            closed: false,
        }
    }

    pub fn into_inner(self) -> T {
        self.port
    }

    fn send(&mut self, cmd: &str) -> Result<()> {
        if self.closed {
            return Err(HwError::Closed);
        }
        tracing::trace!(cmd, "korad >");
        self.port.write_all(cmd.as_bytes())?;
        self.port.flush()?;
        Ok(())
    }

    fn query(&mut self, cmd: &'static str) -> Result<f32> {
        self.send(cmd)?;
        let mut buf = [0u8; REPLY_LEN];
        read_exact_with_timeout(
            &mut self.port,
            &mut buf,
            self.settings.reply_timeout,
            self.settings.poll_interval,
        )?;
        let reply = String::from_utf8_lossy(&buf).into_owned();
        tracing::trace!(cmd, %reply, "korad <");
        reply
            .trim_matches(|c: char| c.is_whitespace() || c == '\0')
            .parse()
            .map_err(|_| HwError::Protocol { command: cmd, reply })
    }

    fn vset(&mut self, volts: f32) -> Result<()> {
        if !(0.0..=MAX_VOLTS).contains(&volts) {
            return Err(HwError::Setpoint {
                value: volts,
                limit: MAX_VOLTS,
            });
        }
        self.send(&format!("VSET1:{volts:05.2}"))?;
        self.v_set = volts;
        Ok(())
    }

    fn iset(&mut self, amps: f32) -> Result<()> {
        if !(0.0..=MAX_AMPS).contains(&amps) {
            return Err(HwError::Setpoint {
                value: amps,
                limit: MAX_AMPS,
            });
        }
        self.send(&format!("ISET1:{amps:.3}"))?;
        self.i_set = amps;
        Ok(())
    }

    fn output(&mut self, on: bool) -> Result<()> {
        self.send(if on { "OUT1" } else { "OUT0" })?;
        self.output = on;
        Ok(())
    }

    fn settle(&self) {
        if !self.settings.settle.is_zero() {
            std::thread::sleep(self.settings.settle);
        }
    }

    /// Binary-search the voltage setpoint at which the battery starts to
    /// draw current. Setpoints and output state are restored afterwards.
    fn probe(&mut self, ceiling: f32, tolerance: f32) -> Result<f32> {
        let saved = (self.v_set, self.i_set, self.output);
        let threshold = self.settings.probe_current_a / 2.0;
        let tolerance = tolerance.max(0.001);

        self.iset(self.settings.probe_current_a)?;
        self.vset(0.0)?;
        self.output(true)?;

        let (mut lo, mut hi) = (0.0f32, ceiling);
        let mut steps = 0u32;
        while hi - lo > tolerance {
            let mid = (lo + hi) / 2.0;
            self.vset(mid)?;
            self.settle();
            if self.query("IOUT1?")? > threshold {
                hi = mid;
            } else {
                lo = mid;
            }
            steps += 1;
        }
        tracing::debug!(lo, hi, steps, "probe converged");

        self.output(false)?;
        self.iset(saved.1)?;
        self.vset(saved.0)?;
        if saved.2 {
            self.output(true)?;
        }
        Ok((lo + hi) / 2.0)
    }
}

impl<T: Read + Write> PowerSupply for KoradPsu<T> {
    fn set_voltage(&mut self, volts: f32) -> HwResult<()> {
        self.vset(volts)?;
        self.settle();
        Ok(())
    }

    fn set_current(&mut self, amps: f32) -> HwResult<()> {
        self.iset(amps)?;
        self.settle();
        Ok(())
    }

    fn read_output_current(&mut self) -> HwResult<f32> {
        Ok(self.query("IOUT1?")?)
    }

    fn read_output_voltage(&mut self) -> HwResult<f32> {
        Ok(self.query("VOUT1?")?)
    }

    fn probe_rest_voltage(&mut self, ceiling: f32, tolerance: f32) -> HwResult<f32> {
        Ok(self.probe(ceiling, tolerance)?)
    }

    fn enable_output(&mut self) -> HwResult<()> {
        self.output(true)?;
        self.settle();
        Ok(())
    }

    fn disable_output(&mut self) -> HwResult<()> {
        Ok(self.output(false)?)
    }

    fn close(&mut self) -> HwResult<()> {
        if self.closed {
            return Ok(());
        }
        if self.output {
            self.output(false)?;
        }
        self.closed = true;
        tracing::info!("power supply closed");
        Ok(())
    }
}
