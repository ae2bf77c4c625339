//! Simulated bench supply wired to a simple battery model.
//!
//! The cell is an ideal open-circuit voltage source (linear in SOC) behind a
//! series resistance. With output enabled the supply runs constant-current
//! until the terminal voltage reaches the voltage setpoint, then tapers.
//! Charge is integrated once per current reading, `step_s` seconds at a
//! time, so a run is deterministic regardless of wall-clock pacing.

use charger_traits::{HwResult, PowerSupply};

use crate::error::HwError;

/// Battery model parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SimBattery {
    pub capacity_ah: f32,
    /// Initial state of charge, 0.0..=1.0.
    pub soc: f32,
    pub ocv_empty_v: f32,
    pub ocv_full_v: f32,
    pub internal_resistance_ohm: f32,
}

impl Default for SimBattery {
    fn default() -> Self {
        Self {
            capacity_ah: 2.0,
            soc: 0.2,
            ocv_empty_v: 3.0,
            ocv_full_v: 4.2,
            internal_resistance_ohm: 0.1,
        }
    }
}

impl SimBattery {
    pub fn ocv(&self) -> f32 {
        self.ocv_empty_v + (self.ocv_full_v - self.ocv_empty_v) * self.soc.clamp(0.0, 1.0)
    }
}

/// Simulated supply implementation
#[derive(Debug)]
pub struct SimulatedPsu {
    battery: SimBattery,
    step_s: f32,
    v_set: f32,
    i_set: f32,
    output: bool,
    closed: bool,
    reads_left: Option<u32>,
}

impl SimulatedPsu {
    pub fn new(battery: SimBattery, step_s: f32) -> Self {
        Self {
            battery,
            step_s: step_s.max(0.0),
            v_set: 0.0,
            i_set: 0.0,
            output: false,
            closed: false,
            reads_left: None,
        }
    }

    /// Make every current reading after the first `n` time out.
    pub fn fail_reads_after(mut self, n: u32) -> Self {
        self.reads_left = Some(n);
        self
    }

    pub fn battery(&self) -> &SimBattery {
        &self.battery
    }

    pub fn output_enabled(&self) -> bool {
        self.output
    }

    /// Current the supply would deliver right now.
    fn flow(&self) -> f32 {
        if !self.output {
            return 0.0;
        }
        let r = self.battery.internal_resistance_ohm.max(1e-6);
        ((self.v_set - self.battery.ocv()) / r).clamp(0.0, self.i_set.max(0.0))
    }

    fn live(&self) -> Result<(), HwError> {
        if self.closed {
            Err(HwError::Closed)
        } else {
            Ok(())
        }
    }
}

impl PowerSupply for SimulatedPsu {
    fn set_voltage(&mut self, volts: f32) -> HwResult<()> {
        self.live()?;
        self.v_set = volts;
        tracing::debug!(volts, "sim VSET");
        Ok(())
    }

    fn set_current(&mut self, amps: f32) -> HwResult<()> {
        self.live()?;
        self.i_set = amps;
        tracing::debug!(amps, "sim ISET");
        Ok(())
    }

    fn read_output_current(&mut self) -> HwResult<f32> {
        self.live()?;
        if let Some(left) = self.reads_left.as_mut() {
            if *left == 0 {
                return Err(Box::new(HwError::Timeout));
            }
            *left -= 1;
        }
        let i = self.flow();
        let cap = self.battery.capacity_ah.max(1e-6);
        self.battery.soc = (self.battery.soc + i * self.step_s / 3600.0 / cap).min(1.0);
        Ok(i)
    }

    fn read_output_voltage(&mut self) -> HwResult<f32> {
        self.live()?;
        if !self.output {
            return Ok(0.0);
        }
        // Never above the voltage setpoint, whatever the float rounding.
        let v = self.battery.ocv() + self.flow() * self.battery.internal_resistance_ohm;
        Ok(v.min(self.v_set.max(self.battery.ocv())))
    }

    fn probe_rest_voltage(&mut self, ceiling: f32, tolerance: f32) -> HwResult<f32> {
        self.live()?;
        let v = self.battery.ocv().min(ceiling);
        if tolerance > 0.0 {
            Ok(((v / tolerance).floor() * tolerance).min(ceiling))
        } else {
            Ok(v)
        }
    }

    fn enable_output(&mut self) -> HwResult<()> {
        self.live()?;
        self.output = true;
        Ok(())
    }

    fn disable_output(&mut self) -> HwResult<()> {
        self.live()?;
        self.output = false;
        Ok(())
    }

    fn close(&mut self) -> HwResult<()> {
        self.output = false;
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn psu(soc: f32) -> SimulatedPsu {
        SimulatedPsu::new(
            SimBattery {
                soc,
                ..SimBattery::default()
            },
            120.0,
        )
    }

    #[test]
    fn constant_current_until_voltage_limit() {
        let mut p = psu(0.2);
        p.set_current(1.0).unwrap();
        p.set_voltage(4.2).unwrap();
        assert_eq!(p.read_output_current().unwrap(), 0.0, "output still off");
        p.enable_output().unwrap();
        assert_eq!(p.read_output_current().unwrap(), 1.0);
        let v = p.read_output_voltage().unwrap();
        assert!(v <= 4.2 && v > p.battery().ocv());
    }

    #[test]
    fn charging_raises_soc_and_tapers_current() {
        let mut p = psu(0.2);
        p.set_current(1.0).unwrap();
        p.set_voltage(4.2).unwrap();
        p.enable_output().unwrap();
        let mut last = f32::MAX;
        for _ in 0..200 {
            let i = p.read_output_current().unwrap();
            assert!(i <= last + 1e-6);
            last = i;
        }
        assert!(p.battery().soc > 0.99);
        assert!(last < 0.1);
    }

    #[test]
    fn probe_reports_ocv_bounded_by_ceiling() {
        let mut p = psu(0.5);
        let v = p.probe_rest_voltage(4.2, 0.001).unwrap();
        assert!((v - 3.6).abs() < 0.002);
        assert!(p.probe_rest_voltage(3.2, 0.001).unwrap() <= 3.2);
    }

    #[test]
    fn injected_read_fault_is_a_timeout() {
        let mut p = psu(0.5).fail_reads_after(1);
        assert!(p.read_output_current().is_ok());
        let err = p.read_output_current().unwrap_err();
        assert!(matches!(err.downcast_ref::<HwError>(), Some(HwError::Timeout)));
    }

    #[test]
    fn closed_supply_rejects_calls() {
        let mut p = psu(0.5);
        p.close().unwrap();
        let err = p.enable_output().unwrap_err();
        assert!(matches!(err.downcast_ref::<HwError>(), Some(HwError::Closed)));
    }
}
