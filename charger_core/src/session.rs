use std::time::Instant;

/// Mutable per-session state owned by the controller.
#[derive(Debug, Clone)]
pub struct ChargeSession {
    /// SOC bucket estimated during setup.
    pub start_soc: u8,
    /// Current SOC bucket; only ever increases within a session.
    pub soc: u8,
    /// Last resting-voltage probe result.
    pub battery_voltage: f32,
    /// Last measured output voltage (the probe result before output is on).
    pub measured_voltage: f32,
    /// Last measured output current; `None` until output is enabled and read.
    pub measured_current: Option<f32>,
    /// Monotonic start of the session, the zero point of sample timestamps.
    pub epoch: Instant,
    pub ticks: u64,
}

impl ChargeSession {
    pub fn new(battery_voltage: f32, soc: u8, epoch: Instant) -> Self {
        Self {
            start_soc: soc,
            soc,
            battery_voltage,
            measured_voltage: battery_voltage,
            measured_current: None,
            epoch,
            ticks: 0,
        }
    }

    /// Raise SOC to `soc`; lower values are ignored.
    pub fn raise_soc(&mut self, soc: u8) -> bool {
        if soc > self.soc {
            self.soc = soc;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soc_only_rises() {
        let mut s = ChargeSession::new(3.5, 10, Instant::now());
        assert!(s.raise_soc(30));
        assert!(!s.raise_soc(20));
        assert_eq!((s.start_soc, s.soc), (10, 30));
    }
}
