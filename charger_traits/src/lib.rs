//! Hardware seams shared by the charger crates.
//!
//! The controller in `charger_core` only ever talks to a supply through
//! [`PowerSupply`], and only ever measures time through [`Clock`].

pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Boxed error returned across the hardware boundary.
pub type HwResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// A programmable bench supply with a single output channel.
///
/// All calls are synchronous: a call either completes on the device or
/// returns an error before the next one is issued.
pub trait PowerSupply {
    /// Program the constant-voltage limit in volts.
    fn set_voltage(&mut self, volts: f32) -> HwResult<()>;

    /// Program the constant-current limit in amperes.
    fn set_current(&mut self, amps: f32) -> HwResult<()>;

    /// Measured output current in amperes.
    fn read_output_current(&mut self) -> HwResult<f32>;

    /// Measured output voltage in volts.
    fn read_output_voltage(&mut self) -> HwResult<f32>;

    /// Find the battery's resting (open-circuit) voltage.
    ///
    /// `ceiling` bounds any voltage the probe may apply; `tolerance` is the
    /// resolution the result must settle to.
    fn probe_rest_voltage(&mut self, ceiling: f32, tolerance: f32) -> HwResult<f32>;

    fn enable_output(&mut self) -> HwResult<()>;

    fn disable_output(&mut self) -> HwResult<()>;

    /// Release the device. Further calls are not expected after `close`.
    fn close(&mut self) -> HwResult<()>;
}

impl<P: PowerSupply + ?Sized> PowerSupply for Box<P> {
    fn set_voltage(&mut self, volts: f32) -> HwResult<()> {
        (**self).set_voltage(volts)
    }
    fn set_current(&mut self, amps: f32) -> HwResult<()> {
        (**self).set_current(amps)
    }
    fn read_output_current(&mut self) -> HwResult<f32> {
        (**self).read_output_current()
    }
    fn read_output_voltage(&mut self) -> HwResult<f32> {
        (**self).read_output_voltage()
    }
    fn probe_rest_voltage(&mut self, ceiling: f32, tolerance: f32) -> HwResult<f32> {
        (**self).probe_rest_voltage(ceiling, tolerance)
    }
    fn enable_output(&mut self) -> HwResult<()> {
        (**self).enable_output()
    }
    fn disable_output(&mut self) -> HwResult<()> {
        (**self).disable_output()
    }
    fn close(&mut self) -> HwResult<()> {
        (**self).close()
    }
}
