//! Power supply backends for the charger.
//!
//! - [`SimulatedPsu`]: a supply wired to a battery model, for dry runs and tests.
//! - [`KoradPsu`]: serial driver for Korad-protocol bench supplies.

pub mod error;
pub mod korad;
pub mod sim;
pub mod util;

pub use error::HwError;
pub use korad::{KoradPsu, KoradSettings};
pub use sim::{SimBattery, SimulatedPsu};
