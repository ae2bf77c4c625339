#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core charge control (hardware-agnostic).
//!
//! This crate provides the hardware-independent charging engine. All supply
//! interactions go through `charger_traits::PowerSupply`, and all timing goes
//! through `charger_traits::Clock`.
//!
//! ## Architecture
//!
//! - **Profile**: validated battery parameters and derived currents (`profile`)
//! - **Safety**: envelope checks gating every setpoint write (`safety`)
//! - **SOC**: open-circuit voltage to SOC bucket (`soc`)
//! - **Controller**: the `Idle → … → Terminated | Aborted` state machine
//!   (`controller`, built through `builder`)
//! - **Telemetry**: append-only samples with live channel fan-out
//!   (`telemetry`)
//!
//! ## Example
//!
//! ```
//! use charger_core::mocks::ScriptedPsu;
//! use charger_core::{ChargeControllerBuilder, ChargeState};
//!
//! let mut ctl = ChargeControllerBuilder::new()
//!     .with_psu(ScriptedPsu::new())
//!     .build()
//!     .unwrap();
//! // No profile selected yet.
//! assert!(ctl.start().is_err());
//! assert_eq!(*ctl.state(), ChargeState::Idle);
//! ```

pub mod builder;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod handle;
pub mod hw_error;
pub mod mocks;
pub mod profile;
pub mod safety;
pub mod session;
pub mod soc;
pub mod status;
pub mod telemetry;

pub use builder::{ChargeControllerBuilder, Missing};
pub use config::ChargeSettings;
pub use controller::{ChargeController, ChargeSummary};
pub use conversions::resolve_profile;
pub use error::{BuildError, ChargerError, ConfigError, Report, Result, SafetyError};
pub use handle::{AbortHandle, StatusHandle};
pub use hw_error::map_hw_error;
pub use profile::BatteryProfile;
pub use safety::SafetyGuard;
pub use soc::SocEstimator;
pub use status::{ChargeState, ChargeStatus, StepStatus, TerminationReason};
pub use telemetry::{Sample, TelemetryRecorder};
