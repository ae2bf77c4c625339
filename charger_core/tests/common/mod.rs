#![allow(dead_code)]

use std::time::Duration;

use charger_config::RawProfile;
use charger_core::mocks::ScriptedPsu;
use charger_core::{BatteryProfile, ChargeController, ChargeControllerBuilder, ChargeSettings};
use charger_traits::clock::test_clock::TestClock;

pub const OCV: [f32; 11] = [3.0, 3.4, 3.5, 3.6, 3.65, 3.7, 3.75, 3.8, 3.9, 4.0, 4.2];

/// 2 Ah cell, 3.0..=4.2 V, 0.5C everywhere, cutoff 0.05C, max 1C.
pub fn raw() -> RawProfile {
    RawProfile {
        capacity_ah: Some(2.0),
        voltage_min: 3.0,
        voltage_max: 4.2,
        soc_ocv: (0u8..=10).map(|i| i * 10).zip(OCV).collect(),
        soc_charge_rate: (0u8..=10).map(|i| (i * 10, 0.5)).collect(),
        c_charge_cutoff: 0.05,
        c_charge_max: 1.0,
        c_charge_min: None,
        table_csv: None,
    }
}

pub fn profile() -> BatteryProfile {
    BatteryProfile::load(&raw()).expect("valid profile")
}

pub fn settings() -> ChargeSettings {
    ChargeSettings {
        tick_base: Duration::from_secs(120),
        probe_tolerance_v: 0.001,
        // One slice per wait keeps the recorded sleeps readable.
        abort_poll: Duration::from_secs(3600),
        max_run: None,
    }
}

pub fn controller(psu: ScriptedPsu, clock: &TestClock) -> ChargeController<ScriptedPsu> {
    ChargeControllerBuilder::new()
        .with_psu(psu)
        .with_profile(profile())
        .with_settings(settings())
        .with_clock(Box::new(clock.clone()))
        .build()
        .expect("controller build")
}
