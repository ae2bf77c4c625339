mod common;

use std::time::Duration;

use charger_core::error::BuildError;
use charger_core::mocks::ScriptedPsu;
use charger_core::{BatteryProfile, ChargeControllerBuilder, ChargeSettings, ConfigError};
use rstest::rstest;

#[rstest]
#[case::zero_tick(ChargeSettings { tick_base: Duration::ZERO, ..common::settings() }, "tick_base")]
#[case::zero_poll(ChargeSettings { abort_poll: Duration::ZERO, ..common::settings() }, "abort_poll")]
#[case::bad_tolerance(ChargeSettings { probe_tolerance_v: f32::NAN, ..common::settings() }, "probe_tolerance_v")]
#[case::zero_max_run(ChargeSettings { max_run: Some(Duration::ZERO), ..common::settings() }, "max_run")]
fn invalid_settings_yield_typed_build_error(#[case] settings: ChargeSettings, #[case] field: &str) {
    let err = ChargeControllerBuilder::new()
        .with_psu(ScriptedPsu::new())
        .with_settings(settings)
        .build()
        .expect_err("settings rejected");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::InvalidConfig(msg)) => assert!(msg.contains(field), "{msg}"),
        other => panic!("expected InvalidConfig, got: {other:?}"),
    }
}

#[rstest]
fn missing_capacity_can_be_supplied_later() {
    let mut raw = common::raw();
    raw.capacity_ah = None;
    assert_eq!(
        BatteryProfile::load(&raw).unwrap_err(),
        ConfigError::MissingCapacity
    );
    let p = BatteryProfile::load(&raw.with_capacity(4.0)).expect("with capacity");
    assert_eq!(p.current_at(50), 2.0);
}

#[rstest]
#[case::flat(20, 3.4, ConfigError::NonMonotonicTable { bucket: 20 })]
#[case::falling(60, 3.6, ConfigError::NonMonotonicTable { bucket: 60 })]
fn non_increasing_ocv_table_is_rejected(
    #[case] bucket: u8,
    #[case] volts: f32,
    #[case] expected: ConfigError,
) {
    let mut raw = common::raw();
    raw.soc_ocv.insert(bucket, volts);
    assert_eq!(BatteryProfile::load(&raw).unwrap_err(), expected);
}

#[rstest]
fn profile_lookup_applies_capacity_override() {
    let profiles = [("li-ion".to_string(), common::raw())].into_iter().collect();
    let p = charger_core::resolve_profile(&profiles, "li-ion", Some(3.0)).expect("resolve");
    assert_eq!(p.capacity_ah(), 3.0);
    assert!(matches!(
        charger_core::resolve_profile(&profiles, "nimh", None),
        Err(ConfigError::UnknownProfile(name)) if name == "nimh"
    ));
}
