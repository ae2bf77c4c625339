use charger_config::{PsuBackend, load_toml};
use rstest::rstest;

#[test]
fn empty_config_uses_defaults_and_validates() {
    let cfg = load_toml("").expect("parse TOML");
    cfg.validate().expect("defaults should be valid");
    assert_eq!(cfg.psu.backend, PsuBackend::Sim);
    assert_eq!(cfg.charge.tick_base_ms, 120_000);
    assert!((cfg.charge.probe_tolerance_v - 0.001).abs() < 1e-9);
    assert_eq!(cfg.charge.max_run_s, 0);
}

#[test]
fn hardware_backend_requires_port() {
    let toml = r#"
[psu]
backend = "korad"
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should require port");
    assert!(format!("{err}").contains("psu.port is required"));
}

#[test]
fn unknown_backend_is_a_parse_error() {
    let toml = r#"
[psu]
backend = "rigol"
"#;
    assert!(load_toml(toml).is_err());
}

#[rstest]
#[case("[charge]\ntick_base_ms = 0\n", "tick_base_ms must be >= 1")]
#[case("[charge]\nprobe_tolerance_v = 0.0\n", "probe_tolerance_v must be in")]
#[case("[charge]\nabort_poll_ms = 0\n", "abort_poll_ms must be >= 1")]
#[case("[sim]\ninitial_soc = 1.5\n", "initial_soc must be in")]
#[case("[sim]\nocv_empty_v = 4.2\nocv_full_v = 3.0\n", "ocv_empty_v must be <")]
#[case("[psu]\nprobe_current_a = -1.0\n", "probe_current_a must be > 0")]
#[case("[logging]\nrotation = \"weekly\"\n", "logging.rotation must be one of")]
fn rejects_out_of_range_values(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(format!("{err}").contains(needle), "{err} does not contain {needle}");
}

#[test]
fn accepts_full_config() {
    let toml = r#"
[psu]
backend = "korad"
port = "/dev/ttyACM0"
settle_ms = 300

[charge]
tick_base_ms = 60000
probe_tolerance_v = 0.002
abort_poll_ms = 100
max_run_s = 36000

[logging]
level = "debug"
rotation = "daily"

[batteries.cell]
Capacity = 2.0
VoltageMin = 3.0
VoltageMax = 4.2
SOC_OCV = { 0 = 3.0, 10 = 3.4, 20 = 3.5, 30 = 3.6, 40 = 3.65, 50 = 3.7, 60 = 3.75, 70 = 3.8, 80 = 3.9, 90 = 4.0, 100 = 4.2 }
SOC_CR = [0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.3, 0.2, 0.1]
CChargeCutOff = 0.05
CChargeMax = 1.0
CChargeMin = 0.02
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    let cell = &cfg.batteries["cell"];
    assert_eq!(cell.c_charge_min, Some(0.02));
    assert_eq!(cell.soc_ocv[&100], 4.2);
}
