use std::fs::{self, File};
use std::io::Write;

use charger_config::{ProfileStore, TomlProfileStore, load_soc_table_csv, load_toml};
use rstest::rstest;
use tempfile::tempdir;

#[rstest]
fn soc_csv_rows_are_sorted_by_bucket() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("table.csv");
    let mut f = File::create(&path).unwrap();
    writeln!(f, "soc,ocv,c_rate").unwrap();
    writeln!(f, "10,3.4,0.5").unwrap();
    writeln!(f, "0,3.0,0.5").unwrap();
    drop(f);

    let rows = load_soc_table_csv(&path).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].soc, 0);
    assert_eq!(rows[1].soc, 10);
    assert!((rows[1].ocv - 3.4).abs() < 1e-6);
}

#[rstest]
fn soc_csv_rejects_wrong_headers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("table.csv");
    fs::write(&path, "soc,voltage,rate\n0,3.0,0.5\n").unwrap();

    let err = load_soc_table_csv(&path).expect_err("should reject headers");
    assert!(
        err.to_string()
            .contains("SOC table CSV must have headers 'soc,ocv,c_rate'")
    );
}

#[rstest]
fn soc_csv_rejects_duplicate_bucket() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("table.csv");
    fs::write(&path, "soc,ocv,c_rate\n0,3.0,0.5\n0,3.1,0.5\n").unwrap();

    let err = load_soc_table_csv(&path).expect_err("should reject duplicate");
    assert!(err.to_string().contains("duplicate SOC bucket 0"), "{err}");
}

#[rstest]
fn soc_csv_reports_bad_row_number() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("table.csv");
    fs::write(&path, "soc,ocv,c_rate\n0,3.0,0.5\n10,abc,0.5\n").unwrap();

    let err = load_soc_table_csv(&path).expect_err("should reject row");
    assert!(err.to_string().contains("invalid CSV row 3"), "{err}");
}

#[rstest]
fn profile_file_resolves_csv_tables_relative_to_itself() {
    let dir = tempdir().unwrap();
    let mut csv = String::from("soc,ocv,c_rate\n");
    for (i, b) in (0..=100).step_by(10).enumerate() {
        csv.push_str(&format!("{b},{:.2},0.5\n", 3.0 + 0.1 * i as f32));
    }
    fs::write(dir.path().join("liion.csv"), csv).unwrap();
    fs::write(
        dir.path().join("batteries.toml"),
        r#"
["Li-Ion"]
Capacity = 2.0
VoltageMin = 3.0
VoltageMax = 4.2
CChargeCutOff = 0.05
CChargeMax = 1.0
table_csv = "liion.csv"
"#,
    )
    .unwrap();

    let profiles = TomlProfileStore::new(dir.path().join("batteries.toml"))
        .load_profiles()
        .unwrap();
    let p = &profiles["Li-Ion"];
    assert_eq!(p.capacity_ah, Some(2.0));
    assert_eq!(p.soc_ocv.len(), 11);
    assert_eq!(p.soc_charge_rate.len(), 11);
    assert!(p.table_csv.is_none());
}

#[rstest]
fn inline_profiles_override_profile_file() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("batteries.toml"),
        r#"
[cell]
VoltageMin = 3.0
VoltageMax = 4.2
SOC_OCV = [3.0, 3.4, 3.5, 3.6, 3.65, 3.7, 3.75, 3.8, 3.9, 4.0, 4.2]
SOC_CR = [0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.3, 0.2, 0.1]
CChargeCutOff = 0.05
CChargeMax = 1.0

[other]
VoltageMin = 2.5
VoltageMax = 3.65
SOC_OCV = [2.5, 3.2, 3.25, 3.28, 3.3, 3.31, 3.32, 3.33, 3.35, 3.4, 3.6]
SOC_CR = [0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5]
CChargeCutOff = 0.05
CChargeMax = 1.0
"#,
    )
    .unwrap();

    let cfg = load_toml(
        r#"
[profiles]
file = "batteries.toml"

[batteries.cell]
capacity_ah = 3.0
voltage_min = 3.0
voltage_max = 4.1
soc_ocv = [3.0, 3.4, 3.5, 3.6, 3.65, 3.7, 3.75, 3.8, 3.9, 4.0, 4.1]
soc_charge_rate = [0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.3, 0.2, 0.1]
c_charge_cutoff = 0.05
c_charge_max = 1.0
"#,
    )
    .unwrap();

    let profiles = cfg.profile_store(dir.path()).load_profiles().unwrap();
    assert_eq!(profiles.len(), 2);
    assert_eq!(profiles["cell"].capacity_ah, Some(3.0));
    assert!((profiles["cell"].voltage_max - 4.1).abs() < 1e-6);
    assert!(profiles["other"].capacity_ah.is_none());
}

#[rstest]
fn missing_profile_file_is_reported_with_path() {
    let dir = tempdir().unwrap();
    let err = TomlProfileStore::new(dir.path().join("nope.toml"))
        .load_profiles()
        .expect_err("missing file");
    assert!(err.to_string().contains("nope.toml"), "{err}");
}
