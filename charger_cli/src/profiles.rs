//! `profiles` and `show`: read-only views of the profile store.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use charger_config::{Config, ProfileStore, RawProfile, SOC_BUCKETS};
use charger_core::{BatteryProfile, ChargerError, resolve_profile};
use serde_json::json;

/// Directory relative paths in the config are resolved against.
pub fn base_dir(config_path: &Path) -> &Path {
    match config_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

pub fn load_profiles(cfg: &Config, config_path: &Path) -> eyre::Result<BTreeMap<String, RawProfile>> {
    cfg.profile_store(base_dir(config_path)).load_profiles()
}

/// Look up and validate one profile; failures carry a typed `ChargerError::Config`.
pub fn select(
    profiles: &BTreeMap<String, RawProfile>,
    battery: &str,
    capacity: Option<f32>,
) -> eyre::Result<BatteryProfile> {
    resolve_profile(profiles, battery, capacity)
        .map_err(|e| eyre::Report::new(ChargerError::Config(e)))
}

pub fn render_list(profiles: &BTreeMap<String, RawProfile>, json_mode: bool) -> String {
    if json_mode {
        return json!({ "profiles": profiles.keys().collect::<Vec<_>>() }).to_string();
    }
    if profiles.is_empty() {
        return "no battery profiles configured".to_string();
    }
    profiles.keys().map(String::as_str).collect::<Vec<_>>().join("\n")
}

pub fn render_profile(name: &str, p: &BatteryProfile, json_mode: bool) -> String {
    if json_mode {
        let table: Vec<_> = SOC_BUCKETS
            .iter()
            .map(|&b| {
                json!({
                    "soc": b,
                    "ocv_v": p.ocv_at(b),
                    "c_rate": p.charge_rate_at(b),
                    "current_a": p.current_at(b),
                })
            })
            .collect();
        return json!({
            "battery": name,
            "capacity_ah": p.capacity_ah(),
            "voltage_min": p.voltage_min(),
            "voltage_max": p.voltage_max(),
            "current_cutoff_a": p.current_cutoff(),
            "current_min_a": p.current_min(),
            "current_max_a": p.current_max(),
            "table": table,
        })
        .to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "{name}: {:.2} Ah", p.capacity_ah());
    let _ = writeln!(
        out,
        "voltage window: {:.3} V .. {:.3} V",
        p.voltage_min(),
        p.voltage_max()
    );
    let _ = writeln!(
        out,
        "current: cutoff {:.3} A, min {:.3} A, max {:.3} A",
        p.current_cutoff(),
        p.current_min(),
        p.current_max()
    );
    let _ = writeln!(out, "{:>4}  {:>6}  {:>6}  {:>7}", "soc", "ocv_v", "c_rate", "current");
    for &b in &SOC_BUCKETS {
        let _ = writeln!(
            out,
            "{b:>4}  {:>6.3}  {:>6.2}  {:>7.3}",
            p.ocv_at(b),
            p.charge_rate_at(b),
            p.current_at(b)
        );
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_dir_of_bare_file_name_is_cwd() {
        assert_eq!(base_dir(Path::new("charger.toml")), Path::new("."));
        assert_eq!(base_dir(Path::new("etc/charger.toml")), Path::new("etc"));
    }

    #[test]
    fn empty_store_lists_a_hint() {
        assert_eq!(render_list(&BTreeMap::new(), false), "no battery profiles configured");
        assert_eq!(render_list(&BTreeMap::new(), true), r#"{"profiles":[]}"#);
    }
}
