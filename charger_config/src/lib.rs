#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas, battery profile storage and SOC table parsing for the charger.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - `RawProfile` is the unvalidated, as-stored form of one battery; the core
//!   turns it into a `BatteryProfile` with derived currents.
//! - SOC tables may live inline (array or keyed table) or in a CSV file with
//!   strict `soc,ocv,c_rate` headers.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::{self, Deserializer};

/// SOC buckets in ascending order: 0, 10, ..., 100.
pub const SOC_BUCKETS: [u8; 11] = [0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100];

/// SOC table CSV schema.
///
/// Expected headers:
/// soc,ocv,c_rate
///
/// Example:
/// soc,ocv,c_rate
/// 0,3.00,0.5
/// 10,3.40,0.5
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct SocRow {
    pub soc: u8,
    pub ocv: f32,
    pub c_rate: f32,
}

/// One battery as stored in configuration, before validation.
///
/// Field aliases accept the key names used by older parameter files.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RawProfile {
    /// Rated capacity in ampere-hours. May be left unset in shared files.
    #[serde(default, alias = "Capacity")]
    pub capacity_ah: Option<f32>,
    #[serde(alias = "VoltageMin")]
    pub voltage_min: f32,
    #[serde(alias = "VoltageMax")]
    pub voltage_max: f32,
    /// SOC bucket -> open-circuit voltage.
    #[serde(default, alias = "SOC_OCV", deserialize_with = "de_soc_table")]
    pub soc_ocv: BTreeMap<u8, f32>,
    /// SOC bucket -> charge C-rate.
    #[serde(default, alias = "SOC_CR", deserialize_with = "de_soc_table")]
    pub soc_charge_rate: BTreeMap<u8, f32>,
    #[serde(alias = "CChargeCutOff")]
    pub c_charge_cutoff: f32,
    #[serde(alias = "CChargeMax")]
    pub c_charge_max: f32,
    #[serde(default, alias = "CChargeMin")]
    pub c_charge_min: Option<f32>,
    /// Optional CSV holding both SOC tables; replaces the inline tables.
    #[serde(default)]
    pub table_csv: Option<PathBuf>,
}

impl RawProfile {
    /// Return a copy with the capacity filled in (operator override).
    pub fn with_capacity(mut self, capacity_ah: f32) -> Self {
        self.capacity_ah = Some(capacity_ah);
        self
    }

    /// Load `table_csv` (if any) relative to `base_dir` into the inline tables.
    pub fn resolve_tables(&mut self, base_dir: &Path) -> eyre::Result<()> {
        let Some(rel) = self.table_csv.take() else {
            return Ok(());
        };
        let path = if rel.is_absolute() {
            rel
        } else {
            base_dir.join(rel)
        };
        let rows = load_soc_table_csv(&path)?;
        self.soc_ocv = rows.iter().map(|r| (r.soc, r.ocv)).collect();
        self.soc_charge_rate = rows.iter().map(|r| (r.soc, r.c_rate)).collect();
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SocTableToml {
    Array(Vec<f32>),
    Table(BTreeMap<String, f32>),
}

/// Accepts either an 11-element array (index = bucket / 10) or a table keyed
/// by bucket: `{ 0 = 3.0, 10 = 3.4, ... }`.
fn de_soc_table<'de, D>(deserializer: D) -> Result<BTreeMap<u8, f32>, D::Error>
where
    D: Deserializer<'de>,
{
    let mut out = BTreeMap::new();
    match SocTableToml::deserialize(deserializer)? {
        SocTableToml::Array(values) => {
            if values.len() != SOC_BUCKETS.len() {
                return Err(de::Error::custom(format!(
                    "SOC table array must have {} entries (0..=100 step 10), got {}",
                    SOC_BUCKETS.len(),
                    values.len()
                )));
            }
            for (bucket, v) in SOC_BUCKETS.iter().zip(values) {
                out.insert(*bucket, v);
            }
        }
        SocTableToml::Table(entries) => {
            for (key, v) in entries {
                let bucket: u8 = key.trim().parse().map_err(|_| {
                    de::Error::custom(format!("SOC table key '{key}' is not a bucket number"))
                })?;
                out.insert(bucket, v);
            }
        }
    }
    Ok(out)
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PsuBackend {
    #[default]
    Sim,
    Korad,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PsuCfg {
    pub backend: PsuBackend,
    /// Serial device path for hardware backends.
    pub port: Option<PathBuf>,
    /// Wait after each setpoint change before measuring (ms).
    pub settle_ms: u64,
    /// Current limit used while probing the resting voltage (A).
    pub probe_current_a: f32,
}

impl Default for PsuCfg {
    fn default() -> Self {
        Self {
            backend: PsuBackend::Sim,
            port: None,
            settle_ms: 200,
            probe_current_a: 0.01,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ChargeCfg {
    /// Tick interval at 1C; the actual interval is `tick_base_ms / c_rate`.
    pub tick_base_ms: u64,
    /// Resolution of the resting-voltage probe (V).
    pub probe_tolerance_v: f32,
    /// Granularity at which an abort request can preempt the tick wait.
    pub abort_poll_ms: u64,
    /// Hard cap on one charge session in seconds (0 disables).
    pub max_run_s: u64,
}

impl Default for ChargeCfg {
    fn default() -> Self {
        Self {
            tick_base_ms: 120_000,
            probe_tolerance_v: 0.001,
            abort_poll_ms: 250,
            max_run_s: 0,
        }
    }
}

/// Battery model used by the simulated supply.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimCfg {
    pub capacity_ah: f32,
    /// Starting state of charge as a fraction (0.0..=1.0).
    pub initial_soc: f32,
    pub ocv_empty_v: f32,
    pub ocv_full_v: f32,
    pub internal_resistance_ohm: f32,
    /// Simulated time that passes per output-current reading (s).
    pub step_s: f32,
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            capacity_ah: 2.0,
            initial_soc: 0.2,
            ocv_empty_v: 3.0,
            ocv_full_v: 4.2,
            internal_resistance_ohm: 0.1,
            step_s: 120.0,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ProfilesCfg {
    /// TOML file whose top-level tables are battery profiles keyed by name.
    pub file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub psu: PsuCfg,
    #[serde(default)]
    pub charge: ChargeCfg,
    #[serde(default)]
    pub sim: SimCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub profiles: ProfilesCfg,
    /// Inline profiles; these win over same-named entries from `profiles.file`.
    #[serde(default)]
    pub batteries: BTreeMap<String, RawProfile>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Source of named battery profiles.
pub trait ProfileStore {
    fn load_profiles(&self) -> eyre::Result<BTreeMap<String, RawProfile>>;
}

/// Profiles stored as top-level tables of a TOML file:
///
/// ```toml
/// ["Li-Ion"]
/// Capacity = 2.0
/// VoltageMin = 3.0
/// ...
/// ```
#[derive(Debug, Clone)]
pub struct TomlProfileStore {
    path: PathBuf,
}

impl TomlProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn parse_profiles(s: &str) -> Result<BTreeMap<String, RawProfile>, toml::de::Error> {
    toml::from_str::<BTreeMap<String, RawProfile>>(s)
}

impl ProfileStore for TomlProfileStore {
    fn load_profiles(&self) -> eyre::Result<BTreeMap<String, RawProfile>> {
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| eyre::eyre!("read profile file {:?}: {}", self.path, e))?;
        let mut profiles = parse_profiles(&text)
            .map_err(|e| eyre::eyre!("parse profile file {:?}: {}", self.path, e))?;
        let base = self.path.parent().unwrap_or_else(|| Path::new("."));
        for (name, p) in &mut profiles {
            p.resolve_tables(base)
                .map_err(|e| eyre::eyre!("profile '{name}': {e}"))?;
        }
        Ok(profiles)
    }
}

/// Resolved view over a `Config`: the external profile file (if any) overlaid
/// with the inline `[batteries.*]` tables.
pub struct ConfigProfiles<'a> {
    cfg: &'a Config,
    base_dir: PathBuf,
}

impl Config {
    /// Profile store rooted at `base_dir` (normally the config file's directory).
    pub fn profile_store(&self, base_dir: impl Into<PathBuf>) -> ConfigProfiles<'_> {
        ConfigProfiles {
            cfg: self,
            base_dir: base_dir.into(),
        }
    }
}

impl ProfileStore for ConfigProfiles<'_> {
    fn load_profiles(&self) -> eyre::Result<BTreeMap<String, RawProfile>> {
        let mut out = match &self.cfg.profiles.file {
            Some(rel) => {
                let path = if rel.is_absolute() {
                    rel.clone()
                } else {
                    self.base_dir.join(rel)
                };
                TomlProfileStore::new(path).load_profiles()?
            }
            None => BTreeMap::new(),
        };
        for (name, raw) in &self.cfg.batteries {
            let mut p = raw.clone();
            p.resolve_tables(&self.base_dir)
                .map_err(|e| eyre::eyre!("profile '{name}': {e}"))?;
            if out.insert(name.clone(), p).is_some() {
                tracing::debug!(profile = %name, "inline profile overrides profile file entry");
            }
        }
        Ok(out)
    }
}

pub fn load_soc_table_csv(path: &Path) -> eyre::Result<Vec<SocRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open SOC table CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["soc", "ocv", "c_rate"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "SOC table CSV must have headers 'soc,ocv,c_rate', got: {}",
            actual.join(",")
        );
    }

    let mut rows: Vec<SocRow> = Vec::with_capacity(SOC_BUCKETS.len());
    for (idx, rec) in rdr.deserialize::<SocRow>().enumerate() {
        match rec {
            Ok(row) => {
                if rows.iter().any(|r| r.soc == row.soc) {
                    eyre::bail!("duplicate SOC bucket {} at CSV row {}", row.soc, idx + 2);
                }
                rows.push(row);
            }
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }
    rows.sort_by_key(|r| r.soc);
    Ok(rows)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // PSU
        if self.psu.backend != PsuBackend::Sim && self.psu.port.is_none() {
            eyre::bail!("psu.port is required for hardware backends");
        }
        if !(self.psu.probe_current_a > 0.0 && self.psu.probe_current_a.is_finite()) {
            eyre::bail!("psu.probe_current_a must be > 0");
        }
        if self.psu.settle_ms > 60_000 {
            eyre::bail!("psu.settle_ms is unreasonably large (>60s)");
        }

        // Charge loop
        if self.charge.tick_base_ms == 0 {
            eyre::bail!("charge.tick_base_ms must be >= 1");
        }
        if !(self.charge.probe_tolerance_v > 0.0 && self.charge.probe_tolerance_v <= 0.1) {
            eyre::bail!("charge.probe_tolerance_v must be in (0.0, 0.1]");
        }
        if self.charge.abort_poll_ms == 0 {
            eyre::bail!("charge.abort_poll_ms must be >= 1");
        }
        if self.charge.max_run_s > 7 * 24 * 60 * 60 {
            eyre::bail!("charge.max_run_s is unreasonably large (>7 days)");
        }

        // Simulator
        if !(self.sim.capacity_ah > 0.0) {
            eyre::bail!("sim.capacity_ah must be > 0");
        }
        if !(0.0..=1.0).contains(&self.sim.initial_soc) {
            eyre::bail!("sim.initial_soc must be in [0.0, 1.0]");
        }
        if !(self.sim.ocv_empty_v < self.sim.ocv_full_v) {
            eyre::bail!("sim.ocv_empty_v must be < sim.ocv_full_v");
        }
        if !(self.sim.internal_resistance_ohm > 0.0) {
            eyre::bail!("sim.internal_resistance_ohm must be > 0");
        }
        if !(self.sim.step_s > 0.0) {
            eyre::bail!("sim.step_s must be > 0");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soc_table_accepts_array_and_keyed_forms() {
        let text = r#"
voltage_min = 3.0
voltage_max = 4.2
soc_ocv = [3.0, 3.4, 3.5, 3.6, 3.65, 3.7, 3.75, 3.8, 3.9, 4.0, 4.2]
soc_charge_rate = { 0 = 0.5, 10 = 0.5, 20 = 0.5, 30 = 0.5, 40 = 0.5, 50 = 0.5, 60 = 0.5, 70 = 0.5, 80 = 0.3, 90 = 0.2, 100 = 0.1 }
c_charge_cutoff = 0.05
c_charge_max = 1.0
"#;
        let p: RawProfile = toml::from_str(text).expect("parse profile");
        assert_eq!(p.soc_ocv.len(), 11);
        assert_eq!(p.soc_ocv[&10], 3.4);
        assert_eq!(p.soc_charge_rate[&100], 0.1);
        assert!(p.capacity_ah.is_none());
    }

    #[test]
    fn short_soc_array_is_rejected() {
        let text = r#"
voltage_min = 3.0
voltage_max = 4.2
soc_ocv = [3.0, 3.4]
c_charge_cutoff = 0.05
c_charge_max = 1.0
"#;
        let err = toml::from_str::<RawProfile>(text).expect_err("should reject");
        assert!(err.to_string().contains("11 entries"), "{err}");
    }
}
