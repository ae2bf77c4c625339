//! Supply assembly, the charge run and the telemetry CSV stream.

use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use charger_config::{Config, PsuBackend};
use charger_core::{
    AbortHandle, BatteryProfile, ChargeControllerBuilder, ChargeSettings, ChargeSummary,
    ChargerError, Report, Sample, map_hw_error,
};
use charger_hardware::{KoradPsu, KoradSettings, SimBattery, SimulatedPsu};
use charger_traits::PowerSupply;
use crossbeam_channel::Receiver;
use eyre::WrapErr;
use serde_json::json;

fn hw_report(e: &(dyn std::error::Error + 'static)) -> Report {
    Report::new(map_hw_error(e))
}

/// Build the supply selected by `[psu]`.
///
/// Test hooks for the simulator: `CHARGER_TEST_SIM_STEP_S` overrides the
/// simulated time per reading, `CHARGER_TEST_SIM_FAIL_READS=N` makes every
/// current reading after the first N time out.
pub fn make_psu(cfg: &Config) -> eyre::Result<Box<dyn PowerSupply>> {
    match cfg.psu.backend {
        PsuBackend::Sim => {
            let battery = SimBattery {
                capacity_ah: cfg.sim.capacity_ah,
                soc: cfg.sim.initial_soc,
                ocv_empty_v: cfg.sim.ocv_empty_v,
                ocv_full_v: cfg.sim.ocv_full_v,
                internal_resistance_ohm: cfg.sim.internal_resistance_ohm,
            };
            let step_s = std::env::var("CHARGER_TEST_SIM_STEP_S")
                .ok()
                .and_then(|s| s.parse::<f32>().ok())
                .unwrap_or(cfg.sim.step_s);
            let mut psu = SimulatedPsu::new(battery, step_s);
            if let Some(n) = std::env::var("CHARGER_TEST_SIM_FAIL_READS")
                .ok()
                .and_then(|s| s.parse::<u32>().ok())
            {
                psu = psu.fail_reads_after(n);
            }
            tracing::info!(soc = cfg.sim.initial_soc, step_s, "using simulated supply");
            Ok(Box::new(psu))
        }
        PsuBackend::Korad => {
            let port = cfg
                .psu
                .port
                .as_deref()
                .ok_or_else(|| eyre::eyre!("psu.port is required for hardware backends"))?;
            let settings = KoradSettings {
                settle: Duration::from_millis(cfg.psu.settle_ms),
                probe_current_a: cfg.psu.probe_current_a,
                ..KoradSettings::default()
            };
            let psu = KoradPsu::open(port, settings).map_err(|e| hw_report(&e))?;
            Ok(Box::new(psu))
        }
    }
}

/// Open the supply, make sure the output is off and read it back.
pub fn self_check(cfg: &Config) -> eyre::Result<f32> {
    let mut psu = make_psu(cfg)?;
    psu.disable_output().map_err(|e| hw_report(&*e))?;
    let v = psu.read_output_voltage().map_err(|e| hw_report(&*e))?;
    psu.close().map_err(|e| hw_report(&*e))?;
    tracing::info!(voltage_v = v, "self-check ok");
    Ok(v)
}

pub struct ChargeRequest<'a> {
    pub battery: &'a str,
    pub profile: BatteryProfile,
    pub settings: ChargeSettings,
    pub telemetry: Option<PathBuf>,
}

/// Run one charge session to completion.
///
/// Ctrl-C requests an abort; the controller turns it into `Cancelled` at the
/// next wait slice. In JSON mode one summary line is printed whether the
/// session completed or not.
pub fn run_charge(
    psu: Box<dyn PowerSupply>,
    req: ChargeRequest<'_>,
    json_mode: bool,
) -> eyre::Result<ChargeSummary> {
    let abort = AbortHandle::new();
    install_ctrlc(abort.clone());

    let capacity_ah = req.profile.capacity_ah();
    let mut controller = ChargeControllerBuilder::new()
        .with_psu(psu)
        .with_profile(req.profile)
        .with_settings(req.settings)
        .with_abort_handle(abort)
        .build()?;

    let writer = match req.telemetry {
        Some(path) => Some(spawn_csv_writer(path, controller.subscribe_telemetry())?),
        None => None,
    };

    let started = std::time::Instant::now();
    tracing::info!(battery = req.battery, capacity_ah, "charge start");
    let result = controller.start();
    let status = controller.status();

    if let Err(e) = controller.close() {
        tracing::warn!(error = %e, "failed to close power supply");
    }
    // Dropping the controller disconnects the telemetry channel.
    drop(controller);
    let written = match writer {
        Some(handle) => Some(join_writer(handle)?),
        None => None,
    };
    if let Some(rows) = written {
        tracing::info!(rows, "telemetry written");
    }

    if json_mode {
        let abort_reason = result.as_ref().err().map(|e| {
            e.downcast_ref::<ChargerError>()
                .map_or("Error", ChargerError::reason_name)
        });
        let summary = result.as_ref().ok();
        let last = summary
            .and_then(|s| s.last_sample)
            .or(status.last_sample);
        let line = json!({
            "timestamp": unix_ms(),
            "battery": req.battery,
            "capacity_ah": capacity_ah,
            "start_soc": summary.map(|s| s.start_soc),
            "final_soc": summary.map(|s| s.final_soc).or(status.soc),
            "ticks": summary.map(|s| s.ticks),
            "samples": summary.map(|s| s.samples),
            "duration_ms": u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "final_voltage_v": last.map(|s| s.voltage_v),
            "final_current_a": last.map(|s| s.current_a),
            "abort_reason": abort_reason,
        });
        println!("{line}");
    }
    result
}

fn install_ctrlc(abort: AbortHandle) {
    if let Err(e) = ctrlc::set_handler(move || {
        if !abort.is_aborted() {
            tracing::warn!("interrupt received; stopping charge");
        }
        abort.abort();
    }) {
        tracing::warn!(error = %e, "failed to install Ctrl-C handler; interrupt will not disable output");
    }
}

fn unix_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

fn spawn_csv_writer(
    path: PathBuf,
    rx: Receiver<Sample>,
) -> eyre::Result<JoinHandle<eyre::Result<usize>>> {
    // Create the file up front so a bad path fails before the charge starts.
    let wtr = csv::Writer::from_path(&path)
        .wrap_err_with(|| format!("create telemetry file {}", path.display()))?;
    std::thread::Builder::new()
        .name("telemetry-csv".into())
        .spawn(move || write_samples(wtr, &path, &rx))
        .wrap_err("spawn telemetry writer")
}

fn write_samples(
    mut wtr: csv::Writer<std::fs::File>,
    path: &Path,
    rx: &Receiver<Sample>,
) -> eyre::Result<usize> {
    wtr.write_record(["t_ms", "voltage_v", "current_a", "soc"])?;
    let mut rows = 0usize;
    for s in rx {
        wtr.write_record([
            s.t_ms.to_string(),
            format!("{:.3}", s.voltage_v),
            format!("{:.3}", s.current_a),
            s.soc.to_string(),
        ])
        .wrap_err_with(|| format!("write telemetry row to {}", path.display()))?;
        // Keep the file useful if the process is killed mid-charge.
        wtr.flush()?;
        rows += 1;
    }
    wtr.flush()?;
    Ok(rows)
}

fn join_writer(handle: JoinHandle<eyre::Result<usize>>) -> eyre::Result<usize> {
    handle
        .join()
        .map_err(|_| eyre::eyre!("telemetry writer thread panicked"))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_writer_stops_when_channel_disconnects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = spawn_csv_writer(path.clone(), rx).unwrap();
        for t_ms in [0, 240_000] {
            tx.send(Sample {
                t_ms,
                voltage_v: 3.6,
                current_a: 1.0,
                soc: 10,
            })
            .unwrap();
        }
        drop(tx);
        assert_eq!(join_writer(handle).unwrap(), 2);
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            [
                "t_ms,voltage_v,current_a,soc",
                "0,3.600,1.000,10",
                "240000,3.600,1.000,10"
            ]
        );
    }
}
