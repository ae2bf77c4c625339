mod charge;
mod cli;
mod error_fmt;
mod profiles;

use std::path::Path;

use charger_config::{Config, Logging};
use charger_core::ChargeSettings;
use clap::Parser;
use eyre::{Result, WrapErr};

use crate::charge::ChargeRequest;
use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    if let Err(e) = color_eyre::install() {
        eprintln!("failed to install error reporter: {e}");
    }

    if let Err(e) = run(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        tracing::error!(error = %e, "command failed");
        std::process::exit(exit_code_for_error(&e));
    }
}

fn run(cli: Cli) -> Result<()> {
    let cfg = load_config(&cli.config)?;
    init_tracing(cli.json, cli.log_level.as_deref(), &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), backend = ?cfg.psu.backend, "config loaded");

    match cli.cmd {
        Commands::Profiles => {
            let store = profiles::load_profiles(&cfg, &cli.config)?;
            println!("{}", profiles::render_list(&store, cli.json));
        }
        Commands::Show { battery, capacity } => {
            let store = profiles::load_profiles(&cfg, &cli.config)?;
            let profile = profiles::select(&store, &battery, capacity)?;
            println!("{}", profiles::render_profile(&battery, &profile, cli.json));
        }
        Commands::Charge {
            battery,
            capacity,
            telemetry,
            max_run_s,
        } => {
            let store = profiles::load_profiles(&cfg, &cli.config)?;
            let profile = profiles::select(&store, &battery, capacity)?;
            let mut settings = ChargeSettings::from(&cfg.charge);
            if let Some(s) = max_run_s {
                settings.max_run = (s > 0).then(|| std::time::Duration::from_secs(s));
            }
            let psu = charge::make_psu(&cfg)?;
            let summary = charge::run_charge(
                psu,
                ChargeRequest {
                    battery: &battery,
                    profile,
                    settings,
                    telemetry,
                },
                cli.json,
            )?;
            tracing::info!(
                start_soc = summary.start_soc,
                final_soc = summary.final_soc,
                ticks = summary.ticks,
                "charge complete"
            );
            if !cli.json {
                println!(
                    "charge complete: SOC {}% -> {}% in {} ticks ({} samples, {:.1} s)",
                    summary.start_soc,
                    summary.final_soc,
                    summary.ticks,
                    summary.samples,
                    summary.elapsed.as_secs_f32()
                );
            }
        }
        Commands::SelfCheck => {
            let v = charge::self_check(&cfg)?;
            if cli.json {
                println!("{}", serde_json::json!({ "ok": true, "output_voltage_v": v }));
            } else {
                println!("ok: output disabled, reads {v:.2} V");
            }
        }
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = charger_config::load_toml(&text)
        .wrap_err_with(|| format!("parse config {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Console logs go to stderr so stdout stays machine-readable. An optional
/// JSON-lines file sink comes from `[logging]`.
fn init_tracing(json: bool, cli_level: Option<&str>, logging: &Logging) -> Result<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, fmt};

    let level = cli_level
        .or(logging.level.as_deref())
        .unwrap_or("info")
        .to_string();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (pretty, json_layer) = if json {
        (
            None,
            Some(fmt::layer().json().with_writer(std::io::stderr)),
        )
    } else {
        (
            Some(fmt::layer().with_target(false).with_writer(std::io::stderr)),
            None,
        )
    };

    let file_layer = match logging.file.as_deref() {
        Some(file) => {
            let path = Path::new(file);
            let dir = match path.parent() {
                Some(p) if !p.as_os_str().is_empty() => p,
                _ => Path::new("."),
            };
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name: {file}"))?;
            let appender = match logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(fmt::layer().json().with_ansi(false).with_writer(writer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(pretty)
        .with(json_layer)
        .with(file_layer)
        .try_init()
        .wrap_err("install tracing subscriber")
}
