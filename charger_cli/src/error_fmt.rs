//! Human-readable error descriptions and structured JSON error formatting.

use charger_core::error::{BuildError, ChargerError, ConfigError, SafetyError};

fn explain(what: &str, causes: &str, fix: &str) -> String {
    format!("What happened: {what}.\nLikely causes: {causes}.\nHow to fix: {fix}.")
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(BuildError::InvalidConfig(msg)) = err.downcast_ref::<BuildError>() {
        return explain(
            &format!("Invalid charge settings ({msg})"),
            "Zero or out-of-range values in the [charge] section",
            "Edit the config file, then rerun",
        );
    }

    if let Some(ce) = err.downcast_ref::<ConfigError>() {
        return humanize_config(ce);
    }

    if let Some(ce) = err.downcast_ref::<ChargerError>() {
        return match ce {
            ChargerError::Config(inner) => humanize_config(inner),
            ChargerError::OutOfRange(SafetyError::VoltageOutOfRange { observed, min, max }) => {
                explain(
                    &format!("Battery voltage {observed:.3} V is outside the profile window {min:.3}..{max:.3} V; output was switched off"),
                    "Wrong profile for this battery, a deeply discharged or damaged cell, or a loose connection",
                    "Check the battery and wiring, confirm --battery matches the cell, then start a new charge",
                )
            }
            ChargerError::OutOfRange(SafetyError::CurrentOutOfRange { observed, min, max }) => {
                explain(
                    &format!("Charge current {observed:.3} A is outside {min:.3}..{max:.3} A; output was switched off"),
                    "Capacity set too low, a shorted cell, or a supply that ignores its current limit",
                    "Verify the capacity (--capacity) and the supply's current limit before retrying",
                )
            }
            ChargerError::Timeout => explain(
                "The power supply did not answer in time",
                "Serial cable unplugged, wrong psu.port, or the supply is switched off",
                "Check the connection and psu.port, then run `charger self-check`",
            ),
            ChargerError::Hardware(msg) => explain(
                &format!("Power supply error ({msg})"),
                "Serial I/O failure or an unexpected reply from the supply",
                "Make sure the output is off, check the connection, and run `charger self-check`",
            ),
            ChargerError::Cancelled => explain(
                "Charge cancelled by operator; output was switched off",
                "Ctrl-C or another abort request",
                "Start a new charge when ready",
            ),
            ChargerError::MaxRuntime => explain(
                "Maximum charge time exceeded; output was switched off",
                "charge.max_run_s or --max-run-s is shorter than this battery needs",
                "Raise the limit or set it to 0 to disable it",
            ),
            ChargerError::NotConfigured => explain(
                "No battery profile was selected",
                "The controller was started without a profile",
                "Pass --battery with one of the names from `charger profiles`",
            ),
            ChargerError::State(msg) => format!(
                "What happened: {msg}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("soc table csv must have headers") {
        return "Invalid headers in SOC table CSV. Expected 'soc,ocv,c_rate'.".to_string();
    }

    if lower.contains("read config") || lower.contains("parse config") {
        return explain(
            &format!("Could not load the configuration ({msg})"),
            "Wrong --config path or a TOML syntax error",
            "Fix the path or the file; etc/charger.toml is a working sample",
        );
    }

    if lower.contains("must be") || lower.contains("is required") {
        return explain(
            &format!("Configuration is invalid ({msg})"),
            "Missing or out-of-range values in the TOML",
            "Edit the TOML config and try again",
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

fn humanize_config(ce: &ConfigError) -> String {
    match ce {
        ConfigError::MissingCapacity => explain(
            "The battery profile has no capacity",
            "Shared profile files often leave Capacity unset",
            "Pass --capacity <AH> or set capacity_ah in the profile",
        ),
        ConfigError::UnknownProfile(name) => explain(
            &format!("No battery profile named '{name}'"),
            "Typo in --battery or the profile file was not loaded",
            "Run `charger profiles` to list the available names",
        ),
        other => explain(
            &format!("Battery profile is invalid ({other})"),
            "Inconsistent SOC tables or limits in the profile",
            "Fix the profile entry and try again",
        ),
    }
}

/// Map typed failures to stable exit codes; everything else returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<ConfigError>().is_some() || err.downcast_ref::<BuildError>().is_some() {
        return 9;
    }
    match err.downcast_ref::<ChargerError>() {
        Some(ChargerError::OutOfRange(SafetyError::VoltageOutOfRange { .. })) => 3,
        Some(ChargerError::OutOfRange(SafetyError::CurrentOutOfRange { .. })) => 4,
        Some(ChargerError::Hardware(_) | ChargerError::Timeout) => 5,
        Some(ChargerError::Cancelled) => 6,
        Some(ChargerError::MaxRuntime) => 7,
        Some(ChargerError::NotConfigured) => 8,
        Some(ChargerError::Config(_)) => 9,
        Some(ChargerError::State(_)) | None => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let reason = if let Some(ce) = err.downcast_ref::<ChargerError>() {
        ce.reason_name()
    } else if err.downcast_ref::<ConfigError>().is_some()
        || err.downcast_ref::<BuildError>().is_some()
    {
        "Config"
    } else {
        "Error"
    };

    let details = match err.downcast_ref::<ChargerError>() {
        Some(ChargerError::OutOfRange(
            SafetyError::VoltageOutOfRange { observed, min, max }
            | SafetyError::CurrentOutOfRange { observed, min, max },
        )) => Some(json!({ "observed": observed, "min": min, "max": max })),
        _ => None,
    };

    let obj = if let Some(d) = details {
        json!({ "reason": reason, "details": d, "message": humanize(err) })
    } else {
        json!({ "reason": reason, "message": humanize(err) })
    };
    obj.to_string()
}
