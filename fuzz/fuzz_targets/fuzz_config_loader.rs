#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse errors and validation errors are fine; panics are not.
    if let Ok(cfg) = charger_config::load_toml(data) {
        let _ = cfg.validate();
        for raw in cfg.batteries.values() {
            let _ = charger_core::BatteryProfile::load(raw);
        }
    }
});
