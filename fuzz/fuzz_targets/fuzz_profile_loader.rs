#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let Ok(profiles) = charger_config::parse_profiles(data) else {
        return;
    };
    for raw in profiles.values() {
        if let Ok(p) = charger_core::BatteryProfile::load(raw) {
            // A loaded profile must give a finite estimate for any voltage.
            for v in [f32::NEG_INFINITY, 0.0, p.voltage_min(), p.voltage_max(), f32::NAN] {
                let soc = charger_core::SocEstimator::estimate(v, &p);
                assert!(soc <= 100 && soc % 10 == 0);
            }
        }
    }
});
