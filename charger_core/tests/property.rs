mod common;

use charger_config::RawProfile;
use charger_core::{BatteryProfile, SafetyGuard, SocEstimator};
use proptest::prelude::*;

/// A strictly increasing OCV table built from a base voltage and 10 positive steps.
fn table() -> impl Strategy<Value = [f32; 11]> {
    (2.5f32..3.5, prop::array::uniform10(0.01f32..0.2)).prop_map(|(base, steps)| {
        let mut t = [base; 11];
        for i in 1..11 {
            t[i] = t[i - 1] + steps[i - 1];
        }
        t
    })
}

fn profile_with(ocv: [f32; 11]) -> BatteryProfile {
    let raw = RawProfile {
        soc_ocv: (0u8..=10).map(|i| i * 10).zip(ocv).collect(),
        voltage_min: ocv[0] - 0.1,
        voltage_max: ocv[10] + 0.1,
        ..common::raw()
    };
    BatteryProfile::load(&raw).expect("generated profile is valid")
}

proptest! {
    #[test]
    fn estimate_is_monotone_in_voltage(ocv in table(), a in 2.0f32..6.0, b in 2.0f32..6.0) {
        let p = profile_with(ocv);
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(SocEstimator::estimate(lo, &p) <= SocEstimator::estimate(hi, &p));
    }

    #[test]
    fn estimate_is_a_bucket_below_the_voltage(ocv in table(), v in 2.0f32..6.0) {
        let p = profile_with(ocv);
        let soc = SocEstimator::estimate(v, &p);
        prop_assert!(soc <= 100 && soc % 10 == 0);
        if soc < 100 {
            prop_assert!(v <= p.ocv_at(soc + 10));
        }
        if soc > 0 {
            prop_assert!(v > p.ocv_at(soc));
        }
    }

    #[test]
    fn advance_never_lowers_soc(ocv in table(), from in 0u8..=10, v in 2.0f32..6.0) {
        let p = profile_with(ocv);
        let from = from * 10;
        prop_assert!(SocEstimator::advance(from, v, &p) >= from);
    }

    #[test]
    fn guard_ignores_the_target(observed in 0.0f32..6.0, t1 in -10.0f32..10.0, t2 in -10.0f32..10.0) {
        let p = common::profile();
        let g = SafetyGuard::new();
        prop_assert_eq!(g.check_voltage(t1, observed, &p), g.check_voltage(t2, observed, &p));
        prop_assert_eq!(g.check_current(t1, observed, &p), g.check_current(t2, observed, &p));
        prop_assert_eq!(
            g.check_voltage(t1, observed, &p).is_ok(),
            (p.voltage_min()..=p.voltage_max()).contains(&observed)
        );
    }
}
