mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use charger_core::mocks::ScriptedPsu;
use charger_core::{
    AbortHandle, ChargeControllerBuilder, ChargeSettings, ChargeState, ChargerError, StepStatus,
};
use charger_traits::Clock;
use charger_traits::clock::test_clock::TestClock;
use rstest::rstest;

use common::{profile, settings};

/// Test clock that raises an abort after a fixed number of sleeps.
struct AbortAfter {
    inner: TestClock,
    after: usize,
    seen: AtomicUsize,
    handle: AbortHandle,
}

impl Clock for AbortAfter {
    fn now(&self) -> Instant {
        self.inner.now()
    }
    fn sleep(&self, d: Duration) {
        self.inner.sleep(d);
        if self.seen.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
            self.handle.abort();
        }
    }
}

#[rstest]
fn abort_preempts_a_long_wait() {
    let psu = ScriptedPsu::new().probes([3.5]).currents([1.0]).voltages([3.9]);
    let log = psu.log();
    let clock = TestClock::new();
    let handle = AbortHandle::new();
    let mut ctl = ChargeControllerBuilder::new()
        .with_psu(psu)
        .with_profile(profile())
        .with_settings(ChargeSettings {
            abort_poll: Duration::from_secs(1),
            ..settings()
        })
        .with_clock(Box::new(AbortAfter {
            inner: clock.clone(),
            after: 3,
            seen: AtomicUsize::new(0),
            handle: handle.clone(),
        }))
        .with_abort_handle(handle)
        .build()
        .expect("build");
    ctl.begin().expect("begin");

    match ctl.step().expect("step") {
        StepStatus::Aborted(ChargerError::Cancelled) => {}
        other => panic!("expected Cancelled, got {other:?}"),
    }
    // Three one-second slices out of a 240 s wait.
    assert_eq!(clock.elapsed(), Duration::from_secs(3));
    assert_eq!(ctl.samples().len(), 1, "no tick after abort");
    assert!(!log.output_enabled());
    assert_eq!(ctl.status().state, ChargeState::Aborted(ChargerError::Cancelled));
}

#[rstest]
fn abort_requested_before_begin_cancels_without_hardware_calls() {
    let psu = ScriptedPsu::new().probes([3.5]).currents([1.0, 0.05]).voltages([3.9]);
    let log = psu.log();
    let clock = TestClock::new();
    let mut ctl = common::controller(psu, &clock);
    ctl.abort_handle().abort();

    let err = ctl.start().expect_err("pending abort honoured");
    assert_eq!(err.downcast_ref::<ChargerError>(), Some(&ChargerError::Cancelled));
    assert!(log.calls().is_empty());
    assert_eq!(ctl.state(), &ChargeState::Aborted(ChargerError::Cancelled));

    // The request was consumed; the next session runs normally.
    assert!(!ctl.abort_handle().is_aborted());
    let summary = ctl.start().expect("second session");
    assert_eq!(summary.ticks, 1);
}

#[rstest]
fn abort_is_consumed_by_the_session_it_cancelled() {
    let psu = ScriptedPsu::new().probes([3.5]).currents([1.0, 1.0, 0.05]).voltages([3.9]);
    let clock = TestClock::new();
    let mut ctl = common::controller(psu, &clock);
    ctl.begin().expect("begin");
    ctl.abort_handle().abort();
    match ctl.step().expect("step") {
        StepStatus::Aborted(ChargerError::Cancelled) => {}
        other => panic!("expected Cancelled, got {other:?}"),
    }
    assert!(!ctl.abort_handle().is_aborted());

    let summary = ctl.start().expect("restart after cancel");
    assert_eq!(summary.final_soc, summary.start_soc);
}

#[rstest]
fn abort_from_another_thread_stops_a_real_time_session() {
    let psu = ScriptedPsu::new().probes([3.5]).currents([1.0]).voltages([3.9]);
    let log = psu.log();
    let mut ctl = ChargeControllerBuilder::new()
        .with_psu(psu)
        .with_profile(profile())
        .with_settings(ChargeSettings {
            tick_base: Duration::from_secs(3600),
            abort_poll: Duration::from_millis(5),
            ..settings()
        })
        .build()
        .expect("build");

    let abort = ctl.abort_handle();
    let status = ctl.status_handle();
    let watcher = thread::spawn(move || {
        let deadline = Instant::now() + Duration::from_secs(5);
        while status.status().state != ChargeState::Charging {
            assert!(Instant::now() < deadline, "never reached Charging");
            thread::sleep(Duration::from_millis(1));
        }
        abort.abort();
    });

    let t0 = Instant::now();
    let err = ctl.start().expect_err("cancelled");
    watcher.join().expect("watcher thread");

    assert_eq!(err.downcast_ref::<ChargerError>(), Some(&ChargerError::Cancelled));
    assert!(t0.elapsed() < Duration::from_secs(5));
    assert!(!log.output_enabled());
}
