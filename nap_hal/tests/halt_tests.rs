//! Halt sequence integration tests.
//!
//! Drives `NapCore::halt_and_restart` against the simulated DS1337 and
//! inspects the registers and transfer log it leaves behind.

use chrono::{DateTime, TimeZone, Utc};
use nap_common::rtc::codec::AlarmFrame;
use nap_common::rtc::config::ValidatedNapConfig;
use nap_common::rtc::driver::BusConfig;
use nap_hal::drivers::simulation::{SimFaults, SimulatedRtc, SimulationDriver, TransferKind};
use nap_hal::{HaltPhase, NapCore, NapError, NapErrorKind, ShutdownAction};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

struct CountingShutdown {
    calls: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
}

impl ShutdownAction for CountingShutdown {
    fn describe(&self) -> String {
        "counting".to_string()
    }

    fn execute(&self) -> Result<(), NapError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(NapError::ShutdownActionFailed {
                status: "exit status: 1".to_string(),
                stderr: "shutdown: permission denied".to_string(),
            });
        }
        Ok(())
    }
}

struct Harness {
    core: NapCore,
    rtc: SimulatedRtc,
    calls: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
    /// Transfers made during startup
    baseline: usize,
}

impl Harness {
    fn new(allow_mock: bool) -> Self {
        let rtc = SimulatedRtc::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let fail = Arc::new(AtomicBool::new(false));
        let config = ValidatedNapConfig {
            bus: BusConfig {
                node: PathBuf::from("/dev/i2c-1"),
                bus_number: 1,
                address: 0x68,
            },
            shutdown_command: PathBuf::from("/sbin/shutdown"),
            shutdown_args: Vec::new(),
            allow_mock,
            driver: "simulation".to_string(),
        };
        let core = NapCore::start(
            config,
            Box::new(SimulationDriver::with_rtc(rtc.clone())),
            Box::new(CountingShutdown {
                calls: Arc::clone(&calls),
                fail: Arc::clone(&fail),
            }),
        )
        .expect("startup")
        .into_core();
        let baseline = rtc.transfers().len();
        Self {
            core,
            rtc,
            calls,
            fail,
            baseline,
        }
    }

    /// Freeze the chip clock at `time`.
    fn at(self, time: DateTime<Utc>) -> Self {
        self.rtc.set_frozen(true);
        self.rtc.set_time(time);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn halt_transfers(&self) -> Vec<(TransferKind, u8, Vec<u8>)> {
        self.rtc.transfers()[self.baseline..]
            .iter()
            .map(|t| (t.kind, t.register, t.bytes.clone()))
            .collect()
    }
}

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

#[test]
fn test_alarm_across_midnight() {
    let h = Harness::new(false).at(utc(2024, 3, 10, 23, 59, 50));

    let report = h.core.halt_and_restart(20).expect("halt");

    assert_eq!(report.phase, HaltPhase::Done);
    assert!(!report.mocked);
    assert_eq!(report.hw_now, Some(utc(2024, 3, 10, 23, 59, 50)));
    assert_eq!(report.wake, Some(utc(2024, 3, 11, 0, 0, 10)));
    assert_eq!(
        report.alarm,
        Some(AlarmFrame {
            date: 11,
            hour: 0,
            minute: 0,
            second: 10
        })
    );

    assert_eq!(h.rtc.alarm_registers(), [0x10, 0x00, 0x00, 0x11]);
    assert_eq!(h.rtc.control(), 0x07);
    assert_eq!(h.calls(), 1);
    assert_eq!(h.core.phase(), HaltPhase::Done);
    assert_eq!(h.core.stats().completed, 1);
}

#[test]
fn test_halt_transfer_order() {
    let h = Harness::new(false).at(utc(2024, 3, 10, 23, 59, 50));
    h.core.halt_and_restart(20).expect("halt");

    let transfers = h.halt_transfers();
    assert_eq!(transfers.len(), 3);
    assert_eq!(
        transfers[0],
        (
            TransferKind::Read,
            0x00,
            vec![0x50, 0x59, 0x23, 0x01, 0x10, 0x03, 0x24]
        )
    );
    assert_eq!(transfers[1], (TransferKind::Write, 0x0E, vec![0x07]));
    assert_eq!(
        transfers[2],
        (TransferKind::Write, 0x07, vec![0x10, 0x00, 0x00, 0x11])
    );
}

#[test]
fn test_wake_into_next_month_accepted() {
    let h = Harness::new(false).at(utc(2024, 3, 31, 23, 59, 50));

    let report = h.core.halt_and_restart(20).expect("halt");

    assert_eq!(report.wake, Some(utc(2024, 4, 1, 0, 0, 10)));
    assert_eq!(h.rtc.alarm_registers(), [0x10, 0x00, 0x00, 0x01]);
    assert_eq!(h.calls(), 1);
}

#[test]
fn test_wake_after_day_recurs_rejected() {
    // Jan 31 + 31 days lands on Mar 2; the chip would match Feb 2 first.
    let h = Harness::new(false).at(utc(2024, 1, 31, 12, 0, 0));

    let err = h.core.halt_and_restart(31 * 24 * 3600).unwrap_err();
    match &err {
        NapError::AlarmOutOfRange { wake, fires_at } => {
            assert_eq!(*wake, utc(2024, 3, 2, 12, 0, 0));
            assert_eq!(*fires_at, Some(utc(2024, 2, 2, 12, 0, 0)));
        }
        other => panic!("expected AlarmOutOfRange, got {other:?}"),
    }

    let transfers = h.halt_transfers();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].0, TransferKind::Read);
    assert_eq!(h.rtc.control(), 0x00);
    assert_eq!(h.calls(), 0);
    assert!(!h.core.is_disabled());
    assert_eq!(
        h.core.phase(),
        HaltPhase::Failed(NapErrorKind::AlarmOutOfRange)
    );

    // A reachable wake still works.
    h.core.halt_and_restart(60).expect("halt");
    assert_eq!(h.calls(), 1);
}

#[test]
fn test_twelve_hour_mode_aborts_current_halt_only() {
    let h = Harness::new(false);
    h.rtc.set_faults(SimFaults {
        twelve_hour: true,
        ..SimFaults::default()
    });

    let err = h.core.halt_and_restart(60).unwrap_err();
    assert_eq!(err.kind(), NapErrorKind::Unsupported12HourMode);
    assert_eq!(h.halt_transfers().len(), 1);
    assert_eq!(h.calls(), 0);
    assert!(!h.core.is_disabled());

    h.rtc.set_faults(SimFaults::default());
    let report = h.core.halt_and_restart(60).expect("halt");
    assert!(report.alarm.is_some());
    assert_eq!(h.calls(), 1);
}

#[test]
fn test_short_read_reports_partial_payload() {
    let h = Harness::new(false).at(utc(2024, 3, 10, 23, 59, 50));
    h.rtc.set_faults(SimFaults {
        short_read: Some(3),
        ..SimFaults::default()
    });

    match h.core.halt_and_restart(60).unwrap_err() {
        NapError::BusTransferFailed {
            register,
            expected,
            actual,
            payload,
            ..
        } => {
            assert_eq!(register, 0x00);
            assert_eq!(expected, 7);
            assert_eq!(actual, 3);
            assert_eq!(payload.as_slice(), &[0x50, 0x59, 0x23]);
        }
        other => panic!("expected BusTransferFailed, got {other:?}"),
    }
    assert_eq!(h.calls(), 0);
}

#[test]
fn test_alarm_write_failure_retried_on_next_halt() {
    let h = Harness::new(false).at(utc(2024, 3, 10, 23, 59, 50));
    h.rtc.set_faults(SimFaults {
        write_fails: true,
        ..SimFaults::default()
    });

    let err = h.core.halt_and_restart(20).unwrap_err();
    assert_eq!(err.kind(), NapErrorKind::BusTransferFailed);
    assert_eq!(h.calls(), 0);

    h.rtc.set_faults(SimFaults::default());
    h.core.halt_and_restart(20).expect("halt");
    assert_eq!(h.rtc.alarm_registers(), [0x10, 0x00, 0x00, 0x11]);
    assert_eq!(h.rtc.control(), 0x07);
    assert_eq!(h.calls(), 1);
}

#[test]
fn test_bus_glitch_with_mock_still_programs_alarm() {
    let h = Harness::new(true).at(utc(2024, 3, 10, 23, 59, 50));
    h.rtc.set_faults(SimFaults {
        read_fails: true,
        ..SimFaults::default()
    });

    assert!(h.core.halt_and_restart(20).is_err());
    assert_eq!(h.calls(), 0);

    h.rtc.set_faults(SimFaults::default());
    let before = h.rtc.transfers().len();
    let report = h.core.halt_and_restart(20).expect("halt");
    assert!(!report.mocked);
    assert_eq!(h.rtc.transfers().len() - before, 3);
    assert_eq!(h.rtc.alarm_registers(), [0x10, 0x00, 0x00, 0x11]);
    assert_eq!(h.calls(), 1);
    assert_eq!(h.core.stats().mocked, 0);
}

#[test]
fn test_shutdown_failure_keeps_alarm() {
    let h = Harness::new(false).at(utc(2024, 3, 10, 23, 59, 50));
    h.fail.store(true, Ordering::SeqCst);

    let err = h.core.halt_and_restart(20).unwrap_err();
    assert_eq!(err.kind(), NapErrorKind::ShutdownActionFailed);
    assert!(err.to_string().contains("permission denied"));

    assert_eq!(h.rtc.alarm_registers(), [0x10, 0x00, 0x00, 0x11]);
    assert_eq!(h.rtc.control(), 0x07);
    assert!(!h.core.is_disabled());
    assert_eq!(
        h.core.phase(),
        HaltPhase::Failed(NapErrorKind::ShutdownActionFailed)
    );

    h.fail.store(false, Ordering::SeqCst);
    h.core.halt_and_restart(20).expect("retry by caller");
    assert_eq!(h.calls(), 2);
}

#[test]
fn test_concurrent_halts_never_interleave() {
    let h = Harness::new(false);
    h.rtc.set_latency(Duration::from_millis(2));
    let core = Arc::new(h.core);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let core = Arc::clone(&core);
            std::thread::spawn(move || core.halt_and_restart(120))
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().expect("halt");
    }

    assert_eq!(h.rtc.overlaps(), 0);
    assert_eq!(h.calls.load(Ordering::SeqCst), 4);

    let transfers = &h.rtc.transfers()[h.baseline..];
    assert_eq!(transfers.len(), 12);
    for sequence in transfers.chunks(3) {
        assert_eq!(sequence[0].kind, TransferKind::Read);
        assert_eq!(sequence[0].register, 0x00);
        assert_eq!(sequence[1].register, 0x0E);
        assert_eq!(sequence[2].register, 0x07);
    }
    assert_eq!(core.stats().completed, 4);
}
