//! Nap Core struct and halt sequence management.
//!
//! The `NapCore` struct is the main entry point for nap operations. It owns
//! the bus driver and the shutdown action, synchronizes the RTC at startup
//! and runs the halt/restart sequence.

use crate::error::{BusOperation, NapError, NapErrorKind};
use crate::latch::DisableLatch;
use crate::shutdown::ShutdownAction;
use chrono::{DateTime, TimeDelta, Utc};
use nap_common::rtc::codec::{AlarmFrame, alarm_control_byte, decode_time_frame, encode_time_frame};
use nap_common::rtc::config::ValidatedNapConfig;
use nap_common::rtc::consts::{ALARM1_REGISTER, CONTROL_REGISTER, TIME_FRAME_LEN, TIME_REGISTER};
use nap_common::rtc::driver::BusDriver;
use parking_lot::Mutex;
use std::fmt;
use tracing::{debug, error, info, warn};

/// Step of the halt sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltPhase {
    /// No halt has run yet
    Idle,
    /// Reading the time frame
    ReadingTime,
    /// Writing the alarm control byte
    Arming,
    /// Writing the alarm 1 frame
    WritingAlarm,
    /// Running the shutdown action
    ShuttingDown,
    /// Sequence finished
    Done,
    /// Sequence aborted
    Failed(NapErrorKind),
}

impl fmt::Display for HaltPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltPhase::Idle => f.write_str("idle"),
            HaltPhase::ReadingTime => f.write_str("reading time"),
            HaltPhase::Arming => f.write_str("arming"),
            HaltPhase::WritingAlarm => f.write_str("writing alarm"),
            HaltPhase::ShuttingDown => f.write_str("shutting down"),
            HaltPhase::Done => f.write_str("done"),
            HaltPhase::Failed(kind) => write!(f, "failed ({kind:?})"),
        }
    }
}

/// Outcome of a successful `halt_and_restart` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HaltReport {
    /// Final phase, always `Done`
    pub phase: HaltPhase,
    /// Hardware was skipped because the core is disabled
    pub mocked: bool,
    /// RTC time read at the start of the sequence
    pub hw_now: Option<DateTime<Utc>>,
    /// Programmed wake instant
    pub wake: Option<DateTime<Utc>>,
    /// Programmed alarm fields
    pub alarm: Option<AlarmFrame>,
}

/// Halt counters for monitoring.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HaltStats {
    /// Halt requests that passed argument validation
    pub attempts: u64,
    /// Hardware sequences that reached `Done`
    pub completed: u64,
    /// Requests served in mock mode
    pub mocked: u64,
    /// Requests that returned an error
    pub failed: u64,
}

#[derive(Debug)]
struct HaltStatus {
    phase: HaltPhase,
    stats: HaltStats,
}

/// Result of `NapCore::start`.
pub enum Startup {
    /// RTC synchronized, hardware sequence available
    Ready(NapCore),
    /// Startup failed and mock mode is enabled
    Degraded {
        /// Core in the disabled state
        core: NapCore,
        /// Error that disabled it
        cause: NapError,
    },
}

impl Startup {
    /// Unwrap the core regardless of startup outcome.
    pub fn into_core(self) -> NapCore {
        match self {
            Startup::Ready(core) | Startup::Degraded { core, .. } => core,
        }
    }

    /// Whether startup fell back to mock mode.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Startup::Degraded { .. })
    }
}

/// Nap Core drives one DS1337 through one bus driver.
pub struct NapCore {
    /// Validated configuration
    config: ValidatedNapConfig,
    /// Bus driver, locked for each whole hardware sequence
    bus: Mutex<Box<dyn BusDriver>>,
    /// Final power-off step
    shutdown: Box<dyn ShutdownAction>,
    /// First startup sync error
    disabled: DisableLatch,
    /// Phase and counters
    status: Mutex<HaltStatus>,
}

impl NapCore {
    /// Create the core and synchronize the RTC to the system clock.
    ///
    /// # Arguments
    /// * `config` - Validated configuration
    /// * `bus` - Unopened bus driver
    /// * `shutdown` - Action run at the end of every halt
    ///
    /// # Errors
    /// Returns the startup error if the RTC cannot be synchronized and
    /// `allow_mock` is false.
    pub fn start(
        config: ValidatedNapConfig,
        bus: Box<dyn BusDriver>,
        shutdown: Box<dyn ShutdownAction>,
    ) -> Result<Startup, NapError> {
        info!(
            "NapCore starting with driver '{}' on {} (chip {:#04x}), shutdown: {}",
            bus.name(),
            config.bus.node.display(),
            config.bus.address,
            shutdown.describe()
        );

        let core = Self {
            config,
            bus: Mutex::new(bus),
            shutdown,
            disabled: DisableLatch::new(),
            status: Mutex::new(HaltStatus {
                phase: HaltPhase::Idle,
                stats: HaltStats::default(),
            }),
        };

        match core.sync_clock(Utc::now()) {
            Ok(()) => Ok(Startup::Ready(core)),
            Err(cause) => {
                if core.config.allow_mock {
                    warn!("Mock enabled, continuing");
                    Ok(Startup::Degraded { core, cause })
                } else {
                    error!("Mock disabled, failing");
                    Err(cause)
                }
            }
        }
    }

    /// Probe, open and write `now` to the time registers.
    fn sync_clock(&self, now: DateTime<Utc>) -> Result<(), NapError> {
        let mut bus = self.bus.lock();
        match self.sync(&mut **bus, now) {
            Ok(()) => {
                info!("RTC synchronized to {}", now.format("%Y-%m-%dT%H:%M:%SZ"));
                Ok(())
            }
            Err(e) => {
                self.disable(&e);
                Err(e)
            }
        }
    }

    fn sync(&self, bus: &mut dyn BusDriver, now: DateTime<Utc>) -> Result<(), NapError> {
        let open_error =
            |e| NapError::from_bus(e, BusOperation::Write, TIME_REGISTER, TIME_FRAME_LEN);
        bus.probe(&self.config.bus.node).map_err(open_error)?;
        bus.open(&self.config.bus).map_err(open_error)?;
        self.write(bus, TIME_REGISTER, &encode_time_frame(&now))
    }

    /// Program the RTC to wake the board `after_sec` seconds from now, then
    /// run the shutdown action.
    ///
    /// # Errors
    /// - `InvalidDelay` if `after_sec` is zero
    /// - the stored startup error if the core is disabled without mock mode
    /// - any bus, protocol, alarm range or shutdown action error
    pub fn halt_and_restart(&self, after_sec: u32) -> Result<HaltReport, NapError> {
        if after_sec == 0 {
            return Err(NapError::InvalidDelay(after_sec));
        }

        let mut bus = self.bus.lock();
        self.status.lock().stats.attempts += 1;

        if let Some(cause) = self.disabled.cause() {
            return self.halt_disabled(after_sec, cause);
        }

        info!("Halting, restart after {} seconds", after_sec);
        match self.run_sequence(&mut **bus, after_sec) {
            Ok(report) => {
                let mut status = self.status.lock();
                status.phase = HaltPhase::Done;
                status.stats.completed += 1;
                Ok(report)
            }
            Err(e) => {
                self.enter(HaltPhase::Failed(e.kind()));
                self.status.lock().stats.failed += 1;
                error!("Cannot halt_and_restart: {}", e);
                Err(e)
            }
        }
    }

    fn halt_disabled(&self, after_sec: u32, cause: &NapError) -> Result<HaltReport, NapError> {
        if !self.config.allow_mock {
            error!("Cannot halt_and_restart: {}", cause);
            self.status.lock().stats.failed += 1;
            return Err(cause.clone());
        }

        info!("MOCK: halt_and_restart after {} seconds", after_sec);
        self.enter(HaltPhase::ShuttingDown);
        match self.shutdown.execute() {
            Ok(()) => {
                self.enter(HaltPhase::Done);
                self.status.lock().stats.mocked += 1;
                Ok(HaltReport {
                    phase: HaltPhase::Done,
                    mocked: true,
                    hw_now: None,
                    wake: None,
                    alarm: None,
                })
            }
            Err(e) => {
                self.enter(HaltPhase::Failed(e.kind()));
                self.status.lock().stats.failed += 1;
                error!("Cannot halt_and_restart: {}", e);
                Err(e)
            }
        }
    }

    fn run_sequence(&self, bus: &mut dyn BusDriver, after_sec: u32) -> Result<HaltReport, NapError> {
        self.enter(HaltPhase::ReadingTime);
        let hw_now = self.read(bus)?;

        let wake = hw_now
            .checked_add_signed(TimeDelta::seconds(i64::from(after_sec)))
            .ok_or(NapError::InvalidDelay(after_sec))?;
        let alarm = AlarmFrame::from_instant(&wake);
        let fires_at = alarm.next_match(&hw_now);
        if fires_at != Some(wake) {
            warn!(
                "Alarm for {} would fire at {:?}, refusing to program it",
                wake, fires_at
            );
            return Err(NapError::AlarmOutOfRange { wake, fires_at });
        }

        self.enter(HaltPhase::Arming);
        self.write(bus, CONTROL_REGISTER, &[alarm_control_byte()])?;

        self.enter(HaltPhase::WritingAlarm);
        self.write(bus, ALARM1_REGISTER, &alarm.encode())?;
        info!(
            "Alarm set for {} (hw time {})",
            wake.format("%Y-%m-%dT%H:%M:%SZ"),
            hw_now.format("%Y-%m-%dT%H:%M:%SZ")
        );

        self.enter(HaltPhase::ShuttingDown);
        self.shutdown.execute()?;

        self.enter(HaltPhase::Done);
        Ok(HaltReport {
            phase: HaltPhase::Done,
            mocked: false,
            hw_now: Some(hw_now),
            wake: Some(wake),
            alarm: Some(alarm),
        })
    }

    /// Read the RTC clock.
    ///
    /// # Errors
    /// Returns the stored error if the core is disabled, otherwise any bus
    /// or protocol error from this read.
    pub fn read_time(&self) -> Result<DateTime<Utc>, NapError> {
        let mut bus = self.bus.lock();
        if let Some(cause) = self.disabled.cause() {
            return Err(cause.clone());
        }
        self.read(&mut **bus)
    }

    fn read(&self, bus: &mut dyn BusDriver) -> Result<DateTime<Utc>, NapError> {
        let mut buf = [0u8; TIME_FRAME_LEN];
        let count = bus
            .read_block(self.config.bus.address, TIME_REGISTER, &mut buf)
            .map_err(|e| NapError::from_bus(e, BusOperation::Read, TIME_REGISTER, TIME_FRAME_LEN))?;
        let time = decode_time_frame(&buf[..count])?;
        debug!("RTC time {}", time);
        Ok(time)
    }

    fn write(&self, bus: &mut dyn BusDriver, register: u8, bytes: &[u8]) -> Result<(), NapError> {
        bus.write_block(self.config.bus.address, register, bytes)
            .map_err(|e| NapError::from_bus(e, BusOperation::Write, register, bytes.len()))
    }

    fn enter(&self, phase: HaltPhase) {
        debug!("Halt phase: {}", phase);
        self.status.lock().phase = phase;
    }

    fn disable(&self, err: &NapError) {
        if self.disabled.latch(err.clone()) {
            warn!("Disabling nap due to error: {}", err);
        } else {
            debug!("Nap already disabled, ignoring: {}", err);
        }
    }

    /// Whether a hardware error has disabled the core.
    pub fn is_disabled(&self) -> bool {
        self.disabled.is_set()
    }

    /// The error that disabled the core, if any.
    pub fn disable_cause(&self) -> Option<&NapError> {
        self.disabled.cause()
    }

    /// Phase reached by the most recent halt.
    pub fn phase(&self) -> HaltPhase {
        self.status.lock().phase
    }

    /// Halt counters.
    pub fn stats(&self) -> HaltStats {
        self.status.lock().stats
    }

    /// Validated configuration.
    pub fn config(&self) -> &ValidatedNapConfig {
        &self.config
    }
}

impl Drop for NapCore {
    fn drop(&mut self) {
        if let Err(e) = self.bus.get_mut().close() {
            warn!("Failed to close bus: {}", e);
        }
    }
}
