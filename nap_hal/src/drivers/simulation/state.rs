//! Simulated DS1337 register file.
//!
//! `SimulatedRtc` is a cloneable handle to a shared in-memory chip: a
//! free-running (or frozen) clock behind the time registers, the alarm and
//! control registers, fault injection, and a transfer log. Tests keep a
//! handle to inspect what the orchestrator wrote.

use chrono::{DateTime, TimeDelta, Utc};
use nap_common::rtc::codec::{AlarmFrame, bcd_to_dec, decode_time_frame, encode_time_frame};
use nap_common::rtc::consts::{
    ALARM1_REGISTER, ALARM_FRAME_LEN, CONTROL_REGISTER, HOURS_12H_FLAG, TIME_FRAME_LEN,
    TIME_REGISTER,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Number of addressable DS1337 registers (0x00..=0x0F).
pub const REGISTER_COUNT: usize = 16;

/// Default DS1337 bus address.
pub const DEFAULT_SIM_ADDRESS: u8 = 0x68;

/// Faults injected into the simulated chip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimFaults {
    /// Device node reported missing by `probe()`
    pub absent: bool,
    /// `open()` fails
    pub open_fails: bool,
    /// Every write fails
    pub write_fails: bool,
    /// Every read fails
    pub read_fails: bool,
    /// Reads return at most this many bytes
    pub short_read: Option<usize>,
    /// Hours register reports 12-hour mode
    pub twelve_hour: bool,
}

/// Direction of a logged transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    /// Register read
    Read,
    /// Register write
    Write,
}

/// One completed bus transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    /// Read or write
    pub kind: TransferKind,
    /// First register
    pub register: u8,
    /// Bytes written or returned
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
struct SimState {
    address: u8,
    registers: [u8; REGISTER_COUNT],
    clock_base: DateTime<Utc>,
    clock_set_at: Instant,
    frozen: bool,
    faults: SimFaults,
    latency: Duration,
    in_flight: bool,
    overlaps: u64,
    open_count: u64,
    transfers: Vec<Transfer>,
}

impl SimState {
    fn now(&self) -> DateTime<Utc> {
        if self.frozen {
            return self.clock_base;
        }
        let elapsed = TimeDelta::from_std(self.clock_set_at.elapsed()).unwrap_or(TimeDelta::zero());
        self.clock_base + elapsed
    }

    fn set_time(&mut self, time: DateTime<Utc>) {
        self.clock_base = time;
        self.clock_set_at = Instant::now();
    }

    /// Refresh the time registers from the clock.
    fn latch_time_registers(&mut self) {
        let mut frame = encode_time_frame(&self.now());
        if self.faults.twelve_hour {
            frame[2] |= HOURS_12H_FLAG;
        }
        let start = TIME_REGISTER as usize;
        self.registers[start..start + TIME_FRAME_LEN].copy_from_slice(&frame);
    }
}

/// Shared handle to a simulated DS1337.
#[derive(Debug, Clone)]
pub struct SimulatedRtc {
    inner: Arc<Mutex<SimState>>,
}

impl SimulatedRtc {
    /// Chip at the default address with its clock set to the current time.
    pub fn new() -> Self {
        Self::with_address(DEFAULT_SIM_ADDRESS)
    }

    /// Chip answering at `address`.
    pub fn with_address(address: u8) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimState {
                address,
                registers: [0; REGISTER_COUNT],
                clock_base: Utc::now(),
                clock_set_at: Instant::now(),
                frozen: false,
                faults: SimFaults::default(),
                latency: Duration::ZERO,
                in_flight: false,
                overlaps: 0,
                open_count: 0,
                transfers: Vec::new(),
            })),
        }
    }

    /// Bus address the chip answers at.
    pub fn address(&self) -> u8 {
        self.inner.lock().address
    }

    /// Current chip time.
    pub fn time(&self) -> DateTime<Utc> {
        self.inner.lock().now()
    }

    /// Set the chip time; the clock keeps running unless frozen.
    pub fn set_time(&self, time: DateTime<Utc>) {
        self.inner.lock().set_time(time);
    }

    /// Stop or restart the clock.
    pub fn set_frozen(&self, frozen: bool) {
        let mut state = self.inner.lock();
        let now = state.now();
        state.frozen = frozen;
        state.set_time(now);
    }

    /// Replace the injected faults.
    pub fn set_faults(&self, faults: SimFaults) {
        self.inner.lock().faults = faults;
    }

    /// Currently injected faults.
    pub fn faults(&self) -> SimFaults {
        self.inner.lock().faults.clone()
    }

    /// Delay applied inside every transfer.
    pub fn set_latency(&self, latency: Duration) {
        self.inner.lock().latency = latency;
    }

    /// Alarm 1 as currently programmed.
    pub fn alarm(&self) -> AlarmFrame {
        let state = self.inner.lock();
        let a = ALARM1_REGISTER as usize;
        AlarmFrame {
            second: bcd_to_dec(state.registers[a], Some(0x7F)),
            minute: bcd_to_dec(state.registers[a + 1], Some(0x7F)),
            hour: bcd_to_dec(state.registers[a + 2], Some(0x3F)),
            date: bcd_to_dec(state.registers[a + 3], Some(0x3F)),
        }
    }

    /// Raw alarm 1 registers.
    pub fn alarm_registers(&self) -> [u8; ALARM_FRAME_LEN] {
        let state = self.inner.lock();
        let a = ALARM1_REGISTER as usize;
        let mut out = [0u8; ALARM_FRAME_LEN];
        out.copy_from_slice(&state.registers[a..a + ALARM_FRAME_LEN]);
        out
    }

    /// Control register value.
    pub fn control(&self) -> u8 {
        self.inner.lock().registers[CONTROL_REGISTER as usize]
    }

    /// All completed transfers, oldest first.
    pub fn transfers(&self) -> Vec<Transfer> {
        self.inner.lock().transfers.clone()
    }

    /// Number of transfers rejected because another was in flight.
    pub fn overlaps(&self) -> u64 {
        self.inner.lock().overlaps
    }

    /// Number of successful `open()` calls.
    pub fn open_count(&self) -> u64 {
        self.inner.lock().open_count
    }

    pub(super) fn is_absent(&self) -> bool {
        self.inner.lock().faults.absent
    }

    pub(super) fn open(&self) -> Result<(), String> {
        let mut state = self.inner.lock();
        if state.faults.open_fails {
            return Err("simulated open failure".to_string());
        }
        state.open_count += 1;
        Ok(())
    }

    /// Mark a transfer in flight, then wait out the configured latency.
    fn begin(&self) -> Result<(), String> {
        let latency = {
            let mut state = self.inner.lock();
            if state.in_flight {
                state.overlaps += 1;
                return Err("overlapping transfer".to_string());
            }
            state.in_flight = true;
            state.latency
        };
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }
        Ok(())
    }

    pub(super) fn write(&self, address: u8, register: u8, bytes: &[u8]) -> Result<(), String> {
        self.begin()?;
        let mut state = self.inner.lock();
        state.in_flight = false;

        if address != state.address {
            return Err(format!("no ack from {address:#04x}"));
        }
        if state.faults.write_fails {
            return Err("simulated write failure".to_string());
        }

        let start = register as usize;
        let end = start + bytes.len();
        if end > REGISTER_COUNT {
            return Err(format!("write past register {:#04x}", REGISTER_COUNT - 1));
        }
        state.registers[start..end].copy_from_slice(bytes);

        if register == TIME_REGISTER && bytes.len() >= TIME_FRAME_LEN {
            if let Ok(time) = decode_time_frame(bytes) {
                state.set_time(time);
            }
        }

        debug!("sim write {:#04x}: {:02x?}", register, bytes);
        state.transfers.push(Transfer {
            kind: TransferKind::Write,
            register,
            bytes: bytes.to_vec(),
        });
        Ok(())
    }

    pub(super) fn read(&self, address: u8, register: u8, buf: &mut [u8]) -> Result<usize, String> {
        self.begin()?;
        let mut state = self.inner.lock();
        state.in_flight = false;

        if address != state.address {
            return Err(format!("no ack from {address:#04x}"));
        }
        if state.faults.read_fails {
            return Err("simulated read failure".to_string());
        }

        let start = register as usize;
        if start >= REGISTER_COUNT {
            return Err(format!("read past register {:#04x}", REGISTER_COUNT - 1));
        }

        state.latch_time_registers();

        let mut count = buf.len().min(REGISTER_COUNT - start);
        if let Some(limit) = state.faults.short_read {
            count = count.min(limit);
        }
        buf[..count].copy_from_slice(&state.registers[start..start + count]);

        debug!("sim read {:#04x}: {:02x?}", register, &buf[..count]);
        state.transfers.push(Transfer {
            kind: TransferKind::Read,
            register,
            bytes: buf[..count].to_vec(),
        });
        Ok(count)
    }
}

impl Default for SimulatedRtc {
    fn default() -> Self {
        Self::new()
    }
}
