//! Orchestrator error taxonomy.
//!
//! `NapError` is `Clone` so the disable latch can hand the first stored
//! error to every later caller.

use chrono::{DateTime, Utc};
use nap_common::config::ConfigError;
use nap_common::rtc::codec::{ProtocolError, RawFrame};
use nap_common::rtc::consts::{TIME_FRAME_LEN, TIME_REGISTER};
use nap_common::rtc::driver::BusError;
use std::fmt;
use thiserror::Error;

/// Direction of a failed bus transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusOperation {
    /// Register read
    Read,
    /// Register write
    Write,
}

impl fmt::Display for BusOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusOperation::Read => f.write_str("read"),
            BusOperation::Write => f.write_str("write"),
        }
    }
}

/// Error types surfaced by `NapCore`.
#[derive(Debug, Clone, Error)]
pub enum NapError {
    /// RTC device node missing
    #[error("RTC device absent: {0}")]
    DeviceAbsent(String),

    /// Bus could not be opened
    #[error("Bus open failed: {0}")]
    BusOpenFailed(String),

    /// Register transfer failed or returned too few bytes
    #[error(
        "Bus {operation} failed at register {register:#04x} ({actual}/{expected} bytes, payload {payload:02x?}): {reason}"
    )]
    BusTransferFailed {
        /// Transfer direction
        operation: BusOperation,
        /// First register of the transfer
        register: u8,
        /// Bytes requested
        expected: usize,
        /// Bytes transferred
        actual: usize,
        /// Partial payload received, if any
        payload: RawFrame,
        /// Failure description
        reason: String,
    },

    /// RTC hours register is in 12-hour mode
    #[error("RTC in 12-hour mode (hours register {hours:#04x}), only 24-hour mode is supported")]
    Unsupported12HourMode {
        /// Raw hours register value
        hours: u8,
    },

    /// RTC time registers do not hold a valid calendar time
    #[error("RTC holds an invalid calendar time: {frame:02x?}")]
    InvalidCalendar {
        /// Raw time frame
        frame: RawFrame,
    },

    /// Shutdown executable failed to spawn or exited unsuccessfully
    #[error("Shutdown action failed ({status}): {stderr}")]
    ShutdownActionFailed {
        /// Exit status or spawn failure
        status: String,
        /// Captured standard error
        stderr: String,
    },

    /// Halt requested with a non-positive or unrepresentable delay
    #[error("Invalid delay: {0} seconds")]
    InvalidDelay(u32),

    /// The chip's alarm would not fire at the requested wake instant
    #[error("Wake at {wake} not reachable with a day-of-month alarm (would fire at {fires_at:?})")]
    AlarmOutOfRange {
        /// Requested wake instant
        wake: DateTime<Utc>,
        /// First instant the chip would actually match
        fires_at: Option<DateTime<Utc>>,
    },

    /// Bus driver name not registered
    #[error("Bus driver not found: {0}")]
    DriverNotFound(String),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Field-less discriminant of [`NapError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NapErrorKind {
    /// See [`NapError::DeviceAbsent`]
    DeviceAbsent,
    /// See [`NapError::BusOpenFailed`]
    BusOpenFailed,
    /// See [`NapError::BusTransferFailed`]
    BusTransferFailed,
    /// See [`NapError::Unsupported12HourMode`]
    Unsupported12HourMode,
    /// See [`NapError::InvalidCalendar`]
    InvalidCalendar,
    /// See [`NapError::ShutdownActionFailed`]
    ShutdownActionFailed,
    /// See [`NapError::InvalidDelay`]
    InvalidDelay,
    /// See [`NapError::AlarmOutOfRange`]
    AlarmOutOfRange,
    /// See [`NapError::DriverNotFound`]
    DriverNotFound,
    /// See [`NapError::Config`]
    Config,
}

impl NapErrorKind {
    /// Hardware and protocol failures latch the orchestrator into the
    /// disabled state. Action, call and configuration errors do not.
    pub const fn is_hardware(&self) -> bool {
        matches!(
            self,
            NapErrorKind::DeviceAbsent
                | NapErrorKind::BusOpenFailed
                | NapErrorKind::BusTransferFailed
                | NapErrorKind::Unsupported12HourMode
                | NapErrorKind::InvalidCalendar
        )
    }
}

impl NapError {
    /// Discriminant of this error.
    pub fn kind(&self) -> NapErrorKind {
        match self {
            NapError::DeviceAbsent(_) => NapErrorKind::DeviceAbsent,
            NapError::BusOpenFailed(_) => NapErrorKind::BusOpenFailed,
            NapError::BusTransferFailed { .. } => NapErrorKind::BusTransferFailed,
            NapError::Unsupported12HourMode { .. } => NapErrorKind::Unsupported12HourMode,
            NapError::InvalidCalendar { .. } => NapErrorKind::InvalidCalendar,
            NapError::ShutdownActionFailed { .. } => NapErrorKind::ShutdownActionFailed,
            NapError::InvalidDelay(_) => NapErrorKind::InvalidDelay,
            NapError::AlarmOutOfRange { .. } => NapErrorKind::AlarmOutOfRange,
            NapError::DriverNotFound(_) => NapErrorKind::DriverNotFound,
            NapError::Config(_) => NapErrorKind::Config,
        }
    }

    /// Attach transfer context to a driver error.
    pub fn from_bus(
        err: BusError,
        operation: BusOperation,
        register: u8,
        expected: usize,
    ) -> Self {
        match err {
            BusError::DeviceAbsent(msg) => NapError::DeviceAbsent(msg),
            BusError::OpenFailed(msg) => NapError::BusOpenFailed(msg),
            BusError::NotOpen => NapError::BusTransferFailed {
                operation,
                register,
                expected,
                actual: 0,
                payload: RawFrame::new(),
                reason: "bus not open".to_string(),
            },
            BusError::TransferFailed {
                register,
                reason,
                partial,
            } => NapError::BusTransferFailed {
                operation,
                register,
                expected,
                actual: partial.len(),
                payload: partial,
                reason,
            },
        }
    }
}

impl From<ProtocolError> for NapError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::ShortRead { count, payload } => NapError::BusTransferFailed {
                operation: BusOperation::Read,
                register: TIME_REGISTER,
                expected: TIME_FRAME_LEN,
                actual: count,
                payload,
                reason: "not all bytes read".to_string(),
            },
            ProtocolError::Unsupported12HourMode { hours } => {
                NapError::Unsupported12HourMode { hours }
            }
            ProtocolError::InvalidCalendar { frame } => NapError::InvalidCalendar { frame },
        }
    }
}
