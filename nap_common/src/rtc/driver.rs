//! Bus driver trait and error types.
//!
//! This module defines:
//! - `BusDriver` trait - Interface for pluggable register-bus backends
//! - `BusError` enum - Error types for bus operations
//! - `BusConfig` struct - Device node, bus number and chip address
//! - `DriverFactory` type alias - Factory function type

use crate::rtc::codec::RawFrame;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error types for bus operations.
#[derive(Debug, Clone, Error)]
pub enum BusError {
    /// Device node does not exist
    #[error("Device not present: {0}")]
    DeviceAbsent(String),

    /// Opening the bus or selecting the chip address failed
    #[error("Bus open failed: {0}")]
    OpenFailed(String),

    /// Transfer attempted before `open()`
    #[error("Bus not open")]
    NotOpen,

    /// Register read or write failed
    #[error("Transfer failed at register {register:#04x}: {reason}")]
    TransferFailed {
        /// First register of the transfer
        register: u8,
        /// Driver-specific failure description
        reason: String,
        /// Bytes received before the failure, if any
        partial: RawFrame,
    },
}

/// Factory function type for creating driver instances.
pub type DriverFactory = fn() -> Box<dyn BusDriver>;

/// Bus session parameters derived from the validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Device node, e.g. `/dev/i2c-1`
    pub node: PathBuf,
    /// Bus number parsed from the node name
    pub bus_number: u32,
    /// Seven-bit chip address
    pub address: u8,
}

/// Trait defining the interface for register-bus drivers.
///
/// `NapCore` owns exactly one driver and serializes every call to it.
///
/// # Lifecycle
///
/// 1. `probe()` - Check that the device node exists
/// 2. `open()` - Acquire the bus and bind the chip address
/// 3. `write_block()` / `read_block()` - Blocking register transfers
/// 4. `close()` - Release the bus
///
/// No call has a timeout. A hung transfer blocks the caller.
pub trait BusDriver: Send {
    /// Returns the driver's unique identifier (e.g., "i2cdev", "simulation").
    fn name(&self) -> &'static str;

    /// Check that the device node exists.
    ///
    /// # Errors
    /// Return `BusError::DeviceAbsent` if the node cannot be found.
    fn probe(&self, node: &Path) -> Result<(), BusError> {
        std::fs::metadata(node)
            .map(|_| ())
            .map_err(|e| BusError::DeviceAbsent(format!("{}: {}", node.display(), e)))
    }

    /// Open the bus described by `config`.
    ///
    /// # Errors
    /// Return `BusError::OpenFailed` if the bus cannot be acquired.
    fn open(&mut self, config: &BusConfig) -> Result<(), BusError>;

    /// Write `bytes` starting at chip register `register`.
    fn write_block(&mut self, address: u8, register: u8, bytes: &[u8]) -> Result<(), BusError>;

    /// Read up to `buf.len()` bytes starting at chip register `register`.
    ///
    /// Returns the number of bytes actually read, which may be short.
    fn read_block(&mut self, address: u8, register: u8, buf: &mut [u8])
    -> Result<usize, BusError>;

    /// Release the bus.
    /// Default: no-op
    fn close(&mut self) -> Result<(), BusError> {
        Ok(())
    }
}
