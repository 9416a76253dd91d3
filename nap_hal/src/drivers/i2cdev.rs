//! Linux i2c-dev driver.
//!
//! Talks to the chip through `/dev/i2c-N`: the `I2C_SLAVE` ioctl binds the
//! chip address to the open descriptor, then plain `write(2)` / `read(2)`
//! calls carry the register pointer and payload.

use nap_common::rtc::codec::raw_frame;
use nap_common::rtc::driver::{BusConfig, BusDriver, BusError};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use tracing::{debug, info};

/// `I2C_SLAVE` from `<linux/i2c-dev.h>`.
const I2C_SLAVE: u32 = 0x0703;

nix::ioctl_write_int_bad!(
    /// Bind the chip address to an i2c-dev descriptor.
    i2c_slave,
    I2C_SLAVE
);

/// Largest register frame written in one transfer (pointer + payload).
const MAX_WRITE_LEN: usize = 16;

/// Bus driver backed by the Linux i2c-dev character device.
pub struct I2cDevDriver {
    file: Option<File>,
    address: Option<u8>,
}

impl I2cDevDriver {
    /// Create an unopened driver.
    pub fn new() -> Self {
        Self {
            file: None,
            address: None,
        }
    }

    fn select(&mut self, address: u8) -> Result<&mut File, BusError> {
        let file = self.file.as_mut().ok_or(BusError::NotOpen)?;
        if self.address != Some(address) {
            // SAFETY: the descriptor is owned by `file` and stays open for the call.
            unsafe { i2c_slave(file.as_raw_fd(), libc::c_int::from(address)) }.map_err(|e| {
                BusError::TransferFailed {
                    register: 0,
                    reason: format!("I2C_SLAVE {address:#04x}: {e}"),
                    partial: raw_frame(&[]),
                }
            })?;
            self.address = Some(address);
        }
        Ok(file)
    }
}

impl Default for I2cDevDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl BusDriver for I2cDevDriver {
    fn name(&self) -> &'static str {
        "i2cdev"
    }

    fn open(&mut self, config: &BusConfig) -> Result<(), BusError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.node)
            .map_err(|e| BusError::OpenFailed(format!("{}: {}", config.node.display(), e)))?;

        // SAFETY: `file` owns a valid descriptor for the duration of the call.
        unsafe { i2c_slave(file.as_raw_fd(), libc::c_int::from(config.address)) }.map_err(
            |e| {
                BusError::OpenFailed(format!(
                    "{}: I2C_SLAVE {:#04x}: {}",
                    config.node.display(),
                    config.address,
                    e
                ))
            },
        )?;

        info!(
            "Opened i2c bus {} ({}) for chip {:#04x}",
            config.bus_number,
            config.node.display(),
            config.address
        );
        self.file = Some(file);
        self.address = Some(config.address);
        Ok(())
    }

    fn write_block(&mut self, address: u8, register: u8, bytes: &[u8]) -> Result<(), BusError> {
        if bytes.len() >= MAX_WRITE_LEN {
            return Err(BusError::TransferFailed {
                register,
                reason: format!("{} byte payload too long", bytes.len()),
                partial: raw_frame(&[]),
            });
        }
        let mut frame = [0u8; MAX_WRITE_LEN];
        frame[0] = register;
        frame[1..=bytes.len()].copy_from_slice(bytes);
        let frame = &frame[..=bytes.len()];

        let file = self.select(address)?;
        let written = file.write(frame).map_err(|e| BusError::TransferFailed {
            register,
            reason: e.to_string(),
            partial: raw_frame(&[]),
        })?;
        if written != frame.len() {
            return Err(BusError::TransferFailed {
                register,
                reason: format!("short write: {written}/{} bytes", frame.len()),
                partial: raw_frame(&[]),
            });
        }
        debug!("i2c write {:#04x}: {:02x?}", register, bytes);
        Ok(())
    }

    fn read_block(
        &mut self,
        address: u8,
        register: u8,
        buf: &mut [u8],
    ) -> Result<usize, BusError> {
        let file = self.select(address)?;
        file.write_all(&[register])
            .map_err(|e| BusError::TransferFailed {
                register,
                reason: format!("set register pointer: {e}"),
                partial: raw_frame(&[]),
            })?;
        let count = file.read(buf).map_err(|e| BusError::TransferFailed {
            register,
            reason: e.to_string(),
            partial: raw_frame(&[]),
        })?;
        debug!("i2c read {:#04x}: {:02x?}", register, &buf[..count]);
        Ok(count)
    }

    fn close(&mut self) -> Result<(), BusError> {
        self.file = None;
        self.address = None;
        Ok(())
    }
}

/// Factory function to create an i2c-dev driver instance.
pub fn create_driver() -> Box<dyn BusDriver> {
    Box::new(I2cDevDriver::new())
}
