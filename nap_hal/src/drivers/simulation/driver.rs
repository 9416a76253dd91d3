//! Simulation driver implementation.
//!
//! The `SimulationDriver` implements the `BusDriver` trait on top of a
//! [`SimulatedRtc`], so the orchestrator can be exercised without an I2C
//! adapter.

use super::state::SimulatedRtc;
use nap_common::rtc::codec::raw_frame;
use nap_common::rtc::driver::{BusConfig, BusDriver, BusError};
use std::path::Path;
use tracing::{debug, info};

/// Simulation driver implementing the BusDriver trait.
pub struct SimulationDriver {
    /// Driver name
    name: &'static str,
    /// Simulated chip
    rtc: SimulatedRtc,
    /// Set by a successful `open()`
    opened: bool,
}

impl SimulationDriver {
    /// Create a driver backed by a fresh simulated chip.
    pub fn new() -> Self {
        Self::with_rtc(SimulatedRtc::new())
    }

    /// Create a driver backed by an existing chip handle.
    pub fn with_rtc(rtc: SimulatedRtc) -> Self {
        Self {
            name: "simulation",
            rtc,
            opened: false,
        }
    }

    /// Handle to the simulated chip.
    pub fn rtc(&self) -> SimulatedRtc {
        self.rtc.clone()
    }
}

impl Default for SimulationDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl BusDriver for SimulationDriver {
    fn name(&self) -> &'static str {
        self.name
    }

    fn probe(&self, node: &Path) -> Result<(), BusError> {
        if self.rtc.is_absent() {
            return Err(BusError::DeviceAbsent(format!(
                "{}: simulated device absent",
                node.display()
            )));
        }
        debug!("Simulated probe of {} ok", node.display());
        Ok(())
    }

    fn open(&mut self, config: &BusConfig) -> Result<(), BusError> {
        self.rtc
            .open()
            .map_err(|e| BusError::OpenFailed(format!("{}: {}", config.node.display(), e)))?;
        self.opened = true;
        info!(
            "Simulation driver opened bus {} (chip at {:#04x})",
            config.bus_number,
            self.rtc.address()
        );
        Ok(())
    }

    fn write_block(&mut self, address: u8, register: u8, bytes: &[u8]) -> Result<(), BusError> {
        if !self.opened {
            return Err(BusError::NotOpen);
        }
        self.rtc
            .write(address, register, bytes)
            .map_err(|reason| BusError::TransferFailed {
                register,
                reason,
                partial: raw_frame(&[]),
            })
    }

    fn read_block(
        &mut self,
        address: u8,
        register: u8,
        buf: &mut [u8],
    ) -> Result<usize, BusError> {
        if !self.opened {
            return Err(BusError::NotOpen);
        }
        self.rtc
            .read(address, register, buf)
            .map_err(|reason| BusError::TransferFailed {
                register,
                reason,
                partial: raw_frame(&[]),
            })
    }

    fn close(&mut self) -> Result<(), BusError> {
        info!("Closing simulation driver");
        self.opened = false;
        Ok(())
    }
}
