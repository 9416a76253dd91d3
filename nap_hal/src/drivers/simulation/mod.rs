//! Simulation driver module.
//!
//! This module provides a simulated DS1337 behind the `BusDriver` trait for
//! development and testing without physical hardware.

mod driver;
mod state;

pub use driver::SimulationDriver;
pub use state::{
    DEFAULT_SIM_ADDRESS, REGISTER_COUNT, SimFaults, SimulatedRtc, Transfer, TransferKind,
};

use nap_common::rtc::driver::BusDriver;

/// Factory function to create a simulation driver instance.
pub fn create_driver() -> Box<dyn BusDriver> {
    Box::new(SimulationDriver::new())
}
