//! Bus driver implementations.
//!
//! - [`i2cdev`] - Linux `/dev/i2c-N` character device
//! - [`simulation`] - In-memory DS1337 for development and testing
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement the `BusDriver` trait from `nap_common::rtc::driver`
//! 3. Register the driver in `register_all_drivers()`

pub mod i2cdev;
pub mod simulation;

use crate::driver_registry::DriverRegistry;

/// Register all built-in drivers with `registry`.
pub fn register_all_drivers(registry: &mut DriverRegistry) {
    registry.register("i2cdev", i2cdev::create_driver);
    registry.register("simulation", simulation::create_driver);
}
