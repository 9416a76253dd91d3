//! Real-time clock register map, codec and bus contract.
//!
//! This module contains everything needed to talk to the DS1337 RTC
//! without performing any I/O itself: register constants, the pure
//! BCD codec, the bus driver trait, and the nap configuration.

pub mod codec;
pub mod config;
pub mod consts;
pub mod driver;
