//! # NAP HAL Library
//!
//! Halt/restart orchestration for boards whose power is cycled by a
//! battery-backed DS1337 RTC, with pluggable bus drivers.
//!
//! Drivers implement the `BusDriver` trait defined in `nap_common::rtc::driver`.
//!
//! # Module Structure
//!
//! - [`core`] - NapCore struct, startup sync and halt sequence
//! - [`driver_registry`] - Driver factory registration
//! - [`drivers`] - Bus driver implementations
//! - [`error`] - Orchestrator error taxonomy
//! - [`latch`] - Sticky disable latch
//! - [`shutdown`] - Power-off action
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     nap_hal (single crate)                       │
//! │  ┌──────────────┐    ┌──────────────┐    ┌────────────────────┐  │
//! │  │ ShutdownAction│◄──│   NapCore    │◄──►│  Driver Registry   │  │
//! │  │  (command)    │   │ (halt seq.)  │    │                    │  │
//! │  └──────────────┘    └──────┬───────┘    └────────────────────┘  │
//! │                             │ Mutex                              │
//! │                             ▼                                    │
//! │                    ┌────────────────┐                            │
//! │                    │  BusDriver     │ (trait object)             │
//! │                    │  i2cdev / sim  │                            │
//! │                    └────────────────┘                            │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![deny(warnings)]
#![deny(missing_docs)]

pub mod core;
pub mod driver_registry;
pub mod drivers;
pub mod error;
pub mod latch;
pub mod shutdown;

// Re-export key types for convenience
pub use crate::core::{HaltPhase, HaltReport, HaltStats, NapCore, Startup};
pub use crate::driver_registry::DriverRegistry;
pub use crate::error::{NapError, NapErrorKind};
pub use crate::shutdown::{CommandShutdown, ShutdownAction};
