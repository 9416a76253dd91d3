//! Prelude module for common re-exports.
//!
//! ```rust
//! use nap_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig};
pub use crate::rtc::config::{NapConfig, ValidatedNapConfig, load_nap_config};

// ─── Register Codec ─────────────────────────────────────────────────
pub use crate::rtc::codec::{
    AlarmFrame, ProtocolError, alarm_control_byte, decode_time_frame, encode_alarm_frame,
    encode_time_frame,
};
pub use crate::rtc::consts::{ALARM1_REGISTER, CONTROL_REGISTER, TIME_FRAME_LEN, TIME_REGISTER};

// ─── Bus ────────────────────────────────────────────────────────────
pub use crate::rtc::driver::{BusConfig, BusDriver, BusError, DriverFactory};
