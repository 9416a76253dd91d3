//! DS1337 register map and nap defaults.
//!
//! Single source of truth for register addresses and frame lengths.
//! The layout matches the DS1337 datasheet register map.

use static_assertions::const_assert_eq;

/// Canonical service name (used for logging).
pub const NAP_SERVICE_NAME: &str = "nap";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/nap/nap.toml";

/// Default bus driver name.
pub const DEFAULT_DRIVER: &str = "i2cdev";

/// First register of the time frame (seconds).
pub const TIME_REGISTER: u8 = 0x00;

/// Time frame length: seconds, minutes, hours, day, date, month, year.
pub const TIME_FRAME_LEN: usize = 7;

/// First register of alarm 1 (seconds).
pub const ALARM1_REGISTER: u8 = 0x07;

/// Alarm 1 frame length: seconds, minutes, hours, date.
pub const ALARM_FRAME_LEN: usize = 4;

/// Control register holding the alarm interrupt enables.
pub const CONTROL_REGISTER: u8 = 0x0E;

/// Hours register bit selecting 12-hour mode.
pub const HOURS_12H_FLAG: u8 = 0x40;

/// Mask applied to the hours register in 24-hour mode.
pub const HOURS_24H_MASK: u8 = 0x3F;

/// Mask applied to the month register (strips the century bit).
pub const MONTH_MASK: u8 = 0x1F;

/// Base year of the two-digit year register.
pub const BASE_YEAR: i32 = 2000;

/// Highest seven-bit bus address.
pub const MAX_DEVICE_ADDRESS: u8 = 0x7F;

// Alarm 1 starts right after the time frame and ends before alarm 2 + control.
const_assert_eq!(TIME_REGISTER as usize + TIME_FRAME_LEN, ALARM1_REGISTER as usize);
const_assert_eq!(ALARM1_REGISTER as usize + ALARM_FRAME_LEN + 3, CONTROL_REGISTER as usize);
