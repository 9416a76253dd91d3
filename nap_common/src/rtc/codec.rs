//! DS1337 register codec.
//!
//! Pure conversion between calendar time (`chrono::DateTime<Utc>`) and the
//! byte frames stored in the DS1337 registers. Nothing here touches the bus.
//!
//! # Register Model
//!
//! ```text
//! 0x00 seconds | minutes | hours | day (1-7) | date | month | year   (time frame)
//! 0x07 seconds | minutes | hours | date                             (alarm 1 frame)
//! 0x0E control                                                      (A1IE | A2IE | INTCN)
//! ```
//!
//! All fields are BCD. Bit 6 of the hours byte selects 12-hour mode, which
//! this codec refuses to decode.
//!
//! # Limitations
//!
//! The year register holds two digits. Years outside 2000..=2099 are encoded
//! as their low two decimal digits and therefore decode to the wrong century.

use crate::rtc::consts::{
    ALARM_FRAME_LEN, BASE_YEAR, HOURS_12H_FLAG, HOURS_24H_MASK, MONTH_MASK, TIME_FRAME_LEN,
};
use bitflags::bitflags;
use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use thiserror::Error;

/// Raw bytes captured from an incomplete or rejected read.
pub type RawFrame = heapless::Vec<u8, TIME_FRAME_LEN>;

/// Copy up to `TIME_FRAME_LEN` bytes into a [`RawFrame`] for diagnostics.
pub fn raw_frame(bytes: &[u8]) -> RawFrame {
    bytes.iter().take(TIME_FRAME_LEN).copied().collect()
}

/// Errors produced while decoding register frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Fewer bytes than a full time frame were supplied.
    #[error("Short read: got {count} of 7 bytes ({payload:02x?})")]
    ShortRead {
        /// Number of bytes actually supplied
        count: usize,
        /// Partial payload as read from the chip
        payload: RawFrame,
    },

    /// The hours register has the 12-hour mode bit set.
    #[error("12-hour mode not supported (hours register {hours:#04x})")]
    Unsupported12HourMode {
        /// Raw hours register value
        hours: u8,
    },

    /// The decoded fields do not name a real calendar instant.
    #[error("Invalid calendar time in frame {frame:02x?}")]
    InvalidCalendar {
        /// Full frame as read from the chip
        frame: RawFrame,
    },
}

bitflags! {
    /// DS1337 control register (0x0E) bits used by nap.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AlarmControl: u8 {
        /// Alarm 1 interrupt enable.
        const A1IE  = 0x01;
        /// Alarm 2 interrupt enable.
        const A2IE  = 0x02;
        /// Route alarms to the interrupt pin instead of the square wave.
        const INTCN = 0x04;
    }
}

impl AlarmControl {
    /// Both alarm channels enabled, interrupt output selected.
    /// Only alarm 1 is ever programmed.
    pub const WAKE: Self = Self::from_bits_truncate(
        Self::A1IE.bits() | Self::A2IE.bits() | Self::INTCN.bits(),
    );
}

/// Convert a decimal value in `0..=99` to packed BCD.
#[inline]
pub const fn dec_to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

/// Convert a packed BCD byte to decimal, applying `mask` first if given.
#[inline]
pub const fn bcd_to_dec(byte: u8, mask: Option<u8>) -> u8 {
    let x = match mask {
        Some(m) => byte & m,
        None => byte,
    };
    (x >> 4) * 10 + (x & 0x0F)
}

/// Encode a UTC timestamp into the 7-byte time frame.
pub fn encode_time_frame(timestamp: &DateTime<Utc>) -> [u8; TIME_FRAME_LEN] {
    let weekday = timestamp.weekday().num_days_from_sunday() as u8 + 1;
    let year = (timestamp.year() - BASE_YEAR).rem_euclid(100) as u8;

    [
        dec_to_bcd(timestamp.second() as u8),
        dec_to_bcd(timestamp.minute() as u8),
        dec_to_bcd(timestamp.hour() as u8),
        dec_to_bcd(weekday),
        dec_to_bcd(timestamp.day() as u8),
        dec_to_bcd(timestamp.month() as u8),
        dec_to_bcd(year),
    ]
}

/// Decode a time frame read from register 0x00.
///
/// The day-of-week byte is ignored.
///
/// # Errors
/// - `ProtocolError::ShortRead` if fewer than 7 bytes were supplied
/// - `ProtocolError::Unsupported12HourMode` if hours bit 6 is set
/// - `ProtocolError::InvalidCalendar` if the fields do not form a valid date/time
pub fn decode_time_frame(bytes: &[u8]) -> Result<DateTime<Utc>, ProtocolError> {
    if bytes.len() < TIME_FRAME_LEN {
        return Err(ProtocolError::ShortRead {
            count: bytes.len(),
            payload: raw_frame(bytes),
        });
    }

    // Only 24h mode is supported.
    if bytes[2] & HOURS_12H_FLAG != 0 {
        return Err(ProtocolError::Unsupported12HourMode { hours: bytes[2] });
    }

    let second = bcd_to_dec(bytes[0], None);
    let minute = bcd_to_dec(bytes[1], None);
    let hour = bcd_to_dec(bytes[2], Some(HOURS_24H_MASK));
    let date = bcd_to_dec(bytes[4], None);
    let month = bcd_to_dec(bytes[5], Some(MONTH_MASK));
    let year = i32::from(bcd_to_dec(bytes[6], None)) + BASE_YEAR;

    Utc.with_ymd_and_hms(
        year,
        u32::from(month),
        u32::from(date),
        u32::from(hour),
        u32::from(minute),
        u32::from(second),
    )
    .single()
    .ok_or_else(|| ProtocolError::InvalidCalendar {
        frame: raw_frame(bytes),
    })
}

/// Absolute alarm 1 trigger: day-of-month plus time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmFrame {
    /// Day of month (1-31)
    pub date: u8,
    /// Hour (0-23)
    pub hour: u8,
    /// Minute (0-59)
    pub minute: u8,
    /// Second (0-59)
    pub second: u8,
}

impl AlarmFrame {
    /// Decompose a UTC wake instant into alarm fields.
    pub fn from_instant(wake: &DateTime<Utc>) -> Self {
        Self {
            date: wake.day() as u8,
            hour: wake.hour() as u8,
            minute: wake.minute() as u8,
            second: wake.second() as u8,
        }
    }

    /// Encode as the 4-byte alarm 1 frame.
    pub fn encode(&self) -> [u8; ALARM_FRAME_LEN] {
        encode_alarm_frame(self.date, self.hour, self.minute, self.second)
    }

    /// First instant strictly after `now` at which the chip's
    /// date/hour/minute/second comparator matches this alarm.
    ///
    /// Months that lack `date` (e.g. the 31st in April) are skipped, as the
    /// chip never reaches that date register value in them.
    pub fn next_match(&self, now: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        let (mut year, mut month) = (now.year(), now.month());

        // Every day 1..=31 occurs at least once in any 13 consecutive months.
        for _ in 0..13 {
            let candidate = Utc
                .with_ymd_and_hms(
                    year,
                    month,
                    u32::from(self.date),
                    u32::from(self.hour),
                    u32::from(self.minute),
                    u32::from(self.second),
                )
                .single();

            if let Some(t) = candidate.filter(|t| t > now) {
                return Some(t);
            }

            if month == 12 {
                year += 1;
                month = 1;
            } else {
                month += 1;
            }
        }
        None
    }
}

/// Encode the alarm 1 frame in register order {sec, min, hour, date}.
pub fn encode_alarm_frame(date: u8, hour: u8, min: u8, sec: u8) -> [u8; ALARM_FRAME_LEN] {
    [dec_to_bcd(sec), dec_to_bcd(min), dec_to_bcd(hour), dec_to_bcd(date)]
}

/// Control register value written before programming the alarm.
#[inline]
pub const fn alarm_control_byte() -> u8 {
    AlarmControl::WAKE.bits()
}
