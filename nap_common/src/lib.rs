//! NAP Common Library
//!
//! This crate provides the shared configuration loader, the bus driver
//! contract and the DS1337 register codec used by all nap workspace crates.
//!
//! # Module Structure
//!
//! - [`config`] - Configuration loading traits and types
//! - [`rtc`] - RTC register map, codec, bus driver trait and nap configuration
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! Add to your `Cargo.toml` with alias for shorter imports:
//! ```toml
//! [dependencies]
//! nap = { package = "nap_common", path = "../nap_common" }
//! ```
//!
//! Then import:
//! ```rust
//! use nap_common::rtc::codec::{decode_time_frame, encode_time_frame};
//! use nap_common::config::{ConfigLoader, SharedConfig};
//! ```

pub mod config;
pub mod prelude;
pub mod rtc;
