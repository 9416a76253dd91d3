//! Nap configuration types.
//!
//! This module contains the `[nap]` section of `nap.toml` and its eager
//! validation into a [`ValidatedNapConfig`]:
//! - `device_address` - decimal string, seven-bit chip address
//! - `device_rtc` - device node of the form `<bus-name>-<N>`
//! - `shutdown_command` - executable performing the physical halt
//! - `allow_mock` - degrade hardware failures to simulated success
//!
//! The camelCase option names are accepted as aliases.

use crate::config::{ConfigError, ConfigLoader, SharedConfig, resolve_path};
use crate::rtc::consts::{DEFAULT_DRIVER, MAX_DEVICE_ADDRESS};
use crate::rtc::driver::BusConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default function for driver
fn default_driver() -> String {
    DEFAULT_DRIVER.to_string()
}

/// Top-level layout of `nap.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NapAppConfig {
    /// Logging and service identity.
    pub shared: SharedConfig,
    /// RTC and shutdown settings.
    pub nap: NapConfig,
}

/// `[nap]` section as written in the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NapConfig {
    /// Chip address as a decimal string (e.g. "104" for 0x68).
    #[serde(alias = "deviceAddress")]
    pub device_address: String,

    /// Device node of the bus, e.g. `/dev/i2c-1`.
    #[serde(alias = "deviceRTC")]
    pub device_rtc: String,

    /// Shutdown executable, relative paths resolve against the config dir.
    #[serde(alias = "shutdownCommand")]
    pub shutdown_command: PathBuf,

    /// Extra arguments passed to the shutdown executable.
    #[serde(default, alias = "shutdownArgs")]
    pub shutdown_args: Vec<String>,

    /// Treat hardware failures as simulated success.
    #[serde(alias = "allowMock")]
    pub allow_mock: bool,

    /// Bus driver name ("i2cdev" or "simulation").
    #[serde(default = "default_driver")]
    pub driver: String,
}

/// Configuration after eager validation, ready for `NapCore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedNapConfig {
    /// Bus session parameters.
    pub bus: BusConfig,
    /// Absolute or config-relative-resolved shutdown executable.
    pub shutdown_command: PathBuf,
    /// Extra shutdown arguments.
    pub shutdown_args: Vec<String>,
    /// Mock fallback permitted.
    pub allow_mock: bool,
    /// Bus driver name.
    pub driver: String,
}

impl NapConfig {
    /// Validate the section and resolve paths against `config_dir`.
    ///
    /// # Validation Rules
    /// 1. `device_address` is a decimal integer <= 0x7F
    /// 2. `device_rtc` ends in `-<N>` with a decimal bus number
    /// 3. `shutdown_command` is not empty
    /// 4. `driver` is not empty
    pub fn validate(&self, config_dir: &Path) -> Result<ValidatedNapConfig, ConfigError> {
        let address = parse_device_address(&self.device_address)?;
        let bus_number = parse_bus_number(&self.device_rtc)?;

        if self.shutdown_command.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "shutdown_command cannot be empty".to_string(),
            ));
        }

        if self.driver.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "driver cannot be empty".to_string(),
            ));
        }

        let shutdown_command = resolve_path(config_dir, &self.shutdown_command);
        debug!(
            "Validated nap config: address={:#04x}, bus={} ({}), shutdown={:?}, allow_mock={}",
            address, bus_number, self.device_rtc, shutdown_command, self.allow_mock
        );

        Ok(ValidatedNapConfig {
            bus: BusConfig {
                node: PathBuf::from(&self.device_rtc),
                bus_number,
                address,
            },
            shutdown_command,
            shutdown_args: self.shutdown_args.clone(),
            allow_mock: self.allow_mock,
            driver: self.driver.clone(),
        })
    }
}

/// Parse a decimal seven-bit chip address.
pub fn parse_device_address(value: &str) -> Result<u8, ConfigError> {
    let address: u32 = value.trim().parse().map_err(|_| {
        ConfigError::ValidationError(format!(
            "device_address '{value}' is not a decimal integer"
        ))
    })?;

    if address > u32::from(MAX_DEVICE_ADDRESS) {
        return Err(ConfigError::ValidationError(format!(
            "device_address {address} exceeds 7-bit range (max {MAX_DEVICE_ADDRESS})"
        )));
    }

    Ok(address as u8)
}

/// Parse the bus number from a `<bus-name>-<N>` device node.
pub fn parse_bus_number(device_rtc: &str) -> Result<u32, ConfigError> {
    let invalid = || {
        ConfigError::ValidationError(format!(
            "device_rtc '{device_rtc}' is not of the form <bus-name>-<N>"
        ))
    };

    let (name, number) = device_rtc.rsplit_once('-').ok_or_else(invalid)?;
    if name.is_empty() || number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    number.parse().map_err(|_| invalid())
}

/// Load `nap.toml`, validate both sections and resolve relative paths
/// against the file's directory.
pub fn load_nap_config(path: &Path) -> Result<(SharedConfig, ValidatedNapConfig), ConfigError> {
    let app = NapAppConfig::load(path)?;
    app.shared.validate()?;

    let config_dir = path.parent().unwrap_or(Path::new("."));
    let nap = app.nap.validate(config_dir)?;
    Ok((app.shared, nap))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section() -> NapConfig {
        NapConfig {
            device_address: "104".to_string(),
            device_rtc: "/dev/i2c-1".to_string(),
            shutdown_command: PathBuf::from("bin/halt.sh"),
            shutdown_args: Vec::new(),
            allow_mock: false,
            driver: default_driver(),
        }
    }

    #[test]
    fn test_validate_success() {
        let validated = section().validate(Path::new("/etc/nap")).unwrap();
        assert_eq!(validated.bus.address, 0x68);
        assert_eq!(validated.bus.bus_number, 1);
        assert_eq!(validated.bus.node, PathBuf::from("/dev/i2c-1"));
        assert_eq!(
            validated.shutdown_command,
            PathBuf::from("/etc/nap/bin/halt.sh")
        );
        assert_eq!(validated.driver, "i2cdev");
    }

    #[test]
    fn test_device_address_is_decimal() {
        assert_eq!(parse_device_address("104").unwrap(), 104);
        assert_eq!(parse_device_address(" 81 ").unwrap(), 81);
        assert!(parse_device_address("0x68").is_err());
        assert!(parse_device_address("").is_err());
    }

    #[test]
    fn test_device_address_range() {
        assert_eq!(parse_device_address("127").unwrap(), 127);
        assert!(matches!(
            parse_device_address("128"),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_bus_number_parsing() {
        assert_eq!(parse_bus_number("/dev/i2c-1").unwrap(), 1);
        assert_eq!(parse_bus_number("/dev/i2c-12").unwrap(), 12);
        assert!(parse_bus_number("/dev/i2c").is_err());
        assert!(parse_bus_number("/dev/i2c-").is_err());
        assert!(parse_bus_number("/dev/i2c-x").is_err());
        assert!(parse_bus_number("-1").is_err());
    }

    #[test]
    fn test_empty_shutdown_command_rejected() {
        let mut cfg = section();
        cfg.shutdown_command = PathBuf::new();
        assert!(matches!(
            cfg.validate(Path::new(".")),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_camel_case_aliases() {
        let cfg: NapConfig = toml::from_str(
            r#"
deviceAddress = "104"
deviceRTC = "/dev/i2c-1"
shutdownCommand = "/sbin/poweroff"
allowMock = true
"#,
        )
        .unwrap();
        assert!(cfg.allow_mock);
        assert_eq!(cfg.driver, "i2cdev");
        assert!(cfg.shutdown_args.is_empty());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<NapConfig, _> = toml::from_str(
            r#"
device_address = "104"
device_rtc = "/dev/i2c-1"
shutdown_command = "/sbin/poweroff"
allow_mock = true
alarm_channel = 2
"#,
        );
        assert!(result.is_err());
    }
}
