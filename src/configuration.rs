use crate::error::ConfigError;
use serde::Deserialize;
use serde_inline_default::serde_inline_default;
use std::path::PathBuf;

/// Number of microseconds in a second, the base unit of the poll interval
pub const MICROS_PER_SECOND: u64 = 1_000_000;

/// Contains the configuration for communicating with the MQTT broker
#[serde_inline_default]
#[derive(Deserialize, Debug)]
pub struct Mqtt {
    /// Hostname or IP address. Default: localhost
    #[serde_inline_default(String::from("localhost"))]
    pub host: String,

    /// Port of the connection to the broker. Default: 1883
    #[serde_inline_default(1883)]
    pub port: u16,

    /// Username for the connection to the broker. Default: empty
    #[serde(default)]
    pub user: String,

    /// Password for the connection to the broker. Default: empty
    #[serde(default)]
    pub password: String,

    /// MQTT client ID. Default: `apcupsd2mqtt-` followed by the machine hostname
    #[serde(default = "client_id", rename = "client-id")]
    pub client_id: String,
}

/// A UPS monitored through an `apcupsd` network information server
#[serde_inline_default]
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Device {
    /// Name of the device, shown in Home Assistant
    pub name: String,

    /// Host running `apcupsd`. Devices without a host are not polled
    #[serde(default)]
    pub host: String,

    /// Port of the `apcupsd` network information server. Default: 3551
    #[serde_inline_default(3551)]
    pub port: u16,

    /// Prefix of the Home Assistant discovery topics for this device, for example
    /// `homeassistant/sensor/ups_office`
    ///
    /// Discovery is disabled for the device when this is not set.
    ///
    /// See <https://www.home-assistant.io/integrations/mqtt#discovery-options>
    #[serde(rename = "ha-topic")]
    pub ha_topic: Option<String>,
}

/// Contains all the configuration for `apcupsd2mqtt`
#[serde_inline_default]
#[derive(Deserialize, Debug)]
pub struct Configuration {
    /// Contains the configuration for communicating with the MQTT broker
    pub mqtt: Mqtt,

    /// Monitored UPS devices
    #[serde(default)]
    pub devices: Vec<Device>,

    /// Delay between the start of two poll cycles in seconds, fractions allowed. Default: 1 second
    ///
    /// 0 means that a cycle starts as soon as the previous one is done.
    #[serde_inline_default(1.0)]
    pub interval: f64,

    /// Report keys sent to Home Assistant discovery. Default: empty, which means every known key
    #[serde(default)]
    pub properties: Vec<String>,

    /// Path of the PID file that prevents two bridges from running together
    #[serde(rename = "pid-file")]
    pub pid_file: Option<PathBuf>,

    /// File receiving the fatal errors. Default: errors only go to the console
    #[serde(rename = "error-log")]
    pub error_log: Option<PathBuf>,

    /// Sets the verbosity of the logs.
    ///   * 1 => Error
    ///  * 2 => Warning
    ///  * 3 => Info
    ///  * 4 => Debug
    ///  * 5 => Trace
    #[serde_inline_default(2)]
    #[serde(rename = "log-verbosity")]
    pub log_verbosity: usize,
}

fn client_id() -> String {
    let host = sysinfo::System::host_name().unwrap_or_else(|| String::from("localhost"));
    format!("apcupsd2mqtt-{host}")
}

impl Configuration {
    /// Load the configuration from a file
    ///
    /// ## Example
    ///
    /// ```
    /// use apcupsd2mqtt::Configuration;
    ///
    /// let config = Configuration::load("conf/apcupsd2mqtt.conf").expect("Cannot load configuration");
    ///
    /// assert_eq!(config.mqtt.host, "localhost");
    /// ```
    pub fn load(path: &str) -> Result<Configuration, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Missing {
            path: path.to_string(),
            source,
        })?;

        Self::parse(&text).map_err(|err| match err {
            ConfigError::Invalid { source, .. } => ConfigError::Invalid {
                path: path.to_string(),
                source,
            },
            other => other,
        })
    }

    /// Parses a configuration from its TOML text
    pub fn parse(text: &str) -> Result<Configuration, ConfigError> {
        let config: Configuration =
            toml::from_str(text).map_err(|source| ConfigError::Invalid {
                path: String::new(),
                source,
            })?;

        if config.devices.is_empty() {
            return Err(ConfigError::NoDevices);
        }

        Ok(config)
    }

    /// Delay between the start of two cycles in microseconds
    ///
    /// Negative intervals count as 0.
    pub fn interval_micros(&self) -> u64 {
        (self.interval * MICROS_PER_SECOND as f64).round().max(0.0) as u64
    }

    /// Returns `true` if the raw key may be announced to Home Assistant
    pub fn is_property_allowed(&self, raw_key: &str) -> bool {
        self.properties.is_empty() || self.properties.iter().any(|p| p == raw_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test that we can properly load the default configuration
    #[test]
    fn test_default_config() -> Result<(), ConfigError> {
        let conf = Configuration::load("conf/apcupsd2mqtt.conf")?;

        assert_eq!(conf.mqtt.host, String::from("localhost"));
        assert_eq!(conf.mqtt.port, 1883);
        assert!(conf.mqtt.client_id.starts_with("apcupsd2mqtt-"));
        assert_eq!(conf.interval, 1.0);
        assert_eq!(conf.interval_micros(), 1_000_000);

        assert_eq!(conf.devices.len(), 1);
        assert_eq!(conf.devices[0].host, "127.0.0.1");
        assert_eq!(conf.devices[0].port, 3551);

        // Every property is announced by default
        assert!(conf.properties.is_empty());
        assert!(conf.is_property_allowed("LINEV"));

        Ok(())
    }

    #[test]
    fn test_devices() -> Result<(), ConfigError> {
        let conf = Configuration::parse(
            r#"
            interval = 0
            properties = ["LINEV", "BCHARGE"]

            [mqtt]

            [[devices]]
            name = "Office"
            host = "10.0.0.2"
            ha-topic = "homeassistant/sensor/ups_office"

            [[devices]]
            name = "Spare"
            port = 3552
            "#,
        )?;

        assert_eq!(conf.interval_micros(), 0);
        assert_eq!(conf.devices[0].port, 3551);
        assert_eq!(
            conf.devices[0].ha_topic.as_deref(),
            Some("homeassistant/sensor/ups_office")
        );
        assert_eq!(conf.devices[1].host, "");
        assert_eq!(conf.devices[1].ha_topic, None);

        assert!(conf.is_property_allowed("BCHARGE"));
        assert!(!conf.is_property_allowed("STATUS"));

        Ok(())
    }

    #[test]
    fn test_fractional_interval() -> Result<(), ConfigError> {
        let devices = "[mqtt]\n[[devices]]\nname = \"UPS\"";

        let conf = Configuration::parse(&format!("interval = 0.5\n{devices}"))?;
        assert_eq!(conf.interval_micros(), 500_000);

        let conf = Configuration::parse(&format!("interval = 2.25\n{devices}"))?;
        assert_eq!(conf.interval_micros(), 2_250_000);

        let conf = Configuration::parse(&format!("interval = -1\n{devices}"))?;
        assert_eq!(conf.interval_micros(), 0);

        Ok(())
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            Configuration::load("conf/does-not-exist.conf"),
            Err(ConfigError::Missing { .. })
        ));
        assert!(matches!(
            Configuration::parse("[mqtt"),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(matches!(
            Configuration::parse("[mqtt]\n"),
            Err(ConfigError::NoDevices)
        ));
    }
}
