//! # apcupsd2mqtt
//!
//! `apcupsd2mqtt` polls UPS devices through apcupsd and publishes their status to MQTT, with
//! discovery for Home Assistant.
//!

pub use self::bus::{Bus, MqttBus};
pub use self::catalog::{FieldCatalog, FieldDescriptor, ValueExtractor};
pub use self::collector::{Apcaccess, StatusSource};
pub use self::configuration::Configuration;
pub use self::daemon::{Control, Daemon, DaemonState};
pub use self::error::{BridgeError, ExitCode};
pub use self::home_assistant::DiscoveryDocument;
pub use self::report::{RawReport, SensorSnapshot};
pub use self::status::StatusMessage;

/// Contains the message bus
pub mod bus;
/// Contains the fields known in apcupsd reports
pub mod catalog;
/// Contains the status query of the UPS
pub mod collector;
/// Contains the configuration stuff
pub mod configuration;
/// Contains the export of the Home Assistant customization
pub mod customization;
/// Contains the daemon code
pub mod daemon;
/// Contains the errors and the exit codes
pub mod error;
/// Contains Home Assistant discovery
pub mod home_assistant;
/// Contains the PID file
pub mod pid_file;
/// Contains the parsing of the reports
pub mod report;
/// Contains the status that is sent to MQTT
pub mod status;
