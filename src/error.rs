use log::error;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use strum_macros::EnumIter;
use thiserror::Error;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// Exit codes of the process, one per kind of fatal error
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum ExitCode {
    NoConfig = 1,
    InvalidConfig = 2,
    NoDevices = 3,
    PidFile = 4,
    Mqtt = 5,
    ApcupsdNotInstalled = 6,
    Apcaccess = 7,
    Unknown = 99,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Errors raised while loading the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read configuration {path}: {source}")]
    Missing {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid configuration {path}: {source}")]
    Invalid {
        path: String,
        source: toml::de::Error,
    },

    #[error("No devices configured")]
    NoDevices,
}

/// Errors raised while taking the PID file
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Daemon already running with PID {0}")]
    AlreadyRunning(u32),

    #[error("Cannot delete PID file {path}, process {pid} unavailable: {source}")]
    Stale {
        path: String,
        pid: String,
        source: std::io::Error,
    },

    #[error("Cannot write PID file {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

/// Errors raised by the message bus
#[derive(Debug, Error)]
pub enum BusError {
    #[error("MQTT connection failed: {0}")]
    Connect(#[from] rumqttc::ConnectionError),

    #[error("MQTT connection timed out")]
    ConnectTimeout,

    #[error("MQTT exception: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("Cannot encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Every error that stops the bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("Package apcupsd is not installed")]
    ApcupsdNotInstalled,

    #[error("Error running apcaccess: {0}")]
    Apcaccess(String),

    #[error("Unknown error running apcaccess ({host}:{port})")]
    UnknownCollection { host: String, port: u16 },

    #[error("Cannot install signal handler: {0}")]
    Signal(std::io::Error),
}

impl BridgeError {
    /// Exit code of the process when this error stops it
    pub fn exit_code(&self) -> ExitCode {
        match self {
            BridgeError::Config(ConfigError::Missing { .. }) => ExitCode::NoConfig,
            BridgeError::Config(ConfigError::Invalid { .. }) => ExitCode::InvalidConfig,
            BridgeError::Config(ConfigError::NoDevices) => ExitCode::NoDevices,
            BridgeError::Lock(LockError::Stale { .. }) => ExitCode::PidFile,
            BridgeError::Lock(_) => ExitCode::Unknown,
            BridgeError::Bus(_) => ExitCode::Mqtt,
            BridgeError::ApcupsdNotInstalled => ExitCode::ApcupsdNotInstalled,
            BridgeError::Apcaccess(_) => ExitCode::Apcaccess,
            BridgeError::UnknownCollection { .. } => ExitCode::Unknown,
            BridgeError::Signal(_) => ExitCode::Unknown,
        }
    }
}

/// Reports a fatal error to the error log, or to the console if there is none
///
/// Entries are timestamped in the `offset` time zone. The local offset can only be read before
/// the runtime starts other threads, so it is captured by the caller.
///
/// Writing the error log is best effort: if the file cannot be written, the error still goes to
/// the console.
pub fn report(err: &BridgeError, error_log: Option<&Path>, offset: UtcOffset) {
    error!("{err}");

    let Some(path) = error_log else {
        return;
    };

    let timestamp = timestamp(OffsetDateTime::now_utc(), offset);

    let written = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| writeln!(file, "[{timestamp}] {err}"));

    if let Err(e) = written {
        error!("Cannot write error log {}: {e}", path.display());
    }
}

fn timestamp(now: OffsetDateTime, offset: UtcOffset) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    now.to_offset(offset).format(&format).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use strum::IntoEnumIterator;
    use time::macros::{datetime, offset};

    #[test]
    fn test_exit_codes_are_distinct() {
        let codes: HashSet<i32> = ExitCode::iter().map(ExitCode::code).collect();

        assert_eq!(codes.len(), ExitCode::iter().count());
        assert!(!codes.contains(&0));
    }

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(
            BridgeError::from(ConfigError::NoDevices).exit_code(),
            ExitCode::NoDevices
        );
        assert_eq!(
            BridgeError::ApcupsdNotInstalled.exit_code().code(),
            6
        );
        assert_eq!(
            BridgeError::Apcaccess("boom".to_string()).exit_code().code(),
            7
        );
        assert_eq!(
            BridgeError::UnknownCollection {
                host: "ups".to_string(),
                port: 3551
            }
            .exit_code()
            .code(),
            99
        );
        assert_eq!(
            BridgeError::from(BusError::ConnectTimeout).exit_code(),
            ExitCode::Mqtt
        );
    }

    #[test]
    fn test_report_appends_to_error_log() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("error.log");

        report(&BridgeError::ApcupsdNotInstalled, Some(path.as_path()), UtcOffset::UTC);
        report(&BridgeError::Apcaccess("boom".to_string()), Some(path.as_path()), UtcOffset::UTC);

        let log = std::fs::read_to_string(&path)?;
        let lines: Vec<&str> = log.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] Package apcupsd is not installed"));
        assert!(lines[1].ends_with("] Error running apcaccess: boom"));

        Ok(())
    }

    #[test]
    fn test_timestamp_offset() {
        let now = datetime!(2024-03-01 23:15:02 UTC);

        assert_eq!(timestamp(now, UtcOffset::UTC), "2024-03-01 23:15:02");
        assert_eq!(timestamp(now, offset!(+2)), "2024-03-02 01:15:02");
        assert_eq!(timestamp(now, offset!(-5)), "2024-03-01 18:15:02");
    }
}
