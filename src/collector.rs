use crate::report::{RawReport, parse};
use log::debug;
use std::future::Future;
use std::io::ErrorKind;
use tokio::process::Command;

/// Source of UPS status reports
pub trait StatusSource {
    /// Queries the status of the UPS served at `host:port`
    ///
    /// Returns the whole output of the query, errors included.
    fn query(&self, host: &str, port: u16) -> impl Future<Output = String> + Send;
}

/// Queries the status with the `apcaccess` tool shipped with apcupsd
///
/// There is no timeout on top of the one `apcaccess` applies to its own connection.
#[derive(Debug, Clone)]
pub struct Apcaccess {
    program: String,
}

impl Apcaccess {
    pub fn new() -> Apcaccess {
        Self::with_program("apcaccess")
    }

    /// Uses another executable, which must accept the `-h host:port` argument of `apcaccess`
    pub fn with_program(program: &str) -> Apcaccess {
        Apcaccess {
            program: program.to_string(),
        }
    }
}

impl Default for Apcaccess {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusSource for Apcaccess {
    async fn query(&self, host: &str, port: u16) -> String {
        let output = Command::new(&self.program)
            .arg("-h")
            .arg(format!("{host}:{port}"))
            .output()
            .await;

        match output {
            // Errors of the tool are read the same way as its report
            Ok(output) => {
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                text
            }
            Err(e) if e.kind() == ErrorKind::NotFound => format!("{}: not found", self.program),
            Err(e) => format!("{}: {e}", self.program),
        }
    }
}

/// Kind of a failed status query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The query tool is not installed
    ToolMissing,

    /// The UPS host refused the connection or cannot be reached
    Unreachable,

    /// The tool failed for another reason
    Other,

    /// The tool failed without saying anything
    Unknown,
}

/// Status query that didn't produce a report
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionFailure {
    /// First line of the output, or empty if there was no output
    pub message: String,
}

impl CollectionFailure {
    /// Classifies the failure from its message
    ///
    /// ## Example
    ///
    /// ```
    /// use apcupsd2mqtt::collector::{CollectionFailure, FailureKind};
    ///
    /// let failure = CollectionFailure { message: "sh: 1: apcaccess: not found".to_string() };
    /// assert_eq!(failure.kind(), FailureKind::ToolMissing);
    /// ```
    pub fn kind(&self) -> FailureKind {
        let message = self.message.to_lowercase();

        if message.is_empty() {
            FailureKind::Unknown
        } else if message.contains("not found") {
            FailureKind::ToolMissing
        } else if ["connection refused", "unreachable", "no route to host"]
            .iter()
            .any(|pattern| message.contains(pattern))
        {
            FailureKind::Unreachable
        } else {
            FailureKind::Other
        }
    }
}

/// Reads the report of the UPS served at `host:port`
///
/// An output of zero or one line is a failure: a report always has many lines, while the tool
/// prints its errors on a single one.
pub async fn collect<S: StatusSource>(
    source: &S,
    host: &str,
    port: u16,
) -> Result<RawReport, CollectionFailure> {
    let output = source.query(host, port).await;
    debug!("Status of {host}:{port} has {} bytes", output.len());

    let mut lines = output.lines();
    match (lines.next(), lines.next()) {
        (first, None) => Err(CollectionFailure {
            message: first.unwrap_or_default().trim().to_string(),
        }),
        _ => Ok(parse(&output)),
    }
}
