use crate::catalog::{FieldCatalog, MODEL, SERIAL_NUMBER};
use std::collections::{BTreeMap, HashMap};

/// Raw facts read from a UPS for a single poll, keyed by `apcaccess` key
pub type RawReport = HashMap<String, String>;

/// Parses the `KEY : value` lines printed by `apcaccess`
///
/// Lines without a colon are skipped. Only the first colon separates the key from the value, so
/// values keep their own colons. The last occurrence of a key wins.
///
/// ## Example
///
/// ```
/// use apcupsd2mqtt::report::parse;
///
/// let report = parse("DATE     : 2024-03-01 10:15:02 +0100\nSTATUS   : ONLINE \n");
///
/// assert_eq!(report["DATE"], "2024-03-01 10:15:02 +0100");
/// assert_eq!(report["STATUS"], "ONLINE");
/// ```
pub fn parse(text: &str) -> RawReport {
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

/// Values of the known fields of a report, keyed by topic slug
///
/// A snapshot is only built from reports that identify the device, which means the serial number and
/// the model are both present and not empty.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSnapshot {
    serial: String,
    model: String,
    values: BTreeMap<&'static str, String>,
}

impl SensorSnapshot {
    /// Keeps the fields of the report known by the catalog
    ///
    /// Returns `None` if the report lacks the serial number or the model.
    pub fn from_report(report: &RawReport, catalog: &FieldCatalog) -> Option<SensorSnapshot> {
        let serial = report.get(SERIAL_NUMBER).filter(|s| !s.is_empty())?;
        let model = report.get(MODEL).filter(|m| !m.is_empty())?;

        let values = report
            .iter()
            .filter_map(|(key, value)| {
                catalog
                    .get(key)
                    .map(|field| (field.topic_slug, value.clone()))
            })
            .collect();

        Some(SensorSnapshot {
            serial: serial.to_lowercase(),
            model: model.clone(),
            values,
        })
    }

    /// Lower-cased serial number, used in topics and identifiers
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// Model as reported by the UPS
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Raw values keyed by topic slug
    pub fn values(&self) -> &BTreeMap<&'static str, String> {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_malformed_lines() {
        let text = "APC      : 001,036,0879\n\
                    garbage line\n\
                    LINEV    : 230.0 Volts\n\
                    \n\
                    BCHARGE  : 100.0 Percent\n\
                    LINEV    : 231.0 Volts\n\
                    another one";
        let report = parse(text);

        assert_eq!(report.len(), 3);
        assert_eq!(report["LINEV"], "231.0 Volts");
        assert_eq!(report["BCHARGE"], "100.0 Percent");
    }

    #[test]
    fn test_parse_keeps_colons_in_values() {
        let report = parse("  END APC  :  2024-03-01 10:15:02 +0100  ");

        assert_eq!(report["END APC"], "2024-03-01 10:15:02 +0100");
    }

    #[test]
    fn test_parse_empty() {
        assert!(parse("").is_empty());
        assert!(parse("\n\n").is_empty());
    }

    #[test]
    fn test_snapshot() {
        let catalog = FieldCatalog::new();
        let report = parse("SERIALNO : AS1234\nMODEL : Back-UPS\nLINEV : 230.0 Volts\nUNKNOWN : 1");
        let snapshot = SensorSnapshot::from_report(&report, &catalog).expect("valid report");

        assert_eq!(snapshot.serial(), "as1234");
        assert_eq!(snapshot.model(), "Back-UPS");
        assert_eq!(snapshot.values().len(), 3);
        assert_eq!(snapshot.values()["line_voltage"], "230.0 Volts");
        assert_eq!(snapshot.values()["serial_number"], "AS1234");
        assert!(!snapshot.values().contains_key("unknown"));
    }

    #[test]
    fn test_snapshot_requires_identity() {
        let catalog = FieldCatalog::new();

        let no_serial = parse("MODEL : Back-UPS\nLINEV : 230.0 Volts");
        assert_eq!(SensorSnapshot::from_report(&no_serial, &catalog), None);

        let no_model = parse("SERIALNO : AS1234\nLINEV : 230.0 Volts");
        assert_eq!(SensorSnapshot::from_report(&no_model, &catalog), None);

        let empty_serial = parse("SERIALNO :\nMODEL : Back-UPS");
        assert_eq!(SensorSnapshot::from_report(&empty_serial, &catalog), None);
    }
}
