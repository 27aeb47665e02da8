use std::collections::HashMap;

/// Rule used by Home Assistant to pull a typed value out of a raw apcupsd value
///
/// apcupsd reports most measurements with their unit appended (`230.0 Volts`), so the
/// extraction keeps the leading token and casts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueExtractor {
    /// Leading token as an integer
    Int,

    /// Leading token as a float
    Float,
}

impl ValueExtractor {
    /// Jinja filter used in the value template
    pub fn filter(&self) -> &'static str {
        match self {
            ValueExtractor::Int => "int",
            ValueExtractor::Float => "float",
        }
    }

    /// Applies the rule to a raw value the same way the value template does.
    ///
    /// Values that don't start with a number are passed through untouched.
    ///
    /// ```
    /// use apcupsd2mqtt::catalog::ValueExtractor;
    ///
    /// assert_eq!(ValueExtractor::Float.apply("99.0 Percent"), "99.0");
    /// assert_eq!(ValueExtractor::Int.apply("230.0 Volts"), "230");
    /// assert_eq!(ValueExtractor::Int.apply("N/A"), "N/A");
    /// ```
    pub fn apply(&self, raw: &str) -> String {
        let token = raw.split_whitespace().next().unwrap_or_default();
        let Ok(number) = token.parse::<f64>() else {
            return raw.to_string();
        };
        match self {
            ValueExtractor::Int => format!("{}", number.trunc() as i64),
            ValueExtractor::Float => format!("{number:?}"),
        }
    }
}

/// Describes a field of the apcupsd status report
#[derive(Debug, PartialEq)]
pub struct FieldDescriptor {
    /// Key as printed by `apcaccess`
    pub raw_key: &'static str,

    /// Slug used in topics, unique IDs and value templates
    pub topic_slug: &'static str,

    /// Human friendly label
    pub label: &'static str,

    /// Unit of measurement, if the value has one
    pub unit: Option<&'static str>,

    /// Material Design icon shown by Home Assistant
    pub icon: Option<&'static str>,

    /// How to extract a scalar out of the raw value
    pub extractor: Option<ValueExtractor>,
}

impl FieldDescriptor {
    /// Template that Home Assistant uses to read this field from the state payload
    pub fn value_template(&self) -> String {
        match self.extractor {
            Some(extractor) => format!(
                "{{{{ value_json.{}.split()[0] | {} }}}}",
                self.topic_slug,
                extractor.filter()
            ),
            None => format!("{{{{ value_json.{} }}}}", self.topic_slug),
        }
    }
}

/// Raw key of the serial number, which identifies the device
pub const SERIAL_NUMBER: &str = "SERIALNO";

/// Raw key of the UPS model
pub const MODEL: &str = "MODEL";

const fn field(
    raw_key: &'static str,
    topic_slug: &'static str,
    label: &'static str,
    unit: Option<&'static str>,
    icon: &'static str,
    extractor: Option<ValueExtractor>,
) -> FieldDescriptor {
    FieldDescriptor {
        raw_key,
        topic_slug,
        label,
        unit,
        icon: Some(icon),
        extractor,
    }
}

const INFO: &str = "mdi:information";
const CLOCK: &str = "mdi:calendar-clock";
const TIMER: &str = "mdi:av-timer";
const FLASH: &str = "mdi:flash";
const GAUGE: &str = "mdi:gauge";
const THERMOMETER: &str = "mdi:thermometer";

use ValueExtractor::{Float, Int};

/// Every field known to apcupsd 3.14
pub static FIELDS: &[FieldDescriptor] = &[
    field("APC", "apc", "Status header", None, INFO, None),
    field("DATE", "date", "Last update", None, CLOCK, None),
    field("HOSTNAME", "hostname", "Hostname", None, INFO, None),
    field("UPSNAME", "ups_name", "UPS name", None, INFO, None),
    field("VERSION", "apcupsd_version", "apcupsd version", None, INFO, None),
    field("CABLE", "ups_cable", "Cable", None, "mdi:cable-data", None),
    field("MODEL", "ups_model", "Model", None, INFO, None),
    field("UPSMODE", "ups_mode", "Mode", None, INFO, None),
    field("STARTTIME", "apcupsd_started", "apcupsd started", None, CLOCK, None),
    field("STATUS", "ups_status", "Status", None, INFO, None),
    field("LINEV", "line_voltage", "Line voltage", Some("V"), FLASH, Some(Int)),
    field("LOADPCT", "load_percentage", "Load", Some("%"), GAUGE, Some(Float)),
    field("BCHARGE", "batteries_charge", "Battery charge", Some("%"), GAUGE, Some(Float)),
    field("TIMELEFT", "time_left", "Time left", Some("minutes"), TIMER, Some(Float)),
    field("MBATTCHG", "charge_to_shutdown", "Shutdown battery charge", Some("%"), GAUGE, Some(Float)),
    field("MINTIMEL", "minutes_to_shutdown", "Shutdown time left", Some("minutes"), TIMER, Some(Float)),
    field("MAXTIME", "max_time_on_batteries", "Max time on batteries", Some("seconds"), TIMER, Some(Int)),
    field("MAXLINEV", "max_line_voltage", "Max line voltage", Some("V"), FLASH, Some(Int)),
    field("MINLINEV", "min_line_voltage", "Min line voltage", Some("V"), FLASH, Some(Int)),
    field("OUTPUTV", "output_voltage", "Output voltage", Some("V"), FLASH, Some(Int)),
    field("SENSE", "sensitivity_level", "Sensitivity", None, INFO, None),
    field("DWAKE", "time_to_restore_power", "Power restore delay", Some("seconds"), TIMER, Some(Int)),
    field("DSHUTD", "delay_after_shutdown_command", "Shutdown delay", Some("seconds"), TIMER, Some(Int)),
    field("DLOWBATT", "remaining_runtime_to_shutdown", "Low battery signal", None, TIMER, None),
    field("LOTRANS", "low_voltage", "Low transfer voltage", Some("V"), FLASH, Some(Int)),
    field("HITRANS", "high_voltage", "High transfer voltage", Some("V"), FLASH, Some(Int)),
    field("RETPCT", "min_charge_to_restore", "Restore battery charge", Some("%"), GAUGE, Some(Float)),
    field("ITEMP", "internal_temperature", "Internal temperature", Some("°C"), THERMOMETER, Some(Float)),
    field("ALARMDEL", "alarm_delay", "Alarm delay", None, TIMER, None),
    field("BATTV", "battery_voltage", "Battery voltage", Some("V"), FLASH, Some(Float)),
    field("LINEFREQ", "line_frequency", "Line frequency", Some("Hz"), "mdi:sine-wave", Some(Float)),
    field("LASTXFER", "last_transfer_reason", "Last transfer reason", None, INFO, None),
    field("NUMXFERS", "number_of_transfers", "Transfers", None, INFO, Some(Int)),
    field("XONBATT", "last_transfer_to_batteries_datetime", "Last transfer to batteries", None, CLOCK, None),
    field("TONBATT", "seconds_on_batteries", "Time on batteries", Some("seconds"), TIMER, Some(Int)),
    field("CUMONBATT", "total_seconds_on_batteries", "Total time on batteries", Some("seconds"), TIMER, Some(Int)),
    field("XOFFBATT", "last_transfer_from_batteries_datetime", "Last transfer from batteries", None, CLOCK, None),
    field("SELFTEST", "self_test_result", "Self test result", None, INFO, None),
    field("STESTI", "self_test_interval", "Self test interval", None, TIMER, None),
    field("STATFLAG", "status_flag", "Status flag", None, INFO, None),
    field("DIPSW", "dip_switch", "DIP switch", None, INFO, None),
    field("REG1", "register_1", "Fault register 1", None, INFO, None),
    field("REG2", "register_2", "Fault register 2", None, INFO, None),
    field("REG3", "register_3", "Fault register 3", None, INFO, None),
    field("MANDATE", "manufacturing_date", "Manufacturing date", None, "mdi:calendar", None),
    field("SERIALNO", "serial_number", "Serial number", None, INFO, None),
    field("BATTDATE", "batteries_replace_date", "Battery replaced", None, CLOCK, None),
    field("NOMOUTV", "output_voltage_on_batteries", "Nominal output voltage", Some("V"), FLASH, Some(Int)),
    field("NOMINV", "expected_input_voltage", "Nominal input voltage", Some("V"), FLASH, Some(Int)),
    field("NOMBATTV", "nominal_battery_voltage", "Nominal battery voltage", Some("V"), FLASH, Some(Float)),
    field("NOMPOWER", "max_power", "Nominal power", Some("W"), FLASH, Some(Int)),
    field("HUMIDITY", "humidity", "Humidity", Some("%"), "mdi:water-percent", Some(Float)),
    field("AMBTEMP", "ambient_temperature", "Ambient temperature", Some("°C"), THERMOMETER, Some(Float)),
    field("EXTBATTS", "external_batteries_number", "External batteries", None, INFO, None),
    field("BADBATTS", "bad_batteries_number", "Bad batteries", None, INFO, None),
    field("FIRMWARE", "firmware", "Firmware", None, INFO, None),
    field("APCMODEL", "model_identification_code", "Model code", None, INFO, None),
    field("END APC", "record_datetime", "Record written", None, CLOCK, None),
];

/// Lookup table of the known report fields, keyed by raw key
///
/// ## Example
///
/// ```
/// use apcupsd2mqtt::FieldCatalog;
///
/// let catalog = FieldCatalog::new();
/// assert_eq!(catalog.get("LINEV").map(|f| f.topic_slug), Some("line_voltage"));
/// assert!(catalog.get("NOT A FIELD").is_none());
/// ```
#[derive(Debug)]
pub struct FieldCatalog {
    fields: HashMap<&'static str, &'static FieldDescriptor>,
}

impl FieldCatalog {
    /// Builds the catalog of every field apcupsd reports
    pub fn new() -> FieldCatalog {
        Self::from_fields(FIELDS)
    }

    /// Builds a catalog from an arbitrary field table
    pub fn from_fields(fields: &'static [FieldDescriptor]) -> FieldCatalog {
        FieldCatalog {
            fields: fields.iter().map(|f| (f.raw_key, f)).collect(),
        }
    }

    /// Returns the descriptor for a raw report key
    pub fn get(&self, raw_key: &str) -> Option<&'static FieldDescriptor> {
        self.fields.get(raw_key).copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Default for FieldCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_unique_keys_and_slugs() {
        let keys: HashSet<_> = FIELDS.iter().map(|f| f.raw_key).collect();
        let slugs: HashSet<_> = FIELDS.iter().map(|f| f.topic_slug).collect();

        assert_eq!(keys.len(), FIELDS.len());
        // Slugs are shared by every device below the same prefix, they must never collide
        assert_eq!(slugs.len(), FIELDS.len());
        assert_eq!(FieldCatalog::new().len(), FIELDS.len());
    }

    #[test]
    fn test_identity_fields() {
        let catalog = FieldCatalog::new();

        assert_eq!(
            catalog.get(SERIAL_NUMBER).map(|f| f.topic_slug),
            Some("serial_number")
        );
        assert_eq!(catalog.get(MODEL).map(|f| f.topic_slug), Some("ups_model"));
    }

    #[test]
    fn test_value_template() {
        let catalog = FieldCatalog::new();

        let linev = catalog.get("LINEV").expect("LINEV not found");
        assert_eq!(
            linev.value_template(),
            "{{ value_json.line_voltage.split()[0] | int }}"
        );

        let status = catalog.get("STATUS").expect("STATUS not found");
        assert_eq!(status.value_template(), "{{ value_json.ups_status }}");
    }

    #[test]
    fn test_extractor_fallback() {
        assert_eq!(Float.apply("13.5 Volts"), "13.5");
        assert_eq!(Float.apply("100 Percent"), "100.0");
        assert_eq!(Int.apply("-3 Seconds"), "-3");
        assert_eq!(Int.apply(""), "");
        assert_eq!(Float.apply("ONLINE"), "ONLINE");
    }
}
