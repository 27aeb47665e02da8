use crate::bus::{BRIDGE_STATE_TOPIC, Bus, TOPIC_ROOT};
use crate::catalog::{FieldCatalog, FieldDescriptor};
use crate::configuration::{self, Configuration};
use crate::error::BusError;
use crate::report::{RawReport, SensorSnapshot};
use crate::status::device_topic;
use log::debug;
use serde::Serialize;
use std::fmt;

/// Discovery document sent to Home Assistant for a single sensor
///
/// See <https://www.home-assistant.io/integrations/sensor.mqtt/>
#[derive(Serialize, Debug, PartialEq)]
pub struct DiscoveryDocument {
    /// The sensor is only available while the bridge is online
    availability: Vec<Availability>,

    /// Device holding the sensor
    device: Device,

    /// Describes the origin of the messages, in this case `apcupsd2mqtt`
    origin: Origin,

    enabled_by_default: bool,

    /// Always `diagnostic`
    entity_category: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<&'static str>,

    /// Every field of the device is exposed as attributes of the sensor
    json_attributes_topic: String,

    /// Name of the sensor, which Home Assistant converts into the entity ID
    name: String,

    /// Topic carrying the JSON object of every field of the device
    state_topic: String,

    /// Unique ID for the sensor. This is constructed from the device serial and the topic slug
    unique_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    unit_of_measurement: Option<&'static str>,

    /// Tells Home Assistant where to find the value in the JSON payload
    value_template: String,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct Availability {
    topic: &'static str,
}

/// Device sent to Home Assistant
#[derive(Serialize, Debug, PartialEq)]
pub struct Device {
    /// Identifier of the device, built from its serial number
    identifiers: Vec<String>,

    manufacturer: &'static str,

    /// Model reported by the UPS
    model: String,

    /// Name of the device. This corresponds to the `name` of the configured device
    name: String,
}

/// Describes the origin of the messages, in this case `apcupsd2mqtt`
#[derive(Serialize, Debug, PartialEq)]
pub struct Origin {
    name: &'static str,
    sw_version: &'static str,
}

impl DiscoveryDocument {
    /// Builds the document of a field for a device
    ///
    /// ## Example
    ///
    /// ```
    /// use apcupsd2mqtt::configuration::Device;
    /// use apcupsd2mqtt::{DiscoveryDocument, FieldCatalog, SensorSnapshot, report};
    ///
    /// let catalog = FieldCatalog::new();
    /// let report = report::parse("SERIALNO : AS1234\nMODEL : Back-UPS\nLINEV : 230.0 Volts");
    /// let snapshot = SensorSnapshot::from_report(&report, &catalog).unwrap();
    /// let device = Device { name: "Office".to_string(), host: "localhost".to_string(), port: 3551, ha_topic: None };
    ///
    /// let document = DiscoveryDocument::new(&device, &snapshot, catalog.get("LINEV").unwrap());
    /// assert_eq!(document.unique_id(), "as1234_line_voltage");
    /// ```
    pub fn new(
        device: &configuration::Device,
        snapshot: &SensorSnapshot,
        field: &FieldDescriptor,
    ) -> DiscoveryDocument {
        let serial = snapshot.serial();
        let state_topic = device_topic(serial);

        DiscoveryDocument {
            availability: vec![Availability {
                topic: BRIDGE_STATE_TOPIC,
            }],
            device: Device {
                identifiers: vec![format!("{TOPIC_ROOT}_{serial}")],
                manufacturer: "APC",
                model: snapshot.model().to_string(),
                name: device.name.clone(),
            },
            origin: Origin {
                name: env!("CARGO_PKG_NAME"),
                sw_version: env!("CARGO_PKG_VERSION"),
            },
            enabled_by_default: true,
            entity_category: "diagnostic",
            icon: field.icon,
            json_attributes_topic: state_topic.clone(),
            name: sensor_name(&device.name, field.topic_slug),
            state_topic,
            unique_id: format!("{serial}_{}", field.topic_slug),
            unit_of_measurement: field.unit,
            value_template: field.value_template(),
        }
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }
}

impl fmt::Display for DiscoveryDocument {
    /// Formats the document in JSON format
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let Ok(document) = serde_json::to_string(&self) else {
            return Err(fmt::Error);
        };
        write!(f, "{document}")
    }
}

/// Entity ID Home Assistant gives to the sensor of a field
///
/// Home Assistant derives it from the sensor name: lower-cased, with every run of other characters
/// than letters and digits replaced by `_`.
///
/// ```
/// use apcupsd2mqtt::home_assistant::entity_id;
///
/// assert_eq!(entity_id("Server Room", "line_voltage"), "sensor.server_room_line_voltage");
/// assert_eq!(entity_id("UPS2", "line_voltage"), "sensor.ups2_line_voltage");
/// ```
pub fn entity_id(device_name: &str, topic_slug: &str) -> String {
    format!("sensor.{}", slugify(&sensor_name(device_name, topic_slug)))
}

fn sensor_name(device_name: &str, topic_slug: &str) -> String {
    format!("{} {topic_slug}", device_name.to_lowercase())
}

fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_end_matches('_').to_string()
}

/// Discovery topic of a field below the prefix configured for a device
pub fn discovery_topic(prefix: &str, topic_slug: &str) -> String {
    format!("{}/{topic_slug}/config", prefix.to_lowercase())
}

/// Builds the discovery documents of a device, with their topics, ordered by topic
///
/// Only the fields present in the report, known by the catalog and allowed by the configured
/// properties get a document. Returns nothing when the device has no discovery prefix.
pub fn documents(
    config: &Configuration,
    catalog: &FieldCatalog,
    device: &configuration::Device,
    report: &RawReport,
    snapshot: &SensorSnapshot,
) -> Vec<(String, DiscoveryDocument)> {
    let Some(prefix) = device.ha_topic.as_deref().filter(|p| !p.is_empty()) else {
        return Vec::new();
    };

    let mut documents: Vec<_> = report
        .keys()
        .filter(|key| config.is_property_allowed(key))
        .filter_map(|key| catalog.get(key))
        .map(|field| {
            (
                discovery_topic(prefix, field.topic_slug),
                DiscoveryDocument::new(device, snapshot, field),
            )
        })
        .collect();

    documents.sort_by(|a, b| a.0.cmp(&b.0));
    documents
}

/// Announces the sensors of a device to Home Assistant
///
/// Every document is preceded by an empty payload on the same topic. Home Assistant removes the
/// sensor on the empty payload, so the document that follows is a new announcement and not an
/// update merged into the previous one.
pub async fn publish_discovery<B: Bus>(
    bus: &B,
    config: &Configuration,
    catalog: &FieldCatalog,
    device: &configuration::Device,
    report: &RawReport,
    snapshot: &SensorSnapshot,
) -> Result<(), BusError> {
    let documents = documents(config, catalog, device, report, snapshot);
    debug!(
        "Announcing {} sensors of {} to Home Assistant",
        documents.len(),
        device.name
    );

    for (topic, document) in documents {
        bus.publish(&topic, String::new(), true).await?;
        bus.publish(&topic, document.to_string(), true).await?;
    }

    Ok(())
}
