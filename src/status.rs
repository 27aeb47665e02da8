use crate::bus::{Bus, TOPIC_ROOT};
use crate::error::BusError;
use crate::report::SensorSnapshot;
use serde::Serialize;
use std::fmt;

/// Message sent to the MQTT broker for a single field
///
/// The value is sent exactly as `apcaccess` printed it, unit included.
#[derive(Serialize, Debug, PartialEq)]
pub struct StatusMessage<'a> {
    pub value: &'a str,
}

impl fmt::Display for StatusMessage<'_> {
    /// Formats the message to a JSON string
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let Ok(str) = serde_json::to_string(&self) else {
            return Err(fmt::Error);
        };
        write!(f, "{str}")
    }
}

/// Topic carrying every field of a device in a single JSON object
pub fn device_topic(serial: &str) -> String {
    format!("{TOPIC_ROOT}/{serial}")
}

/// Topic carrying a single field of a device
pub fn field_topic(serial: &str, topic_slug: &str) -> String {
    format!("{TOPIC_ROOT}/{serial}/{topic_slug}")
}

/// Publishes the current values of a snapshot
///
/// Each field goes to its own topic, then the whole snapshot goes to the device topic, which is
/// the state topic used by Home Assistant discovery.
pub async fn publish<B: Bus>(bus: &B, snapshot: &SensorSnapshot) -> Result<(), BusError> {
    let serial = snapshot.serial();

    for (slug, value) in snapshot.values() {
        let message = StatusMessage { value };
        bus.publish(&field_topic(serial, slug), message.to_string(), false)
            .await?;
    }

    bus.publish(
        &device_topic(serial),
        serde_json::to_string(snapshot.values())?,
        false,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topics() {
        assert_eq!(device_topic("as1234"), "apcupsd2mqtt/as1234");
        assert_eq!(
            field_topic("as1234", "line_voltage"),
            "apcupsd2mqtt/as1234/line_voltage"
        );
    }

    #[test]
    fn test_message() {
        let message = StatusMessage {
            value: "230.0 Volts",
        };
        assert_eq!(message.to_string(), r#"{"value":"230.0 Volts"}"#);

        let message = StatusMessage {
            value: r#"say "hi""#,
        };
        assert_eq!(message.to_string(), r#"{"value":"say \"hi\""}"#);
    }
}
