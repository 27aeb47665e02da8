//! Home Assistant customization of the entities created by discovery
//!
//! Discovery names the entities `{device} {topic slug}`, which gives entity IDs like
//! `sensor.office_line_voltage`. The customization gives them a readable friendly name.

use crate::catalog::FIELDS;
use crate::configuration::Configuration;
use crate::home_assistant::entity_id;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize, Debug, PartialEq)]
pub struct Customization {
    friendly_name: String,
}

#[derive(Serialize)]
struct Customize<'a> {
    customize: &'a BTreeMap<String, Customization>,
}

#[derive(Serialize)]
struct HomeAssistant<'a> {
    homeassistant: Customize<'a>,
}

/// Friendly names of every announced entity, keyed by entity ID
pub fn customizations(config: &Configuration) -> BTreeMap<String, Customization> {
    config
        .devices
        .iter()
        .flat_map(|device| {
            FIELDS
                .iter()
                .filter(|field| config.is_property_allowed(field.raw_key))
                .map(move |field| {
                    (
                        entity_id(&device.name, field.topic_slug),
                        Customization {
                            friendly_name: format!("{} {}", device.name, field.label),
                        },
                    )
                })
        })
        .collect()
}

/// Renders the customization as YAML
///
/// With `with_prefix`, the mapping is wrapped in `homeassistant: customize:` so that it can be
/// pasted as is in `configuration.yaml`.
pub fn to_yaml(config: &Configuration, with_prefix: bool) -> Result<String, serde_yaml::Error> {
    let customize = customizations(config);

    if with_prefix {
        serde_yaml::to_string(&HomeAssistant {
            homeassistant: Customize {
                customize: &customize,
            },
        })
    } else {
        serde_yaml::to_string(&customize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Configuration {
        Configuration::parse(
            r#"
            properties = ["LINEV", "BCHARGE"]
            [mqtt]
            [[devices]]
            name = "Server Room"
            host = "10.0.0.2"
            [[devices]]
            name = "office"
            "#,
        )
        .expect("Cannot parse configuration")
    }

    #[test]
    fn test_keys_match_discovery() {
        let config = Configuration::parse(
            r#"
            properties = ["LINEV"]
            [mqtt]
            [[devices]]
            name = "UPS2"
            [[devices]]
            name = "rack1"
            [[devices]]
            name = "ServerRoom"
            "#,
        )
        .expect("Cannot parse configuration");
        let keys: Vec<String> = customizations(&config).into_keys().collect();

        assert_eq!(
            keys,
            vec![
                "sensor.rack1_line_voltage",
                "sensor.serverroom_line_voltage",
                "sensor.ups2_line_voltage",
            ]
        );
    }

    #[test]
    fn test_customizations() {
        let customize = customizations(&config());

        assert_eq!(customize.len(), 4);
        assert_eq!(
            customize["sensor.server_room_batteries_charge"],
            Customization {
                friendly_name: "Server Room Battery charge".to_string()
            }
        );
        assert_eq!(
            customize["sensor.office_line_voltage"].friendly_name,
            "office Line voltage"
        );
    }

    #[test]
    fn test_yaml() -> Result<(), serde_yaml::Error> {
        let config = config();

        let with_prefix = to_yaml(&config, true)?;
        assert!(with_prefix.starts_with("homeassistant:\n  customize:\n    sensor.office_batteries_charge:\n      friendly_name: office Battery charge\n"));

        let without_prefix = to_yaml(&config, false)?;
        assert!(without_prefix.starts_with("sensor.office_batteries_charge:\n  friendly_name: office Battery charge\n"));

        Ok(())
    }
}
