use crate::configuration::Mqtt;
use crate::error::BusError;
use log::{debug, info, trace};
use rumqttc::{AsyncClient, Event, LastWill, MqttOptions, Packet, QoS};
use std::future::Future;
use std::time::Duration;
use tokio::task;
use tokio::time::timeout;

/// Root of every topic published by the bridge
pub const TOPIC_ROOT: &str = "apcupsd2mqtt";

/// Retained topic telling whether the bridge is connected
pub const BRIDGE_STATE_TOPIC: &str = "apcupsd2mqtt/bridge/state";

pub const ONLINE: &str = "online";
pub const OFFLINE: &str = "offline";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Message bus the bridge publishes to
pub trait Bus {
    /// Publishes a payload on a topic
    fn publish(
        &self,
        topic: &str,
        payload: String,
        retain: bool,
    ) -> impl Future<Output = Result<(), BusError>> + Send;

    /// Closes the connection to the bus
    fn disconnect(&self) -> impl Future<Output = Result<(), BusError>> + Send;
}

/// Bus backed by an MQTT broker
pub struct MqttBus {
    client: AsyncClient,
}

impl MqttBus {
    /// Connects to the broker
    ///
    /// This waits for the broker to acknowledge the connection, so an unreachable broker or bad
    /// credentials are reported here instead of on the first publish.
    pub async fn connect(config: &Mqtt) -> Result<MqttBus, BusError> {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_credentials(&config.user, &config.password);
        options.set_keep_alive(Duration::from_secs(30));
        options.set_last_will(LastWill::new(
            BRIDGE_STATE_TOPIC,
            OFFLINE,
            QoS::AtLeastOnce,
            true,
        ));

        info!("Connecting to MQTT broker {}:{}", config.host, config.port);

        let (client, mut event_loop) = AsyncClient::new(options, 10);

        timeout(CONNECT_TIMEOUT, async {
            loop {
                if let Event::Incoming(Packet::ConnAck(ack)) = event_loop.poll().await? {
                    debug!("Connected: {ack:?}");
                    return Ok::<(), BusError>(());
                }
            }
        })
        .await
        .map_err(|_| BusError::ConnectTimeout)??;

        task::spawn(async move {
            while let Ok(notification) = event_loop.poll().await {
                trace!("MQTT notification received: {notification:?}");
            }
        });

        Ok(MqttBus { client })
    }
}

impl Bus for MqttBus {
    async fn publish(&self, topic: &str, payload: String, retain: bool) -> Result<(), BusError> {
        debug!("Publishing to topic {topic} : {payload}");
        self.client
            .publish(topic, QoS::AtLeastOnce, retain, payload)
            .await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BusError> {
        // Give the event loop a chance to flush the pending publishes
        tokio::time::sleep(Duration::from_secs(1)).await;
        self.client.disconnect().await?;
        Ok(())
    }
}
