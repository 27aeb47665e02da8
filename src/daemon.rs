use crate::bus::{BRIDGE_STATE_TOPIC, Bus, OFFLINE, ONLINE};
use crate::catalog::FieldCatalog;
use crate::collector::{FailureKind, StatusSource, collect};
use crate::configuration::{Configuration, Device};
use crate::error::BridgeError;
use crate::home_assistant::publish_discovery;
use crate::report::SensorSnapshot;
use crate::status;
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::Notify;
use tokio::time::sleep;

/// State of the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    /// Connected, polling the devices
    Running,

    /// A stop was requested, the bridge is going offline
    Stopping,

    /// Offline and disconnected
    Stopped,
}

/// Requests sent to a running daemon
///
/// Clones share the same requests. Requests are only looked at between two cycles, a cycle
/// always polls every device.
#[derive(Debug, Clone, Default)]
pub struct Control {
    stop: Arc<AtomicBool>,
    rediscover: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl Control {
    pub fn new() -> Control {
        Default::default()
    }

    /// Requests the daemon to stop
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Requests the discovery documents to be sent again on the next cycle
    pub fn rediscover(&self) {
        self.rediscover.store(true, Ordering::SeqCst);
    }

    fn take_rediscover(&self) -> bool {
        self.rediscover.swap(false, Ordering::SeqCst)
    }

    /// Stops on SIGINT and SIGTERM, rediscovers on SIGHUP
    pub fn listen_signals(&self) -> Result<(), BridgeError> {
        let mut terminate = signal(SignalKind::terminate()).map_err(BridgeError::Signal)?;
        let mut interrupt = signal(SignalKind::interrupt()).map_err(BridgeError::Signal)?;
        let mut hangup = signal(SignalKind::hangup()).map_err(BridgeError::Signal)?;
        let control = self.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = terminate.recv() => {
                        debug!("Terminate received");
                        control.stop();
                    },
                    _ = interrupt.recv() => {
                        debug!("Interrupt received");
                        control.stop();
                    },
                    _ = hangup.recv() => {
                        info!("Hangup received, sending discovery again");
                        control.rediscover();
                    },
                }
            }
        });

        Ok(())
    }
}

/// Time to wait after a cycle that took `elapsed`, so that cycles start every `interval`
///
/// A cycle that overran the interval is followed by the next one right away.
///
/// ```
/// use apcupsd2mqtt::daemon::cycle_delay;
/// use std::time::Duration;
///
/// let interval = Duration::from_secs(10);
/// assert_eq!(cycle_delay(interval, Duration::from_secs(3)), Duration::from_secs(7));
/// assert_eq!(cycle_delay(interval, Duration::from_secs(12)), Duration::ZERO);
/// ```
pub fn cycle_delay(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// Daemon that periodically polls the devices and publishes their status to MQTT
pub struct Daemon<B, S> {
    config: Configuration,
    catalog: FieldCatalog,
    bus: B,
    source: S,
    control: Control,
    state: DaemonState,
}

impl<B: Bus, S: StatusSource> Daemon<B, S> {
    /// Constructs a daemon publishing to a connected bus
    pub fn new(config: Configuration, bus: B, source: S, control: Control) -> Daemon<B, S> {
        info!("Daemon for {} devices starting", config.devices.len());

        Daemon {
            config,
            catalog: FieldCatalog::new(),
            bus,
            source,
            control,
            state: DaemonState::Stopped,
        }
    }

    /// Current state. A daemon that didn't run yet is `Stopped`
    pub fn state(&self) -> DaemonState {
        self.state
    }

    /// Runs the main loop until a stop is requested
    ///
    /// Discovery is sent on the first cycle, and again on the cycle following a
    /// [`Control::rediscover`] request. Any error stops the loop right away.
    pub async fn run(&mut self) -> Result<(), BridgeError> {
        let interval = Duration::from_micros(self.config.interval_micros());

        self.bus
            .publish(BRIDGE_STATE_TOPIC, ONLINE.to_string(), true)
            .await?;
        self.state = DaemonState::Running;

        let mut discovery_pending = true;

        while !self.control.is_stop_requested() {
            let started = Instant::now();
            let send_discovery = self.control.take_rediscover() || discovery_pending;

            self.run_cycle(send_discovery).await?;
            discovery_pending = false;

            let delay = cycle_delay(interval, started.elapsed());
            debug!("Cycle done in {:?}, next in {delay:?}", started.elapsed());

            tokio::select! {
                _ = sleep(delay) => {},
                _ = self.control.wake.notified() => {},
            }
        }

        self.state = DaemonState::Stopping;
        info!("Stopping");

        self.bus
            .publish(BRIDGE_STATE_TOPIC, OFFLINE.to_string(), true)
            .await?;
        self.bus.disconnect().await?;

        self.state = DaemonState::Stopped;
        Ok(())
    }

    /// Single pass over every configured device
    pub async fn run_cycle(&self, send_discovery: bool) -> Result<(), BridgeError> {
        for device in &self.config.devices {
            if device.host.is_empty() {
                continue;
            }
            self.poll_device(device, send_discovery).await?;
        }

        Ok(())
    }

    async fn poll_device(&self, device: &Device, send_discovery: bool) -> Result<(), BridgeError> {
        let report = match collect(&self.source, &device.host, device.port).await {
            Ok(report) => report,
            Err(failure) => {
                return match failure.kind() {
                    FailureKind::Unreachable => {
                        warn!(
                            "UPS {} ({}:{}) unreachable: {}",
                            device.name, device.host, device.port, failure.message
                        );
                        Ok(())
                    }
                    FailureKind::ToolMissing => Err(BridgeError::ApcupsdNotInstalled),
                    FailureKind::Other => Err(BridgeError::Apcaccess(failure.message)),
                    FailureKind::Unknown => Err(BridgeError::UnknownCollection {
                        host: device.host.clone(),
                        port: device.port,
                    }),
                };
            }
        };

        // Reports are sometimes incomplete while apcupsd is starting, this is not an error
        let Some(snapshot) = SensorSnapshot::from_report(&report, &self.catalog) else {
            return Ok(());
        };

        status::publish(&self.bus, &snapshot).await?;

        if send_discovery {
            publish_discovery(
                &self.bus,
                &self.config,
                &self.catalog,
                device,
                &report,
                &snapshot,
            )
            .await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_delay() {
        let interval = Duration::from_micros(1_000_000);

        assert_eq!(
            cycle_delay(interval, Duration::from_micros(250_000)),
            Duration::from_micros(750_000)
        );
        assert_eq!(cycle_delay(interval, interval), Duration::ZERO);
        assert_eq!(
            cycle_delay(interval, Duration::from_secs(5)),
            Duration::ZERO
        );
        assert_eq!(
            cycle_delay(Duration::ZERO, Duration::from_micros(10)),
            Duration::ZERO
        );
    }

    #[test]
    fn test_control() {
        let control = Control::new();
        let shared = control.clone();

        assert!(!control.is_stop_requested());
        shared.stop();
        assert!(control.is_stop_requested());

        assert!(!control.take_rediscover());
        shared.rediscover();
        assert!(control.take_rediscover());
        assert!(!control.take_rediscover());
    }
}
