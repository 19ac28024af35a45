//! MQTT transport for publishing node messages.
//!
//! The device loop talks to the broker through the [`Transport`] trait, one
//! instance per device, created by a [`Connector`]. [`MqttConnector`] is the
//! production implementation on top of the synchronous `rumqttc` client: the
//! MQTT event loop runs on its own thread and reports connection changes back
//! as [`LinkEvent`]s.

use crate::config::{BrokerConfig, DeviceConfig};
use crate::error::{Error, Result};
use crate::topic::MessageType;
use log::{debug, info, warn};
use rumqttc::{Client, Connection, Event, MqttOptions, Outgoing, Packet, QoS};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Connection changes reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The first connection was established.
    Connected,
    /// The connection was re-established after a loss. The broker sees a new
    /// MQTT session.
    Reconnected,
    /// The connection dropped; the transport keeps retrying.
    Lost(String),
    /// The transport gave up reconnecting.
    Exhausted,
}

/// A device's connection to the broker.
pub trait Transport: Send {
    /// Hands an encoded payload to the broker connection.
    ///
    /// Returns [`Error::PublishFailed`] if the message could not be queued.
    fn publish(&mut self, message_type: MessageType, topic: &str, payload: &[u8]) -> Result<()>;

    /// Returns the next pending connection change, if any. Never blocks.
    fn poll_link(&mut self) -> Option<LinkEvent>;

    /// Disconnects and releases the connection.
    fn close(&mut self) -> Result<()>;
}

/// Creates transports for devices.
pub trait Connector: Send + Sync {
    /// Opens a connection for `device`.
    fn connect(&self, broker: &BrokerConfig, device: &DeviceConfig) -> Result<Box<dyn Transport>>;
}

/// Maps a numeric QoS level to the MQTT client's QoS.
pub fn qos_level(qos: u8) -> Result<QoS> {
    match qos {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(Error::Config(format!("invalid QoS {}", other))),
    }
}

/// Builds MQTT options for a device.
pub fn mqtt_options(broker: &BrokerConfig, device: &DeviceConfig) -> MqttOptions {
    let mut options = MqttOptions::new(device.client_id(), broker.host.clone(), broker.port);
    options.set_keep_alive(broker.keep_alive());
    options.set_clean_session(true);
    if let Some(username) = &device.username {
        options.set_credentials(username.clone(), device.password.clone().unwrap_or_default());
    }
    options
}

/// Opens [`MqttPublisher`]s against a real broker.
#[derive(Debug, Clone, Copy)]
pub struct MqttConnector {
    capacity: usize,
}

impl Default for MqttConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MqttConnector {
    /// Creates a connector with a request queue of 32 messages per device.
    pub fn new() -> Self {
        Self { capacity: 32 }
    }

    /// Sets the per-device request queue capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

impl Connector for MqttConnector {
    fn connect(&self, broker: &BrokerConfig, device: &DeviceConfig) -> Result<Box<dyn Transport>> {
        let publisher = MqttPublisher::connect(broker, device, self.capacity.max(1))?;
        Ok(Box::new(publisher))
    }
}

/// A device's MQTT connection.
///
/// Publishing never blocks: while the link is down, or the request queue is
/// full, [`publish`](Transport::publish) fails immediately and the caller
/// decides how to back off.
pub struct MqttPublisher {
    client: Client,
    qos: QoS,
    client_id: String,
    connected: bool,
    events: Option<Receiver<LinkEvent>>,
    event_loop: Option<JoinHandle<()>>,
}

impl MqttPublisher {
    /// Connects to the broker and waits for the broker's acknowledgement.
    pub fn connect(broker: &BrokerConfig, device: &DeviceConfig, capacity: usize) -> Result<Self> {
        let qos = qos_level(broker.qos)?;
        let options = mqtt_options(broker, device);
        let (client, connection) = Client::new(options, capacity);
        let (tx, rx) = mpsc::channel();

        let client_id = device.client_id().to_string();
        let max_attempts = broker.max_reconnect_attempts;
        let backoff = broker.reconnect_backoff();
        let event_loop = thread::Builder::new()
            .name(format!("mqtt-{}", client_id))
            .spawn(move || drive_connection(connection, tx, max_attempts, backoff))?;

        let mut publisher = Self {
            client,
            qos,
            client_id,
            connected: false,
            events: Some(rx),
            event_loop: Some(event_loop),
        };

        let timeout = broker.keep_alive() + Duration::from_secs(5);
        let first = match publisher.events.as_ref() {
            Some(events) => events.recv_timeout(timeout),
            None => Err(RecvTimeoutError::Disconnected),
        };
        match first {
            Ok(LinkEvent::Connected) | Ok(LinkEvent::Reconnected) => {
                publisher.connected = true;
                info!(
                    "Client '{}' connected to {}:{}",
                    publisher.client_id, broker.host, broker.port
                );
                Ok(publisher)
            }
            Ok(LinkEvent::Lost(reason)) => {
                publisher.shutdown_event_loop();
                Err(Error::ConnectionFailed(reason))
            }
            Ok(LinkEvent::Exhausted) | Err(RecvTimeoutError::Disconnected) => {
                publisher.shutdown_event_loop();
                Err(Error::ConnectionFailed("event loop stopped".to_string()))
            }
            Err(RecvTimeoutError::Timeout) => {
                publisher.shutdown_event_loop();
                Err(Error::ConnectionFailed(format!(
                    "no acknowledgement from {}:{} within {:?}",
                    broker.host, broker.port, timeout
                )))
            }
        }
    }

    fn shutdown_event_loop(&mut self) {
        // The event loop exits on its next report once nobody is listening.
        self.events = None;
        if let Some(handle) = self.event_loop.take() {
            if handle.join().is_err() {
                warn!("MQTT event loop of '{}' panicked", self.client_id);
            }
        }
    }
}

impl Transport for MqttPublisher {
    fn publish(&mut self, message_type: MessageType, topic: &str, payload: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(Error::PublishFailed {
                message_type: message_type.as_str(),
                details: "broker connection is down".to_string(),
            });
        }
        self.client
            .try_publish(topic, self.qos, false, payload.to_vec())
            .map_err(|e| Error::PublishFailed {
                message_type: message_type.as_str(),
                details: e.to_string(),
            })?;
        debug!("{} queued on {} ({} bytes)", message_type, topic, payload.len());
        Ok(())
    }

    fn poll_link(&mut self) -> Option<LinkEvent> {
        let event = match self.events.as_ref()?.try_recv() {
            Ok(event) => event,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                self.events = None;
                self.connected = false;
                LinkEvent::Exhausted
            }
        };
        self.connected = matches!(event, LinkEvent::Connected | LinkEvent::Reconnected);
        Some(event)
    }

    fn close(&mut self) -> Result<()> {
        let result = if self.connected {
            self.client
                .try_disconnect()
                .map_err(|e| Error::ConnectionFailed(e.to_string()))
        } else {
            Ok(())
        };
        self.connected = false;
        if result.is_err() {
            // Without a queued DISCONNECT the loop only ends with the client.
            self.events = None;
            self.event_loop = None;
        } else {
            self.shutdown_event_loop();
        }
        result
    }
}

impl Drop for MqttPublisher {
    fn drop(&mut self) {
        if self.event_loop.is_some() {
            let _ = self.close();
        }
    }
}

fn drive_connection(
    mut connection: Connection,
    events: Sender<LinkEvent>,
    max_attempts: Option<u32>,
    backoff: Duration,
) {
    let mut ever_connected = false;
    let mut failures: u32 = 0;

    for notification in connection.iter() {
        let report = match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                failures = 0;
                let event = if ever_connected {
                    LinkEvent::Reconnected
                } else {
                    LinkEvent::Connected
                };
                ever_connected = true;
                event
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
            Ok(_) => continue,
            Err(e) => {
                failures += 1;
                if max_attempts.is_some_and(|max| failures >= max) {
                    let _ = events.send(LinkEvent::Exhausted);
                    break;
                }
                LinkEvent::Lost(e.to_string())
            }
        };

        let lost = matches!(report, LinkEvent::Lost(_));
        if events.send(report).is_err() {
            break;
        }
        if lost {
            thread::sleep(backoff);
        }
    }
}
