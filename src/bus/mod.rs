use crate::config::EventBusConfig;
use crate::error::BusError;
use crate::mqtt::{BusEventLoop, BusHandle, Transport};
use rumqttc::{AsyncClient, ConnectionError, Event, Outgoing, Packet};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;
use tracing::{debug, error, info};

pub mod observer;
pub mod payload;
pub mod registry;
pub mod state;

pub use observer::{BusObserver, TracingObserver};
pub use payload::{decode_payload, empty_object, encode_payload};
pub use registry::{Handler, Registry, WILDCARD};
pub use state::ConnectionState;

/// Topic-keyed callbacks on top of an MQTT connection.
///
/// Cloning is cheap; clones share the registry, the connection and its state.
#[derive(Clone)]
pub struct EventBus {
    transport: Arc<dyn Transport>,
    registry: Arc<RwLock<Registry>>,
    observer: Arc<dyn BusObserver>,
    state: Arc<watch::Sender<ConnectionState>>,
    connected_before: Arc<AtomicBool>,
}

impl EventBus {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        Self {
            transport,
            registry: Arc::new(RwLock::new(Registry::new())),
            observer: Arc::new(TracingObserver),
            state: Arc::new(state),
            connected_before: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn BusObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Creates a bus for the broker at `address` with default connection
    /// settings. Nothing touches the network until the returned loop runs.
    pub fn connect(address: &str) -> Result<(Self, BusEventLoop), BusError> {
        Self::connect_with_config(&EventBusConfig::for_address(address))
    }

    pub fn connect_with_config(config: &EventBusConfig) -> Result<(Self, BusEventLoop), BusError> {
        let mqtt_options = config.mqtt_options()?;
        info!(
            "Creating event bus for {} as client {}",
            config.broker.address,
            mqtt_options.client_id()
        );

        let (client, event_loop) =
            AsyncClient::new(mqtt_options, config.connection.request_channel_capacity);

        Ok((
            Self::new(Arc::new(client)),
            BusEventLoop::new(event_loop, config.reconnect_delay()),
        ))
    }

    /// Connects and drives the event loop on the current tokio runtime.
    pub fn start(config: &EventBusConfig) -> Result<(Self, BusHandle), BusError> {
        let (bus, event_loop) = Self::connect_with_config(config)?;
        let handle = event_loop.spawn(bus.clone());
        Ok((bus, handle))
    }

    /// Registers `handler` for messages on `topic` and subscribes to it.
    ///
    /// Handlers accumulate: registering the same topic again adds another
    /// handler. The `"*"` key registers a catch-all handler instead and does
    /// not subscribe.
    pub fn on<F>(&self, topic: &str, handler: F) -> Result<(), BusError>
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        if topic.is_empty() {
            return Err(BusError::EmptyTopic);
        }

        if topic == WILDCARD {
            self.on_any(handler);
            return Ok(());
        }

        self.registry_mut().insert(topic, Arc::new(handler));

        debug!("Subscribing to topic: {}", topic);
        self.transport.subscribe(topic).map_err(|e| {
            error!("Failed to subscribe to topic {}: {}", topic, e);
            e
        })
    }

    /// Registers a handler that receives every dispatched message.
    pub fn on_any<F>(&self, handler: F)
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.registry_mut().insert_catch_all(Arc::new(handler));
    }

    /// Publishes `payload` as JSON on `topic`.
    pub fn emit<T>(&self, topic: &str, payload: &T) -> Result<(), BusError>
    where
        T: Serialize + ?Sized,
    {
        if topic.is_empty() {
            return Err(BusError::EmptyTopic);
        }
        if topic.contains(['+', '#']) {
            return Err(BusError::InvalidPublishTopic(topic.to_string()));
        }

        let body = encode_payload(payload).map_err(|source| BusError::Encode {
            topic: topic.to_string(),
            source,
        })?;

        debug!("Publishing {} bytes to topic: {}", body.len(), topic);
        self.transport.publish(topic, body).map_err(|e| {
            error!("Failed to publish to topic {}: {}", topic, e);
            e
        })
    }

    /// Queues an MQTT DISCONNECT. The event loop stops once it is sent.
    pub fn disconnect(&self) -> Result<(), BusError> {
        info!("Disconnecting from MQTT broker");
        self.transport.disconnect()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn subscribed_topics(&self) -> Vec<String> {
        self.registry().topics()
    }

    pub fn handle_event(&self, event: &Event) {
        match event {
            Event::Incoming(Packet::Publish(publish)) => {
                self.dispatch(&publish.topic, &publish.payload);
            }
            Event::Incoming(Packet::ConnAck(connack)) => {
                self.handle_connected(connack.session_present);
            }
            Event::Incoming(Packet::SubAck(_)) => {
                debug!("Successfully subscribed to topic");
            }
            Event::Incoming(Packet::Disconnect) | Event::Outgoing(Outgoing::Disconnect) => {
                self.go_offline();
            }
            Event::Incoming(packet) => {
                debug!("Received MQTT packet: {:?}", packet);
            }
            Event::Outgoing(_) => {}
        }
    }

    pub fn handle_connection_error(&self, error: &ConnectionError) {
        self.observer.connection_error(&error.to_string());

        if self.connection_state().is_connected() {
            self.go_offline();
        } else {
            self.state.send_replace(ConnectionState::Error);
        }
    }

    /// Decodes `payload` and runs every handler registered for `topic`.
    /// Returns how many handlers ran.
    pub fn dispatch(&self, topic: &str, payload: &[u8]) -> usize {
        // Snapshot so handlers can call `on` without deadlocking
        let handlers = self.registry().handlers_for(topic);
        if handlers.is_empty() {
            debug!("No handlers registered for topic: {}", topic);
            return 0;
        }

        let message = decode_payload(payload);
        for handler in &handlers {
            handler(topic, &message);
        }

        self.observer.message_handled(topic, handlers.len());
        handlers.len()
    }

    fn handle_connected(&self, session_present: bool) {
        self.state.send_replace(ConnectionState::Connected);
        self.observer.connected();

        let reconnect = self.connected_before.swap(true, Ordering::SeqCst);
        if reconnect && !session_present {
            self.resubscribe();
        }
    }

    fn resubscribe(&self) {
        let topics = self.subscribed_topics();
        info!("Restoring {} subscriptions after reconnect", topics.len());
        for topic in topics {
            if let Err(e) = self.transport.subscribe(&topic) {
                error!("Failed to resubscribe to topic {}: {}", topic, e);
            }
        }
    }

    fn go_offline(&self) {
        let previous = self.state.send_replace(ConnectionState::Offline);
        if previous != ConnectionState::Offline {
            self.observer.offline();
        }
    }

    fn registry(&self) -> std::sync::RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn registry_mut(&self) -> std::sync::RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("registry", &*self.registry())
            .field("state", &self.connection_state())
            .finish()
    }
}
