use mqtt_event_bus::{BusError, BusObserver, EventBus, TracingObserver, Transport};
use rumqttc::{ConnAck, ConnectReturnCode, Event, Packet, Publish, QoS};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub client: usize,
    pub topic: String,
    pub payload: Vec<u8>,
}

/// In-process broker: buses created by [`MockMqttBroker::connect_bus`]
/// publish through it and receive whatever matches their subscriptions.
#[derive(Default)]
pub struct MockMqttBroker {
    clients: Mutex<Vec<EventBus>>,
    subscriptions: Mutex<HashMap<usize, Vec<String>>>,
    published_messages: Mutex<Vec<PublishedMessage>>,
    disconnects: Mutex<Vec<usize>>,
}

impl MockMqttBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Creates a bus wired to this broker and acknowledges its connection.
    pub fn connect_bus(self: &Arc<Self>) -> EventBus {
        self.connect_observed_bus(Arc::new(TracingObserver))
    }

    pub fn connect_observed_bus(self: &Arc<Self>, observer: Arc<dyn BusObserver>) -> EventBus {
        let mut clients = self.clients.lock().unwrap();
        let transport = MockTransport {
            broker: self.clone(),
            client: clients.len(),
        };
        let bus = EventBus::new(Arc::new(transport)).with_observer(observer);
        clients.push(bus.clone());
        drop(clients);

        bus.handle_event(&connack(false));
        bus
    }

    /// Delivers a raw body as if some other client published it.
    pub fn inject(&self, topic: &str, payload: &[u8]) {
        let targets = self.matching_clients(topic);
        for bus in targets {
            bus.handle_event(&publish_event(topic, payload));
        }
    }

    pub fn get_published_messages(&self) -> Vec<PublishedMessage> {
        self.published_messages.lock().unwrap().clone()
    }

    /// Every subscribe request a client sent, duplicates included.
    pub fn subscriptions_of(&self, client: usize) -> Vec<String> {
        self.subscriptions
            .lock()
            .unwrap()
            .get(&client)
            .cloned()
            .unwrap_or_default()
    }

    pub fn disconnects(&self) -> Vec<usize> {
        self.disconnects.lock().unwrap().clone()
    }

    fn matching_clients(&self, topic: &str) -> Vec<EventBus> {
        let subscriptions = self.subscriptions.lock().unwrap();
        let clients = self.clients.lock().unwrap();
        clients
            .iter()
            .enumerate()
            .filter(|(id, _)| {
                subscriptions
                    .get(id)
                    .is_some_and(|filters| filters.iter().any(|f| topic_matches(f, topic)))
            })
            .map(|(_, bus)| bus.clone())
            .collect()
    }
}

struct MockTransport {
    broker: Arc<MockMqttBroker>,
    client: usize,
}

impl Transport for MockTransport {
    fn subscribe(&self, topic: &str) -> Result<(), BusError> {
        self.broker
            .subscriptions
            .lock()
            .unwrap()
            .entry(self.client)
            .or_default()
            .push(topic.to_string());
        Ok(())
    }

    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError> {
        self.broker
            .published_messages
            .lock()
            .unwrap()
            .push(PublishedMessage {
                client: self.client,
                topic: topic.to_string(),
                payload: payload.clone(),
            });

        // Deliver outside the locks, handlers may publish again
        self.broker.inject(topic, &payload);
        Ok(())
    }

    fn disconnect(&self) -> Result<(), BusError> {
        self.broker.disconnects.lock().unwrap().push(self.client);
        Ok(())
    }
}

/// MQTT filter matching with `+` and `#`.
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');

    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Records every observer callback as a short string.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl BusObserver for RecordingObserver {
    fn connected(&self) {
        self.record("connected".to_string());
    }

    fn offline(&self) {
        self.record("offline".to_string());
    }

    fn connection_error(&self, _error: &str) {
        self.record("error".to_string());
    }

    fn message_handled(&self, topic: &str, handlers: usize) {
        self.record(format!("handled {} {}", topic, handlers));
    }
}

/// Collects `(topic, payload)` pairs seen by a handler.
pub type Received = Arc<Mutex<Vec<(String, Value)>>>;

pub fn collector() -> (Received, impl Fn(&str, &Value) + Send + Sync + 'static) {
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let handler = move |topic: &str, payload: &Value| {
        sink.lock().unwrap().push((topic.to_string(), payload.clone()));
    };
    (received, handler)
}

pub fn connack(session_present: bool) -> Event {
    Event::Incoming(Packet::ConnAck(ConnAck::new(
        ConnectReturnCode::Success,
        session_present,
    )))
}

pub fn publish_event(topic: &str, payload: &[u8]) -> Event {
    Event::Incoming(Packet::Publish(Publish::new(
        topic,
        QoS::AtMostOnce,
        payload.to_vec(),
    )))
}
