use crate::error::BusError;
use rumqttc::{AsyncClient, QoS};

/// Outbound side of a broker connection.
///
/// Every call only queues a request and returns immediately; the MQTT event
/// loop performs the actual network I/O.
pub trait Transport: Send + Sync {
    fn subscribe(&self, topic: &str) -> Result<(), BusError>;

    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError>;

    fn disconnect(&self) -> Result<(), BusError>;
}

// QoS 0 everywhere, no retained messages.
impl Transport for AsyncClient {
    fn subscribe(&self, topic: &str) -> Result<(), BusError> {
        self.try_subscribe(topic, QoS::AtMostOnce)?;
        Ok(())
    }

    fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BusError> {
        self.try_publish(topic, QoS::AtMostOnce, false, payload)?;
        Ok(())
    }

    fn disconnect(&self) -> Result<(), BusError> {
        self.try_disconnect()?;
        Ok(())
    }
}
