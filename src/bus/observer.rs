use tracing::{error, info};

/// Receives connection and dispatch notifications from an [`EventBus`].
///
/// All methods default to doing nothing, so implementors only override the
/// events they care about.
///
/// [`EventBus`]: crate::bus::EventBus
pub trait BusObserver: Send + Sync {
    fn connected(&self) {}

    fn offline(&self) {}

    fn connection_error(&self, _error: &str) {}

    fn message_handled(&self, _topic: &str, _handlers: usize) {}
}

/// Default observer, logs through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl BusObserver for TracingObserver {
    fn connected(&self) {
        info!("Connected to MQTT broker");
    }

    fn offline(&self) {
        info!("MQTT client offline");
    }

    fn connection_error(&self, error: &str) {
        error!("MQTT connection error: {}", error);
    }

    fn message_handled(&self, topic: &str, handlers: usize) {
        info!("Handled message on topic {} ({} handlers)", topic, handlers);
    }
}
