use crate::bus::EventBus;
use rumqttc::{Event, EventLoop, Outgoing};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Drives the MQTT connection and feeds every event into an [`EventBus`].
pub struct BusEventLoop {
    event_loop: EventLoop,
    reconnect_delay: Duration,
}

impl BusEventLoop {
    pub fn new(event_loop: EventLoop, reconnect_delay: Duration) -> Self {
        Self {
            event_loop,
            reconnect_delay,
        }
    }

    /// Polls until `shutdown` is cancelled or a DISCONNECT has been sent.
    ///
    /// Connection errors never end the loop: they go to the bus observer and
    /// the next poll reconnects after `reconnect_delay`.
    pub async fn run(mut self, bus: EventBus, shutdown: CancellationToken) {
        info!("Starting MQTT event loop");

        loop {
            let polled = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("MQTT event loop cancelled");
                    break;
                }
                polled = self.event_loop.poll() => polled,
            };

            match polled {
                Ok(event) => {
                    let disconnected = matches!(event, Event::Outgoing(Outgoing::Disconnect));
                    bus.handle_event(&event);
                    if disconnected {
                        info!("Disconnected from MQTT broker");
                        break;
                    }
                }
                Err(e) => {
                    bus.handle_connection_error(&e);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.reconnect_delay) => {}
                    }
                }
            }
        }

        info!("MQTT event loop stopped");
    }

    pub fn spawn(self, bus: EventBus) -> BusHandle {
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(self.run(bus.clone(), shutdown.clone()));
        BusHandle {
            bus,
            shutdown,
            task,
        }
    }
}

/// A running event loop spawned by [`BusEventLoop::spawn`].
pub struct BusHandle {
    bus: EventBus,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl BusHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the loop immediately without saying goodbye to the broker.
    pub async fn stop(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            warn!("MQTT event loop task failed: {}", e);
        }
    }

    /// Sends DISCONNECT and waits up to `grace` for pending requests to go
    /// out before stopping the loop.
    pub async fn close(mut self, grace: Duration) {
        if let Err(e) = self.bus.disconnect() {
            warn!("Failed to queue disconnect: {}", e);
        }

        let finished = tokio::time::timeout(grace, &mut self.task).await;
        match finished {
            Ok(Err(e)) => warn!("MQTT event loop task failed: {}", e),
            Ok(Ok(())) => {}
            Err(_) => {
                warn!("MQTT event loop did not finish within {:?}, stopping it", grace);
                self.stop().await;
            }
        }
    }
}
