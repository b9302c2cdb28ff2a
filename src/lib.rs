pub mod bus;
pub mod config;
pub mod error;
pub mod mqtt;

pub use bus::{BusObserver, ConnectionState, EventBus, TracingObserver, WILDCARD};
pub use config::EventBusConfig;
pub use error::BusError;
pub use mqtt::{BrokerAddress, BusEventLoop, BusHandle, Transport};
