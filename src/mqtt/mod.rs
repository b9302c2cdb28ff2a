pub mod address;
pub mod event_loop;
pub mod transport;

pub use address::{BrokerAddress, Scheme};
pub use event_loop::{BusEventLoop, BusHandle};
pub use transport::Transport;
