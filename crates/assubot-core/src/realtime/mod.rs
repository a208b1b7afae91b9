//! Push channel: Socket.IO framing, socket transport, and the connection
//! manager that keeps one socket alive with exponential backoff.

pub mod backoff;
pub mod bus;
pub mod events;
pub mod manager;
pub mod transport;
pub mod wire;

#[cfg(test)]
pub(crate) mod testing;

pub use backoff::ReconnectPolicy;
pub use bus::{EventBus, Subscription};
pub use events::{
    ConnectionStatus, ContractProcessed, CreditOperation, CreditUpdate, EventKind,
    ProcessedStatus, RealtimeEvent,
};
pub use manager::ConnectionManager;
pub use transport::{Connector, SocketSignal, WebSocketConnector};
