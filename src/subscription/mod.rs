// Live connections: wire protocol, registry, per-socket driver

pub mod manager;
pub mod protocol;
pub mod registry;

pub use manager::ConnectionManager;
pub use protocol::{ClientEvent, ErrorMessage, Frame, ProtocolError, ServerEvent};
pub use registry::{ConnectionHandle, ConnectionId, ConnectionRegistry, ConnectionState, DeliveryError};
