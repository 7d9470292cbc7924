// Per-connection streaming: wire protocol, transport and message loop

pub mod manager;
pub mod protocol;
pub mod transport;


pub use manager::StreamingSession;
pub use protocol::{
    parse_action, ClientMessage, ErrorMessage, ProtocolError, SnapshotMessage, StatusMessage,
};
pub use transport::{Transport, TransportError};
