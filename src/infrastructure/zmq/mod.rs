//! ZeroMQ 多路复用传输

pub mod server;
pub mod sink;

pub use server::{BoundZmqServer, TransportError, ZmqServer, ZmqServerConfig};
pub use sink::{Outbound, ZmqFrameSink};
