//! Infrastructure Layer - 基础设施层
//!
//! 提供所有端口的具体实现，以及 HTTP / ZMQ 两个前端

pub mod adapters;
pub mod http;
pub mod memory;
pub mod persistence;
pub mod worker;
pub mod zmq;

pub use memory::{InMemoryPromptCache, ModelLifecycleManager, ModelManagerConfig};
pub use persistence::sqlite::SqliteVoiceRepository;
pub use worker::{IdleWatchdog, IdleWatchdogConfig};
