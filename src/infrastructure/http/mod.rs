//! HTTP Layer - RESTful API + WebSocket
//!
//! 与 ZMQ 前端共享 GatewayServices；认证使用 Bearer API key

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use routes::create_routes;
pub use server::{HttpServer, ServerConfig};
pub use state::AppState;
