//! HTTP Handlers

mod synthesize;
mod utility;
mod voice;
mod websocket;

pub use synthesize::*;
pub use utility::*;
pub use voice::*;
pub use websocket::*;
