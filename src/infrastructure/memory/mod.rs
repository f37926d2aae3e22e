//! Memory Layer - In-Memory State Management
//!
//! 模型生命周期管理器与提示缓存的内存实现

mod model_manager;
mod prompt_cache;

pub use model_manager::{ModelLifecycleManager, ModelManagerConfig};
pub use prompt_cache::InMemoryPromptCache;
