//! Storage Adapters - 音色文件存储

mod voice_store;

pub use voice_store::LocalVoiceStore;
