//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod audio_transcoder;
mod frame_sink;
mod model_manager;
mod prompt_cache;
mod repositories;
mod synthesis_model;
mod voice_store;

pub use audio_transcoder::{AudioTranscoderPort, TranscodeError};
pub use frame_sink::{FrameSink, SinkClosed};
pub use model_manager::{ModelLease, ModelManagerPort, OffloadOutcome};
pub use prompt_cache::PromptCachePort;
pub use repositories::{RepositoryError, VoiceRepositoryPort};
pub use synthesis_model::{
    AudioChunk, AudioStream, ModelError, ModelLoader, PromptArtifact, SynthesisInput,
    SynthesisModel,
};
pub use voice_store::{NewVoice, StoreHealth, VoiceReference, VoiceStorePort};
