//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（SynthesisModel、ModelManager、PromptCache、VoiceStore 等）
//! - codec: 流式音频编码策略
//! - envelope: 请求信封解码
//! - orchestrator: 合成编排
//! - router: 传输无关的请求分发
//! - commands: CQRS 命令及处理器
//! - queries: CQRS 查询及处理器
//! - error: 应用层错误定义

pub mod auth;
pub mod codec;
pub mod commands;
pub mod envelope;
pub mod error;
pub mod orchestrator;
pub mod ports;
pub mod queries;
pub mod router;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use auth::ApiKeyAuthenticator;
pub use codec::{AudioStreamEncoder, EncoderFactory};
pub use commands::{
    handlers::{
        DeleteVoiceHandler, ModelUnloadResponse, RenameVoiceHandler, RenameVoiceResponse,
        UnloadModelHandler, UploadVoiceHandler, VoiceMutationResponse,
    },
    DeleteVoice, RenameVoice, UnloadModel, UploadVoice,
};
pub use envelope::{decode_object, decode_payload, DecodedMessage, RequestEnvelope};
pub use error::GatewayError;
pub use orchestrator::{report_error, SynthesisOrchestrator};
pub use ports::{
    AudioChunk, AudioStream, AudioTranscoderPort, FrameSink, ModelError, ModelLease,
    ModelLoader, ModelManagerPort, NewVoice, OffloadOutcome, PromptArtifact, PromptCachePort,
    RepositoryError, SinkClosed, StoreHealth, SynthesisInput, SynthesisModel, TranscodeError,
    VoiceReference, VoiceRepositoryPort, VoiceStorePort,
};
pub use queries::{
    handlers::{
        HealthHandler, HealthResponse, ListVoicesHandler, ReadinessHandler, ReadyResponse,
        VoiceInfo, VoiceListResponse,
    },
    HealthCheck, ListVoices, ReadinessCheck,
};
pub use router::{BareTextDefaults, GatewayServices, RequestRouter};
