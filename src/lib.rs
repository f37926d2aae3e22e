//! Voxgate - 流式 TTS 网关
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Synthesis: 请求、音频格式、线协议帧、模型状态
//! - Voice: 音色聚合与值对象
//! - Audio: PCM / WAV 编码
//!
//! 应用层 (application/):
//! - Ports: SynthesisModel, ModelManager, PromptCache, VoiceStore, AudioTranscoder, FrameSink
//! - Orchestrator / Codec / Router: 合成编排、流式编码、请求分发
//! - Commands / Queries: 音色管理与状态查询
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: RESTful API + WebSocket
//! - ZMQ: ROUTER 多路复用前端
//! - Memory: 模型生命周期管理、Prompt 缓存
//! - Worker: 空闲看门狗
//! - Persistence: SQLite 音色元数据
//! - Adapters: 模型后端、参考音频存储、Vorbis 转码

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
