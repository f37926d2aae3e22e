//! Domain Layer - 领域层
//!
//! 包含两个限界上下文:
//! - Synthesis Context: 合成请求、输出格式、响应帧、模型状态
//! - Voice Context: 音色管理
//!
//! 以及共享的纯函数音频编码 (audio)

pub mod audio;
pub mod synthesis;
pub mod voice;
