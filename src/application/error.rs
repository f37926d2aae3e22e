//! 应用层错误定义
//!
//! 统一的请求处理错误类型。所有错误在请求任务边界被捕获，
//! 转换为单个 error 帧，不会传播到路由循环。

use thiserror::Error;

use crate::application::ports::{ModelError, RepositoryError, SinkClosed, TranscodeError};
use crate::domain::synthesis::RequestError;
use crate::domain::voice::{VoiceError, VoiceId};

/// 网关错误
#[derive(Debug, Error)]
pub enum GatewayError {
    /// 认证失败（缺失或错误的 API key）
    #[error("{0}")]
    Auth(String),

    /// 资源未找到
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: String },

    /// 请求体或字段不合法
    #[error("{0}")]
    Validation(String),

    /// 模型调用失败（流开始前或流中）
    #[error("{0}")]
    Synthesis(String),

    /// 编码器或外部工具失败
    #[error("{0}")]
    Encoding(String),

    /// 模型加载 / 卸载失败
    #[error("{0}")]
    Resource(String),

    /// 资源已存在
    #[error("{0}")]
    Conflict(String),

    /// 客户端已断开（不向客户端报告）
    #[error("client disconnected")]
    Disconnected,

    /// 存储等内部错误
    #[error("{0}")]
    Internal(String),
}

impl GatewayError {
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn voice_not_found(id: &VoiceId) -> Self {
        Self::NotFound {
            resource: "Voice",
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// 是否应当向客户端发送 error 帧
    pub fn is_reportable(&self) -> bool {
        !matches!(self, Self::Disconnected)
    }

    /// 错误类别（日志字段）
    pub fn category(&self) -> &'static str {
        match self {
            Self::Auth(_) => "auth",
            Self::NotFound { .. } => "not_found",
            Self::Validation(_) => "validation",
            Self::Synthesis(_) => "synthesis",
            Self::Encoding(_) => "encoding",
            Self::Resource(_) => "resource",
            Self::Conflict(_) => "conflict",
            Self::Disconnected => "disconnected",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<RequestError> for GatewayError {
    fn from(err: RequestError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<VoiceError> for GatewayError {
    fn from(err: VoiceError) -> Self {
        match err {
            VoiceError::NotFound(id) => Self::voice_not_found(&id),
            VoiceError::AlreadyExists(_) => Self::Conflict(err.to_string()),
            VoiceError::InvalidId(_) | VoiceError::InvalidReferenceAudio(_) => {
                Self::Validation(err.to_string())
            }
        }
    }
}

impl From<RepositoryError> for GatewayError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => Self::NotFound {
                resource: "Voice",
                id,
            },
            RepositoryError::Duplicate(id) => Self::Conflict(format!(
                "Voice ID '{}' already exists. Please use a different identifier or delete the existing voice first.",
                id
            )),
            RepositoryError::InvalidAudio(msg) => Self::Validation(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ModelError> for GatewayError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::LoadFailed(_) | ModelError::ReleaseFailed(_) => {
                Self::Resource(err.to_string())
            }
            _ => Self::Synthesis(err.to_string()),
        }
    }
}

impl From<TranscodeError> for GatewayError {
    fn from(err: TranscodeError) -> Self {
        Self::Encoding(err.to_string())
    }
}

impl From<SinkClosed> for GatewayError {
    fn from(_: SinkClosed) -> Self {
        Self::Disconnected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_not_found_message() {
        let id = VoiceId::parse("missing").unwrap();
        assert_eq!(
            GatewayError::voice_not_found(&id).to_string(),
            "Voice not found: missing"
        );
    }

    #[test]
    fn test_conversions() {
        assert!(matches!(
            GatewayError::from(ModelError::LoadFailed("oom".into())),
            GatewayError::Resource(_)
        ));
        assert!(matches!(
            GatewayError::from(ModelError::Timeout),
            GatewayError::Synthesis(_)
        ));
        assert!(matches!(
            GatewayError::from(RepositoryError::Duplicate("v".into())),
            GatewayError::Conflict(_)
        ));
        assert!(matches!(
            GatewayError::from(TranscodeError::Timeout(30)),
            GatewayError::Encoding(_)
        ));
        assert!(!GatewayError::from(SinkClosed).is_reportable());
        assert!(GatewayError::validation("bad").is_reportable());
    }
}
