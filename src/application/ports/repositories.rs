//! Repository Ports - 出站端口
//!
//! 定义数据持久化的抽象接口
//! 具体实现在 infrastructure 层（SQLite）

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::voice::{Voice, VoiceId};

/// Repository 错误
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Duplicate entity: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Invalid audio: {0}")]
    InvalidAudio(String),

    #[error("IO error: {0}")]
    IoError(String),
}

// ============================================================================
// Voice Repository
// ============================================================================

/// Voice Repository Port（元数据）
#[async_trait]
pub trait VoiceRepositoryPort: Send + Sync {
    /// 保存音色，voice_id 重复时返回 Duplicate
    async fn save(&self, voice: &Voice) -> Result<(), RepositoryError>;

    /// 根据 ID 查找音色
    async fn find_by_id(&self, id: &VoiceId) -> Result<Option<Voice>, RepositoryError>;

    /// 获取所有音色（按上传时间倒序）
    async fn find_all(&self) -> Result<Vec<Voice>, RepositoryError>;

    /// 删除音色，返回是否存在
    async fn delete(&self, id: &VoiceId) -> Result<bool, RepositoryError>;

    /// 修改 voice_id（同时更新文件名）
    async fn rename(&self, old_id: &VoiceId, new_id: &VoiceId) -> Result<(), RepositoryError>;

    /// 数据库是否可达
    async fn ping(&self) -> bool;
}
