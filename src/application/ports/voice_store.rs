//! Voice Store Port - 音色存储抽象
//!
//! 组合元数据仓储与参考音频文件，对核心只暴露两个读操作
//! （resolve_voice_reference / voice_exists），其余为管理接口。

use std::sync::Arc;

use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::voice::{Voice, VoiceId, VoiceTranscript};

/// 解码后的参考音频
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceReference {
    pub voice_id: VoiceId,
    /// 单声道 f32 样本（多声道已取平均）
    pub samples: Arc<[f32]>,
    pub sample_rate: u32,
    pub transcript: String,
}

impl VoiceReference {
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// 新音色上传
#[derive(Debug, Clone)]
pub struct NewVoice {
    pub voice_id: VoiceId,
    pub sample_rate: u32,
    pub transcript: VoiceTranscript,
    /// 原始 WAV 文件内容
    pub wav_data: Vec<u8>,
}

/// 存储健康状况
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreHealth {
    pub voice_dir_accessible: bool,
    pub database_accessible: bool,
}

/// Voice Store Port
#[async_trait]
pub trait VoiceStorePort: Send + Sync {
    /// 加载并解码参考音频；记录或文件不存在时返回 None
    async fn resolve_voice_reference(
        &self,
        voice_id: &VoiceId,
    ) -> Result<Option<VoiceReference>, RepositoryError>;

    async fn voice_exists(&self, voice_id: &VoiceId) -> Result<bool, RepositoryError>;

    async fn list_voices(&self) -> Result<Vec<Voice>, RepositoryError>;

    /// 校验 WAV、写入文件并登记元数据
    async fn save_voice(&self, voice: NewVoice) -> Result<Voice, RepositoryError>;

    /// 删除元数据与文件，返回是否存在
    async fn delete_voice(&self, voice_id: &VoiceId) -> Result<bool, RepositoryError>;

    async fn rename_voice(&self, old_id: &VoiceId, new_id: &VoiceId)
        -> Result<(), RepositoryError>;

    async fn health(&self) -> StoreHealth;
}
