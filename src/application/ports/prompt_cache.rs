//! Prompt Cache Port - 音色提示缓存抽象

use super::PromptArtifact;
use crate::domain::voice::VoiceId;

/// Prompt Cache Port
///
/// 按 voice_id 缓存预计算提示，TTL 过期在读取时惰性检查。
/// 读取不会刷新过期时间，只有 set 会。
///
/// 每次 invalidate / clear 推进代数；set 携带准备提示前读到的代数，
/// 代数已变化的写入被丢弃，避免失效前开始的准备把旧提示写回缓存。
pub trait PromptCachePort: Send + Sync {
    fn get(&self, voice_id: &VoiceId) -> Option<PromptArtifact>;

    /// 当前代数，准备提示之前读取
    fn generation(&self) -> u64;

    /// 写入提示；`generation` 已过期时丢弃并返回 false
    fn set(&self, voice_id: VoiceId, prompt: PromptArtifact, generation: u64) -> bool;

    /// 立即移除并推进代数，返回是否存在过
    fn invalidate(&self, voice_id: &VoiceId) -> bool;

    /// 清空并推进代数
    fn clear(&self);

    /// 当前条目数（可能包含尚未被惰性清理的过期条目）
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
