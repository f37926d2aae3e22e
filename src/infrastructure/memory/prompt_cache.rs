//! In-Memory Prompt Cache Implementation
//!
//! voice_id → 预计算提示，TTL 惰性过期（读取时检查并移除）
//! 代数计数拒绝失效之后才落地的旧写入

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use crate::application::ports::{PromptArtifact, PromptCachePort};
use crate::domain::voice::VoiceId;

struct CacheEntry {
    prompt: PromptArtifact,
    expires_at: Instant,
    generation: u64,
}

/// 内存提示缓存
pub struct InMemoryPromptCache {
    entries: DashMap<VoiceId, CacheEntry>,
    generation: AtomicU64,
    ttl: Duration,
}

impl InMemoryPromptCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            generation: AtomicU64::new(0),
            ttl,
        }
    }
}

impl PromptCachePort for InMemoryPromptCache {
    fn get(&self, voice_id: &VoiceId) -> Option<PromptArtifact> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(voice_id) {
            if now < entry.expires_at {
                return Some(entry.prompt.clone());
            }
        }
        // 读锁已释放，再按条件移除过期条目（避免误删并发 set 的新值）
        if self
            .entries
            .remove_if(voice_id, |_, entry| now >= entry.expires_at)
            .is_some()
        {
            tracing::debug!(voice_id = %voice_id, "Prompt cache entry expired");
        }
        None
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn set(&self, voice_id: VoiceId, prompt: PromptArtifact, generation: u64) -> bool {
        if self.generation() != generation {
            tracing::debug!(voice_id = %voice_id, "Discarding prompt prepared before invalidation");
            return false;
        }

        let expires_at = Instant::now() + self.ttl;
        self.entries.insert(
            voice_id.clone(),
            CacheEntry {
                prompt,
                expires_at,
                generation,
            },
        );

        // 插入与失效交错时撤回本次写入
        if self.generation() != generation {
            self.entries
                .remove_if(&voice_id, |_, entry| entry.generation == generation);
            return false;
        }
        true
    }

    fn invalidate(&self, voice_id: &VoiceId) -> bool {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let removed = self.entries.remove(voice_id).is_some();
        if removed {
            tracing::debug!(voice_id = %voice_id, "Prompt cache entry invalidated");
        }
        removed
    }

    fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let count = self.entries.len();
        self.entries.clear();
        if count > 0 {
            tracing::info!(entries = count, "Prompt cache cleared");
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
