//! 应用层测试替身
//!
//! 端口的最小内存实现，供 orchestrator / router / handler 测试共用

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{stream, StreamExt};

use crate::application::ports::{
    AudioChunk, AudioStream, FrameSink, ModelError, ModelLease, ModelManagerPort, NewVoice,
    OffloadOutcome, PromptArtifact, PromptCachePort, RepositoryError, SinkClosed, StoreHealth,
    SynthesisInput, SynthesisModel, VoiceReference, VoiceStorePort,
};
use crate::domain::synthesis::{Frame, ModelState};
use crate::domain::voice::{Voice, VoiceId, VoiceTranscript};

// ============================================================================
// Sink
// ============================================================================

/// 收集帧的 sink；`fail_after` 条之后模拟断开
#[derive(Default)]
pub struct CollectingSink {
    pub frames: Mutex<Vec<Frame>>,
    pub fail_after: Option<usize>,
}

impl CollectingSink {
    pub fn failing_after(n: usize) -> Self {
        Self {
            frames: Mutex::new(Vec::new()),
            fail_after: Some(n),
        }
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.frames()
            .iter()
            .map(|f| f.kind().as_str())
            .collect()
    }
}

#[async_trait]
impl FrameSink for CollectingSink {
    async fn send(&self, frame: Frame) -> Result<(), SinkClosed> {
        let mut frames = self.frames.lock().unwrap();
        if let Some(limit) = self.fail_after {
            if frames.len() >= limit {
                return Err(SinkClosed);
            }
        }
        frames.push(frame);
        Ok(())
    }
}

// ============================================================================
// Model
// ============================================================================

/// 准备提示期间执行的钩子
pub type PrepareHook = Box<dyn Fn() + Send + Sync>;

/// 固定输出的模型：`chunks` 块，每块 `chunk_len` 个样本，可在第 n 块出错
pub struct StubModel {
    pub sample_rate: u32,
    pub chunks: usize,
    pub chunk_len: usize,
    pub fail_at: Option<usize>,
    /// 每块之前的等待
    pub chunk_delay: Option<Duration>,
    /// 为 true 时忽略请求的采样率覆盖，始终按原生采样率输出
    pub ignore_rate_override: bool,
    pub on_prepare: Option<PrepareHook>,
    pub prepare_calls: AtomicUsize,
    pub pulled: Arc<AtomicUsize>,
}

impl StubModel {
    pub fn new(chunks: usize, chunk_len: usize) -> Self {
        Self {
            sample_rate: 24000,
            chunks,
            chunk_len,
            fail_at: None,
            chunk_delay: None,
            ignore_rate_override: false,
            on_prepare: None,
            prepare_calls: AtomicUsize::new(0),
            pulled: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl SynthesisModel for StubModel {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    async fn prepare_prompt(
        &self,
        reference: &VoiceReference,
    ) -> Result<PromptArtifact, ModelError> {
        self.prepare_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = &self.on_prepare {
            hook();
        }
        Ok(PromptArtifact {
            voice_id: reference.voice_id.clone(),
            data: Bytes::from_static(b"prompt"),
        })
    }

    async fn synthesize(&self, input: SynthesisInput) -> Result<AudioStream, ModelError> {
        let rate = match input.sample_rate {
            Some(rate) if !self.ignore_rate_override => rate,
            _ => self.sample_rate,
        };
        let chunk_len = self.chunk_len;
        let delay = self.chunk_delay;
        let fail_at = self.fail_at;
        let pulled = self.pulled.clone();
        let items = (0..self.chunks).map(move |i| {
            pulled.fetch_add(1, Ordering::SeqCst);
            if Some(i) == fail_at {
                Err(ModelError::SynthesisFailed("CUDA error".into()))
            } else {
                Ok(AudioChunk {
                    samples: vec![0.5; chunk_len],
                    sample_rate: rate,
                })
            }
        });
        Ok(Box::pin(stream::iter(items).then(move |item| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            item
        })))
    }
}

/// 始终返回同一模型的管理器
pub struct StubModelManager {
    pub model: Arc<StubModel>,
    pub load_calls: AtomicUsize,
    pub offload_calls: AtomicUsize,
    pub fail_load: bool,
}

impl StubModelManager {
    pub fn new(model: StubModel) -> Self {
        Self {
            model: Arc::new(model),
            load_calls: AtomicUsize::new(0),
            offload_calls: AtomicUsize::new(0),
            fail_load: false,
        }
    }

    pub fn failing(model: StubModel) -> Self {
        Self {
            fail_load: true,
            ..Self::new(model)
        }
    }
}

#[async_trait]
impl ModelManagerPort for StubModelManager {
    async fn ensure_loaded(&self) -> Result<ModelLease, ModelError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_load {
            return Err(ModelError::LoadFailed("out of memory".into()));
        }
        Ok(ModelLease::detached(self.model.clone()))
    }

    async fn offload(&self) -> Result<OffloadOutcome, ModelError> {
        let previous = self.offload_calls.fetch_add(1, Ordering::SeqCst);
        Ok(OffloadOutcome {
            was_loaded: previous == 0 && self.load_calls.load(Ordering::SeqCst) > 0,
        })
    }

    async fn offload_if_idle(&self) -> Result<bool, ModelError> {
        Ok(false)
    }

    fn state(&self) -> ModelState {
        if self.load_calls.load(Ordering::SeqCst) > 0 {
            ModelState::Loaded
        } else {
            ModelState::Unloaded
        }
    }
}

// ============================================================================
// Prompt cache
// ============================================================================

#[derive(Default)]
struct MapCacheState {
    entries: HashMap<VoiceId, PromptArtifact>,
    generation: u64,
}

#[derive(Default)]
pub struct MapPromptCache {
    state: Mutex<MapCacheState>,
}

impl PromptCachePort for MapPromptCache {
    fn get(&self, voice_id: &VoiceId) -> Option<PromptArtifact> {
        self.state.lock().unwrap().entries.get(voice_id).cloned()
    }

    fn generation(&self) -> u64 {
        self.state.lock().unwrap().generation
    }

    fn set(&self, voice_id: VoiceId, prompt: PromptArtifact, generation: u64) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.generation != generation {
            return false;
        }
        state.entries.insert(voice_id, prompt);
        true
    }

    fn invalidate(&self, voice_id: &VoiceId) -> bool {
        let mut state = self.state.lock().unwrap();
        state.generation += 1;
        state.entries.remove(voice_id).is_some()
    }

    fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.generation += 1;
        state.entries.clear();
    }

    fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }
}

// ============================================================================
// Voice store
// ============================================================================

/// 内存音色库，记录所有访问次数
#[derive(Default)]
pub struct StubVoiceStore {
    voices: Mutex<HashMap<VoiceId, Voice>>,
    pub accesses: AtomicUsize,
}

impl StubVoiceStore {
    pub fn with_voices(ids: &[&str]) -> Self {
        let store = Self::default();
        {
            let mut voices = store.voices.lock().unwrap();
            for id in ids {
                let voice_id = VoiceId::parse(id).unwrap();
                voices.insert(
                    voice_id.clone(),
                    Voice::new(
                        voice_id,
                        24000,
                        VoiceTranscript::new("sample").unwrap(),
                        1.0,
                    ),
                );
            }
        }
        store
    }

    fn touch(&self) {
        self.accesses.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl VoiceStorePort for StubVoiceStore {
    async fn resolve_voice_reference(
        &self,
        voice_id: &VoiceId,
    ) -> Result<Option<VoiceReference>, RepositoryError> {
        self.touch();
        let voices = self.voices.lock().unwrap();
        Ok(voices.get(voice_id).map(|voice| VoiceReference {
            voice_id: voice.voice_id().clone(),
            samples: Arc::from(vec![0.1f32; 2400]),
            sample_rate: voice.sample_rate(),
            transcript: voice.transcript().as_str().to_string(),
        }))
    }

    async fn voice_exists(&self, voice_id: &VoiceId) -> Result<bool, RepositoryError> {
        self.touch();
        Ok(self.voices.lock().unwrap().contains_key(voice_id))
    }

    async fn list_voices(&self) -> Result<Vec<Voice>, RepositoryError> {
        self.touch();
        let mut voices: Vec<Voice> = self.voices.lock().unwrap().values().cloned().collect();
        voices.sort_by(|a, b| a.voice_id().cmp(b.voice_id()));
        Ok(voices)
    }

    async fn save_voice(&self, voice: NewVoice) -> Result<Voice, RepositoryError> {
        self.touch();
        if !voice.wav_data.starts_with(b"RIFF") {
            return Err(RepositoryError::InvalidAudio(
                "Uploaded file is not a valid WAV file".into(),
            ));
        }
        let mut voices = self.voices.lock().unwrap();
        if voices.contains_key(&voice.voice_id) {
            return Err(RepositoryError::Duplicate(voice.voice_id.to_string()));
        }
        let record = Voice::new(voice.voice_id.clone(), voice.sample_rate, voice.transcript, 1.0);
        voices.insert(voice.voice_id, record.clone());
        Ok(record)
    }

    async fn delete_voice(&self, voice_id: &VoiceId) -> Result<bool, RepositoryError> {
        self.touch();
        Ok(self.voices.lock().unwrap().remove(voice_id).is_some())
    }

    async fn rename_voice(
        &self,
        old_id: &VoiceId,
        new_id: &VoiceId,
    ) -> Result<(), RepositoryError> {
        self.touch();
        let mut voices = self.voices.lock().unwrap();
        if voices.contains_key(new_id) {
            return Err(RepositoryError::Duplicate(new_id.to_string()));
        }
        let voice = voices
            .remove(old_id)
            .ok_or_else(|| RepositoryError::NotFound(old_id.to_string()))?;
        let renamed = Voice::restore(
            new_id.clone(),
            new_id.filename(),
            voice.sample_rate(),
            voice.transcript().clone(),
            voice.duration_seconds(),
            voice.uploaded_at(),
        );
        voices.insert(new_id.clone(), renamed);
        Ok(())
    }

    async fn health(&self) -> StoreHealth {
        StoreHealth {
            voice_dir_accessible: true,
            database_accessible: true,
        }
    }
}
