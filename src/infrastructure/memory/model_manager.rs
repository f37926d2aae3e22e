//! Model Lifecycle Manager Implementation
//!
//! 持有唯一的模型句柄:
//! - tokio Mutex 守护句柄槽位，加载期间持锁，并发 ensure_loaded 排队等待同一次加载
//! - AtomicU8 镜像当前状态，就绪检查无需加锁
//! - 租约计数 + 最近活跃时间，供空闲看门狗判断

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::application::ports::{
    ModelError, ModelLease, ModelLoader, ModelManagerPort, OffloadOutcome, PromptCachePort,
    SynthesisModel,
};
use crate::domain::synthesis::ModelState;

/// 管理器配置
#[derive(Debug, Clone)]
pub struct ModelManagerConfig {
    /// 空闲多久后卸载
    pub inactivity_timeout: Duration,
    /// 常驻：从不因空闲卸载
    pub keep_warm: bool,
}

impl Default for ModelManagerConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout: Duration::from_secs(600),
            keep_warm: false,
        }
    }
}

/// 活跃度追踪
struct ActivityTracker {
    last_activity: Mutex<Instant>,
    in_flight: AtomicUsize,
}

impl ActivityTracker {
    fn new() -> Self {
        Self {
            last_activity: Mutex::new(Instant::now()),
            in_flight: AtomicUsize::new(0),
        }
    }

    fn touch(&self) {
        if let Ok(mut last) = self.last_activity.lock() {
            *last = Instant::now();
        }
    }

    fn idle_for(&self) -> Duration {
        self.last_activity
            .lock()
            .map(|last| last.elapsed())
            .unwrap_or_default()
    }
}

/// 模型生命周期管理器
pub struct ModelLifecycleManager {
    config: ModelManagerConfig,
    loader: Arc<dyn ModelLoader>,
    prompt_cache: Arc<dyn PromptCachePort>,
    slot: tokio::sync::Mutex<Option<Arc<dyn SynthesisModel>>>,
    state: AtomicU8,
    activity: Arc<ActivityTracker>,
}

impl ModelLifecycleManager {
    pub fn new(
        config: ModelManagerConfig,
        loader: Arc<dyn ModelLoader>,
        prompt_cache: Arc<dyn PromptCachePort>,
    ) -> Self {
        Self {
            config,
            loader,
            prompt_cache,
            slot: tokio::sync::Mutex::new(None),
            state: AtomicU8::new(ModelState::Unloaded.as_u8()),
            activity: Arc::new(ActivityTracker::new()),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 正在使用模型的请求数
    pub fn in_flight(&self) -> usize {
        self.activity.in_flight.load(Ordering::SeqCst)
    }

    fn set_state(&self, state: ModelState) {
        let previous = ModelState::from_u8(self.state.swap(state.as_u8(), Ordering::SeqCst));
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Model state changed");
        }
    }

    fn lease(&self, model: Arc<dyn SynthesisModel>) -> ModelLease {
        let activity = self.activity.clone();
        activity.in_flight.fetch_add(1, Ordering::SeqCst);
        activity.touch();
        ModelLease::new(model, move || {
            activity.in_flight.fetch_sub(1, Ordering::SeqCst);
            activity.touch();
        })
    }

    /// 调用方必须持有 slot 锁
    async fn offload_locked(
        &self,
        slot: &mut Option<Arc<dyn SynthesisModel>>,
    ) -> Result<OffloadOutcome, ModelError> {
        let Some(model) = slot.take() else {
            return Ok(OffloadOutcome { was_loaded: false });
        };

        self.set_state(ModelState::Offloading);
        tracing::info!(backend = self.loader.name(), "Offloading model");

        // 缓存的提示与当前模型实例绑定
        self.prompt_cache.clear();
        let result = self.loader.release(model).await;
        self.set_state(ModelState::Unloaded);

        match result {
            Ok(()) => {
                tracing::info!(backend = self.loader.name(), "Model offloaded");
                Ok(OffloadOutcome { was_loaded: true })
            }
            Err(e) => {
                tracing::error!(error = %e, "Model release failed, handle dropped");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl ModelManagerPort for ModelLifecycleManager {
    async fn ensure_loaded(&self) -> Result<ModelLease, ModelError> {
        let mut slot = self.slot.lock().await;

        if let Some(model) = slot.as_ref() {
            return Ok(self.lease(model.clone()));
        }

        self.set_state(ModelState::Loading);
        tracing::info!(backend = self.loader.name(), "Loading model");
        let started = std::time::Instant::now();

        match self.loader.load().await {
            Ok(model) => {
                *slot = Some(model.clone());
                self.set_state(ModelState::Loaded);
                tracing::info!(
                    backend = self.loader.name(),
                    sample_rate = model.sample_rate(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Model loaded"
                );
                Ok(self.lease(model))
            }
            Err(e) => {
                self.set_state(ModelState::Unloaded);
                tracing::error!(backend = self.loader.name(), error = %e, "Model load failed");
                Err(e)
            }
        }
    }

    async fn offload(&self) -> Result<OffloadOutcome, ModelError> {
        let mut slot = self.slot.lock().await;
        self.offload_locked(&mut slot).await
    }

    async fn offload_if_idle(&self) -> Result<bool, ModelError> {
        if self.config.keep_warm {
            return Ok(false);
        }

        // 正在加载或卸载时跳过本轮
        let Ok(mut slot) = self.slot.try_lock() else {
            return Ok(false);
        };
        if slot.is_none() || self.in_flight() > 0 {
            return Ok(false);
        }

        let idle = self.activity.idle_for();
        if idle < self.config.inactivity_timeout {
            return Ok(false);
        }

        tracing::info!(
            idle_secs = idle.as_secs(),
            timeout_secs = self.config.inactivity_timeout.as_secs(),
            "Model idle timeout reached"
        );
        self.offload_locked(&mut slot).await.map(|_| true)
    }

    fn state(&self) -> ModelState {
        ModelState::from_u8(self.state.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    use bytes::Bytes;

    use crate::application::ports::PromptArtifact;
    use crate::application::testing::{MapPromptCache, StubModel};
    use crate::domain::voice::VoiceId;

    struct CountingLoader {
        loads: AtomicUsize,
        releases: AtomicUsize,
        delay: Duration,
        fail_next: AtomicBool,
    }

    impl CountingLoader {
        fn new(delay: Duration) -> Self {
            Self {
                loads: AtomicUsize::new(0),
                releases: AtomicUsize::new(0),
                delay,
                fail_next: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl ModelLoader for CountingLoader {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn load(&self) -> Result<Arc<dyn SynthesisModel>, ModelError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(ModelError::LoadFailed("device unavailable".into()));
            }
            Ok(Arc::new(StubModel::new(1, 1)))
        }

        async fn release(&self, _model: Arc<dyn SynthesisModel>) -> Result<(), ModelError> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn manager(
        timeout_secs: u64,
        keep_warm: bool,
    ) -> (Arc<ModelLifecycleManager>, Arc<CountingLoader>, Arc<MapPromptCache>) {
        let loader = Arc::new(CountingLoader::new(Duration::from_secs(2)));
        let cache = Arc::new(MapPromptCache::default());
        let manager = ModelLifecycleManager::new(
            ModelManagerConfig {
                inactivity_timeout: Duration::from_secs(timeout_secs),
                keep_warm,
            },
            loader.clone(),
            cache.clone(),
        )
        .arc();
        (manager, loader, cache)
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_once_then_reuse() {
        let (manager, loader, _) = manager(600, false);
        assert_eq!(manager.state(), ModelState::Unloaded);

        drop(manager.ensure_loaded().await.unwrap());
        assert_eq!(manager.state(), ModelState::Loaded);
        drop(manager.ensure_loaded().await.unwrap());
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_load() {
        let (manager, loader, _) = manager(600, false);

        let first = tokio::spawn({
            let m = manager.clone();
            async move { m.ensure_loaded().await.map(drop) }
        });
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(manager.state(), ModelState::Loading);

        let second = tokio::spawn({
            let m = manager.clone();
            async move { m.ensure_loaded().await.map(drop) }
        });

        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();
        assert_eq!(loader.loads.load(Ordering::SeqCst), 1);
        assert_eq!(manager.state(), ModelState::Loaded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_load_resets_state() {
        let (manager, loader, _) = manager(600, false);
        loader.fail_next.store(true, Ordering::SeqCst);

        assert!(manager.ensure_loaded().await.is_err());
        assert_eq!(manager.state(), ModelState::Unloaded);

        drop(manager.ensure_loaded().await.unwrap());
        assert_eq!(manager.state(), ModelState::Loaded);
        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_offload_and_lazy_reload() {
        let (manager, loader, cache) = manager(60, false);
        drop(manager.ensure_loaded().await.unwrap());
        let id = VoiceId::parse("v1").unwrap();
        cache.set(
            id.clone(),
            PromptArtifact {
                voice_id: id,
                data: Bytes::from_static(b"p"),
            },
            cache.generation(),
        );

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(!manager.offload_if_idle().await.unwrap());
        assert!(manager.is_loaded());

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(manager.offload_if_idle().await.unwrap());
        assert_eq!(manager.state(), ModelState::Unloaded);
        assert_eq!(loader.releases.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());

        drop(manager.ensure_loaded().await.unwrap());
        assert_eq!(manager.state(), ModelState::Loaded);
        assert_eq!(loader.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_active_lease_blocks_idle_offload() {
        let (manager, _, _) = manager(60, false);
        let lease = manager.ensure_loaded().await.unwrap();
        assert_eq!(manager.in_flight(), 1);

        tokio::time::advance(Duration::from_secs(120)).await;
        assert!(!manager.offload_if_idle().await.unwrap());

        drop(lease);
        assert_eq!(manager.in_flight(), 0);
        // dropping the lease counts as activity
        assert!(!manager.offload_if_idle().await.unwrap());
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(manager.offload_if_idle().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_warm_never_idles_out() {
        let (manager, loader, _) = manager(1, true);
        drop(manager.ensure_loaded().await.unwrap());

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(!manager.offload_if_idle().await.unwrap());
        assert!(manager.is_loaded());
        assert_eq!(loader.releases.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_offload_is_idempotent() {
        let (manager, loader, _) = manager(600, false);
        assert!(!manager.offload().await.unwrap().was_loaded);

        drop(manager.ensure_loaded().await.unwrap());
        assert!(manager.offload().await.unwrap().was_loaded);
        assert!(!manager.offload().await.unwrap().was_loaded);
        assert_eq!(loader.releases.load(Ordering::SeqCst), 1);
        assert_eq!(manager.state(), ModelState::Unloaded);
    }
}
