//! Model Manager Port - 模型生命周期管理抽象

use std::sync::Arc;

use async_trait::async_trait;

use super::{ModelError, SynthesisModel};
use crate::domain::synthesis::ModelState;

/// 卸载结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffloadOutcome {
    /// 调用前模型是否处于已加载状态
    pub was_loaded: bool,
}

/// 模型租约
///
/// 持有期间视为模型正在使用，空闲看门狗不会卸载；
/// drop 时执行释放回调（刷新活跃时间、减少在用计数）。
pub struct ModelLease {
    model: Arc<dyn SynthesisModel>,
    on_release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl ModelLease {
    pub fn new(
        model: Arc<dyn SynthesisModel>,
        on_release: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            model,
            on_release: Some(Box::new(on_release)),
        }
    }

    /// 不带回调的租约（测试或无需追踪的场景）
    pub fn detached(model: Arc<dyn SynthesisModel>) -> Self {
        Self {
            model,
            on_release: None,
        }
    }

    pub fn model(&self) -> &Arc<dyn SynthesisModel> {
        &self.model
    }
}

impl Drop for ModelLease {
    fn drop(&mut self) {
        if let Some(release) = self.on_release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for ModelLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelLease")
            .field("sample_rate", &self.model.sample_rate())
            .finish()
    }
}

/// Model Manager Port
///
/// 拥有唯一的模型实例。并发的 ensure_loaded 合并为一次加载；
/// 手动卸载与空闲卸载共用同一条互斥路径。
#[async_trait]
pub trait ModelManagerPort: Send + Sync {
    /// 确保模型已加载并刷新活跃时间
    async fn ensure_loaded(&self) -> Result<ModelLease, ModelError>;

    /// 卸载模型（幂等）
    async fn offload(&self) -> Result<OffloadOutcome, ModelError>;

    /// 仅当空闲时间达到阈值且没有在用租约时卸载
    ///
    /// 返回 true 表示本次确实发生了卸载
    async fn offload_if_idle(&self) -> Result<bool, ModelError>;

    fn is_loaded(&self) -> bool {
        self.state() == ModelState::Loaded
    }

    fn state(&self) -> ModelState;
}
