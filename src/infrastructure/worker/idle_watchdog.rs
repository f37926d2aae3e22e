//! Idle Watchdog - 模型空闲卸载
//!
//! 按固定间隔唤醒，空闲超时后通过 ModelManager 卸载模型。
//! keep_warm 时不启动。

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::ports::ModelManagerPort;

/// 看门狗配置
#[derive(Debug, Clone)]
pub struct IdleWatchdogConfig {
    /// 检查间隔
    pub interval: Duration,
    /// 常驻模式，不启动看门狗
    pub keep_warm: bool,
}

impl Default for IdleWatchdogConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            keep_warm: false,
        }
    }
}

/// 空闲看门狗
pub struct IdleWatchdog {
    config: IdleWatchdogConfig,
    model_manager: Arc<dyn ModelManagerPort>,
}

impl IdleWatchdog {
    pub fn new(config: IdleWatchdogConfig, model_manager: Arc<dyn ModelManagerPort>) -> Self {
        Self {
            config,
            model_manager,
        }
    }

    /// 在后台启动；keep_warm 时返回 None
    pub fn spawn(self, shutdown: CancellationToken) -> Option<JoinHandle<()>> {
        if self.config.keep_warm {
            tracing::info!("Keep-warm enabled, idle watchdog disabled");
            return None;
        }
        Some(tokio::spawn(self.run(shutdown)))
    }

    async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            "IdleWatchdog started"
        );

        let mut ticker = tokio::time::interval_at(
            tokio::time::Instant::now() + self.config.interval,
            self.config.interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match self.model_manager.offload_if_idle().await {
                        Ok(true) => tracing::info!("Model offloaded after inactivity"),
                        Ok(false) => {}
                        Err(e) => tracing::warn!(error = %e, "Idle offload failed"),
                    }
                }
            }
        }

        tracing::info!("IdleWatchdog stopped");
    }
}
