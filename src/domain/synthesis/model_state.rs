//! Synthesis Context - 模型生命周期状态

use serde::Serialize;

/// 模型状态
///
/// 状态转移:
/// - `Unloaded → Loading → Loaded`（ensure_loaded）
/// - `Loading → Unloaded`（加载失败）
/// - `Loaded → Offloading → Unloaded`（空闲超时或手动卸载）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelState {
    #[default]
    Unloaded,
    Loading,
    Loaded,
    Offloading,
}

impl ModelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelState::Unloaded => "unloaded",
            ModelState::Loading => "loading",
            ModelState::Loaded => "loaded",
            ModelState::Offloading => "offloading",
        }
    }

    /// 原子镜像用的编码
    pub fn as_u8(self) -> u8 {
        match self {
            ModelState::Unloaded => 0,
            ModelState::Loading => 1,
            ModelState::Loaded => 2,
            ModelState::Offloading => 3,
        }
    }

    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => ModelState::Loading,
            2 => ModelState::Loaded,
            3 => ModelState::Offloading,
            _ => ModelState::Unloaded,
        }
    }
}

impl std::fmt::Display for ModelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
