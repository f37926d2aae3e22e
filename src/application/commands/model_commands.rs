//! Model Commands

/// 手动卸载模型命令
#[derive(Debug, Clone, Copy, Default)]
pub struct UnloadModel;
