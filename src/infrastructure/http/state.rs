//! Application State
//!
//! HTTP 与 ZMQ 前端共享同一组应用服务

use std::sync::Arc;

use crate::application::GatewayServices;

/// 应用状态
pub struct AppState {
    pub services: Arc<GatewayServices>,
    /// 上传体积上限（字节）
    pub max_upload_size: usize,
}

impl AppState {
    pub fn new(services: Arc<GatewayServices>, max_upload_size: usize) -> Self {
        Self {
            services,
            max_upload_size,
        }
    }
}
