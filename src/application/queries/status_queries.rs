//! Status Queries

/// 存活检查
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthCheck;

/// 就绪检查
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadinessCheck;
