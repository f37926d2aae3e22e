//! Worker Layer - Background Task Processing
//!
//! 实现 IdleWatchdog，空闲时卸载模型

mod idle_watchdog;

pub use idle_watchdog::{IdleWatchdog, IdleWatchdogConfig};
