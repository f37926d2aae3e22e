//! Model Backends
//!
//! SynthesisModel / ModelLoader 的实现：
//! - http: 外部推理 worker
//! - fake: 确定性正弦音（开发与测试）

mod fake_model;
mod http_model;

pub use fake_model::{FakeModel, FakeModelConfig, FakeModelLoader};
pub use http_model::{rechunk_f32le, HttpModel, HttpModelConfig, HttpModelLoader};
