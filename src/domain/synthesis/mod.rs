//! Synthesis Context - 合成限界上下文
//!
//! 职责:
//! - 合成请求校验
//! - 输出格式与响应帧
//! - 模型生命周期状态

mod format;
mod frame;
mod model_state;
mod request;

pub use format::AudioFormat;
pub use frame::{EncodedFrame, Frame, FrameKind};
pub use model_state::ModelState;
pub use request::{
    GenerationParams, RequestError, SynthesisRequest, MAX_TEXT_CHARS, SAMPLE_RATE_RANGE,
    SPEED_RANGE,
};
