//! Voice Context - 音色限界上下文
//!
//! 职责:
//! - 参考音频元数据
//! - voice_id 校验（同时作为文件名使用）

mod aggregate;
mod errors;
mod value_objects;

pub use aggregate::Voice;
pub use errors::VoiceError;
pub use value_objects::{VoiceId, VoiceTranscript, MAX_TRANSCRIPT_LEN, MAX_VOICE_ID_LEN};
