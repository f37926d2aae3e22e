//! Voice Context - Value Objects

use serde::{Deserialize, Serialize};

/// voice_id 中禁止出现的字符（会被用作文件名）
const FORBIDDEN_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// 音色 ID 最大长度
pub const MAX_VOICE_ID_LEN: usize = 100;

/// 参考文本最大长度
pub const MAX_TRANSCRIPT_LEN: usize = 1000;

/// 音色唯一标识
///
/// 不变量:
/// - 去除首尾空白后非空，且不超过 100 个字符
/// - 不包含路径分隔符等文件名非法字符
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VoiceId(String);

impl VoiceId {
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, &'static str> {
        let id = raw.as_ref().trim();
        if id.is_empty() {
            return Err("voice_id cannot be empty");
        }
        if id.chars().count() > MAX_VOICE_ID_LEN {
            return Err("voice_id cannot exceed 100 characters");
        }
        if id.contains(FORBIDDEN_CHARS) || id == "." || id == ".." {
            return Err("voice_id contains invalid characters");
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 参考音频文件名
    pub fn filename(&self) -> String {
        format!("{}.wav", self.0)
    }
}

impl TryFrom<String> for VoiceId {
    type Error = &'static str;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<VoiceId> for String {
    fn from(id: VoiceId) -> Self {
        id.0
    }
}

impl std::fmt::Display for VoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 参考音频对应的文本
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceTranscript(String);

impl VoiceTranscript {
    pub fn new(text: impl AsRef<str>) -> Result<Self, &'static str> {
        let text = text.as_ref().trim();
        if text.is_empty() {
            return Err("voice_transcript cannot be empty");
        }
        if text.chars().count() > MAX_TRANSCRIPT_LEN {
            return Err("voice_transcript cannot exceed 1000 characters");
        }
        Ok(Self(text.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
