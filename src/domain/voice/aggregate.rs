//! Voice Context - Aggregate Root

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{VoiceId, VoiceTranscript};

/// Voice 聚合根
///
/// 不变量:
/// - 每个音色有且只有一个参考音频文件 `{voice_id}.wav`
/// - 文件名由 voice_id 派生
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voice {
    voice_id: VoiceId,
    filename: String,
    sample_rate: u32,
    transcript: VoiceTranscript,
    duration_seconds: f64,
    uploaded_at: DateTime<Utc>,
}

impl Voice {
    /// 登记新上传的音色
    pub fn new(
        voice_id: VoiceId,
        sample_rate: u32,
        transcript: VoiceTranscript,
        duration_seconds: f64,
    ) -> Self {
        Self {
            filename: voice_id.filename(),
            voice_id,
            sample_rate,
            transcript,
            duration_seconds,
            uploaded_at: Utc::now(),
        }
    }

    /// 从持久化记录恢复
    pub fn restore(
        voice_id: VoiceId,
        filename: String,
        sample_rate: u32,
        transcript: VoiceTranscript,
        duration_seconds: f64,
        uploaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            voice_id,
            filename,
            sample_rate,
            transcript,
            duration_seconds,
            uploaded_at,
        }
    }

    // Getters
    pub fn voice_id(&self) -> &VoiceId {
        &self.voice_id
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn transcript(&self) -> &VoiceTranscript {
        &self.transcript
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    pub fn uploaded_at(&self) -> DateTime<Utc> {
        self.uploaded_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_creation() {
        let id = VoiceId::parse("narrator").unwrap();
        let transcript = VoiceTranscript::new("hello there").unwrap();
        let voice = Voice::new(id, 24000, transcript, 3.5);

        assert_eq!(voice.voice_id().as_str(), "narrator");
        assert_eq!(voice.filename(), "narrator.wav");
        assert_eq!(voice.sample_rate(), 24000);
    }
}
