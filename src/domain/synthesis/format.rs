//! Synthesis Context - 输出音频格式

use serde::{Deserialize, Serialize};

/// 输出音频格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// signed 16-bit little-endian 单声道，逐块直出
    #[default]
    Pcm,
    /// RIFF/WAVE，累积后一次性输出
    Wav,
    /// Vorbis-in-Ogg，累积后交给外部编码器
    Vorbis,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Pcm => "pcm",
            AudioFormat::Wav => "wav",
            AudioFormat::Vorbis => "vorbis",
        }
    }

    /// HTTP Content-Type
    pub fn media_type(&self) -> &'static str {
        match self {
            AudioFormat::Pcm => "audio/pcm",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Vorbis => "audio/ogg",
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pcm" => Ok(AudioFormat::Pcm),
            "wav" => Ok(AudioFormat::Wav),
            "vorbis" => Ok(AudioFormat::Vorbis),
            other => Err(format!("Unsupported audio format: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_types() {
        assert_eq!(AudioFormat::Pcm.media_type(), "audio/pcm");
        assert_eq!(AudioFormat::Wav.media_type(), "audio/wav");
        assert_eq!(AudioFormat::Vorbis.media_type(), "audio/ogg");
    }

    #[test]
    fn test_parse_and_serde() {
        assert_eq!("WAV".parse::<AudioFormat>().unwrap(), AudioFormat::Wav);
        assert!("mp3".parse::<AudioFormat>().is_err());

        let format: AudioFormat = serde_json::from_str("\"vorbis\"").unwrap();
        assert_eq!(format, AudioFormat::Vorbis);
        assert_eq!(serde_json::to_string(&AudioFormat::Pcm).unwrap(), "\"pcm\"");
    }
}
