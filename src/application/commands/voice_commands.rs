//! Voice Commands

/// 上传音色命令（wav_data 为完整的 WAV 文件）
#[derive(Debug, Clone)]
pub struct UploadVoice {
    pub voice_id: String,
    pub sample_rate: u32,
    pub voice_transcript: String,
    pub wav_data: Vec<u8>,
}

/// 删除音色命令
#[derive(Debug, Clone)]
pub struct DeleteVoice {
    pub voice_id: String,
}

/// 重命名音色命令
#[derive(Debug, Clone)]
pub struct RenameVoice {
    pub voice_id: String,
    pub new_voice_id: String,
}
