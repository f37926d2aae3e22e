//! Audio Primitives - 纯函数音频编码
//!
//! 输入统一为归一化到 [-1, 1] 的 f32 单声道样本：
//! - PCM: signed 16-bit little-endian
//! - WAV: 44 字节标准 RIFF/WAVE 头 + 16-bit PCM 数据

/// 位深度
pub const BITS_PER_SAMPLE: u16 = 16;

/// 声道数（始终单声道）
pub const NUM_CHANNELS: u16 = 1;

/// 标准 WAV 头长度
pub const WAV_HEADER_LEN: usize = 44;

/// 每个样本占用的字节数
pub const BYTES_PER_SAMPLE: usize = (BITS_PER_SAMPLE / 8) as usize;

/// 量化单个样本：裁剪到 [-1, 1]，乘以 32767 后向零截断
#[inline]
pub fn quantize_sample(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}

/// 编码为 PCM s16le
pub fn encode_pcm_s16le(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * BYTES_PER_SAMPLE);
    for &sample in samples {
        out.extend_from_slice(&quantize_sample(sample).to_le_bytes());
    }
    out
}

/// 构建 WAV 文件头
///
/// `num_samples` 为单声道样本数，data 块大小 = num_samples * 2
pub fn wav_header(sample_rate: u32, num_samples: usize) -> Vec<u8> {
    let byte_rate = sample_rate * NUM_CHANNELS as u32 * (BITS_PER_SAMPLE / 8) as u32;
    let block_align = NUM_CHANNELS * (BITS_PER_SAMPLE / 8);
    let data_size = (num_samples * BYTES_PER_SAMPLE) as u32;

    let mut header = Vec::with_capacity(WAV_HEADER_LEN);

    // RIFF header
    header.extend_from_slice(b"RIFF");
    header.extend_from_slice(&(36 + data_size).to_le_bytes());
    header.extend_from_slice(b"WAVE");

    // fmt chunk
    header.extend_from_slice(b"fmt ");
    header.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    header.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    header.extend_from_slice(&NUM_CHANNELS.to_le_bytes());
    header.extend_from_slice(&sample_rate.to_le_bytes());
    header.extend_from_slice(&byte_rate.to_le_bytes());
    header.extend_from_slice(&block_align.to_le_bytes());
    header.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    // data chunk header
    header.extend_from_slice(b"data");
    header.extend_from_slice(&data_size.to_le_bytes());

    header
}

/// 一次性编码完整 WAV
pub fn encode_wav_complete(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let mut wav = wav_header(sample_rate, samples.len());
    wav.reserve(samples.len() * BYTES_PER_SAMPLE);
    for &sample in samples {
        wav.extend_from_slice(&quantize_sample(sample).to_le_bytes());
    }
    wav
}
