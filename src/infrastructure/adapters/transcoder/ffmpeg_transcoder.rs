//! FFmpeg Transcoder - 基于 ffmpeg 子进程的 Vorbis 编码器
//!
//! WAV 通过 stdin 输入，Ogg Vorbis 从 stdout 读取，不落盘。
//! 质量 0.0 ~ 1.0 映射到 libvorbis 的 `-q:a 0..10`。

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::application::ports::{AudioTranscoderPort, TranscodeError};

/// FFmpeg 转码器配置
#[derive(Debug, Clone)]
pub struct FfmpegTranscoderConfig {
    /// ffmpeg 可执行文件路径
    pub ffmpeg_path: String,
    /// 单次编码超时
    pub timeout: Duration,
}

impl Default for FfmpegTranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// FFmpeg 转码器
pub struct FfmpegTranscoder {
    config: FfmpegTranscoderConfig,
}

impl FfmpegTranscoder {
    pub fn new(config: FfmpegTranscoderConfig) -> Self {
        Self { config }
    }

    /// 0.0 ~ 1.0 → 0 ~ 10
    pub fn vorbis_quality_level(quality: f32) -> u8 {
        (quality.clamp(0.0, 1.0) * 10.0) as u8
    }

    async fn run(&self, wav_data: &[u8], level: u8) -> Result<Vec<u8>, TranscodeError> {
        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(["-f", "wav", "-i", "pipe:0"])
            .args(["-c:a", "libvorbis", "-q:a"])
            .arg(level.to_string())
            .args(["-f", "ogg", "pipe:1"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    TranscodeError::EncoderMissing(self.config.ffmpeg_path.clone())
                }
                _ => TranscodeError::IoError(e.to_string()),
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| TranscodeError::IoError("ffmpeg stdin unavailable".to_string()))?;

        // 写 stdin 与读 stdout 并发进行，避免管道缓冲区写满后互相等待
        let input = wav_data.to_vec();
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(&input).await;
            drop(stdin);
            result
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| TranscodeError::IoError(e.to_string()))?;

        match writer.await {
            Ok(Ok(())) => {}
            // ffmpeg 提前退出时写入会 broken pipe，以退出状态为准
            Ok(Err(e)) if output.status.success() => {
                return Err(TranscodeError::IoError(e.to_string()));
            }
            Ok(Err(_)) => {}
            Err(e) => return Err(TranscodeError::IoError(e.to_string())),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscodeError::EncodingFailed(stderr.trim().to_string()));
        }
        if output.stdout.is_empty() {
            return Err(TranscodeError::EncodingFailed(
                "ffmpeg produced no output".to_string(),
            ));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl AudioTranscoderPort for FfmpegTranscoder {
    async fn encode_vorbis(&self, wav_data: &[u8], quality: f32) -> Result<Vec<u8>, TranscodeError> {
        let level = Self::vorbis_quality_level(quality);

        let encoded = tokio::time::timeout(self.config.timeout, self.run(wav_data, level))
            .await
            .map_err(|_| TranscodeError::Timeout(self.config.timeout.as_secs()))??;

        tracing::debug!(
            input_bytes = wav_data.len(),
            output_bytes = encoded.len(),
            quality_level = level,
            "Encoded vorbis"
        );

        Ok(encoded)
    }
}
