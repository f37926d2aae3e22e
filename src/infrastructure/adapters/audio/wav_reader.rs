//! WAV Reader - 基于 symphonia 的参考音频解码
//!
//! 解码为单声道 f32（多声道逐帧取平均），同时用于上传时的格式校验。

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::application::ports::RepositoryError;

/// 解码结果
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedWav {
    /// 单声道样本
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// 源文件声道数
    pub channels: usize,
}

impl DecodedWav {
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

fn invalid(msg: impl Into<String>) -> RepositoryError {
    RepositoryError::InvalidAudio(msg.into())
}

/// 解码 WAV 字节
pub fn decode_wav(data: &[u8]) -> Result<DecodedWav, RepositoryError> {
    if data.len() < 12 || &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return Err(invalid("Invalid WAV: missing RIFF/WAVE header"));
    }

    let mss = MediaSourceStream::new(Box::new(Cursor::new(data.to_vec())), Default::default());

    let mut hint = Hint::new();
    hint.with_extension("wav");

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| invalid(format!("Probe failed: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| invalid("No audio track found"))?;
    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| invalid("Unknown sample rate"))?;

    let channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .ok_or_else(|| invalid("Unknown channel count"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| invalid(format!("Decoder creation failed: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(invalid(format!("Packet read error: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!("Decode error (skipping packet): {}", e);
                continue;
            }
            Err(e) => return Err(invalid(format!("Decode failed: {}", e))),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();
        let frame_channels = spec.channels.count().max(1);
        let mut buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        buf.copy_interleaved_ref(decoded);

        let interleaved = &buf.samples()[..num_frames * frame_channels];
        if frame_channels == 1 {
            samples.extend_from_slice(interleaved);
        } else {
            samples.extend(
                interleaved
                    .chunks_exact(frame_channels)
                    .map(|frame| frame.iter().sum::<f32>() / frame_channels as f32),
            );
        }
    }

    if samples.is_empty() {
        return Err(invalid("WAV contains no audio samples"));
    }

    Ok(DecodedWav {
        samples,
        sample_rate,
        channels,
    })
}
