//! Audio Adapters - 参考音频解码

mod wav_reader;

pub use wav_reader::{decode_wav, DecodedWav};
