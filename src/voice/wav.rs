//! WAV encoding of captured audio for upload to the transcription service.

use crate::{ChatterlyError, Result};
use std::io::Cursor;

/// Encode f32 samples as 16-bit PCM WAV.
pub fn encode_wav(samples: &[f32], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec)
        .map_err(|e| ChatterlyError::Transcription(format!("wav encode: {}", e)))?;
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(value)
            .map_err(|e| ChatterlyError::Transcription(format!("wav encode: {}", e)))?;
    }
    writer
        .finalize()
        .map_err(|e| ChatterlyError::Transcription(format!("wav encode: {}", e)))?;

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_produces_riff_header() {
        let wav = encode_wav(&[0.0, 0.5, -0.5], 16000, 1).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        // 44-byte header + 3 samples * 2 bytes
        assert_eq!(wav.len(), 44 + 6);
    }

    #[test]
    fn test_encode_clamps_out_of_range_samples() {
        let wav = encode_wav(&[2.0], 16000, 1).unwrap();
        let sample = i16::from_le_bytes([wav[44], wav[45]]);
        assert_eq!(sample, i16::MAX);
    }
}
