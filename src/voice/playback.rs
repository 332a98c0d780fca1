//! Synthesized-speech playback

use crate::Result;

/// Blocking playback of synthesized audio bytes.
pub trait AudioPlayer: Send + Sync {
    /// Play to completion. Errors share the fatal-reset path with
    /// transcription failures.
    fn play(&self, audio: &[u8]) -> Result<()>;
}

/// Player for builds or hosts without audio output; always fails.
pub struct NullPlayer;

impl AudioPlayer for NullPlayer {
    fn play(&self, _audio: &[u8]) -> Result<()> {
        Err(crate::ChatterlyError::Playback(
            "audio output is disabled".to_string(),
        ))
    }
}

#[cfg(feature = "audio-io")]
pub use rodio_player::RodioPlayer;

#[cfg(feature = "audio-io")]
mod rodio_player {
    use super::AudioPlayer;
    use crate::{ChatterlyError, Result};
    use std::io::Cursor;
    use tracing::debug;

    /// rodio-backed playback on the default output device.
    pub struct RodioPlayer;

    impl AudioPlayer for RodioPlayer {
        fn play(&self, audio: &[u8]) -> Result<()> {
            debug!("playing {} bytes of synthesized audio", audio.len());
            let (_stream, handle) = rodio::OutputStream::try_default()
                .map_err(|e| ChatterlyError::Playback(format!("open output: {}", e)))?;
            let sink = rodio::Sink::try_new(&handle)
                .map_err(|e| ChatterlyError::Playback(format!("open sink: {}", e)))?;
            let source = rodio::Decoder::new(Cursor::new(audio.to_vec()))
                .map_err(|e| ChatterlyError::Playback(format!("decode audio: {}", e)))?;
            sink.append(source);
            sink.sleep_until_end();
            Ok(())
        }
    }
}
