//! Microphone capture
//!
//! A capture session exists only between start and stop; the accumulated
//! buffer is finalized into one [`AudioClip`] and the session is destroyed
//! once transcription has been requested.

use super::AudioClip;
use crate::Result;

/// Seam between the voice pipeline and the audio device.
pub trait AudioRecorder {
    /// Open a capture session. Fails when no input device is available.
    fn start(&mut self) -> Result<()>;

    /// Finalize the accumulated buffer into a single clip.
    fn stop(&mut self) -> Result<AudioClip>;

    /// Discard the session without producing a clip.
    fn cancel(&mut self);
}

/// Recorder for builds or hosts without audio input; `start` always fails.
pub struct NullRecorder;

impl AudioRecorder for NullRecorder {
    fn start(&mut self) -> Result<()> {
        Err(crate::ChatterlyError::AudioDevice(
            "audio input is disabled".to_string(),
        ))
    }

    fn stop(&mut self) -> Result<AudioClip> {
        Err(crate::ChatterlyError::AudioDevice(
            "no capture session".to_string(),
        ))
    }

    fn cancel(&mut self) {}
}

#[cfg(feature = "audio-io")]
pub use cpal_recorder::CpalRecorder;

#[cfg(feature = "audio-io")]
mod cpal_recorder {
    use super::AudioRecorder;
    use crate::voice::AudioClip;
    use crate::{ChatterlyError, Result};
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{Device, Stream, StreamConfig};
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tracing::{info, warn};

    /// cpal-backed recorder using the default input device.
    pub struct CpalRecorder {
        device: Device,
        config: StreamConfig,
        stream: Option<Stream>,
        buffer: Arc<Mutex<Vec<f32>>>,
    }

    impl CpalRecorder {
        pub fn new() -> Result<Self> {
            let host = cpal::default_host();
            let device = host.default_input_device().ok_or_else(|| {
                ChatterlyError::AudioDevice("no input device available".into())
            })?;

            info!(
                "using input device: {}",
                device.name().unwrap_or_else(|_| "Unknown".to_string())
            );

            let config = device
                .default_input_config()
                .map_err(|e| {
                    ChatterlyError::AudioDevice(format!("failed to get input config: {}", e))
                })?
                .into();

            Ok(Self {
                device,
                config,
                stream: None,
                buffer: Arc::new(Mutex::new(Vec::new())),
            })
        }
    }

    impl AudioRecorder for CpalRecorder {
        fn start(&mut self) -> Result<()> {
            if self.stream.is_some() {
                warn!("already capturing");
                return Ok(());
            }
            self.buffer.lock().clear();

            let buffer = Arc::clone(&self.buffer);
            let err_fn = |err| warn!("capture stream error: {}", err);
            let stream = self
                .device
                .build_input_stream(
                    &self.config,
                    move |data: &[f32], _| {
                        buffer.lock().extend_from_slice(data);
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| ChatterlyError::AudioDevice(format!("build stream: {}", e)))?;
            stream
                .play()
                .map_err(|e| ChatterlyError::AudioDevice(format!("start stream: {}", e)))?;
            self.stream = Some(stream);
            Ok(())
        }

        fn stop(&mut self) -> Result<AudioClip> {
            self.stream.take();
            let samples = std::mem::take(&mut *self.buffer.lock());
            info!("capture finished with {} samples", samples.len());
            Ok(AudioClip {
                samples,
                sample_rate: self.config.sample_rate.0,
                channels: self.config.channels,
            })
        }

        fn cancel(&mut self) {
            self.stream.take();
            self.buffer.lock().clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_recorder_reports_unsupported_device() {
        let mut recorder = NullRecorder;
        let err = recorder.start().unwrap_err();
        assert!(matches!(err, crate::ChatterlyError::AudioDevice(_)));
    }
}
