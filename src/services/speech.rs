//! Speech collaborators
//!
//! The client performs no recognition or synthesis itself; captured audio is
//! shipped to the transcription service and reply text to the synthesis
//! service. No client-side timeout is imposed on either call, unlike the
//! text-protocol request deadline.

use crate::{ChatterlyError, Result};
use serde::Deserialize;
use tracing::debug;

/// Remote speech recognition and synthesis.
pub trait SpeechService: Send + Sync {
    /// Transcribe a WAV-encoded utterance into text.
    fn transcribe(&self, wav: &[u8]) -> Result<String>;

    /// Synthesize reply text into playable audio bytes.
    fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Deserialize)]
struct TranscriptionReply {
    text: Option<String>,
}

/// HTTP implementation over the assistant backend.
pub struct HttpSpeechService {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl HttpSpeechService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::blocking::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

impl SpeechService for HttpSpeechService {
    fn transcribe(&self, wav: &[u8]) -> Result<String> {
        debug!("uploading {} bytes for transcription", wav.len());
        let part = reqwest::blocking::multipart::Part::bytes(wav.to_vec())
            .file_name("voice.wav")
            .mime_str("audio/wav")
            .map_err(|e| ChatterlyError::Transcription(e.to_string()))?;
        let form = reqwest::blocking::multipart::Form::new().part("file", part);

        let reply: TranscriptionReply = self
            .http
            .post(self.endpoint("transcribe-audio"))
            .multipart(form)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| ChatterlyError::Transcription(e.to_string()))?
            .json()
            .map_err(|e| ChatterlyError::Transcription(e.to_string()))?;

        Ok(reply.text.unwrap_or_default())
    }

    fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        debug!("requesting synthesis for {} chars", text.chars().count());
        let bytes = self
            .http
            .post(self.endpoint("speak-text"))
            .json(&serde_json::json!({ "text": text }))
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| ChatterlyError::Synthesis(e.to_string()))?
            .bytes()
            .map_err(|e| ChatterlyError::Synthesis(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_without_double_slash() {
        let service = HttpSpeechService::new("http://localhost:8001/");
        assert_eq!(
            service.endpoint("speak-text"),
            "http://localhost:8001/speak-text"
        );
    }

    #[test]
    fn test_transcription_reply_tolerates_missing_text() {
        let reply: TranscriptionReply = serde_json::from_str("{}").unwrap();
        assert!(reply.text.is_none());
    }
}
