pub mod app;
pub mod auth;
pub mod config;
pub mod connection;
pub mod engine;
pub mod protocol;
pub mod services;
pub mod transcript;
pub mod voice;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ChatterlyError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Request timed out")]
    RequestTimeout,

    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Speech synthesis error: {0}")]
    Synthesis(String),

    #[error("Playback error: {0}")]
    Playback(String),

    #[error("Service error: {0}")]
    Service(String),

    #[error("Channel error: {0}")]
    Channel(String),
}

impl From<std::io::Error> for ChatterlyError {
    fn from(e: std::io::Error) -> Self {
        ChatterlyError::Connection(e.to_string())
    }
}

/// How far an error is allowed to propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Absorbed into the transcript as a system turn; conversation continues.
    Transcript,
    /// The session handle is lost; recoverable by reconnect, transcript kept.
    Session,
    /// The session contract is broken; full reset to the entry state.
    Fatal,
}

impl ChatterlyError {
    pub fn severity(&self) -> Severity {
        match self {
            ChatterlyError::Connection(_) => Severity::Session,
            ChatterlyError::Decode(_) => Severity::Fatal,
            ChatterlyError::RequestTimeout => Severity::Transcript,
            ChatterlyError::AudioDevice(_) => Severity::Transcript,
            ChatterlyError::Transcription(_) => Severity::Fatal,
            ChatterlyError::Synthesis(_) => Severity::Fatal,
            ChatterlyError::Playback(_) => Severity::Fatal,
            ChatterlyError::Service(_) => Severity::Transcript,
            ChatterlyError::Channel(_) => Severity::Fatal,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            ChatterlyError::Connection(_) => {
                "Lost connection to the assistant.".to_string()
            }
            ChatterlyError::Decode(_) => {
                "An unexpected error occurred. You will be redirected to the homepage.".to_string()
            }
            ChatterlyError::RequestTimeout => {
                "⚠️ Oops! Something went wrong! Please try again.".to_string()
            }
            ChatterlyError::AudioDevice(_) => {
                "🎙️ Voice input is not supported on this device.".to_string()
            }
            ChatterlyError::Transcription(_) => {
                "Failed to convert your voice to text. You will be redirected to the homepage."
                    .to_string()
            }
            ChatterlyError::Synthesis(_) | ChatterlyError::Playback(_) => {
                "Failed to play the bot's voice. You will be redirected to the homepage."
                    .to_string()
            }
            ChatterlyError::Service(_) => {
                "❗ Server error. Please try again.".to_string()
            }
            ChatterlyError::Channel(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ChatterlyError>;
