//! Client configuration
//!
//! Centralized configuration for the connection, the conversation engine
//! and the voice pipeline.

use std::time::Duration;

/// Configuration for the complete client
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// WebSocket endpoint of the assistant backend
    pub server_url: String,

    /// Base URL for the HTTP collaborators (profile, favourites, speech)
    pub api_base_url: String,

    /// How long to wait for a reply before giving up on a request
    pub request_timeout: Duration,

    /// Interval between revealed characters of a bot reply
    pub typing_interval: Duration,

    /// Delay before the single reconnect attempt after a close.
    /// Fixed, no backoff.
    pub reconnect_delay: Duration,

    /// Whether to enable microphone capture and playback
    pub enable_audio_io: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://localhost:8001/ws".to_string(),
            api_base_url: "http://localhost:8001".to_string(),
            request_timeout: Duration::from_secs(60),
            typing_interval: Duration::from_millis(30),
            reconnect_delay: Duration::from_millis(500),
            enable_audio_io: true,
        }
    }
}

impl ClientConfig {
    /// Set the WebSocket endpoint
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    /// Set the HTTP API base URL
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Set the reply deadline
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the typing reveal interval
    pub fn with_typing_interval(mut self, interval: Duration) -> Self {
        self.typing_interval = interval;
        self
    }

    /// Disable microphone capture and playback (text-only mode)
    pub fn without_audio_io(mut self) -> Self {
        self.enable_audio_io = false;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.server_url.starts_with("ws://") && !self.server_url.starts_with("wss://") {
            return Err(format!("Server URL is not a WebSocket URL: {}", self.server_url));
        }
        if self.request_timeout.is_zero() {
            return Err("Request timeout must be non-zero".to_string());
        }
        if self.typing_interval.is_zero() {
            return Err("Typing interval must be non-zero".to_string());
        }
        Ok(())
    }
}
