use crate::transcript::{VideoCard, WebResult};
use serde::{Deserialize, Serialize};

/// How the user chose to interact with the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Text,
    Voice,
}

/// First client→server message after connect.
///
/// The calendar flag is a one-shot snapshot taken at open time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitPayload {
    pub identity: String,
    pub mode: Mode,
    #[serde(rename = "calendarAuthorized")]
    pub calendar_authorized: bool,
}

/// A recipe the server resolved for the current conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeSelection {
    pub title: String,
    pub body: String,
}

/// Every inbound server message, decoded at the single ingress point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Application-level failure; terminates the pending request,
    /// never fatal to the connection.
    Error { message: String },

    /// The server wants the client to treat the session as disconnected
    /// and offer a manual reconnect.
    Reconnect { message: String },

    /// A multiple-choice turn. Options are guaranteed non-empty.
    Suggestions {
        prompt: Option<String>,
        options: Vec<String>,
    },

    /// A terminal conversational reply.
    Response {
        text: String,
        source_url: Option<String>,
        recipe: Option<RecipeSelection>,
    },

    /// A media turn: thumbnail grid of videos. Does not touch the
    /// pending-request timer.
    Video { items: Vec<VideoCard> },

    /// A media turn: filtered web search results. Does not touch the
    /// pending-request timer.
    Web { results: Vec<WebResult> },

    /// Implicit default: a recipe selection side effect carried by a
    /// payload without a recognized `type`.
    RecipeSelected(RecipeSelection),
}

/// Raw wire shape shared by all server payloads. Field names are fixed by
/// the protocol (mixed camel/snake case on the wire).
#[derive(Debug, Deserialize)]
pub(crate) struct RawMessage {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub message: Option<String>,
    pub suggestions: Option<Vec<String>>,
    #[serde(rename = "sourceUrl")]
    pub source_url: Option<String>,
    pub selected_title: Option<String>,
    pub full_recipe: Option<String>,
    pub videos: Option<Vec<RawVideoItem>>,
    pub results: Option<Vec<RawWebResult>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawVideoItem {
    pub title: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawWebResult {
    pub title: Option<String>,
    pub snippet: Option<String>,
    pub link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_payload_wire_names() {
        let payload = InitPayload {
            identity: "user@example.com".to_string(),
            mode: Mode::Voice,
            calendar_authorized: true,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["identity"], "user@example.com");
        assert_eq!(json["mode"], "voice");
        assert_eq!(json["calendarAuthorized"], true);
    }
}
