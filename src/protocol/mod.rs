//! Protocol dispatcher
//!
//! The single ingress point for server payloads. Every inbound frame is
//! decoded into a [`ServerMessage`] here; no downstream code branches on raw
//! payload shape. Decode failures are protocol-contract violations and are
//! treated as more severe than an application-level `error` message.

pub mod markup;
pub mod message;

pub use message::{InitPayload, Mode, RecipeSelection, ServerMessage};

use crate::transcript::{VideoCard, WebResult};
use message::{RawMessage, RawVideoItem, RawWebResult};
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone)]
pub enum DecodeError {
    #[error("payload is not valid JSON: {0}")]
    Json(String),

    #[error("`{kind}` payload is missing required field `{field}`")]
    MissingField { kind: &'static str, field: &'static str },

    #[error("`suggestions` payload carries no options")]
    EmptySuggestions,

    #[error("payload has no recognized type")]
    UnknownType,
}

impl From<DecodeError> for crate::ChatterlyError {
    fn from(e: DecodeError) -> Self {
        crate::ChatterlyError::Decode(e.to_string())
    }
}

/// Decode one raw inbound frame into a typed message.
pub fn decode(raw: &str) -> Result<ServerMessage, DecodeError> {
    let msg: RawMessage =
        serde_json::from_str(raw).map_err(|e| DecodeError::Json(e.to_string()))?;

    match msg.kind.as_deref() {
        Some("error") => Ok(ServerMessage::Error {
            message: require(msg.message, "error", "message")?,
        }),
        Some("reconnect") => Ok(ServerMessage::Reconnect {
            message: require(msg.message, "reconnect", "message")?,
        }),
        Some("suggestions") => {
            let options = require(msg.suggestions, "suggestions", "suggestions")?;
            if options.is_empty() {
                return Err(DecodeError::EmptySuggestions);
            }
            Ok(ServerMessage::Suggestions {
                prompt: msg.message,
                options,
            })
        }
        Some("response") => Ok(ServerMessage::Response {
            text: require(msg.message, "response", "message")?,
            source_url: msg.source_url,
            recipe: recipe_selection(msg.selected_title, msg.full_recipe),
        }),
        Some("video") => {
            let items = require(msg.videos, "video", "videos")?;
            Ok(ServerMessage::Video {
                items: items.into_iter().filter_map(video_card).collect(),
            })
        }
        Some("web") => {
            let results = require(msg.results, "web", "results")?;
            Ok(ServerMessage::Web {
                results: filter_web_results(results),
            })
        }
        // Anything carrying a recipe selection without a recognized type is
        // still treated as a recipe-selection side effect.
        _ => match recipe_selection(msg.selected_title, msg.full_recipe) {
            Some(selection) => Ok(ServerMessage::RecipeSelected(selection)),
            None => Err(DecodeError::UnknownType),
        },
    }
}

fn require<T>(
    value: Option<T>,
    kind: &'static str,
    field: &'static str,
) -> Result<T, DecodeError> {
    value.ok_or(DecodeError::MissingField { kind, field })
}

fn recipe_selection(title: Option<String>, body: Option<String>) -> Option<RecipeSelection> {
    match (title, body) {
        (Some(title), Some(body)) => Some(RecipeSelection { title, body }),
        _ => None,
    }
}

fn video_card(item: RawVideoItem) -> Option<VideoCard> {
    let url = item.url?;
    Some(VideoCard {
        thumbnail: youtube_thumbnail(&url),
        title: item.title.unwrap_or_default(),
        url,
    })
}

/// Derive the thumbnail for a YouTube watch URL from its `v=` parameter.
fn youtube_thumbnail(url: &str) -> Option<String> {
    let video_id = url.split("v=").nth(1)?.split('&').next()?;
    if video_id.is_empty() {
        return None;
    }
    Some(format!("https://img.youtube.com/vi/{}/hqdefault.jpg", video_id))
}

/// Drop incomplete web results and dedupe by exact title, first wins.
fn filter_web_results(results: Vec<RawWebResult>) -> Vec<WebResult> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for raw in results {
        let title = raw.title.as_deref().unwrap_or("").trim().to_string();
        let snippet = raw.snippet.as_deref().unwrap_or("").trim().to_string();
        let link = raw.link.as_deref().unwrap_or("").trim().to_string();
        if title.is_empty() || snippet.is_empty() || link.is_empty() {
            debug!("dropping incomplete web result");
            continue;
        }
        if !seen.insert(title.clone()) {
            continue;
        }
        out.push(WebResult { title, snippet, link });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_message() {
        let msg = decode(r#"{"type":"error","message":"rate limited"}"#).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Error {
                message: "rate limited".to_string()
            }
        );
    }

    #[test]
    fn test_decode_reconnect_message() {
        let msg = decode(r#"{"type":"reconnect","message":"please reconnect"}"#).unwrap();
        assert!(matches!(msg, ServerMessage::Reconnect { .. }));
    }

    #[test]
    fn test_decode_suggestions() {
        let msg =
            decode(r#"{"type":"suggestions","suggestions":["Koshary","Molokhia"]}"#).unwrap();
        match msg {
            ServerMessage::Suggestions { prompt, options } => {
                assert!(prompt.is_none());
                assert_eq!(options, vec!["Koshary", "Molokhia"]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_empty_suggestions_are_a_decode_error() {
        let err = decode(r#"{"type":"suggestions","suggestions":[]}"#).unwrap_err();
        assert!(matches!(err, DecodeError::EmptySuggestions));
    }

    #[test]
    fn test_decode_response_with_recipe() {
        let raw = r#"{
            "type":"response",
            "message":"اتفضل الوصفة",
            "sourceUrl":"https://example.com/src",
            "selected_title":"كشري",
            "full_recipe":"اسلق العدس..."
        }"#;
        match decode(raw).unwrap() {
            ServerMessage::Response {
                text,
                source_url,
                recipe,
            } => {
                assert_eq!(text, "اتفضل الوصفة");
                assert_eq!(source_url.as_deref(), Some("https://example.com/src"));
                let recipe = recipe.unwrap();
                assert_eq!(recipe.title, "كشري");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_response_without_message_is_a_decode_error() {
        let err = decode(r#"{"type":"response"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField { .. }));
    }

    #[test]
    fn test_decode_video_grid_with_thumbnails() {
        let raw = r#"{"type":"video","videos":[
            {"title":"Koshary at home","url":"https://www.youtube.com/watch?v=abc123&t=4"},
            {"title":"No id","url":"https://example.com/clip"}
        ]}"#;
        match decode(raw).unwrap() {
            ServerMessage::Video { items } => {
                assert_eq!(items.len(), 2);
                assert_eq!(
                    items[0].thumbnail.as_deref(),
                    Some("https://img.youtube.com/vi/abc123/hqdefault.jpg")
                );
                assert!(items[1].thumbnail.is_none());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_web_results_filter_and_dedupe() {
        let raw = r#"{"type":"web","results":[
            {"title":"X","snippet":"s1","link":"l1"},
            {"title":"X","snippet":"s2","link":"l2"},
            {"title":"","snippet":"s3","link":"l3"}
        ]}"#;
        match decode(raw).unwrap() {
            ServerMessage::Web { results } => {
                assert_eq!(results.len(), 1);
                assert_eq!(results[0].title, "X");
                assert_eq!(results[0].snippet, "s1");
                assert_eq!(results[0].link, "l1");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_implicit_recipe_selection_default() {
        let raw = r#"{"selected_title":"ملوخية","full_recipe":"اخرط الملوخية..."}"#;
        match decode(raw).unwrap() {
            ServerMessage::RecipeSelected(selection) => {
                assert_eq!(selection.title, "ملوخية");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_payload_is_a_decode_error() {
        assert!(matches!(decode("not json"), Err(DecodeError::Json(_))));
        assert!(matches!(decode(r#"{"type":"mystery"}"#), Err(DecodeError::UnknownType)));
    }
}
