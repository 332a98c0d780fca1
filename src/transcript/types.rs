use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fallback line rendered when web search results filter down to nothing.
pub const NO_WEB_RESULTS_TEXT: &str = "لم يتم العثور على نتائج مناسبة.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Bot,
    System,
}

/// One piece of trusted inline markup inside a bot reply.
///
/// Produced by the protocol dispatcher; renderers never sniff raw content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Span {
    Text(String),
    Bold(String),
    Link { label: String, url: String },
}

/// One tile of a video grid turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoCard {
    pub title: String,
    pub url: String,
    /// Derived thumbnail image, when the video id could be extracted.
    pub thumbnail: Option<String>,
}

/// One filtered web search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebResult {
    pub title: String,
    pub snippet: String,
    pub link: String,
}

/// The displayable body of a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnBody {
    /// Unformatted text: user turns, system turns, in-progress reveals.
    Plain(String),
    /// Finalized bot text with inline markup.
    Rich(Vec<Span>),
    /// Thumbnail grid, one tile per video.
    VideoGrid(Vec<VideoCard>),
    /// Filtered web results; an empty list renders the explicit
    /// no-results line, never an empty turn.
    WebResults(Vec<WebResult>),
}

impl TurnBody {
    /// Flatten the body to displayable text.
    pub fn display_text(&self) -> String {
        match self {
            TurnBody::Plain(text) => text.clone(),
            TurnBody::Rich(spans) => {
                let mut out = String::new();
                for span in spans {
                    match span {
                        Span::Text(t) | Span::Bold(t) => out.push_str(t),
                        Span::Link { label, url } => {
                            out.push_str(label);
                            out.push_str(" (");
                            out.push_str(url);
                            out.push(')');
                        }
                    }
                }
                out
            }
            TurnBody::VideoGrid(cards) => cards
                .iter()
                .map(|c| format!("▶ {} — {}", c.title, c.url))
                .collect::<Vec<_>>()
                .join("\n"),
            TurnBody::WebResults(results) => {
                if results.is_empty() {
                    NO_WEB_RESULTS_TEXT.to_string()
                } else {
                    results
                        .iter()
                        .map(|r| format!("{}\n{}\n{}", r.title, r.snippet, r.link))
                        .collect::<Vec<_>>()
                        .join("\n\n")
                }
            }
        }
    }
}

/// One transcript entry attributed to the user, the bot or the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Monotonic id; used by the typing presenter to verify it is still
    /// animating the right turn.
    pub id: u64,
    pub role: Role,
    pub body: TurnBody,
    /// Source-attribution URL accompanying some bot replies.
    pub source_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}
