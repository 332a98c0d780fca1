//! External collaborators
//!
//! Plain request/reply clients. None of these hold conversation state; all
//! failures surface as [`ChatterlyError::Service`] or the voice-pipeline
//! error variants and are reported by the engine, never silently swallowed.
//!
//! [`ChatterlyError::Service`]: crate::ChatterlyError::Service

pub mod api;
pub mod speech;

pub use api::{ApiClient, ChatLog, Favourite, FavouriteStatus, UserProfile};
pub use speech::{HttpSpeechService, SpeechService};
