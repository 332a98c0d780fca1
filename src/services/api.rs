//! Profile, favourites and chat-log collaborators
//!
//! Simple fetch-and-render backends for the side panels. Keyed by the user's
//! identity (email); all stateless request/reply.

use crate::{ChatterlyError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub likes: Vec<String>,
    #[serde(default)]
    pub dislikes: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Favourite {
    pub title: String,
    pub recipe: String,
}

/// Outcome of adding a favourite; duplicates are reported, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavouriteStatus {
    Added,
    AlreadyExists,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatLog {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub chat: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct FavouritesReply {
    #[serde(default)]
    favourites: Vec<Favourite>,
}

#[derive(Debug, Deserialize)]
struct ChatLogsReply {
    #[serde(default)]
    chats: Vec<ChatLog>,
}

#[derive(Debug, Deserialize)]
struct StatusReply {
    status: String,
}

pub struct ApiClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::blocking::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    fn service_err(e: reqwest::Error) -> ChatterlyError {
        ChatterlyError::Service(e.to_string())
    }

    pub fn get_profile(&self, email: &str) -> Result<UserProfile> {
        self.http
            .get(self.endpoint("get-profile"))
            .query(&[("email", email)])
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(Self::service_err)?
            .json()
            .map_err(Self::service_err)
    }

    /// Replace one preference list (`likes`, `dislikes` or `allergies`).
    pub fn update_profile(&self, email: &str, field: &str, updated: &[String]) -> Result<()> {
        self.http
            .post(self.endpoint("update-profile"))
            .json(&serde_json::json!({
                "email": email,
                "field": field,
                "updatedList": updated,
            }))
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(Self::service_err)?;
        Ok(())
    }

    pub fn get_favourites(&self, email: &str) -> Result<Vec<Favourite>> {
        let reply: FavouritesReply = self
            .http
            .get(self.endpoint("get-favourites"))
            .query(&[("email", email)])
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(Self::service_err)?
            .json()
            .map_err(Self::service_err)?;
        Ok(reply.favourites)
    }

    pub fn add_favourite(&self, email: &str, title: &str, recipe: &str) -> Result<FavouriteStatus> {
        let reply: StatusReply = self
            .http
            .post(self.endpoint("add-favourite"))
            .json(&serde_json::json!({
                "email": email,
                "title": title,
                "recipe": recipe,
            }))
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(Self::service_err)?
            .json()
            .map_err(Self::service_err)?;

        match reply.status.as_str() {
            "success" => Ok(FavouriteStatus::Added),
            "exists" => Ok(FavouriteStatus::AlreadyExists),
            other => Err(ChatterlyError::Service(format!(
                "add-favourite returned status {:?}",
                other
            ))),
        }
    }

    pub fn get_chat_logs(&self, email: &str) -> Result<Vec<ChatLog>> {
        let reply: ChatLogsReply = self
            .http
            .get(self.endpoint("get-chat-logs"))
            .query(&[("email", email)])
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(Self::service_err)?
            .json()
            .map_err(Self::service_err)?;
        Ok(reply.chats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_tolerates_sparse_reply() {
        let profile: UserProfile =
            serde_json::from_str(r#"{"name":"Nour","likes":["كشري"]}"#).unwrap();
        assert_eq!(profile.name, "Nour");
        assert_eq!(profile.likes, vec!["كشري"]);
        assert!(profile.dislikes.is_empty());
        assert!(profile.allergies.is_empty());
    }

    #[test]
    fn test_favourites_reply_shape() {
        let reply: FavouritesReply = serde_json::from_str(
            r#"{"favourites":[{"title":"كشري","recipe":"اسلق العدس"}]}"#,
        )
        .unwrap();
        assert_eq!(reply.favourites.len(), 1);
        assert_eq!(reply.favourites[0].title, "كشري");
    }

    #[test]
    fn test_chat_logs_reply_shape() {
        let reply: ChatLogsReply =
            serde_json::from_str(r#"{"chats":[{"title":"Chat #1","chat":[]}]}"#).unwrap();
        assert_eq!(reply.chats.len(), 1);
        assert_eq!(reply.chats[0].title.as_deref(), Some("Chat #1"));
    }
}
