//! Third-party integration authorization flags
//!
//! Keyed per user and handed to the connection manager at open time, where a
//! one-shot snapshot is taken for the init payload. The flags are never
//! polled after connect.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-user authorization flags for the calendar integration.
#[derive(Debug, Clone, Default)]
pub struct IntegrationAuth {
    calendar: Arc<RwLock<HashMap<String, bool>>>,
}

impl IntegrationAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record whether the given user has authorized the calendar integration
    pub fn set_calendar_authorized(&self, user_id: impl Into<String>, authorized: bool) {
        self.calendar.write().insert(user_id.into(), authorized);
    }

    /// Snapshot of the calendar authorization for one user.
    /// Unknown users are unauthorized.
    pub fn calendar_authorized(&self, user_id: &str) -> bool {
        self.calendar.read().get(user_id).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_user_is_unauthorized() {
        let auth = IntegrationAuth::new();
        assert!(!auth.calendar_authorized("u-1"));
    }

    #[test]
    fn test_set_and_read_back() {
        let auth = IntegrationAuth::new();
        auth.set_calendar_authorized("u-1", true);
        auth.set_calendar_authorized("u-2", false);
        assert!(auth.calendar_authorized("u-1"));
        assert!(!auth.calendar_authorized("u-2"));
    }
}
