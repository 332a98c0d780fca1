use super::types::{Role, Turn, TurnBody};
use chrono::Utc;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Thread-safe, append-only transcript store.
///
/// Allocates the monotonic turn ids. The only in-place mutation is
/// `update_body`, used by the typing presenter on the newest bot turn.
#[derive(Debug, Clone)]
pub struct Transcript {
    turns: Arc<RwLock<Vec<Turn>>>,
    next_id: Arc<AtomicU64>,
}

impl Transcript {
    pub fn new() -> Self {
        Self {
            turns: Arc::new(RwLock::new(Vec::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Append a turn and return its id.
    pub fn append(&self, role: Role, body: TurnBody, source_url: Option<String>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.turns.write().push(Turn {
            id,
            role,
            body,
            source_url,
            timestamp: Utc::now(),
        });
        id
    }

    /// Replace the body of the turn with the given id.
    /// Returns false if the turn no longer exists.
    pub fn update_body(&self, id: u64, body: TurnBody) -> bool {
        let mut turns = self.turns.write();
        match turns.iter_mut().rev().find(|t| t.id == id) {
            Some(turn) => {
                turn.body = body;
                true
            }
            None => false,
        }
    }

    pub fn get_all(&self) -> Vec<Turn> {
        self.turns.read().clone()
    }

    pub fn last(&self) -> Option<Turn> {
        self.turns.read().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.turns.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.read().is_empty()
    }

    pub fn clear(&self) {
        self.turns.write().clear();
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order_and_ids_increase() {
        let transcript = Transcript::new();
        let a = transcript.append(Role::User, TurnBody::Plain("a".into()), None);
        let b = transcript.append(Role::Bot, TurnBody::Plain("b".into()), None);
        assert!(b > a);

        let all = transcript.get_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, a);
        assert_eq!(all[1].id, b);
    }

    #[test]
    fn test_update_body_by_id() {
        let transcript = Transcript::new();
        let id = transcript.append(Role::Bot, TurnBody::Plain(String::new()), None);
        assert!(transcript.update_body(id, TurnBody::Plain("full".into())));
        assert_eq!(transcript.last().unwrap().body.display_text(), "full");
    }

    #[test]
    fn test_update_missing_turn_is_noop() {
        let transcript = Transcript::new();
        assert!(!transcript.update_body(99, TurnBody::Plain("x".into())));
    }
}
