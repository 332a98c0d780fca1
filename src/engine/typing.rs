//! Typing presenter
//!
//! Reveals a finalized bot turn character by character. The in-progress
//! partial text lives in the same turn (same id) until the reveal completes,
//! at which point the full rich body replaces it exactly. Starting a reveal
//! for a new turn snaps the previous one to its full body, never leaving it
//! truncated. Reveals are char-based; transcript text is largely Arabic.

use crate::transcript::{Role, Transcript, TurnBody};
use std::time::{Duration, Instant};

pub struct TypingPresenter {
    interval: Duration,
    active: Option<Reveal>,
}

struct Reveal {
    turn_id: u64,
    chars: Vec<char>,
    shown: usize,
    final_body: TurnBody,
    next_at: Instant,
}

impl TypingPresenter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            active: None,
        }
    }

    /// Append a new bot turn and start revealing it. Any in-flight reveal is
    /// snapped to its full body first. Returns the new turn's id.
    pub fn begin(
        &mut self,
        transcript: &Transcript,
        raw_text: &str,
        final_body: TurnBody,
        source_url: Option<String>,
        now: Instant,
    ) -> u64 {
        self.snap(transcript);
        let turn_id = transcript.append(Role::Bot, TurnBody::Plain(String::new()), source_url);
        self.active = Some(Reveal {
            turn_id,
            chars: raw_text.chars().collect(),
            shown: 0,
            final_body,
            next_at: now + self.interval,
        });
        turn_id
    }

    /// Advance the reveal. Returns true when the displayed turn changed.
    pub fn tick(&mut self, transcript: &Transcript, now: Instant) -> bool {
        let interval = self.interval;
        let Some(reveal) = self.active.as_mut() else {
            return false;
        };
        if now < reveal.next_at {
            return false;
        }

        let mut advanced = false;
        while now >= reveal.next_at && reveal.shown < reveal.chars.len() {
            reveal.shown += 1;
            reveal.next_at += interval;
            advanced = true;
        }

        if advanced {
            let partial: String = reveal.chars[..reveal.shown].iter().collect();
            if !transcript.update_body(reveal.turn_id, TurnBody::Plain(partial)) {
                // The turn is gone; this reveal is stale.
                self.active = None;
                return false;
            }
        }

        if reveal.shown >= reveal.chars.len() {
            if let Some(done) = self.active.take() {
                transcript.update_body(done.turn_id, done.final_body);
            }
            return true;
        }
        advanced
    }

    /// Complete the in-flight reveal immediately.
    pub fn snap(&mut self, transcript: &Transcript) {
        if let Some(done) = self.active.take() {
            transcript.update_body(done.turn_id, done.final_body);
        }
    }

    /// Drop the in-flight reveal without touching the transcript.
    pub fn abort(&mut self) {
        self.active = None;
    }

    pub fn is_revealing(&self) -> bool {
        self.active.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::Span;

    const TICK: Duration = Duration::from_millis(30);

    fn rich(text: &str) -> TurnBody {
        TurnBody::Rich(vec![Span::Text(text.to_string())])
    }

    #[test]
    fn test_reveal_progresses_by_chars() {
        let transcript = Transcript::new();
        let mut presenter = TypingPresenter::new(TICK);
        let start = Instant::now();

        presenter.begin(&transcript, "سلام", rich("سلام"), None, start);
        assert_eq!(transcript.last().unwrap().body.display_text(), "");

        assert!(presenter.tick(&transcript, start + TICK));
        assert_eq!(transcript.last().unwrap().body.display_text(), "س");

        assert!(presenter.tick(&transcript, start + TICK * 3));
        assert_eq!(transcript.last().unwrap().body.display_text(), "سلا");
    }

    #[test]
    fn test_completed_reveal_swaps_in_final_body() {
        let transcript = Transcript::new();
        let mut presenter = TypingPresenter::new(TICK);
        let start = Instant::now();

        let final_body = TurnBody::Rich(vec![Span::Bold("hi".to_string())]);
        presenter.begin(&transcript, "hi", final_body.clone(), None, start);
        assert!(presenter.tick(&transcript, start + TICK * 10));

        assert!(!presenter.is_revealing());
        assert_eq!(transcript.last().unwrap().body, final_body);
    }

    #[test]
    fn test_new_reveal_snaps_previous_to_full_text() {
        let transcript = Transcript::new();
        let mut presenter = TypingPresenter::new(TICK);
        let start = Instant::now();

        let a = presenter.begin(&transcript, "first reply", rich("first reply"), None, start);
        presenter.tick(&transcript, start + TICK);

        let b = presenter.begin(&transcript, "second", rich("second"), None, start + TICK * 2);
        assert_ne!(a, b);

        let turns = transcript.get_all();
        let turn_a = turns.iter().find(|t| t.id == a).unwrap();
        assert_eq!(turn_a.body.display_text(), "first reply");

        // B proceeds independently from empty.
        let turn_b = turns.iter().find(|t| t.id == b).unwrap();
        assert_eq!(turn_b.body.display_text(), "");
    }

    #[test]
    fn test_stale_turn_aborts_reveal() {
        let transcript = Transcript::new();
        let mut presenter = TypingPresenter::new(TICK);
        let start = Instant::now();

        presenter.begin(&transcript, "bye", rich("bye"), None, start);
        transcript.clear();

        assert!(!presenter.tick(&transcript, start + TICK));
        assert!(!presenter.is_revealing());
        assert!(transcript.is_empty());
    }
}
