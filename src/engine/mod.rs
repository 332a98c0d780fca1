//! Conversation state machine
//!
//! Owns the canonical transcript, the current interaction mode, the
//! pending-request deadline and the choice set. All mutations happen on the
//! app loop thread in reaction to connection events, UI actions or ticks;
//! there is never more than one writer.

pub mod typing;

use crate::config::ClientConfig;
use crate::protocol::{self, DecodeError, Mode, RecipeSelection, ServerMessage};
use crate::transcript::{Role, Transcript, TurnBody};
use crate::{ChatterlyError, Severity};
use crossbeam_channel::Sender;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use typing::TypingPresenter;
use uuid::Uuid;

/// Shown while the transcript is still empty, mirroring the entry screen.
pub const STARTER_PROMPTS: &[&str] = &[
    "السلام عليكم",
    "أزيك؟ عامل إيه؟",
    "مساء الفل",
    "صباح الخير",
    "أنا زهقان شوية",
    "احكيلي حاجة حلوة",
    "إيه الأخبار؟",
];

const DEFAULT_CHOICE_PROMPT: &str = "اختر وصفة من الخيارات التالية:";
const DISCONNECTED_TEXT: &str = "🚫 Lost connection to the assistant.";

/// Interaction phase. `disconnected` and voice-pipeline activity are
/// orthogonal flags, not phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    ModeUnselected,
    Idle,
    AwaitingResponse,
    AwaitingChoice,
}

/// Bookkeeping for the one outstanding reply expected from the server.
#[derive(Debug, Clone)]
struct PendingRequest {
    id: Uuid,
    submitted_at: Instant,
    deadline: Instant,
}

/// Recipe bodies keyed by title, plus the current selection.
/// The current title, when set, is always a key of the map.
#[derive(Debug, Default)]
pub struct RecipeBook {
    entries: HashMap<String, String>,
    current: Option<String>,
}

impl RecipeBook {
    fn upsert(&mut self, selection: RecipeSelection) {
        self.entries.insert(selection.title.clone(), selection.body);
        self.current = Some(selection.title);
    }

    /// The current selection as (title, body).
    pub fn current(&self) -> Option<(&str, &str)> {
        let title = self.current.as_deref()?;
        let body = self.entries.get(title)?;
        Some((title, body))
    }

    /// Forget the current selection (after favoriting), keeping the body.
    pub fn clear_current(&mut self) {
        self.current = None;
    }

    pub fn get(&self, title: &str) -> Option<&str> {
        self.entries.get(title).map(String::as_str)
    }

    fn reset(&mut self) {
        self.entries.clear();
        self.current = None;
    }
}

/// Events emitted to the app loop and voice coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The transcript changed; re-render.
    TranscriptUpdated,
    /// A choice set is on offer.
    ChoicesOffered(Vec<String>),
    /// The session is disconnected; offer a manual reconnect.
    Disconnected,
    /// A finalized bot reply, for speech synthesis in voice mode.
    BotReply { text: String },
    /// The outstanding request ended without a reply to speak (timeout,
    /// server error, choice set, disconnect); the voice cycle can wind down.
    RequestSettled,
    /// Unrecoverable failure; tear the session down to the entry screen.
    FatalReset { message: String },
}

pub struct ChatEngine {
    transcript: Transcript,
    typing: TypingPresenter,
    phase: Phase,
    mode: Option<Mode>,
    connected: bool,
    voice_busy: bool,
    pending: Option<PendingRequest>,
    choices: Vec<String>,
    recipes: RecipeBook,
    request_timeout: Duration,
    outbound_tx: Sender<String>,
    event_tx: Sender<EngineEvent>,
}

impl ChatEngine {
    pub fn new(
        config: &ClientConfig,
        outbound_tx: Sender<String>,
        event_tx: Sender<EngineEvent>,
    ) -> Self {
        Self {
            transcript: Transcript::new(),
            typing: TypingPresenter::new(config.typing_interval),
            phase: Phase::ModeUnselected,
            mode: None,
            connected: false,
            voice_busy: false,
            pending: None,
            choices: Vec::new(),
            recipes: RecipeBook::default(),
            request_timeout: config.request_timeout,
            outbound_tx,
            event_tx,
        }
    }

    pub fn transcript(&self) -> Transcript {
        self.transcript.clone()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mode(&self) -> Option<Mode> {
        self.mode
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    pub fn recipes(&self) -> &RecipeBook {
        &self.recipes
    }

    pub fn recipes_mut(&mut self) -> &mut RecipeBook {
        &mut self.recipes
    }

    pub fn awaiting_response(&self) -> bool {
        self.pending.is_some()
    }

    /// Show starter prompts only before the first turn.
    pub fn show_starters(&self) -> bool {
        self.phase != Phase::ModeUnselected && self.transcript.is_empty()
    }

    /// Whether the voice pipeline currently excludes manual text entry.
    pub fn set_voice_busy(&mut self, busy: bool) {
        self.voice_busy = busy;
    }

    /// Pick the interaction mode; only valid once, from the entry state.
    pub fn select_mode(&mut self, mode: Mode) {
        if self.phase != Phase::ModeUnselected {
            return;
        }
        self.mode = Some(mode);
        self.phase = Phase::Idle;
        info!("mode selected: {:?}", mode);
    }

    pub fn on_opened(&mut self) {
        self.connected = true;
        info!("session connected");
    }

    /// Transport closed: clear the awaiting state, keep the transcript, and
    /// note the disconnection with one system turn.
    pub fn on_closed(&mut self) {
        let was_connected = self.connected;
        self.connected = false;
        let had_pending = self.pending.take().is_some();
        self.choices.clear();
        self.typing.snap(&self.transcript);
        if self.phase == Phase::AwaitingResponse || self.phase == Phase::AwaitingChoice {
            self.phase = Phase::Idle;
        }
        // Failed reconnect attempts close again; only note the first loss.
        if was_connected {
            self.append_system(DISCONNECTED_TEXT.to_string());
            self.emit(EngineEvent::Disconnected);
        }
        if had_pending {
            self.emit(EngineEvent::RequestSettled);
        }
    }

    /// Submit free text. No-op when empty, disconnected, mid-request,
    /// awaiting a choice, or while the voice pipeline is active.
    pub fn submit_text(&mut self, text: &str, now: Instant) -> bool {
        if self.voice_busy {
            debug!("rejecting text submission while voice pipeline is active");
            return false;
        }
        if text.trim().is_empty() || !self.connected || self.phase != Phase::Idle {
            return false;
        }

        self.choices.clear();
        self.transcript
            .append(Role::User, TurnBody::Plain(text.to_string()), None);
        self.start_request(now);
        if self.outbound_tx.send(text.to_string()).is_err() {
            warn!("outbound channel closed");
        }
        self.emit(EngineEvent::TranscriptUpdated);
        true
    }

    /// Submit the choice at `index`. The display label is appended as a user
    /// turn; the wire payload is the 1-based ordinal, which the server
    /// resolves against the choice set it last sent.
    pub fn submit_choice(&mut self, index: usize, now: Instant) -> bool {
        if self.phase != Phase::AwaitingChoice || !self.connected || index >= self.choices.len() {
            return false;
        }

        let label = self.choices[index].clone();
        self.transcript
            .append(Role::User, TurnBody::Plain(label), None);
        self.choices.clear();
        self.start_request(now);
        if self.outbound_tx.send((index + 1).to_string()).is_err() {
            warn!("outbound channel closed");
        }
        self.emit(EngineEvent::TranscriptUpdated);
        true
    }

    fn start_request(&mut self, now: Instant) {
        self.pending = Some(PendingRequest {
            id: Uuid::new_v4(),
            submitted_at: now,
            deadline: now + self.request_timeout,
        });
        self.phase = Phase::AwaitingResponse;
    }

    /// Drive the deadline and the typing reveal. Call on every scheduler tick.
    pub fn on_tick(&mut self, now: Instant) {
        if self.pending.as_ref().is_some_and(|p| now >= p.deadline) {
            if let Some(pending) = self.pending.take() {
                warn!(
                    "request {} timed out after {:?}",
                    pending.id,
                    now.saturating_duration_since(pending.submitted_at)
                );
                self.phase = Phase::Idle;
                self.typing.snap(&self.transcript);
                self.append_system(ChatterlyError::RequestTimeout.user_message());
                self.emit(EngineEvent::RequestSettled);
            }
        }

        if self.typing.tick(&self.transcript, now) {
            self.emit(EngineEvent::TranscriptUpdated);
        }
    }

    /// Decode and process one raw inbound frame.
    pub fn handle_raw(&mut self, raw: &str, now: Instant) {
        match protocol::decode(raw) {
            Ok(message) => self.handle_message(message, now),
            Err(e) => self.on_decode_error(e),
        }
    }

    /// Process one typed inbound message, strictly in arrival order.
    pub fn handle_message(&mut self, message: ServerMessage, now: Instant) {
        match message {
            ServerMessage::Error { message } => {
                self.finish_request();
                self.typing.snap(&self.transcript);
                self.append_system(message);
                self.emit(EngineEvent::RequestSettled);
            }
            ServerMessage::Reconnect { message } => {
                self.finish_request();
                self.typing.snap(&self.transcript);
                self.connected = false;
                self.append_system(message);
                self.emit(EngineEvent::Disconnected);
                self.emit(EngineEvent::RequestSettled);
            }
            ServerMessage::Suggestions { prompt, options } => {
                if self.is_stale_reply() {
                    debug!("dropping stale suggestions");
                    return;
                }
                self.pending = None;
                self.phase = Phase::AwaitingChoice;
                self.choices = options.clone();
                let prompt = prompt.unwrap_or_else(|| DEFAULT_CHOICE_PROMPT.to_string());
                self.transcript
                    .append(Role::Bot, TurnBody::Plain(prompt), None);
                self.emit(EngineEvent::ChoicesOffered(options));
                self.emit(EngineEvent::TranscriptUpdated);
                // Choices are read, not spoken.
                self.emit(EngineEvent::RequestSettled);
            }
            ServerMessage::Response {
                text,
                source_url,
                recipe,
            } => {
                if self.is_stale_reply() {
                    debug!("dropping stale response");
                    return;
                }
                self.pending = None;
                self.choices.clear();
                self.phase = Phase::Idle;
                if let Some(selection) = recipe {
                    self.recipes.upsert(selection);
                }
                let body = TurnBody::Rich(protocol::markup::parse_markup(&text));
                self.typing
                    .begin(&self.transcript, &text, body, source_url, now);
                self.emit(EngineEvent::TranscriptUpdated);
                self.emit(EngineEvent::BotReply { text });
            }
            ServerMessage::Video { items } => {
                // Media turns never touch the pending-request timer.
                self.transcript
                    .append(Role::Bot, TurnBody::VideoGrid(items), None);
                self.emit(EngineEvent::TranscriptUpdated);
            }
            ServerMessage::Web { results } => {
                self.transcript
                    .append(Role::Bot, TurnBody::WebResults(results), None);
                self.emit(EngineEvent::TranscriptUpdated);
            }
            ServerMessage::RecipeSelected(selection) => {
                self.recipes.upsert(selection);
            }
        }
    }

    /// A reply that would terminate a request is stale when neither a
    /// pending request nor an active choice set exists; it is dropped
    /// without touching the transcript.
    fn is_stale_reply(&self) -> bool {
        self.pending.is_none() && self.phase != Phase::AwaitingChoice
    }

    fn finish_request(&mut self) {
        self.pending = None;
        if self.phase == Phase::AwaitingResponse {
            self.phase = Phase::Idle;
        }
    }

    /// A malformed payload violates the protocol contract itself and forces
    /// a hard session reset, unlike an application-level `error` message.
    fn on_decode_error(&mut self, error: DecodeError) {
        warn!("decode error: {}", error);
        let message = ChatterlyError::from(error).user_message();
        self.append_system(message.clone());
        self.pending = None;
        self.choices.clear();
        self.typing.abort();
        self.phase = Phase::ModeUnselected;
        self.mode = None;
        self.voice_busy = false;
        self.emit(EngineEvent::FatalReset { message });
    }

    /// Route an error by its severity: fatal ones tear the session down,
    /// anything else becomes a visible system turn.
    pub fn report_error(&mut self, error: &ChatterlyError) {
        if error.severity() == Severity::Fatal {
            self.on_fatal(error);
        } else {
            self.append_system(error.user_message());
        }
    }

    /// Append a bot-authored notice outside the request cycle, e.g. a
    /// favourites confirmation.
    pub fn append_notice(&mut self, text: String) {
        self.transcript.append(Role::Bot, TurnBody::Plain(text), None);
        self.emit(EngineEvent::TranscriptUpdated);
    }

    /// Voice-pipeline failures share the decode-error severity: the session
    /// ends and the app returns to the entry screen.
    pub fn on_fatal(&mut self, error: &ChatterlyError) {
        let message = error.user_message();
        self.append_system(message.clone());
        self.pending = None;
        self.choices.clear();
        self.typing.abort();
        self.phase = Phase::ModeUnselected;
        self.mode = None;
        self.voice_busy = false;
        self.emit(EngineEvent::FatalReset { message });
    }

    /// Wipe everything back to a fresh entry state.
    pub fn reset(&mut self) {
        self.transcript.clear();
        self.typing.abort();
        self.connected = false;
        self.pending = None;
        self.choices.clear();
        self.recipes.reset();
        self.phase = Phase::ModeUnselected;
        self.mode = None;
        self.voice_busy = false;
    }

    fn append_system(&mut self, text: String) {
        self.transcript.append(Role::System, TurnBody::Plain(text), None);
        self.emit(EngineEvent::TranscriptUpdated);
    }

    fn emit(&self, event: EngineEvent) {
        let _ = self.event_tx.send(event);
    }
}
