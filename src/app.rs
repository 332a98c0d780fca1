//! Application loop
//!
//! Wires the connection, the conversation engine and the voice pipeline
//! together on a single thread. Everything arrives as a channel message and
//! is folded into the engine in order; a 10ms tick drives the request
//! deadline and the typing reveal.

use crate::auth::IntegrationAuth;
use crate::config::ClientConfig;
use crate::connection::{self, ConnectionEvent, ConnectionHandle, SessionConfig};
use crate::engine::{ChatEngine, EngineEvent, Phase, STARTER_PROMPTS};
use crate::protocol::Mode;
use crate::services::{ApiClient, FavouriteStatus, HttpSpeechService};
use crate::transcript::Role;
use crate::voice::{AudioPlayer, AudioRecorder, NullPlayer, NullRecorder, VoiceOutcome, VoicePipeline};
use crate::Result;
use crossbeam_channel::{select, tick, unbounded, Receiver, Sender};
use std::io::Write;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const FAVOURITE_ADDED_TEXT: &str = "✅ تمت إضافة الوصفة إلى المفضلة!";
const FAVOURITE_EXISTS_TEXT: &str = "🔔 هذه الوصفة موجودة بالفعل في المفضلة.";

/// Actions arriving from the terminal front-end.
#[derive(Debug, Clone)]
pub enum UiCommand {
    /// Pick the interaction mode and open a session, from the entry state.
    SelectMode(Mode),
    SendText(String),
    /// Zero-based index into the offered choice set.
    Choose(usize),
    StartVoice,
    StopVoice,
    CancelVoice,
    /// Save the currently selected recipe.
    AddFavourite,
    Reconnect,
    Quit,
}

pub struct App {
    config: ClientConfig,
    identity: String,
    mode: Mode,
    auth: IntegrationAuth,
    engine: ChatEngine,
    conn: Option<ConnectionHandle>,
    conn_events_tx: Sender<ConnectionEvent>,
    conn_events_rx: Receiver<ConnectionEvent>,
    voice: VoicePipeline,
    api: ApiClient,
    outbound_rx: Receiver<String>,
    engine_events_rx: Receiver<EngineEvent>,
    ui_tx: Sender<UiCommand>,
    ui_rx: Receiver<UiCommand>,
    // Render cursor over the transcript: fully printed turns, plus how much
    // of the turn under the cursor has been printed so far.
    rendered: usize,
    partial: usize,
    current_started: bool,
}

impl App {
    pub fn new(config: ClientConfig, identity: String, mode: Mode) -> Self {
        let (outbound_tx, outbound_rx) = unbounded();
        let (engine_events_tx, engine_events_rx) = unbounded();
        let (conn_events_tx, conn_events_rx) = unbounded();
        let (ui_tx, ui_rx) = unbounded();

        let engine = ChatEngine::new(&config, outbound_tx, engine_events_tx);
        let voice = VoicePipeline::new(
            make_recorder(config.enable_audio_io),
            Box::new(HttpSpeechService::new(config.api_base_url.clone())),
            make_player(config.enable_audio_io),
        );
        let api = ApiClient::new(config.api_base_url.clone());

        Self {
            config,
            identity,
            mode,
            auth: IntegrationAuth::new(),
            engine,
            conn: None,
            conn_events_tx,
            conn_events_rx,
            voice,
            api,
            outbound_rx,
            engine_events_rx,
            ui_tx,
            ui_rx,
            rendered: 0,
            partial: 0,
            current_started: false,
        }
    }

    /// Sender for the terminal front-end thread.
    pub fn ui_handle(&self) -> Sender<UiCommand> {
        self.ui_tx.clone()
    }

    pub fn auth(&self) -> &IntegrationAuth {
        &self.auth
    }

    /// Select the mode, open the session and run until quit or fatal error.
    pub fn run(mut self) -> Result<()> {
        self.engine.select_mode(self.mode);
        self.connect()?;
        self.print_starters();

        let ticker = tick(Duration::from_millis(10));
        // Receivers are cloned out of self so the arm bodies can borrow
        // self mutably.
        let conn_events = self.conn_events_rx.clone();
        let voice_events = self.voice.events().clone();
        let outbound = self.outbound_rx.clone();
        let engine_events = self.engine_events_rx.clone();
        let ui = self.ui_rx.clone();

        loop {
            select! {
                recv(conn_events) -> event => {
                    if let Ok(event) = event {
                        self.on_connection_event(event);
                    }
                }
                recv(voice_events) -> event => {
                    if let Ok(event) = event {
                        let outcome = self.voice.on_event(event);
                        self.on_voice_outcome(outcome);
                    }
                }
                recv(outbound) -> text => {
                    if let (Ok(text), Some(conn)) = (text, self.conn.as_ref()) {
                        conn.send_text(text);
                    }
                }
                recv(engine_events) -> event => {
                    if let Ok(event) = event {
                        self.on_engine_event(event);
                    }
                }
                recv(ui) -> command => {
                    match command {
                        Ok(UiCommand::Quit) | Err(_) => break,
                        Ok(command) => self.on_ui_command(command),
                    }
                }
                recv(ticker) -> _ => {
                    self.engine.on_tick(Instant::now());
                }
            }
        }

        self.teardown();
        Ok(())
    }

    fn connect(&mut self) -> Result<()> {
        let handle = connection::open(
            SessionConfig {
                server_url: self.config.server_url.clone(),
                identity: self.identity.clone(),
                mode: self.mode,
                reconnect_delay: self.config.reconnect_delay,
            },
            &self.auth,
            self.conn_events_tx.clone(),
        )?;
        self.conn = Some(handle);
        Ok(())
    }

    fn on_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Opened => self.engine.on_opened(),
            ConnectionEvent::Closed => self.engine.on_closed(),
            ConnectionEvent::Message(raw) => self.engine.handle_raw(&raw, Instant::now()),
        }
    }

    fn on_voice_outcome(&mut self, outcome: VoiceOutcome) {
        match outcome {
            VoiceOutcome::Submit(text) => {
                self.engine.set_voice_busy(false);
                if !self.engine.submit_text(&text, Instant::now()) {
                    warn!("transcribed utterance was not accepted");
                    self.voice.finish_cycle();
                }
            }
            VoiceOutcome::Fatal(error) => {
                self.engine.on_fatal(&error);
            }
            VoiceOutcome::Idle => {
                self.engine.set_voice_busy(false);
            }
        }
    }

    fn on_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::TranscriptUpdated => self.render(),
            EngineEvent::ChoicesOffered(options) => {
                self.render();
                for (i, option) in options.iter().enumerate() {
                    println!("  {}. {}", i + 1, option);
                }
                println!("(/choice N to pick)");
            }
            EngineEvent::Disconnected => {
                println!("(/reconnect to retry)");
            }
            EngineEvent::RequestSettled => {
                self.voice.finish_cycle();
            }
            EngineEvent::BotReply { text } => {
                if self.mode == Mode::Voice && self.config.enable_audio_io {
                    self.engine.set_voice_busy(true);
                    if let Err(e) = self.voice.speak(text) {
                        self.engine.on_fatal(&e);
                    }
                }
            }
            EngineEvent::FatalReset { message } => {
                self.render();
                info!("session ended: {}", message);
                self.teardown_session();
                println!("\n(/mode text|voice to start again)");
            }
        }
    }

    fn on_ui_command(&mut self, command: UiCommand) {
        let now = Instant::now();
        match command {
            UiCommand::SelectMode(mode) => self.select_mode(mode),
            UiCommand::SendText(text) => {
                self.engine.submit_text(&text, now);
            }
            UiCommand::Choose(index) => {
                self.engine.submit_choice(index, now);
            }
            UiCommand::StartVoice => match self.voice.start_capture() {
                Ok(true) => self.engine.set_voice_busy(true),
                Ok(false) => {}
                Err(e) => self.engine.report_error(&e),
            },
            UiCommand::StopVoice => match self.voice.stop_capture() {
                Ok(_) => {}
                Err(e) => self.engine.report_error(&e),
            },
            UiCommand::CancelVoice => {
                self.voice.cancel_capture();
                self.engine.set_voice_busy(false);
            }
            UiCommand::AddFavourite => self.add_favourite(),
            UiCommand::Reconnect => {
                if self.conn.is_none() || !self.engine.is_connected() {
                    if let Some(conn) = self.conn.take() {
                        conn.shutdown();
                    }
                    match self.connect() {
                        Ok(()) => info!("manual reconnect requested"),
                        Err(e) => self.engine.report_error(&e),
                    }
                }
            }
            UiCommand::Quit => {}
        }
    }

    fn add_favourite(&mut self) {
        let Some((title, body)) = self
            .engine
            .recipes()
            .current()
            .map(|(t, b)| (t.to_string(), b.to_string()))
        else {
            println!("(no recipe selected)");
            return;
        };

        match self.api.add_favourite(&self.identity, &title, &body) {
            Ok(FavouriteStatus::Added) => {
                self.engine.append_notice(FAVOURITE_ADDED_TEXT.to_string());
                self.engine.recipes_mut().clear_current();
            }
            Ok(FavouriteStatus::AlreadyExists) => {
                self.engine.append_notice(FAVOURITE_EXISTS_TEXT.to_string());
                self.engine.recipes_mut().clear_current();
            }
            Err(e) => self.engine.report_error(&e),
        }
    }

    /// Pick a mode from the entry state and open a fresh session.
    fn select_mode(&mut self, mode: Mode) {
        if self.engine.phase() != Phase::ModeUnselected {
            return;
        }
        self.mode = mode;
        self.engine.select_mode(mode);
        match self.connect() {
            Ok(()) => self.print_starters(),
            Err(e) => self.engine.report_error(&e),
        }
    }

    /// Back to the entry state: session closed, transcript wiped, voice
    /// worker kept alive for the next session.
    fn teardown_session(&mut self) {
        self.voice.cancel_capture();
        self.voice.finish_cycle();
        if let Some(conn) = self.conn.take() {
            conn.shutdown();
        }
        self.engine.reset();
        self.rendered = 0;
        self.partial = 0;
        self.current_started = false;
    }

    fn teardown(&mut self) {
        self.teardown_session();
        self.voice.shutdown();
    }

    fn print_starters(&self) {
        if !self.engine.show_starters() {
            return;
        }
        println!("جرب تقول:");
        for prompt in STARTER_PROMPTS {
            println!("  {}", prompt);
        }
    }

    /// Print transcript turns incrementally. The turn under the cursor may
    /// still be revealing, so only its delta is printed and the cursor stays
    /// put until a later turn pushes past it.
    fn render(&mut self) {
        let turns = self.engine.transcript().get_all();
        while self.rendered < turns.len() {
            let turn = &turns[self.rendered];
            let text = turn.body.display_text();

            if !self.current_started {
                print!("{}", role_prefix(turn.role));
                self.current_started = true;
            }
            let delta: String = text.chars().skip(self.partial).collect();
            print!("{}", delta);
            self.partial = text.chars().count();

            if self.rendered + 1 == turns.len() {
                break;
            }
            println!();
            self.rendered += 1;
            self.partial = 0;
            self.current_started = false;
        }
        let _ = std::io::stdout().flush();
    }
}

fn role_prefix(role: Role) -> &'static str {
    match role {
        Role::User => "\n[you] ",
        Role::Bot => "\n[bot] ",
        Role::System => "\n[!] ",
    }
}

#[cfg(feature = "audio-io")]
fn make_recorder(enable: bool) -> Box<dyn AudioRecorder> {
    if enable {
        match crate::voice::CpalRecorder::new() {
            Ok(recorder) => return Box::new(recorder),
            Err(e) => warn!("falling back to null recorder: {}", e),
        }
    }
    Box::new(NullRecorder)
}

#[cfg(not(feature = "audio-io"))]
fn make_recorder(_enable: bool) -> Box<dyn AudioRecorder> {
    Box::new(NullRecorder)
}

#[cfg(feature = "audio-io")]
fn make_player(enable: bool) -> Box<dyn AudioPlayer> {
    if enable {
        Box::new(crate::voice::RodioPlayer)
    } else {
        Box::new(NullPlayer)
    }
}

#[cfg(not(feature = "audio-io"))]
fn make_player(_enable: bool) -> Box<dyn AudioPlayer> {
    Box::new(NullPlayer)
}
