//! Voice conversation pipeline
//!
//! Capture, transcription, and reply playback for voice mode. The pipeline
//! owns the recorder and runs the blocking speech calls on a worker thread so
//! the application loop stays responsive; outcomes come back as events.
//!
//! Voice mode serializes the whole exchange: while a clip is being
//! transcribed or a reply is being spoken, the pipeline reports busy and the
//! engine refuses new submissions until the cycle completes.

pub mod capture;
pub mod playback;
pub mod wav;

pub use capture::{AudioRecorder, NullRecorder};
pub use playback::{AudioPlayer, NullPlayer};

#[cfg(feature = "audio-io")]
pub use capture::CpalRecorder;
#[cfg(feature = "audio-io")]
pub use playback::RodioPlayer;

use crate::services::SpeechService;
use crate::{ChatterlyError, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::thread;
use tracing::{debug, error, info, warn};

/// One finalized capture, ready for WAV encoding.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioClip {
    pub fn duration_seconds(&self) -> f32 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / (self.sample_rate as f32 * self.channels as f32)
    }
}

/// Where the pipeline is in the capture/transcribe/speak cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Idle,
    Capturing,
    Transcribing,
    Speaking,
}

/// Work shipped to the speech worker thread.
enum VoiceJob {
    Transcribe(AudioClip),
    Speak(String),
    Shutdown,
}

/// Results coming back from the speech worker thread.
#[derive(Debug)]
pub enum VoiceEvent {
    Transcribed(String),
    TranscriptionFailed(String),
    PlaybackFinished,
    PlaybackFailed(String),
}

/// What the application should do with a completed pipeline step.
#[derive(Debug)]
pub enum VoiceOutcome {
    /// A transcription came back; submit it as the user's utterance.
    Submit(String),
    /// The step failed in a way that resets the session.
    Fatal(ChatterlyError),
    /// The cycle finished (or produced nothing); voice mode is ready again.
    Idle,
}

pub struct VoicePipeline {
    state: VoiceState,
    recorder: Box<dyn AudioRecorder>,
    job_tx: Sender<VoiceJob>,
    event_rx: Receiver<VoiceEvent>,
    worker: Option<thread::JoinHandle<()>>,
}

impl VoicePipeline {
    pub fn new(
        recorder: Box<dyn AudioRecorder>,
        speech: Box<dyn SpeechService>,
        player: Box<dyn AudioPlayer>,
    ) -> Self {
        let (job_tx, job_rx) = unbounded::<VoiceJob>();
        let (event_tx, event_rx) = unbounded::<VoiceEvent>();

        let worker = thread::spawn(move || {
            speech_worker(job_rx, event_tx, speech, player);
        });

        Self {
            state: VoiceState::Idle,
            recorder,
            job_tx,
            event_rx,
            worker: Some(worker),
        }
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    /// True while a submitted utterance is still being transcribed or spoken.
    pub fn is_busy(&self) -> bool {
        matches!(self.state, VoiceState::Transcribing | VoiceState::Speaking)
    }

    /// Channel the application loop selects on for worker results.
    pub fn events(&self) -> &Receiver<VoiceEvent> {
        &self.event_rx
    }

    /// Open the microphone. Returns false when the request was ignored
    /// because a cycle is already underway.
    pub fn start_capture(&mut self) -> Result<bool> {
        if self.state != VoiceState::Idle {
            warn!("capture requested in state {:?}", self.state);
            return Ok(false);
        }
        self.recorder.start()?;
        self.state = VoiceState::Capturing;
        info!("voice capture started");
        Ok(true)
    }

    /// Close the microphone and ship the clip for transcription. Returns
    /// false when no capture was open.
    pub fn stop_capture(&mut self) -> Result<bool> {
        if self.state != VoiceState::Capturing {
            warn!("stop requested in state {:?}", self.state);
            return Ok(false);
        }
        let clip = self.recorder.stop()?;
        debug!("captured {:.2}s of audio", clip.duration_seconds());
        self.state = VoiceState::Transcribing;
        self.job_tx
            .send(VoiceJob::Transcribe(clip))
            .map_err(|_| ChatterlyError::Channel("voice worker gone".to_string()))?;
        Ok(true)
    }

    /// Throw the capture away without transcribing it.
    pub fn cancel_capture(&mut self) {
        if self.state == VoiceState::Capturing {
            self.recorder.cancel();
            self.state = VoiceState::Idle;
            info!("voice capture cancelled");
        }
    }

    /// Wind the cycle down when a submitted utterance resolved without a
    /// reply to speak: timeout, server error, a choice set, disconnect.
    /// Without this the pipeline would wait for a playback event that will
    /// never come.
    pub fn finish_cycle(&mut self) {
        if self.state == VoiceState::Transcribing {
            self.state = VoiceState::Idle;
        }
    }

    /// Synthesize and play a bot reply; the pipeline stays busy until
    /// playback finishes.
    pub fn speak(&mut self, text: String) -> Result<()> {
        self.state = VoiceState::Speaking;
        self.job_tx
            .send(VoiceJob::Speak(text))
            .map_err(|_| ChatterlyError::Channel("voice worker gone".to_string()))
    }

    /// Fold a worker event into the pipeline state.
    pub fn on_event(&mut self, event: VoiceEvent) -> VoiceOutcome {
        match event {
            VoiceEvent::Transcribed(text) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    // Nothing intelligible; skip the exchange entirely.
                    info!("transcription came back empty");
                    self.state = VoiceState::Idle;
                    return VoiceOutcome::Idle;
                }
                // Still busy until the reply is spoken or the request
                // settles without one (see finish_cycle).
                self.state = VoiceState::Transcribing;
                VoiceOutcome::Submit(text)
            }
            VoiceEvent::TranscriptionFailed(msg) => {
                error!("transcription failed: {}", msg);
                self.state = VoiceState::Idle;
                VoiceOutcome::Fatal(ChatterlyError::Transcription(msg))
            }
            VoiceEvent::PlaybackFinished => {
                self.state = VoiceState::Idle;
                VoiceOutcome::Idle
            }
            VoiceEvent::PlaybackFailed(msg) => {
                error!("playback failed: {}", msg);
                self.state = VoiceState::Idle;
                VoiceOutcome::Fatal(ChatterlyError::Playback(msg))
            }
        }
    }

    pub fn shutdown(&mut self) {
        self.cancel_capture();
        let _ = self.job_tx.send(VoiceJob::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for VoicePipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn speech_worker(
    job_rx: Receiver<VoiceJob>,
    event_tx: Sender<VoiceEvent>,
    speech: Box<dyn SpeechService>,
    player: Box<dyn AudioPlayer>,
) {
    info!("speech worker started");
    while let Ok(job) = job_rx.recv() {
        match job {
            VoiceJob::Transcribe(clip) => {
                let event = wav::encode_wav(&clip.samples, clip.sample_rate, clip.channels)
                    .and_then(|wav| speech.transcribe(&wav))
                    .map(VoiceEvent::Transcribed)
                    .unwrap_or_else(|e| VoiceEvent::TranscriptionFailed(e.to_string()));
                if event_tx.send(event).is_err() {
                    break;
                }
            }
            VoiceJob::Speak(text) => {
                let event = speech
                    .synthesize(&text)
                    .and_then(|audio| player.play(&audio))
                    .map(|_| VoiceEvent::PlaybackFinished)
                    .unwrap_or_else(|e| VoiceEvent::PlaybackFailed(e.to_string()));
                if event_tx.send(event).is_err() {
                    break;
                }
            }
            VoiceJob::Shutdown => break,
        }
    }
    info!("speech worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::time::Duration;

    struct StubRecorder {
        capturing: bool,
    }

    impl AudioRecorder for StubRecorder {
        fn start(&mut self) -> Result<()> {
            self.capturing = true;
            Ok(())
        }

        fn stop(&mut self) -> Result<AudioClip> {
            self.capturing = false;
            Ok(AudioClip {
                samples: vec![0.0; 1600],
                sample_rate: 16000,
                channels: 1,
            })
        }

        fn cancel(&mut self) {
            self.capturing = false;
        }
    }

    struct StubSpeech {
        transcription: Result<String>,
        spoken: Arc<Mutex<Vec<String>>>,
    }

    impl SpeechService for StubSpeech {
        fn transcribe(&self, _wav: &[u8]) -> Result<String> {
            match &self.transcription {
                Ok(text) => Ok(text.clone()),
                Err(e) => Err(ChatterlyError::Transcription(e.to_string())),
            }
        }

        fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
            self.spoken.lock().push(text.to_string());
            Ok(vec![1, 2, 3])
        }
    }

    struct StubPlayer {
        fail: bool,
    }

    impl AudioPlayer for StubPlayer {
        fn play(&self, _audio: &[u8]) -> Result<()> {
            if self.fail {
                Err(ChatterlyError::Playback("device gone".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn pipeline(transcription: Result<String>, playback_fails: bool) -> VoicePipeline {
        VoicePipeline::new(
            Box::new(StubRecorder { capturing: false }),
            Box::new(StubSpeech {
                transcription,
                spoken: Arc::new(Mutex::new(Vec::new())),
            }),
            Box::new(StubPlayer {
                fail: playback_fails,
            }),
        )
    }

    fn next_event(pipeline: &VoicePipeline) -> VoiceEvent {
        pipeline
            .events()
            .recv_timeout(Duration::from_secs(2))
            .expect("worker event")
    }

    #[test]
    fn test_capture_cycle_submits_transcription() {
        let mut voice = pipeline(Ok("أريد وصفة كشري".to_string()), false);
        assert!(voice.start_capture().unwrap());
        assert_eq!(voice.state(), VoiceState::Capturing);
        assert!(voice.stop_capture().unwrap());
        assert!(voice.is_busy());

        let event = next_event(&voice);
        match voice.on_event(event) {
            VoiceOutcome::Submit(text) => assert_eq!(text, "أريد وصفة كشري"),
            other => panic!("unexpected outcome: {:?}", other),
        }
        // Still busy until the reply has been spoken.
        assert!(voice.is_busy());
    }

    #[test]
    fn test_empty_transcription_returns_to_idle() {
        let mut voice = pipeline(Ok("   ".to_string()), false);
        voice.start_capture().unwrap();
        voice.stop_capture().unwrap();

        let event = next_event(&voice);
        assert!(matches!(voice.on_event(event), VoiceOutcome::Idle));
        assert_eq!(voice.state(), VoiceState::Idle);
    }

    #[test]
    fn test_transcription_failure_is_fatal() {
        let mut voice = pipeline(
            Err(ChatterlyError::Transcription("service down".to_string())),
            false,
        );
        voice.start_capture().unwrap();
        voice.stop_capture().unwrap();

        let event = next_event(&voice);
        match voice.on_event(event) {
            VoiceOutcome::Fatal(ChatterlyError::Transcription(_)) => {}
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(voice.state(), VoiceState::Idle);
    }

    #[test]
    fn test_speak_cycle_finishes_idle() {
        let mut voice = pipeline(Ok(String::new()), false);
        voice.speak("تفضل الوصفة".to_string()).unwrap();
        assert_eq!(voice.state(), VoiceState::Speaking);

        let event = next_event(&voice);
        assert!(matches!(voice.on_event(event), VoiceOutcome::Idle));
        assert_eq!(voice.state(), VoiceState::Idle);
    }

    #[test]
    fn test_playback_failure_is_fatal() {
        let mut voice = pipeline(Ok(String::new()), true);
        voice.speak("تفضل الوصفة".to_string()).unwrap();

        let event = next_event(&voice);
        match voice.on_event(event) {
            VoiceOutcome::Fatal(ChatterlyError::Playback(_)) => {}
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_cancel_discards_capture() {
        let mut voice = pipeline(Ok("anything".to_string()), false);
        voice.start_capture().unwrap();
        voice.cancel_capture();
        assert_eq!(voice.state(), VoiceState::Idle);
        assert!(voice
            .events()
            .recv_timeout(Duration::from_millis(50))
            .is_err());
    }

    #[test]
    fn test_stop_outside_capture_is_ignored() {
        let mut voice = pipeline(Ok("anything".to_string()), false);
        assert!(!voice.stop_capture().unwrap());
        assert_eq!(voice.state(), VoiceState::Idle);
    }

    #[test]
    fn test_ignored_start_is_distinguishable_from_started() {
        let mut voice = pipeline(Ok("anything".to_string()), false);
        assert!(voice.start_capture().unwrap());
        // Second start while a cycle is underway reports it did nothing.
        assert!(!voice.start_capture().unwrap());
    }

    #[test]
    fn test_finish_cycle_unblocks_capture_after_unspoken_reply() {
        let mut voice = pipeline(Ok("عايز وصفة".to_string()), false);
        voice.start_capture().unwrap();
        voice.stop_capture().unwrap();

        let event = next_event(&voice);
        assert!(matches!(voice.on_event(event), VoiceOutcome::Submit(_)));
        assert_eq!(voice.state(), VoiceState::Transcribing);
        // Without winding down, a new capture is refused.
        assert!(!voice.start_capture().unwrap());

        // The request settled without a reply to speak.
        voice.finish_cycle();
        assert_eq!(voice.state(), VoiceState::Idle);
        assert!(voice.start_capture().unwrap());
    }

    #[test]
    fn test_finish_cycle_leaves_capture_and_playback_alone() {
        let mut voice = pipeline(Ok("anything".to_string()), false);
        voice.start_capture().unwrap();
        voice.finish_cycle();
        assert_eq!(voice.state(), VoiceState::Capturing);

        voice.cancel_capture();
        voice.speak("تفضل".to_string()).unwrap();
        voice.finish_cycle();
        assert_eq!(voice.state(), VoiceState::Speaking);
        let event = next_event(&voice);
        voice.on_event(event);
    }

    #[test]
    fn test_voice_submission_recovers_after_request_timeout() {
        use crate::config::ClientConfig;
        use crate::engine::{ChatEngine, EngineEvent};
        use crate::protocol::Mode;
        use std::time::Instant;

        let config = ClientConfig::default();
        let (outbound_tx, _outbound_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        let mut engine = ChatEngine::new(&config, outbound_tx, event_tx);
        engine.select_mode(Mode::Voice);
        engine.on_opened();

        let mut voice = pipeline(Ok("عايز وصفة كشري".to_string()), false);
        let mut now = Instant::now();

        assert!(voice.start_capture().unwrap());
        assert!(voice.stop_capture().unwrap());
        engine.set_voice_busy(true);

        let event = next_event(&voice);
        match voice.on_event(event) {
            VoiceOutcome::Submit(text) => {
                engine.set_voice_busy(false);
                assert!(engine.submit_text(&text, now));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(voice.is_busy());

        // The request times out; no reply will ever be spoken.
        now += Duration::from_secs(61);
        engine.on_tick(now);
        assert!(event_rx.try_iter().any(|e| e == EngineEvent::RequestSettled));

        voice.finish_cycle();
        assert!(!voice.is_busy());
        assert!(voice.start_capture().unwrap());
    }
}
