use crate::analyzer::Analyzer;
use crate::audio_player::Transport;
use crate::clock::Clock;
use crate::config::AudioConfig;
use crate::error::EngineError;
use crate::file_reader::{self, DecodedAudio};
use crossbeam::channel::{Receiver, Sender, TryRecvError, bounded, unbounded};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Load(PathBuf),
    TogglePlay,
    Seek(f64),
    Reset,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AudioPlaybackState {
    pub is_ready: bool,
    pub is_playing: bool,
    // Sticky until reset, seek, load or the next play.
    pub is_finished: bool,
    pub duration: f64,
    pub current_time: f64,
    pub progress: f32,
    pub intensity: f32,
}

// The running part of a playback session. Dropping it is the cancellation:
// a tick without a session never touches the state.
#[derive(Debug, Clone, Copy)]
struct Session {
    // Clock reading at which offset 0 of the track would have started
    started_at: Duration,
    resumed_from: f64,
}

type LoadResult = Result<DecodedAudio, EngineError>;

pub struct AudioEngine<C: Clock> {
    clock: C,
    transport: Box<dyn Transport>,
    analyzer: Analyzer,
    end_tolerance: f64,
    audio: Option<DecodedAudio>,
    state: AudioPlaybackState,
    session: Option<Session>,
    paused_at: f64,
    pending_load: Option<Receiver<LoadResult>>,
    last_error: Option<String>,
    command_tx: Sender<PlayerCommand>,
    command_rx: Receiver<PlayerCommand>,
}

impl<C: Clock> AudioEngine<C> {
    pub fn new(config: &AudioConfig, clock: C, transport: Box<dyn Transport>) -> Self {
        let (command_tx, command_rx) = unbounded();
        info!("audio engine using {} transport", transport.name());
        Self {
            clock,
            transport,
            analyzer: Analyzer::new(config),
            end_tolerance: config.end_tolerance_secs,
            audio: None,
            state: AudioPlaybackState::default(),
            session: None,
            paused_at: 0.0,
            pending_load: None,
            last_error: None,
            command_tx,
            command_rx,
        }
    }

    pub fn state(&self) -> AudioPlaybackState {
        self.state
    }

    pub fn commands(&self) -> Sender<PlayerCommand> {
        self.command_tx.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.pending_load.is_some()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    // The engine is not ready until a later tick installs the result.
    pub fn load(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        info!("loading {}", path.display());
        self.begin_load();
        let (tx, rx) = bounded::<LoadResult>(1);
        thread::spawn(move || {
            let result = file_reader::decode_file(&path);
            // The receiver is gone if another load superseded this one.
            let _ = tx.send(result);
        });
        self.pending_load = Some(rx);
    }

    pub fn wait_for_load(&mut self, timeout: Duration) -> bool {
        let Some(rx) = self.pending_load.take() else {
            return false;
        };
        match rx.recv_timeout(timeout) {
            Ok(result) => {
                self.finish_load(result);
                true
            }
            Err(_) => {
                self.pending_load = Some(rx);
                false
            }
        }
    }

    pub fn load_decoded(&mut self, audio: DecodedAudio) {
        self.begin_load();
        self.finish_load(Ok(audio));
    }

    fn begin_load(&mut self) {
        self.stop_session();
        self.pending_load = None;
        self.audio = None;
        self.paused_at = 0.0;
        self.last_error = None;
        self.state = AudioPlaybackState::default();
    }

    fn finish_load(&mut self, result: LoadResult) {
        match result {
            Ok(audio) => {
                info!(
                    "decoded {:.2}s at {} Hz, {} channel(s)",
                    audio.duration(),
                    audio.sample_rate(),
                    audio.channels()
                );
                self.state = AudioPlaybackState {
                    is_ready: true,
                    duration: audio.duration(),
                    ..AudioPlaybackState::default()
                };
                self.audio = Some(audio);
            }
            Err(err) => {
                warn!("failed to decode audio: {err}");
                self.last_error = Some(format!("failed to decode audio: {err}"));
                self.state.is_ready = false;
            }
        }
    }

    pub fn play(&mut self) {
        if self.session.is_some() {
            return;
        }
        let Some(audio) = &self.audio else {
            return;
        };
        let offset = self.paused_at;
        if let Err(err) = self.transport.start(audio, offset) {
            warn!("could not start playback: {err}");
            self.last_error = Some(err.to_string());
            return;
        }
        self.last_error = None;
        self.analyzer.clear();
        self.session = Some(Session {
            started_at: self.clock.now(),
            resumed_from: offset,
        });
        self.state.is_playing = true;
        self.state.is_finished = false;
        info!("play from {offset:.2}s");
    }

    pub fn pause(&mut self) {
        let Some(session) = self.session else {
            return;
        };
        self.paused_at = self.elapsed(session).min(self.state.duration);
        self.stop_session();
        self.state.is_playing = false;
        self.state.intensity = 0.0;
        self.state.current_time = self.paused_at;
        if self.state.duration > 0.0 {
            self.state.progress = (self.paused_at / self.state.duration).clamp(0.0, 1.0) as f32;
        }
        info!("paused at {:.2}s", self.paused_at);
    }

    pub fn toggle_play(&mut self) {
        if self.state.is_playing {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn seek(&mut self, progress: f64) {
        let Some(audio) = &self.audio else {
            return;
        };
        if !progress.is_finite() {
            return;
        }
        let progress = progress.clamp(0.0, 1.0);
        let was_playing = self.state.is_playing;
        let duration = audio.duration();
        self.stop_session();

        self.paused_at = progress * duration;
        self.state.progress = progress as f32;
        self.state.current_time = self.paused_at;
        self.state.is_finished = false;
        self.state.is_playing = false;
        self.state.intensity = 0.0;
        info!("seek to {:.2}s", self.paused_at);

        if was_playing {
            self.play();
        }
    }

    pub fn reset(&mut self) {
        self.stop_session();
        self.paused_at = 0.0;
        self.state.is_playing = false;
        self.state.progress = 0.0;
        self.state.intensity = 0.0;
        self.state.current_time = 0.0;
        self.state.is_finished = false;
        info!("reset");
    }

    pub fn apply(&mut self, command: PlayerCommand) {
        match command {
            PlayerCommand::Load(path) => self.load(path),
            PlayerCommand::TogglePlay => self.toggle_play(),
            PlayerCommand::Seek(progress) => self.seek(progress),
            PlayerCommand::Reset => self.reset(),
        }
    }

    pub fn tick(&mut self) -> AudioPlaybackState {
        self.drain_commands();
        self.poll_load();

        let (Some(session), Some(audio)) = (self.session, &self.audio) else {
            return self.state;
        };

        let elapsed = self.elapsed(session);
        let duration = audio.duration();
        if elapsed >= duration - self.end_tolerance {
            self.finish_track();
            return self.state;
        }

        let intensity = self.analyzer.analyze(audio, elapsed);
        self.state.intensity = intensity.clamp(0.0, 1.0);
        self.state.current_time = elapsed;
        self.state.progress = (elapsed / duration).clamp(0.0, 1.0) as f32;
        self.state
    }

    fn drain_commands(&mut self) {
        loop {
            match self.command_rx.try_recv() {
                Ok(command) => self.apply(command),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn poll_load(&mut self) {
        let Some(rx) = &self.pending_load else {
            return;
        };
        match rx.try_recv() {
            Ok(result) => {
                self.pending_load = None;
                self.finish_load(result);
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                self.pending_load = None;
                self.finish_load(Err(EngineError::Io(std::io::Error::other(
                    "decoder thread exited without a result",
                ))));
            }
        }
    }

    fn finish_track(&mut self) {
        self.stop_session();
        self.paused_at = 0.0;
        self.state.is_playing = false;
        self.state.progress = 1.0;
        self.state.current_time = self.state.duration;
        self.state.is_finished = true;
        self.state.intensity = 0.0;
        info!("reached the end of the track");
    }

    fn stop_session(&mut self) {
        if self.session.take().is_some() {
            debug!("analysis loop stopped");
        }
        self.transport.stop();
    }

    fn elapsed(&self, session: Session) -> f64 {
        let running = self.clock.now().saturating_sub(session.started_at);
        session.resumed_from + running.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_player::NullTransport;
    use crate::clock::ManualClock;

    fn engine_with_track(seconds: usize) -> (AudioEngine<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let mut engine = AudioEngine::new(
            &AudioConfig::default(),
            clock.clone(),
            Box::new(NullTransport::new()),
        );
        let audio = DecodedAudio::from_samples(vec![0.0; 1000 * seconds], 1000, 1).unwrap();
        engine.load_decoded(audio);
        (engine, clock)
    }

    #[test]
    fn operations_without_a_buffer_are_noops() {
        let mut engine = AudioEngine::new(
            &AudioConfig::default(),
            ManualClock::new(),
            Box::new(NullTransport::new()),
        );
        engine.play();
        engine.seek(0.5);
        engine.toggle_play();
        let state = engine.tick();
        assert_eq!(state, AudioPlaybackState::default());
    }

    #[test]
    fn pause_records_the_resume_point() {
        let (mut engine, clock) = engine_with_track(10);
        engine.play();
        clock.advance(Duration::from_millis(3000));
        engine.tick();
        engine.pause();
        let paused = engine.state();
        assert!(!paused.is_playing);
        assert_eq!(paused.intensity, 0.0);

        clock.advance(Duration::from_secs(60));
        assert_eq!(engine.tick(), paused);

        engine.play();
        clock.advance(Duration::from_millis(1000));
        let state = engine.tick();
        assert!((state.current_time - 4.0).abs() < 1e-9);
        assert!((state.progress - 0.4).abs() < 1e-6);
    }

    #[test]
    fn queued_commands_apply_on_next_tick() {
        let (mut engine, _clock) = engine_with_track(10);
        let tx = engine.commands();
        tx.send(PlayerCommand::TogglePlay).unwrap();
        assert!(!engine.state().is_playing);
        assert!(engine.tick().is_playing);
        tx.send(PlayerCommand::Seek(0.25)).unwrap();
        tx.send(PlayerCommand::Reset).unwrap();
        let state = engine.tick();
        assert!(!state.is_playing);
        assert_eq!(state.progress, 0.0);
    }

    #[test]
    fn play_after_finish_restarts_from_the_top() {
        let (mut engine, clock) = engine_with_track(2);
        engine.play();
        clock.advance(Duration::from_secs(2));
        assert!(engine.tick().is_finished);
        engine.play();
        clock.advance(Duration::from_millis(500));
        let state = engine.tick();
        assert!(!state.is_finished);
        assert!((state.current_time - 0.5).abs() < 1e-9);
    }

    #[test]
    fn pause_refreshes_position_and_progress() {
        let (mut engine, clock) = engine_with_track(10);
        engine.play();
        clock.advance(Duration::from_millis(3000));
        engine.tick();
        clock.advance(Duration::from_millis(500));
        engine.pause();
        let state = engine.state();
        assert!((state.current_time - 3.5).abs() < 1e-9);
        assert!((state.progress - 0.35).abs() < 1e-6);
    }

    #[test]
    fn non_finite_seek_is_ignored() {
        let (mut engine, _clock) = engine_with_track(10);
        engine.seek(0.3);
        let before = engine.state();
        engine.seek(f64::NAN);
        engine.seek(f64::INFINITY);
        assert_eq!(engine.state(), before);
        assert!((before.progress - 0.3).abs() < 1e-6);
    }
}
