use std::cell::Cell;
use std::io::Cursor;
use std::rc::Rc;
use std::time::Duration;
use summit::audio_player::{NullTransport, Transport};
use summit::clock::{Clock, ManualClock};
use summit::config::{AudioConfig, VisualConfig};
use summit::engine::{AudioEngine, AudioPlaybackState};
use summit::error::EngineError;
use summit::file_reader::{self, DecodedAudio};
use summit::visual::VisualStateMachine;

fn engine() -> (AudioEngine<ManualClock>, ManualClock) {
    let clock = ManualClock::new();
    let engine = AudioEngine::new(
        &AudioConfig::default(),
        clock.clone(),
        Box::new(NullTransport::new()),
    );
    (engine, clock)
}

/// A silent mono track of `seconds` at 8 kHz.
fn silent_track(seconds: usize) -> DecodedAudio {
    DecodedAudio::from_samples(vec![0.0; 8_000 * seconds], 8_000, 1).unwrap()
}

/// 16-bit PCM WAV bytes holding a 440 Hz tone.
fn wav_bytes(seconds: f32, sample_rate: u32, channels: u16) -> Vec<u8> {
    let mut bytes = Vec::new();
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec).unwrap();
        let frames = (seconds * sample_rate as f32) as usize;
        for i in 0..frames {
            let t = i as f32 / sample_rate as f32;
            let s = ((t * 440.0 * std::f32::consts::TAU).sin() * 12_000.0) as i16;
            for _ in 0..channels {
                writer.write_sample(s).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    bytes
}

/// Output that refuses to start while `broken` is set.
struct FlakyOutput {
    broken: Rc<Cell<bool>>,
    active: bool,
}

impl Transport for FlakyOutput {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn start(&mut self, _audio: &DecodedAudio, _offset_secs: f64) -> summit::error::Result<()> {
        if self.broken.get() {
            return Err(EngineError::Output("device unplugged".into()));
        }
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

fn assert_in_range(state: &AudioPlaybackState) {
    assert!((0.0..=1.0).contains(&state.intensity), "intensity {}", state.intensity);
    assert!((0.0..=1.0).contains(&state.progress), "progress {}", state.progress);
}

// ── Decoding ───────────────────────────────────────────────────────────────

#[test]
fn decodes_wav_from_memory() {
    let audio = file_reader::decode_bytes(wav_bytes(1.0, 8_000, 2)).unwrap();
    assert_eq!(audio.sample_rate(), 8_000);
    assert_eq!(audio.channels(), 2);
    assert!((audio.duration() - 1.0).abs() < 1e-3, "duration {}", audio.duration());
}

#[test]
fn load_from_disk_completes_on_a_later_tick() {
    let path = std::env::temp_dir().join(format!("summit-engine-suite-{}.wav", std::process::id()));
    std::fs::write(&path, wav_bytes(0.5, 8_000, 1)).unwrap();

    let (mut engine, _clock) = engine();
    engine.load(&path);
    assert!(engine.is_loading());
    assert!(!engine.state().is_ready);
    assert!(engine.wait_for_load(Duration::from_secs(10)));

    let state = engine.tick();
    assert!(state.is_ready);
    assert!((state.duration - 0.5).abs() < 1e-3);
    assert!(engine.last_error().is_none());
    let _ = std::fs::remove_file(&path);
}

#[test]
fn decode_failure_leaves_engine_not_ready() {
    let (mut engine, _clock) = engine();
    engine.load("/nonexistent/summit/track.mp3");
    assert!(engine.wait_for_load(Duration::from_secs(10)));
    let state = engine.tick();
    assert!(!state.is_ready);
    assert!(engine.last_error().is_some());

    // Still a no-op afterwards.
    engine.play();
    assert!(!engine.tick().is_playing);
}

// ── Transport ──────────────────────────────────────────────────────────────

#[test]
fn silent_track_avalanches_then_finishes() {
    let (mut engine, clock) = engine();
    engine.load_decoded(silent_track(10));
    let mut visual = VisualStateMachine::new(VisualConfig::default());
    let mut rng = fastrand::Rng::with_seed(42);

    engine.play();
    let mut finished_at = None;
    for step in 0..=1010u64 {
        let t = step * 10;
        clock.set(Duration::from_millis(t));
        let audio = engine.tick();
        let frame = visual.step(&audio, clock.now(), &mut rng);
        assert_in_range(&audio);

        if t < 2000 {
            assert!(!frame.is_avalanche, "early avalanche at {t}ms");
        } else if t < 9890 {
            assert!(frame.is_avalanche, "no avalanche at {t}ms");
        }
        if audio.is_finished {
            assert!(!frame.is_avalanche);
            assert!(!audio.is_playing);
            assert_eq!(audio.progress, 1.0);
            assert_eq!(audio.intensity, 0.0);
            finished_at.get_or_insert(t);
        }
    }
    let finished_at = finished_at.expect("track never finished");
    assert!((9890..=10000).contains(&finished_at), "finished at {finished_at}ms");
}

#[test]
fn progress_never_decreases_while_playing() {
    let (mut engine, clock) = engine();
    engine.load_decoded(silent_track(3));
    engine.play();
    let mut last = 0.0;
    for _ in 0..500 {
        clock.advance(Duration::from_millis(7));
        let state = engine.tick();
        assert_in_range(&state);
        assert!(state.progress >= last);
        last = state.progress;
    }
    assert!(engine.state().is_finished);
}

#[test]
fn seek_mid_playback_resumes() {
    let (mut engine, clock) = engine();
    engine.load_decoded(silent_track(10));
    engine.play();
    clock.advance(Duration::from_secs(3));
    engine.tick();

    engine.seek(0.5);
    let state = engine.state();
    assert!((state.current_time - 5.0).abs() < 1e-9);
    assert_eq!(state.progress, 0.5);
    assert!(!state.is_finished);
    assert!(state.is_playing);

    clock.advance(Duration::from_secs(1));
    let state = engine.tick();
    assert!((state.current_time - 6.0).abs() < 1e-9);
}

#[test]
fn seek_while_paused_stays_paused_and_clears_finished() {
    let (mut engine, clock) = engine();
    engine.load_decoded(silent_track(2));
    engine.play();
    clock.advance(Duration::from_secs(3));
    assert!(engine.tick().is_finished);

    engine.seek(0.25);
    let state = engine.state();
    assert!(!state.is_finished);
    assert!(!state.is_playing);
    assert!((state.current_time - 0.5).abs() < 1e-9);

    clock.advance(Duration::from_secs(1));
    assert_eq!(engine.tick(), state);

    engine.seek(7.0);
    assert_eq!(engine.state().progress, 1.0);
}

#[test]
fn reset_always_returns_to_the_start() {
    let (mut engine, clock) = engine();
    engine.load_decoded(silent_track(2));

    let expect_reset = |state: AudioPlaybackState| {
        assert_eq!(state.progress, 0.0);
        assert_eq!(state.intensity, 0.0);
        assert_eq!(state.current_time, 0.0);
        assert!(!state.is_finished);
        assert!(!state.is_playing);
        assert!(state.is_ready);
    };

    // From idle
    engine.reset();
    expect_reset(engine.state());

    // From playing
    engine.play();
    clock.advance(Duration::from_millis(700));
    engine.tick();
    engine.reset();
    expect_reset(engine.state());
    clock.advance(Duration::from_millis(700));
    expect_reset(engine.tick());

    // From finished
    engine.play();
    clock.advance(Duration::from_secs(5));
    assert!(engine.tick().is_finished);
    engine.reset();
    expect_reset(engine.state());
}

#[test]
fn toggle_flips_play_state() {
    let (mut engine, clock) = engine();
    engine.load_decoded(silent_track(5));
    engine.toggle_play();
    assert!(engine.state().is_playing);
    clock.advance(Duration::from_secs(1));
    engine.tick();
    engine.toggle_play();
    let state = engine.state();
    assert!(!state.is_playing);
    assert_eq!(state.intensity, 0.0);
    assert!((state.current_time - 1.0).abs() < 1e-9);
}

#[test]
fn tone_is_heard_by_the_analyzer() {
    let (mut engine, clock) = engine();
    engine.load_decoded(file_reader::decode_bytes(wav_bytes(2.0, 8_000, 1)).unwrap());
    engine.play();
    let mut loudest = 0.0f32;
    for _ in 0..30 {
        clock.advance(Duration::from_millis(16));
        let state = engine.tick();
        assert_in_range(&state);
        loudest = loudest.max(state.intensity);
    }
    assert!(loudest > 0.0);
}

#[test]
fn load_while_playing_stops_the_old_track() {
    let path = std::env::temp_dir().join(format!("summit-reload-{}.wav", std::process::id()));
    std::fs::write(&path, wav_bytes(0.5, 8_000, 1)).unwrap();

    let (mut engine, clock) = engine();
    engine.load_decoded(silent_track(10));
    engine.play();
    clock.advance(Duration::from_secs(2));
    assert!(engine.tick().is_playing);

    engine.load(&path);
    let state = engine.state();
    assert!(!state.is_ready);
    assert!(!state.is_playing);
    assert_eq!(state.progress, 0.0);

    assert!(engine.wait_for_load(Duration::from_secs(10)));
    clock.advance(Duration::from_secs(1));
    let state = engine.tick();
    assert!(state.is_ready);
    assert!(!state.is_playing);
    assert_eq!(state.current_time, 0.0);
    assert!((state.duration - 0.5).abs() < 1e-3);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn play_while_playing_keeps_the_running_session() {
    let (mut engine, clock) = engine();
    engine.load_decoded(silent_track(10));
    engine.play();
    clock.advance(Duration::from_secs(2));
    engine.play();
    clock.advance(Duration::from_secs(1));
    let state = engine.tick();
    assert!(state.is_playing);
    assert!((state.current_time - 3.0).abs() < 1e-9);
}

#[test]
fn output_failure_reports_and_recovers() {
    let broken = Rc::new(Cell::new(true));
    let clock = ManualClock::new();
    let output = FlakyOutput { broken: Rc::clone(&broken), active: false };
    let mut engine = AudioEngine::new(&AudioConfig::default(), clock.clone(), Box::new(output));
    engine.load_decoded(silent_track(5));

    engine.play();
    assert!(engine.last_error().is_some_and(|err| err.contains("device unplugged")));
    clock.advance(Duration::from_secs(1));
    let state = engine.tick();
    assert!(!state.is_playing);
    assert_eq!(state.current_time, 0.0);

    broken.set(false);
    engine.play();
    assert!(engine.last_error().is_none());
    clock.advance(Duration::from_secs(1));
    let state = engine.tick();
    assert!(state.is_playing);
    assert!((state.current_time - 1.0).abs() < 1e-9);
}
