use crate::color::ScenePalette;
use crate::config::VisualConfig;
use crate::engine::AudioPlaybackState;
use crate::terrain;
use std::time::Duration;
use tracing::debug;

const BOB_AMPLITUDE: f32 = 1.5;
const BOB_SPEED: f32 = 3.0;
pub const SUMMIT_UNLOCK: f32 = 0.8;
const RESTART_PROGRESS: f32 = 0.1;
const DAY_SHAKE_DAMPING: f32 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualFrameState {
    pub sunrise_mix: f32,
    pub is_avalanche: bool,
    // Scene translation for this frame only
    pub shake: (f32, f32),
    pub palette: ScenePalette,
    pub climber_progress: f32,
    // Idle bob offset in pixels (positive is up)
    pub climber_bob: f32,
    pub show_summit: bool,
    pub elapsed: f32,
    pub intensity: f32,
    pub progress: f32,
}

impl VisualFrameState {
    pub fn climber_position(&self, width: f32, height: f32) -> (f32, f32) {
        let x = self.climber_progress * width;
        let y = terrain::ground_y(self.climber_progress, height) - self.climber_bob;
        (x, y)
    }
}

pub struct VisualStateMachine {
    config: VisualConfig,
    sunrise_mix: f32,
    silence_started: Option<Duration>,
    was_avalanche: bool,
}

impl VisualStateMachine {
    pub fn new(config: VisualConfig) -> Self {
        Self {
            config,
            sunrise_mix: 0.0,
            silence_started: None,
            was_avalanche: false,
        }
    }

    pub fn config(&self) -> &VisualConfig {
        &self.config
    }

    pub fn sunrise_mix(&self) -> f32 {
        self.sunrise_mix
    }

    pub fn silence_started(&self) -> Option<Duration> {
        self.silence_started
    }

    pub fn step(
        &mut self,
        audio: &AudioPlaybackState,
        now: Duration,
        rng: &mut fastrand::Rng,
    ) -> VisualFrameState {
        let intensity = audio.intensity.clamp(0.0, 1.0);
        let progress = audio.progress.clamp(0.0, 1.0);

        if audio.is_finished {
            self.sunrise_mix = (self.sunrise_mix + self.config.sunrise_step).min(1.0);
        } else if progress < RESTART_PROGRESS {
            self.sunrise_mix = 0.0;
        }
        let day = self.sunrise_mix;

        let is_avalanche = self.detect_avalanche(audio, intensity, now);

        let magnitude = (intensity * self.config.shake_amount
            + if is_avalanche { self.config.avalanche_shake } else { 0.0 })
            * (1.0 - day * DAY_SHAKE_DAMPING);
        let shake = (
            (rng.f32() - 0.5) * magnitude,
            (rng.f32() - 0.5) * magnitude,
        );

        let elapsed = now.as_secs_f32();
        VisualFrameState {
            sunrise_mix: day,
            is_avalanche,
            shake,
            palette: self.config.palette.scene(intensity, day),
            climber_progress: (progress + intensity * self.config.boost_factor).min(1.0),
            climber_bob: (elapsed * BOB_SPEED).sin() * BOB_AMPLITUDE,
            show_summit: progress > SUMMIT_UNLOCK,
            elapsed,
            intensity,
            progress,
        }
    }

    fn detect_avalanche(
        &mut self,
        audio: &AudioPlaybackState,
        intensity: f32,
        now: Duration,
    ) -> bool {
        let mut avalanche = false;
        if audio.is_playing && !audio.is_finished {
            if intensity < self.config.avalanche_threshold {
                match self.silence_started {
                    None => self.silence_started = Some(now),
                    Some(start) => {
                        avalanche = now.saturating_sub(start) >= self.config.silence_duration();
                    }
                }
            } else {
                self.silence_started = None;
            }
        } else {
            self.silence_started = None;
        }

        if avalanche != self.was_avalanche {
            debug!(avalanche, "avalanche state changed");
            self.was_avalanche = avalanche;
        }
        avalanche
    }
}
