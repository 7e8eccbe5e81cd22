use crate::color::{Rgb, ScenePalette, Swatch, rgb};
use crate::error::EngineError;
use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "summit";

#[derive(Parser, Debug, Clone)]
#[command(name = "summit", version, about = "Climb a mountain to the sound of a track")]
pub struct Cli {
    /// Audio file to load on start-up
    pub file: Option<PathBuf>,

    /// Path to the config file (defaults to the platform config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub fps: Option<u32>,

    /// Log filter, e.g. "debug" or "summit=trace"
    #[arg(long)]
    pub log_level: Option<String>,

    /// Do not open an audio output device
    #[arg(long, default_value_t = false)]
    pub mute: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub fps: u32,
    pub audio: AudioConfig,
    pub visual: VisualConfig,
    pub log: LogConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fps: 60,
            audio: AudioConfig::default(),
            visual: VisualConfig::default(),
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub fft_size: usize,
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
    pub end_tolerance_secs: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
            end_tolerance_secs: 0.1,
        }
    }
}

impl AudioConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.fft_size < 64 || !self.fft_size.is_power_of_two() {
            return Err(EngineError::Config(format!(
                "fft_size must be a power of two >= 64, got {}",
                self.fft_size
            )));
        }
        if !(0.0..1.0).contains(&self.smoothing) {
            return Err(EngineError::Config(format!(
                "smoothing must be in [0, 1), got {}",
                self.smoothing
            )));
        }
        if self.max_decibels <= self.min_decibels {
            return Err(EngineError::Config(
                "max_decibels must be greater than min_decibels".to_string(),
            ));
        }
        if self.end_tolerance_secs < 0.0 {
            return Err(EngineError::Config(
                "end_tolerance_secs must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    pub avalanche_threshold: f32,
    pub silence_duration_ms: u64,
    pub shake_amount: f32,
    pub avalanche_shake: f32,
    pub boost_factor: f32,
    pub sunrise_step: f32,
    pub palette: PaletteConfig,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            avalanche_threshold: 0.8,
            silence_duration_ms: 2000,
            shake_amount: 10.0,
            avalanche_shake: 5.0,
            boost_factor: 0.1,
            sunrise_step: 0.005,
            palette: PaletteConfig::default(),
        }
    }
}

impl VisualConfig {
    pub fn silence_duration(&self) -> Duration {
        Duration::from_millis(self.silence_duration_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaletteConfig {
    pub sky_top: Swatch,
    pub sky_bottom: Swatch,
    pub mountain_background: Swatch,
    pub mountain_foreground: Swatch,
    pub sun: Rgb,
    pub sun_glow: Rgb,
    pub climber: Rgb,
    pub summit_glow: Rgb,
    pub particle: Rgb,
    pub star: Rgb,
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            sky_top: Swatch {
                calm: rgb(0x0f, 0x17, 0x2a),
                intense: rgb(0x31, 0x2e, 0x81),
                day: rgb(0x0e, 0xa5, 0xe9),
            },
            sky_bottom: Swatch {
                calm: rgb(0x1e, 0x29, 0x3b),
                intense: rgb(0x4c, 0x1d, 0x95),
                day: rgb(0xba, 0xe6, 0xfd),
            },
            // Mountains hold their night tone regardless of loudness.
            mountain_background: Swatch {
                calm: rgb(0x0f, 0x17, 0x2a),
                intense: rgb(0x0f, 0x17, 0x2a),
                day: rgb(0x64, 0x74, 0x8b),
            },
            mountain_foreground: Swatch {
                calm: rgb(0x1e, 0x29, 0x3b),
                intense: rgb(0x1e, 0x29, 0x3b),
                day: rgb(0x33, 0x41, 0x55),
            },
            sun: rgb(0xfb, 0xbf, 0x24),
            sun_glow: rgb(0xf5, 0x9e, 0x0b),
            climber: rgb(0xe2, 0xe8, 0xf0),
            summit_glow: rgb(0xfc, 0xd3, 0x4d),
            particle: rgb(0xe2, 0xe8, 0xf0),
            star: Rgb::WHITE,
        }
    }
}

impl PaletteConfig {
    pub fn scene(&self, intensity: f32, sunrise_mix: f32) -> ScenePalette {
        ScenePalette {
            sky_top: self.sky_top.blend(intensity, sunrise_mix),
            sky_bottom: self.sky_bottom.blend(intensity, sunrise_mix),
            mountain_background: self.mountain_background.blend(intensity, sunrise_mix),
            mountain_foreground: self.mountain_foreground.blend(intensity, sunrise_mix),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl LogConfig {
    pub fn log_path(&self) -> PathBuf {
        self.file.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_DIR)
                .join("summit.log")
        })
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR).join("config.toml"))
}

impl Settings {
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(text).wrap_err("failed to parse config")?;
        settings.audio.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml(&text).wrap_err_with(|| format!("in {}", path.display()))
    }

    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut settings = match cli.config.clone().or_else(default_config_path) {
            Some(path) => Self::load(&path)?,
            None => Self::default(),
        };
        if let Some(fps) = cli.fps {
            settings.fps = fps;
        }
        if let Some(level) = &cli.log_level {
            settings.log.level = level.clone();
        }
        settings.fps = settings.fps.clamp(1, 240);
        Ok(settings)
    }
}
