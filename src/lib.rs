pub mod analyzer;
pub mod audio_player;
pub mod canvas;
pub mod clock;
pub mod color;
pub mod config;
pub mod engine;
pub mod error;
pub mod file_reader;
pub mod logging;
pub mod particles;
pub mod scene;
pub mod terrain;
pub mod tui;
pub mod visual;
