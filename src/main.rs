use clap::Parser;
use color_eyre::Result;
use summit::audio_player::open_transport;
use summit::clock::MonotonicClock;
use summit::config::{Cli, Settings};
use summit::engine::AudioEngine;
use summit::{logging, tui};

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    let settings = Settings::from_cli(&cli)?;
    // keep the log writer alive until the terminal is restored
    let _log_guard = logging::init(&settings.log)?;

    let transport = open_transport(cli.mute);
    let mut engine = AudioEngine::new(&settings.audio, MonotonicClock::new(), transport);
    if let Some(path) = cli.file {
        engine.load(path);
    }
    tui::run(engine, &settings)
}
