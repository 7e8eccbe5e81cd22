use crate::canvas::{Canvas, HalfBlocks};
use crate::clock::{Clock, MonotonicClock};
use crate::config::Settings;
use crate::engine::{AudioEngine, AudioPlaybackState, PlayerCommand};
use crate::particles::ParticleSystem;
use crate::scene;
use crate::visual::{VisualFrameState, VisualStateMachine};
use color_eyre::Result;
use crossbeam::channel::Sender;
use ratatui::{
    DefaultTerminal,
    crossterm::event::{Event, KeyCode, KeyEventKind, poll, read},
    layout::Flex,
    prelude::*,
    widgets::{Clear, FrameExt, Paragraph},
};
use ratatui_explorer::{FileExplorer, Theme};
use std::time::{Duration, Instant};

const HUD_ROWS: u16 = 1;
const SEEK_STEP: f64 = 0.05;

struct App<C: Clock> {
    explorer: FileExplorer,
    show_explorer: bool,
    engine: AudioEngine<C>,
    commands: Sender<PlayerCommand>,
    visual: VisualStateMachine,
    particles: ParticleSystem,
    canvas: Canvas,
    // Terminal size from the latest resize, applied at the start of the next tick
    pending_size: Option<(u16, u16)>,
    clock: MonotonicClock,
    rng: fastrand::Rng,
    frame_time: Duration,
    last: Option<(AudioPlaybackState, VisualFrameState)>,
}

impl<C: Clock> App<C> {
    fn new(explorer: FileExplorer, engine: AudioEngine<C>, settings: &Settings) -> Self {
        let commands = engine.commands();
        Self {
            explorer,
            show_explorer: false,
            engine,
            commands,
            visual: VisualStateMachine::new(settings.visual.clone()),
            particles: ParticleSystem::new(),
            canvas: Canvas::new(0, 0),
            pending_size: None,
            clock: MonotonicClock::new(),
            rng: fastrand::Rng::new(),
            frame_time: Duration::from_secs_f64(1.0 / settings.fps.max(1) as f64),
            last: None,
        }
    }

    // One refresh: derive state, integrate particles, paint. Always in that order
    // and always from the same playback snapshot.
    fn tick(&mut self) {
        if let Some((cols, rows)) = self.pending_size.take() {
            self.canvas.resize(cols as usize, rows.saturating_sub(HUD_ROWS) as usize * 2);
        }
        let audio = self.engine.tick();
        let frame = self.visual.step(&audio, self.clock.now(), &mut self.rng);
        self.particles.step(
            frame.is_avalanche,
            self.canvas.width() as f32,
            self.canvas.height() as f32,
            &mut self.rng,
        );
        scene::render(
            &mut self.canvas,
            &frame,
            self.particles.particles(),
            &self.visual.config().palette,
        );
        self.last = Some((audio, frame));
    }

    fn draw(&mut self, f: &mut Frame) {
        let [scene_area, hud_area] =
            Layout::vertical([Constraint::Min(0), Constraint::Length(HUD_ROWS)]).areas(f.area());

        f.render_widget(HalfBlocks(&self.canvas), scene_area);
        f.render_widget(
            Paragraph::new(self.hud()).style(Style::default().fg(Color::Gray).bg(Color::Black)),
            hud_area,
        );

        if self.show_explorer {
            let area = Self::popup_area(f.area(), 50, 70);
            f.render_widget(Clear, area);
            f.render_widget_ref(self.explorer.widget(), area);
        }
    }

    fn hud(&self) -> String {
        if let Some(err) = self.engine.last_error() {
            return format!(" {err}  [e] open another file  [q] quit");
        }
        if self.engine.is_loading() {
            return " decoding...".to_string();
        }
        let Some((audio, frame)) = &self.last else {
            return String::new();
        };
        if !audio.is_ready {
            return " [e] open an audio file  [q] quit".to_string();
        }
        let icon = if audio.is_finished {
            "summit"
        } else if audio.is_playing {
            "climbing"
        } else {
            "paused"
        };
        let mut line = format!(
            " {icon} {} / {}  intensity {:.2}",
            format_time(audio.current_time),
            format_time(audio.duration),
            audio.intensity
        );
        if frame.is_avalanche {
            line.push_str("  AVALANCHE");
        }
        line.push_str("  [space] play/pause  [<-/->] seek  [r] reset  [e] open  [q] quit");
        line
    }

    fn run(mut self, mut terminal: DefaultTerminal) -> Result<()> {
        let size = terminal.size()?;
        self.pending_size = Some((size.width, size.height));
        let mut next_frame = Instant::now();
        loop {
            let timeout = next_frame.saturating_duration_since(Instant::now());
            if poll(timeout)? {
                let event = read()?;
                if !self.handle_event(event)? {
                    return Ok(());
                }
                continue;
            }

            next_frame += self.frame_time;
            let now = Instant::now();
            if next_frame < now {
                // Fell behind; do not try to catch up.
                next_frame = now;
            }
            self.tick();
            terminal.draw(|f| self.draw(f))?;
        }
    }

    fn handle_event(&mut self, event: Event) -> Result<bool> {
        match &event {
            Event::Resize(cols, rows) => {
                self.pending_size = Some((*cols, *rows));
            }
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if self.show_explorer {
                    match key.code {
                        KeyCode::Char('q') => return Ok(false),
                        KeyCode::Char('e') | KeyCode::Esc => self.show_explorer = false,
                        KeyCode::Enter => self.select_file(),
                        _ => self.explorer.handle(&event)?,
                    }
                    return Ok(true);
                }
                let progress = self.engine.state().progress as f64;
                let command = match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(false),
                    KeyCode::Char('e') => {
                        self.show_explorer = true;
                        None
                    }
                    KeyCode::Char(' ') => Some(PlayerCommand::TogglePlay),
                    KeyCode::Char('r') => Some(PlayerCommand::Reset),
                    KeyCode::Left => Some(PlayerCommand::Seek(progress - SEEK_STEP)),
                    KeyCode::Right => Some(PlayerCommand::Seek(progress + SEEK_STEP)),
                    KeyCode::Char(c @ '0'..='9') => {
                        let tenth = c.to_digit(10).unwrap_or(0) as f64;
                        Some(PlayerCommand::Seek(tenth / 10.0))
                    }
                    _ => None,
                };
                if let Some(command) = command {
                    self.send(command);
                }
            }
            _ => (),
        }
        Ok(true)
    }

    fn send(&self, command: PlayerCommand) {
        if let Err(err) = self.commands.send(command) {
            tracing::error!("engine command channel closed: {err}");
        }
    }

    fn select_file(&mut self) {
        let file = self.explorer.current();
        if !file.is_file() {
            return;
        }
        let path = file.path().to_path_buf();
        self.show_explorer = false;
        self.particles.clear();
        self.send(PlayerCommand::Load(path));
    }

    fn popup_area(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
        let vertical = Layout::vertical([Constraint::Percentage(percent_y)]).flex(Flex::Center);
        let horizontal = Layout::horizontal([Constraint::Percentage(percent_x)]).flex(Flex::Center);
        let [area] = vertical.areas(area);
        let [area] = horizontal.areas(area);
        area
    }
}

pub fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{:02}:{:02}", total / 60, total % 60)
}

pub fn run<C: Clock>(engine: AudioEngine<C>, settings: &Settings) -> Result<()> {
    let theme = Theme::default()
        .add_default_title()
        .with_item_style(Style::default().fg(Color::White));
    let file_explorer = FileExplorer::with_theme(theme)?;
    let app = App::new(file_explorer, engine, settings);
    let terminal = ratatui::init();
    let app_result = app.run(terminal);
    ratatui::restore();
    app_result
}
