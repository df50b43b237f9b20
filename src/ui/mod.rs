use std::{
    error::Error,
    io,
    time::{Duration, Instant},
};

use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event as CrosstermEvent, KeyCode,
        KeyEventKind, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use crate::{
    config,
    control::{MotionSample, ShakeState},
    core::{FrameStats, Simulation},
    glyph::SlotState,
    render::{self, Backdrop, FrameBuffer},
    tilt::Orientation,
    types::{ColorChoice, Rgb},
};

const PRESETS: [&str; 4] = ["🐱🌸✨", "LOVE", "★☆♡", "🍓🍒🍑🍋"];
const COLOR_CYCLE: [Option<ColorChoice>; 6] = [
    None,
    Some(ColorChoice::Rainbow),
    Some(ColorChoice::Solid(Rgb::hex(0xFF6B9D))),
    Some(ColorChoice::Solid(Rgb::hex(0xFFD166))),
    Some(ColorChoice::Solid(Rgb::hex(0x06D6A0))),
    Some(ColorChoice::Solid(Rgb::hex(0x9B5DE5))),
];
const TILT_STEP: f32 = 5.0;
const JOLT: f32 = 6.0;
const RESTING_ACCEL: [f32; 3] = [0.0, 0.0, 9.8];
const BACKDROP_SIZE: (usize, usize) = (160, 90);

pub fn run(mut sim: Simulation) -> Result<(), Box<dyn Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut ui_state = UiState::new(&sim);
    let frame_interval = Duration::from_secs_f32(1.0 / config::FRAME_HZ);
    let mut last_frame = Instant::now();
    let mut frame_counter = 0_u32;
    let mut last_fps_sample = Instant::now();
    let mut fps = 0.0_f32;

    loop {
        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => {
                    if key.code == KeyCode::Esc {
                        shutdown_terminal(&mut terminal)?;
                        return Ok(());
                    }
                    handle_key(key.code, &mut sim, &mut ui_state);
                }
                CrosstermEvent::Mouse(mouse) => {
                    if let MouseEventKind::Down(_) = mouse.kind {
                        sim.on_trigger(Instant::now());
                    }
                }
                _ => {}
            }
        }

        if last_frame.elapsed() >= frame_interval {
            let now = Instant::now();
            feed_sensors(&mut sim, &mut ui_state, now);
            if last_fps_sample.elapsed() >= Duration::from_secs(1) {
                fps = frame_counter as f32 / last_fps_sample.elapsed().as_secs_f32();
                frame_counter = 0;
                last_fps_sample = Instant::now();
            }

            terminal.draw(|frame| {
                let size = frame.size();
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([
                        Constraint::Length(3),
                        Constraint::Min(3),
                        Constraint::Length(3),
                    ])
                    .split(size);

                let header = Paragraph::new(status_line(&sim, now, fps))
                    .block(Block::default().borders(Borders::ALL).title("charmshake"));
                frame.render_widget(header, chunks[0]);

                let card = Block::default().borders(Borders::ALL).title("Card");
                let inner = card.inner(chunks[1]);
                ui_state.ensure_viewport(inner);
                sim.set_container(render::container_for(inner.width, inner.height));
                match sim.frame(now, &mut ui_state.framebuf, ui_state.backdrop.as_ref()) {
                    Ok(stats) => {
                        log_frame(&stats);
                        ui_state.note_frame(None);
                    }
                    Err(err) => ui_state.note_frame(Some(err.to_string())),
                }

                let lines = cell_lines(&ui_state.framebuf);
                frame.render_widget(Paragraph::new(lines).block(card), chunks[1]);

                let footer = Paragraph::new(format!(
                    "charms: {}_ | Enter: apply | Tab/click: shake | arrows: tilt | Home: jolt | \
                     S-Tab: filter | PgUp/PgDn: color | F1-F4: presets | F5: mobile | \
                     F6: sensors off | Del: photo | Esc: quit",
                    ui_state.input
                ))
                .block(Block::default().borders(Borders::ALL).title("Controls"));
                frame.render_widget(footer, chunks[2]);
            })?;

            last_frame = now;
            frame_counter += 1;
        }

        std::thread::sleep(Duration::from_millis(1));
    }
}

fn handle_key(code: KeyCode, sim: &mut Simulation, ui_state: &mut UiState) {
    match code {
        KeyCode::Enter => sim.set_spec(&ui_state.input),
        KeyCode::Backspace => {
            ui_state.input.pop();
        }
        KeyCode::Tab => {
            sim.on_trigger(Instant::now());
        }
        KeyCode::BackTab => sim.set_filter(sim.filter().next()),
        KeyCode::PageUp | KeyCode::PageDown => {
            let len = COLOR_CYCLE.len();
            ui_state.color_index = if code == KeyCode::PageUp {
                (ui_state.color_index + 1) % len
            } else {
                (ui_state.color_index + len - 1) % len
            };
            sim.set_charm_color(COLOR_CYCLE[ui_state.color_index]);
        }
        KeyCode::Up => ui_state.nudge_tilt(-TILT_STEP, 0.0),
        KeyCode::Down => ui_state.nudge_tilt(TILT_STEP, 0.0),
        KeyCode::Left => ui_state.nudge_tilt(0.0, -TILT_STEP),
        KeyCode::Right => ui_state.nudge_tilt(0.0, TILT_STEP),
        KeyCode::Home => ui_state.jolt = JOLT,
        KeyCode::F(n @ 1..=4) => {
            ui_state.input = PRESETS[n as usize - 1].to_string();
            sim.set_spec(&ui_state.input);
        }
        KeyCode::F(5) => {
            let mobile = !sim.is_mobile();
            sim.set_mobile(mobile);
        }
        KeyCode::F(6) => sim.sensor_unavailable("turned off from the keyboard"),
        KeyCode::Delete => {
            ui_state.backdrop = match ui_state.backdrop.take() {
                Some(_) => None,
                None => Some(Backdrop::landscape(BACKDROP_SIZE.0, BACKDROP_SIZE.1)),
            };
        }
        KeyCode::Char(ch) => {
            if !ch.is_control() && ui_state.input.chars().count() < 64 {
                ui_state.input.push(ch);
            }
        }
        _ => {}
    }
}

/// Stands in for the device sensors: a resting accelerometer plus whatever
/// jolt and tilt the keyboard asked for.
fn feed_sensors(sim: &mut Simulation, ui_state: &mut UiState, now: Instant) {
    if sim.sensors_enabled() {
        let mut accel = RESTING_ACCEL;
        accel[0] += std::mem::take(&mut ui_state.jolt);
        if let Err(err) = sim.on_motion(MotionSample { accel, at: now }) {
            log::debug!("motion sample dropped: {err}");
        }
    }
    if sim.tilt_active() {
        if let Err(err) = sim.on_orientation(ui_state.tilt) {
            log::debug!("orientation sample dropped: {err}");
        }
    }
}

fn log_frame(stats: &FrameStats) {
    if stats.rebuilt {
        log::info!("rebuilt {} charm bodies", stats.bodies);
    }
    if stats.upgraded > 0 || stats.failed > 0 {
        log::debug!("rasters: {} upgraded, {} failed", stats.upgraded, stats.failed);
    }
}

fn status_line(sim: &Simulation, now: Instant, fps: f32) -> String {
    let shake = match sim.shake_state() {
        ShakeState::Idle => "ready".to_string(),
        ShakeState::Shaking { .. } => format!("{:.1}s", sim.cooldown_left(now).as_secs_f32()),
    };
    let color = sim
        .charm_color()
        .map_or_else(|| config::DEFAULT_CHARM_COLOR.to_string(), |c| c.to_string());
    let gravity = sim.gravity();
    let stats = sim.last_stats();
    format!(
        "charms: {} | bodies: {} | filter: {} | color: {} | gravity: ({:.2}, {:.2}) | shake: {} | {} | rasters: {} ready, {} failed, {} as text | unstuck: {} | fps: {:.1}",
        sim.spec().concat(),
        stats.bodies,
        sim.filter().name(),
        color,
        gravity.x,
        gravity.y,
        shake,
        if sim.is_mobile() { "mobile" } else { "desktop" },
        sim.glyph_count(SlotState::Ready),
        sim.glyph_count(SlotState::Failed),
        stats.fallbacks - stats.upgraded,
        stats.corrected,
        fps
    )
}

fn cell_lines(framebuf: &FrameBuffer) -> Vec<Line<'static>> {
    (0..framebuf.height())
        .map(|y| {
            let spans: Vec<Span> = (0..framebuf.width())
                .map(|x| framebuf.get(x, y))
                .filter(|cell| !cell.is_continuation())
                .map(|cell| {
                    Span::styled(
                        cell.symbol.clone(),
                        Style::default().fg(color_for(cell.fg)).bg(color_for(cell.bg)),
                    )
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}

fn shutdown_terminal(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
) -> Result<(), Box<dyn Error>> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    Ok(())
}

struct UiState {
    framebuf: FrameBuffer,
    backdrop: Option<Backdrop>,
    input: String,
    color_index: usize,
    tilt: Orientation,
    jolt: f32,
    last_error: Option<String>,
}

impl UiState {
    fn new(sim: &Simulation) -> Self {
        let color_index = COLOR_CYCLE
            .iter()
            .position(|c| *c == sim.charm_color())
            .unwrap_or(0);
        Self {
            framebuf: FrameBuffer::new(0, 0),
            backdrop: Some(Backdrop::landscape(BACKDROP_SIZE.0, BACKDROP_SIZE.1)),
            input: sim.spec().concat(),
            color_index,
            tilt: Orientation { pitch: 0.0, roll: 0.0 },
            jolt: 0.0,
            last_error: None,
        }
    }

    fn ensure_viewport(&mut self, area: Rect) {
        if self.framebuf.width() != area.width || self.framebuf.height() != area.height {
            self.framebuf.resize(area.width, area.height);
        }
    }

    fn nudge_tilt(&mut self, pitch: f32, roll: f32) {
        self.tilt.pitch = (self.tilt.pitch + pitch).clamp(-90.0, 90.0);
        self.tilt.roll = (self.tilt.roll + roll).clamp(-90.0, 90.0);
    }

    /// Logs frame errors when they start or change, not every frame.
    fn note_frame(&mut self, error: Option<String>) {
        if error != self.last_error {
            match &error {
                Some(err) => log::warn!("frame degraded: {err}"),
                None if self.last_error.is_some() => log::info!("frame recovered"),
                None => {}
            }
            self.last_error = error;
        }
    }
}

fn color_for(rgb: Rgb) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}
