mod app;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
    MouseEvent, MouseEventKind,
};
use crossterm::execute;
use ratatui::DefaultTerminal;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tui_choropleth::config::Config;
use tui_choropleth::data::Geo;
use tui_choropleth::refresh::Refresher;
use tui_choropleth::{ColorRamp, Filter, GeometryCache, HealthStatus, KeyFields};

/// Terminal choropleth of case counts per region
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// GeoJSON FeatureCollection of regions (omit with --cases for the demo)
    #[arg(long)]
    geometry: Option<PathBuf>,

    /// JSON case table keyed by status
    #[arg(long)]
    cases: Option<PathBuf>,

    /// Feature property holding the primary key part
    #[arg(long, default_value = "region")]
    primary_field: String,

    /// Feature property holding the secondary key part
    #[arg(long, default_value = "province")]
    secondary_field: String,

    /// Initial status filter
    #[arg(long, default_value_t = HealthStatus::All)]
    status: HealthStatus,

    /// Show cases as of this date (YYYY-MM-DD)
    #[arg(long)]
    as_of: Option<String>,

    /// Comma separated #rrggbb colors, lowest band first
    #[arg(long, value_parser = ColorRamp::parse)]
    ramp: Option<ColorRamp>,

    /// Write logs here; RUST_LOG sets the filter
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let mut filter = Filter::new(args.status);
        if let Some(as_of) = args.as_of {
            filter = filter.with_as_of(as_of);
        }
        Config {
            geometry: args.geometry,
            cases: args.cases,
            fields: KeyFields::new(args.primary_field, args.secondary_field),
            filter,
            ramp: args.ramp.unwrap_or_default(),
            log_file: args.log_file,
        }
    }
}

/// The terminal belongs to the TUI, so logs only go to a file.
fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let Some(path) = log_file else {
        return Ok(());
    };
    let file = File::create(path).with_context(|| format!("creating log file {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let config = Config::from(Args::parse());
    init_tracing(config.log_file.as_deref())?;

    // Load everything that can fail before taking over the terminal
    let (geometry_source, cases) = config.open_sources()?;
    let mut cache: GeometryCache<Geo> = GeometryCache::new();
    let geometry = cache
        .get_or_load(geometry_source.as_ref())
        .context("loading base geometry")?;
    info!(
        features = geometry.len(),
        demo = config.uses_demo(),
        status = %config.filter.status,
        "starting"
    );
    let refresher = Refresher::new(cases, geometry, config.fields.clone(), config.ramp.clone());

    let mut terminal = ratatui::init();
    terminal.clear()?;
    execute!(std::io::stdout(), EnableMouseCapture)?;

    let result = run(&mut terminal, refresher, config.filter);

    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();

    result
}

/// Handle mouse events for hover, panning and zooming
fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    app.set_mouse_pos(mouse.column, mouse.row);

    match mouse.kind {
        MouseEventKind::ScrollUp => app.zoom_in_at(mouse.column, mouse.row),
        MouseEventKind::ScrollDown => app.zoom_out_at(mouse.column, mouse.row),
        // Horizontal scroll for panning (trackpad two-finger swipe)
        MouseEventKind::ScrollLeft => app.pan(-15, 0),
        MouseEventKind::ScrollRight => app.pan(15, 0),
        MouseEventKind::Down(MouseButton::Left) => {
            app.last_mouse = Some((mouse.column, mouse.row));
        }
        MouseEventKind::Drag(MouseButton::Left) => {
            app.handle_drag(mouse.column, mouse.row);
        }
        MouseEventKind::Up(MouseButton::Left) => {
            app.end_drag();
        }
        // Right click pins the hovered region
        MouseEventKind::Down(MouseButton::Right) => app.toggle_pin(),
        _ => {}
    }
}

fn run(terminal: &mut DefaultTerminal, refresher: Refresher<Geo>, filter: Filter) -> Result<()> {
    let size = terminal.size()?;
    let mut app = App::new(size.width as usize, size.height as usize, refresher, filter);

    loop {
        terminal.draw(|frame| ui::render(frame, &app))?;

        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.quit(),

                    // Pan with hjkl or arrow keys
                    KeyCode::Left | KeyCode::Char('h') => app.pan(-10, 0),
                    KeyCode::Right | KeyCode::Char('l') => app.pan(10, 0),
                    KeyCode::Up | KeyCode::Char('k') => app.pan(0, -6),
                    KeyCode::Down | KeyCode::Char('j') => app.pan(0, 6),

                    KeyCode::Char('+') | KeyCode::Char('=') => app.zoom_in(),
                    KeyCode::Char('-') | KeyCode::Char('_') => app.zoom_out(),

                    KeyCode::Tab => app.next_status(),
                    KeyCode::BackTab => app.prev_status(),

                    // Layer toggles
                    KeyCode::Char('f') | KeyCode::Char('F') => app.renderer.toggle_fill(),
                    KeyCode::Char('o') | KeyCode::Char('O') => app.renderer.toggle_outlines(),
                    KeyCode::Char('c') | KeyCode::Char('C') => app.selection.clear_all(),

                    KeyCode::Char('r') | KeyCode::Char('0') => app.reset_view(),

                    _ => {}
                },
                Event::Mouse(mouse) => handle_mouse(&mut app, mouse),
                Event::Resize(width, height) => {
                    app.resize(width as usize, height as usize);
                }
                _ => {}
            }
        }

        app.poll_refresh();

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_map_onto_config() {
        let args = Args::parse_from([
            "tui-choropleth",
            "--status",
            "died",
            "--as-of",
            "2020-05-01",
            "--primary-field",
            "adm1",
            "--ramp",
            "#000000,#ffffff",
        ]);
        let config = Config::from(args);
        assert!(config.uses_demo());
        assert_eq!(config.filter.status, HealthStatus::Died);
        assert_eq!(config.filter.as_of.as_deref(), Some("2020-05-01"));
        assert_eq!(config.fields, KeyFields::new("adm1", "province"));
        assert_eq!(config.ramp.len(), 2);
    }

    #[test]
    fn bad_ramp_is_rejected() {
        assert!(Args::try_parse_from(["tui-choropleth", "--ramp", "#zzzzzz,#ffffff"]).is_err());
        assert!(Args::try_parse_from(["tui-choropleth", "--status", "zombie"]).is_err());
    }
}
