use crate::app::{App, PANEL_WIDTH};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
    Frame,
};
use tui_choropleth::braille::BrailleCanvas;
use tui_choropleth::{ColorScale, HealthStatus, Rgb};

const WHITE: Rgb = Rgb::new(255, 255, 255);

/// Render the UI
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    // Map + side panel above, status bar below
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(area);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(10), Constraint::Length(PANEL_WIDTH)])
        .split(rows[0]);

    render_map(frame, app, columns[0]);
    render_panel(frame, app, columns[1]);
    render_status_bar(frame, app, rows[1]);
}

fn color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}

fn render_map(frame: &mut Frame, app: &App, area: Rect) {
    let title = match &app.current {
        Some(current) => format!(" Cases: {} ", current.ticket.filter().status.label()),
        None => " Cases ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Braille gives 2x4 resolution per character
    let mut viewport = app.viewport.clone();
    viewport.width = inner.width as usize * 2;
    viewport.height = inner.height as usize * 4;

    let canvas = app.renderer.render(
        inner.width as usize,
        inner.height as usize,
        &viewport,
        &app.bands,
        &app.selection,
    );

    frame.render_widget(
        MapWidget {
            canvas,
            scale: app.current.as_ref().map(|c| &c.scale),
        },
        inner,
    );
}

/// Braille map with per-cell band colors as background
struct MapWidget<'a> {
    canvas: BrailleCanvas,
    scale: Option<&'a ColorScale>,
}

impl Widget for MapWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for row in 0..self.canvas.height().min(area.height as usize) {
            let y = area.y + row as u16;
            for (col, (ch, fill)) in self.canvas.row(row).enumerate() {
                if col >= area.width as usize {
                    break;
                }
                let x = area.x + col as u16;
                let cell = &mut buf[(x, y)];

                let Some(fill) = fill else {
                    // Skip empty braille characters (U+2800)
                    if ch != '\u{2800}' {
                        cell.set_char(ch).set_fg(Color::DarkGray);
                    }
                    continue;
                };

                // Before the first render lands every region is band 0 of nothing
                let base = self
                    .scale
                    .and_then(|s| s.colors().get(fill.band).copied())
                    .unwrap_or(Rgb::new(60, 60, 60));
                let bg = if fill.highlighted { base.lerp(WHITE, 0.45) } else { base };
                let fg = if bg.luminance() > 0.6 { Color::Black } else { Color::Gray };
                cell.set_char(ch).set_bg(color(bg)).set_fg(fg);
            }
        }
    }
}

/// Vertical legend: one swatch per band, thresholds on the boundaries
/// between swatches. The bottom threshold is omitted.
fn legend_lines(scale: &ColorScale) -> Vec<Line<'static>> {
    let dim = Style::default().fg(Color::DarkGray);
    let entries: Vec<_> = scale.legend_entries().collect();
    if entries.is_empty() {
        // Flat scale: one color, nothing to rank
        return vec![Line::from(vec![
            Span::styled("    ", Style::default().bg(color(scale.colors()[0]))),
            Span::styled(" no cases", dim),
        ])];
    }

    let mut lines = Vec::with_capacity(entries.len() * 2);
    for (idx, (swatch, label)) in entries.into_iter().enumerate() {
        if idx > 0 {
            lines.push(Line::from(vec![
                Span::styled("────", dim),
                Span::raw(format!(" {label}")),
            ]));
        }
        lines.push(Line::from(Span::styled("    ", Style::default().bg(color(swatch)))));
    }
    lines
}

fn render_panel(frame: &mut Frame, app: &App, area: Rect) {
    let label = Style::default().fg(Color::DarkGray);
    let value = Style::default().fg(Color::White).add_modifier(Modifier::BOLD);
    let mut lines = Vec::new();

    match &app.current {
        Some(current) => {
            lines.extend(legend_lines(&current.scale));
            lines.push(Line::raw(""));
            lines.push(Line::from(vec![
                Span::styled("Mapped    ", label),
                Span::styled(current.merged.total().to_string(), value),
            ]));
            lines.push(Line::from(vec![
                Span::styled("Reporting ", label),
                Span::styled(
                    format!("{}/{}", current.merged.reporting(), current.merged.len()),
                    value,
                ),
            ]));
        }
        None => lines.push(Line::styled("loading…", label)),
    }

    if let Some(summary) = &app.summary {
        lines.push(Line::raw(""));
        if let Some(date) = &summary.max_date {
            lines.push(Line::from(vec![
                Span::styled("as of ", label),
                Span::styled(date.clone(), Style::default().fg(Color::Cyan)),
            ]));
        }
        for (name, count, fg) in [
            ("New active", summary.new_active, Color::Yellow),
            ("Active    ", summary.active, Color::LightRed),
            ("Recovered ", summary.recovered, Color::Green),
            (HealthStatus::Died.label(), summary.died, Color::Gray),
            ("Total     ", summary.total(), Color::White),
        ] {
            lines.push(Line::from(vec![
                Span::styled(format!("{name:<10}"), label),
                Span::styled(count.to_string(), Style::default().fg(fg)),
            ]));
        }
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(" Legend ", Style::default().fg(Color::Cyan)));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let dim = Style::default().fg(Color::DarkGray);
    let mut spans = vec![
        Span::styled(" Status: ", dim),
        Span::styled(app.filter.status.label(), Style::default().fg(Color::Yellow)),
    ];
    if let Some(as_of) = &app.filter.as_of {
        spans.push(Span::styled(" as of ", dim));
        spans.push(Span::styled(as_of.clone(), Style::default().fg(Color::Yellow)));
    }
    spans.push(Span::styled(" | Zoom: ", dim));
    spans.push(Span::styled(app.zoom_level(), Style::default().fg(Color::Magenta)));

    if let Some(feature) = app.hovered_feature() {
        spans.push(Span::styled(" | ", dim));
        spans.push(Span::styled(feature.key.to_string(), Style::default().fg(Color::Cyan)));
        spans.push(Span::styled(": ", dim));
        spans.push(Span::styled(
            feature.count.to_string(),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ));
    }
    if app.is_refreshing() {
        spans.push(Span::styled(" | updating…", Style::default().fg(Color::Yellow)));
    }
    if let Some(error) = &app.last_error {
        spans.push(Span::styled(format!(" | {error}"), Style::default().fg(Color::Red)));
    }
    spans.push(Span::styled(
        " | hjkl:pan +/-:zoom Tab:status r:reset q:quit",
        dim,
    ));

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
