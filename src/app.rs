use anyhow::Result;
use tracing::{info, warn};
use tui_choropleth::data::Geo;
use tui_choropleth::map::{ChoroplethRenderer, SelectionSet, Viewport};
use tui_choropleth::model::Feature;
use tui_choropleth::refresh::{Refresher, Rendered};
use tui_choropleth::{CaseSummary, Filter};

/// Columns reserved on the right for legend and summary
pub const PANEL_WIDTH: u16 = 28;

/// Application state
pub struct App {
    pub viewport: Viewport,
    pub renderer: ChoroplethRenderer,
    pub should_quit: bool,
    /// Last mouse position for drag tracking
    pub last_mouse: Option<(u16, u16)>,
    /// Current mouse position, drives hover
    pub mouse_pos: Option<(u16, u16)>,
    pub selection: SelectionSet,
    pub filter: Filter,
    refresher: Refresher<Geo>,
    /// Latest published render; kept when a later refresh fails
    pub current: Option<Rendered<Geo>>,
    /// Color band per feature id for `current`
    pub bands: Vec<usize>,
    pub summary: Option<CaseSummary>,
    pub last_error: Option<String>,
}

impl App {
    pub fn new(width: usize, height: usize, refresher: Refresher<Geo>, filter: Filter) -> Self {
        let renderer =
            ChoroplethRenderer::from_geometries(refresher.geometry().iter().map(|f| f.geometry.as_ref()));

        let summary = match refresher.summary() {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "case summary unavailable");
                None
            }
        };

        let (pixel_width, pixel_height) = map_pixels(width, height);
        let mut app = Self {
            viewport: Viewport::world(pixel_width, pixel_height),
            renderer,
            should_quit: false,
            last_mouse: None,
            mouse_pos: None,
            selection: SelectionSet::new(),
            filter,
            refresher,
            current: None,
            bands: Vec::new(),
            summary,
            last_error: None,
        };
        app.reset_view();
        app.refresh();
        app
    }

    /// Update viewport size when terminal resizes
    pub fn resize(&mut self, width: usize, height: usize) {
        let (pixel_width, pixel_height) = map_pixels(width, height);
        self.viewport.width = pixel_width;
        self.viewport.height = pixel_height;
    }

    /// Fit the view to the loaded geometry
    pub fn reset_view(&mut self) {
        if let Some(bounds) = self.renderer.bounds() {
            self.viewport.fit_bounds(bounds);
        }
    }

    pub fn pan(&mut self, dx: i32, dy: i32) {
        self.viewport.pan(dx, dy);
        self.update_hover();
    }

    pub fn zoom_in(&mut self) {
        self.viewport.zoom_in();
        self.update_hover();
    }

    pub fn zoom_out(&mut self) {
        self.viewport.zoom_out();
        self.update_hover();
    }

    /// Zoom in towards a screen position (terminal column/row)
    pub fn zoom_in_at(&mut self, col: u16, row: u16) {
        let (px, py) = to_pixel(col, row);
        self.viewport.zoom_in_at(px, py);
        self.update_hover();
    }

    pub fn zoom_out_at(&mut self, col: u16, row: u16) {
        let (px, py) = to_pixel(col, row);
        self.viewport.zoom_out_at(px, py);
        self.update_hover();
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Start a refresh for the current filter
    pub fn refresh(&mut self) {
        let ticket = self.refresher.request(self.filter.clone());
        info!(generation = ticket.generation(), status = %self.filter.status, "refresh requested");
    }

    pub fn next_status(&mut self) {
        self.filter.status = self.filter.status.next();
        self.refresh();
    }

    pub fn prev_status(&mut self) {
        self.filter.status = self.filter.status.prev();
        self.refresh();
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresher.is_pending()
    }

    /// Publish a finished refresh, if any. Returns true when the map changed.
    pub fn poll_refresh(&mut self) -> bool {
        match self.refresher.poll() {
            Some(result) => {
                self.publish(result);
                true
            }
            None => false,
        }
    }

    fn publish(&mut self, result: Result<Rendered<Geo>>) {
        match result {
            Ok(rendered) => {
                self.bands = rendered
                    .merged
                    .counts()
                    .map(|count| rendered.scale.band_for(count as f64))
                    .collect();
                self.current = Some(rendered);
                self.last_error = None;
            }
            Err(e) => {
                let message = format!("{e:#}");
                warn!(error = %message, "refresh failed, keeping previous map");
                self.last_error = Some(message);
            }
        }
    }

    pub fn zoom_level(&self) -> String {
        format!("{:.1}x", self.viewport.zoom)
    }

    /// Handle mouse drag
    pub fn handle_drag(&mut self, x: u16, y: u16) {
        if let Some((last_x, last_y)) = self.last_mouse {
            let dx = last_x as i32 - x as i32;
            let dy = last_y as i32 - y as i32;
            // One terminal cell is 2x4 braille dots
            self.pan(dx * 2, dy * 4);
        }
        self.last_mouse = Some((x, y));
    }

    /// Reset drag state when mouse button released
    pub fn end_drag(&mut self) {
        self.last_mouse = None;
    }

    /// Update mouse cursor position and the hovered feature
    pub fn set_mouse_pos(&mut self, col: u16, row: u16) {
        self.mouse_pos = Some((col, row));
        self.update_hover();
    }

    /// Pin or unpin the feature under the cursor
    pub fn toggle_pin(&mut self) {
        if let Some(id) = self.selection.hovered() {
            self.selection.toggle(id);
        }
    }

    fn update_hover(&mut self) {
        let hit = self.mouse_pos.and_then(|(col, row)| {
            let (px, py) = to_pixel(col, row);
            let inside = col >= 1
                && row >= 1
                && (px as usize) < self.viewport.width
                && (py as usize) < self.viewport.height;
            if !inside {
                return None;
            }
            let (lon, lat) = self.viewport.unproject(px, py);
            self.renderer.feature_at(lon, lat)
        });
        self.selection.hover(hit);
    }

    /// Merged feature under the cursor, once a render has been published
    pub fn hovered_feature(&self) -> Option<&Feature<Geo>> {
        let id = self.selection.hovered()?;
        self.current.as_ref()?.merged.get(id)
    }
}

/// Braille pixel size of the map pane: border on all sides, status bar below,
/// side panel on the right.
fn map_pixels(width: usize, height: usize) -> (usize, usize) {
    let inner_width = width.saturating_sub(2 + PANEL_WIDTH as usize);
    let inner_height = height.saturating_sub(3);
    (inner_width * 2, inner_height * 4)
}

/// Terminal cell to braille pixel, accounting for the 1-cell border
fn to_pixel(col: u16, row: u16) -> (i32, i32) {
    let px = (col.saturating_sub(1) as i32) * 2;
    let py = (row.saturating_sub(1) as i32) * 4;
    (px, py)
}
