use glam::DVec2;
use std::f64::consts::PI;

const MIN_ZOOM: f64 = 0.5;
const MAX_ZOOM: f64 = 2000.0;

/// Geographic bounding box in degrees (x = lon, y = lat)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: DVec2,
    pub max: DVec2,
}

impl Bounds {
    pub fn from_point(p: DVec2) -> Self {
        Self { min: p, max: p }
    }

    pub fn extend(&mut self, p: DVec2) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    pub fn union(self, other: Bounds) -> Bounds {
        Bounds {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn contains(&self, p: DVec2) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    pub fn center(&self) -> DVec2 {
        (self.min + self.max) * 0.5
    }
}

/// Web Mercator: lon/lat degrees to normalized [0, 1] world coordinates
#[inline]
fn mercator(lon: f64, lat: f64) -> DVec2 {
    let lat_rad = lat.clamp(-85.0, 85.0).to_radians();
    DVec2::new(
        (lon + 180.0) / 360.0,
        (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0,
    )
}

#[inline]
fn inverse_mercator(p: DVec2) -> (f64, f64) {
    let lon = p.x * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * p.y)).sinh().atan().to_degrees();
    (lon, lat)
}

/// Viewport representing the visible map area and zoom level
#[derive(Clone, Debug)]
pub struct Viewport {
    /// Center longitude (-180 to 180)
    pub center_lon: f64,
    /// Center latitude (-85 to 85)
    pub center_lat: f64,
    /// Zoom level (higher = more zoomed in)
    pub zoom: f64,
    /// Canvas pixel width
    pub width: usize,
    /// Canvas pixel height
    pub height: usize,
}

impl Viewport {
    pub fn new(center_lon: f64, center_lat: f64, zoom: f64, width: usize, height: usize) -> Self {
        Self {
            center_lon,
            center_lat,
            zoom,
            width,
            height,
        }
    }

    /// Create a world view (shows entire world)
    pub fn world(width: usize, height: usize) -> Self {
        Self::new(0.0, 20.0, 1.0, width, height)
    }

    /// Center on `bounds` and zoom so they fill most of the canvas.
    pub fn fit_bounds(&mut self, bounds: Bounds) {
        let a = mercator(bounds.min.x, bounds.min.y);
        let b = mercator(bounds.max.x, bounds.max.y);
        let span = (b - a).abs().max(DVec2::splat(1e-9));

        let (lon, lat) = inverse_mercator((a + b) * 0.5);
        self.center_lon = lon;
        self.center_lat = lat;

        let w = self.width.max(1) as f64;
        let h = self.height.max(1) as f64;
        let fit_x = 1.0 / span.x;
        let fit_y = h / (w * span.y);
        self.zoom = (fit_x.min(fit_y) * 0.9).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    fn scale(&self) -> f64 {
        self.zoom * self.width as f64
    }

    fn has_area(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    fn half_extent(&self) -> DVec2 {
        DVec2::new(self.width as f64 / 2.0, self.height as f64 / 2.0)
    }

    /// Pan the viewport by pixel delta
    pub fn pan(&mut self, dx: i32, dy: i32) {
        // A zero-sized canvas has no pixel scale to move by
        if !self.has_area() {
            return;
        }
        let center = mercator(self.center_lon, self.center_lat)
            + DVec2::new(dx as f64, dy as f64) / self.scale();
        let (mut lon, lat) = inverse_mercator(center);

        // Wrap longitude
        if lon > 180.0 {
            lon -= 360.0;
        } else if lon < -180.0 {
            lon += 360.0;
        }

        self.center_lon = lon;
        self.center_lat = lat.clamp(-85.0, 85.0);
    }

    pub fn zoom_in(&mut self) {
        self.zoom = (self.zoom * 1.5).min(MAX_ZOOM);
    }

    pub fn zoom_out(&mut self) {
        self.zoom = (self.zoom / 1.5).max(MIN_ZOOM);
    }

    /// Zoom in towards a specific pixel location
    pub fn zoom_in_at(&mut self, px: i32, py: i32) {
        self.zoom_at(px, py, 1.5);
    }

    /// Zoom out from a specific pixel location
    pub fn zoom_out_at(&mut self, px: i32, py: i32) {
        self.zoom_at(px, py, 1.0 / 1.5);
    }

    /// Zoom by factor keeping the point under (px, py) fixed
    fn zoom_at(&mut self, px: i32, py: i32, factor: f64) {
        if !self.has_area() {
            self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
            return;
        }
        let (lon, lat) = self.unproject(px, py);
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);

        let (new_px, new_py) = self.project(lon, lat);
        self.pan(new_px - px, new_py - py);
    }

    /// Pixel coordinates back to geographic (lon, lat)
    pub fn unproject(&self, px: i32, py: i32) -> (f64, f64) {
        let center = mercator(self.center_lon, self.center_lat);
        let offset = DVec2::new(px as f64, py as f64) - self.half_extent();
        inverse_mercator(offset / self.scale() + center)
    }

    /// Geographic (lon, lat) to fractional pixel coordinates
    pub fn project_f(&self, lon: f64, lat: f64) -> DVec2 {
        let center = mercator(self.center_lon, self.center_lat);
        (mercator(lon, lat) - center) * self.scale() + self.half_extent()
    }

    /// Geographic (lon, lat) to pixel coordinates
    pub fn project(&self, lon: f64, lat: f64) -> (i32, i32) {
        let p = self.project_f(lon, lat);
        (p.x as i32, p.y as i32)
    }

    /// Check if a line segment might be visible (rough bounding box check)
    pub fn line_might_be_visible(&self, p1: (i32, i32), p2: (i32, i32)) -> bool {
        let min_x = p1.0.min(p2.0);
        let max_x = p1.0.max(p2.0);
        let min_y = p1.1.min(p2.1);
        let max_y = p1.1.max(p2.1);

        max_x >= 0 && min_x < self.width as i32 && max_y >= 0 && min_y < self.height as i32
    }
}
