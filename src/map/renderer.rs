use crate::braille::{BrailleCanvas, Fill};
use crate::map::geometry::{fill_rings, point_in_rings, stroke_rings};
use crate::map::projection::{Bounds, Viewport};
use crate::map::selection::SelectionSet;
use geojson::{Geometry, Value};
use glam::DVec2;
use rayon::prelude::*;

/// A closed ring of (lon, lat) points
pub type Ring = Vec<DVec2>;

/// Polygon rings of one feature; empty for point/line/missing geometry
struct Region {
    rings: Vec<Ring>,
    bounds: Option<Bounds>,
}

impl Region {
    fn new(rings: Vec<Ring>) -> Self {
        let bounds = rings
            .iter()
            .flatten()
            .fold(None, |acc: Option<Bounds>, &p| match acc {
                Some(mut b) => {
                    b.extend(p);
                    Some(b)
                }
                None => Some(Bounds::from_point(p)),
            });
        Self { rings, bounds }
    }
}

/// Display settings for map layers
#[derive(Clone)]
pub struct DisplaySettings {
    pub show_fill: bool,
    pub show_outlines: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            show_fill: true,
            show_outlines: true,
        }
    }
}

/// Paints feature polygons by color band. Region index == merged feature id.
pub struct ChoroplethRenderer {
    regions: Vec<Region>,
    pub settings: DisplaySettings,
}

impl ChoroplethRenderer {
    pub fn new() -> Self {
        Self {
            regions: Vec::new(),
            settings: DisplaySettings::default(),
        }
    }

    /// One region per geometry, in feature order.
    pub fn from_geometries<'a, I>(geometries: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a Geometry>>,
    {
        let mut renderer = Self::new();
        for geometry in geometries {
            renderer.push_geometry(geometry);
        }
        renderer
    }

    pub fn push_geometry(&mut self, geometry: Option<&Geometry>) {
        let mut rings = Vec::new();
        if let Some(geometry) = geometry {
            collect_rings(geometry, &mut rings);
        }
        self.regions.push(Region::new(rings));
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Check if any polygon data is loaded
    pub fn has_data(&self) -> bool {
        self.regions.iter().any(|r| !r.rings.is_empty())
    }

    /// Extent of every polygon
    pub fn bounds(&self) -> Option<Bounds> {
        self.regions
            .iter()
            .filter_map(|r| r.bounds)
            .reduce(Bounds::union)
    }

    /// Render fills and outlines; `bands[id]` picks each feature's color.
    pub fn render(
        &self,
        width: usize,
        height: usize,
        viewport: &Viewport,
        bands: &[usize],
        selection: &SelectionSet,
    ) -> BrailleCanvas {
        let mut canvas = BrailleCanvas::new(width, height);

        let projected: Vec<Option<Vec<Ring>>> = self
            .regions
            .par_iter()
            .map(|region| {
                let bounds = region.bounds?;
                let nw = viewport.project(bounds.min.x, bounds.max.y);
                let se = viewport.project(bounds.max.x, bounds.min.y);
                if !viewport.line_might_be_visible(nw, se) {
                    return None;
                }
                Some(
                    region
                        .rings
                        .iter()
                        .map(|ring| ring.iter().map(|p| viewport.project_f(p.x, p.y)).collect())
                        .collect(),
                )
            })
            .collect();

        if self.settings.show_fill {
            // Highlighted regions last so neighbours don't paint over them
            let order = projected
                .iter()
                .enumerate()
                .filter(|(id, _)| !selection.contains(*id))
                .chain(projected.iter().enumerate().filter(|(id, _)| selection.contains(*id)));
            for (id, rings) in order {
                if let Some(rings) = rings {
                    let fill = Fill {
                        band: bands.get(id).copied().unwrap_or(0),
                        highlighted: selection.contains(id),
                    };
                    fill_rings(&mut canvas, rings, fill);
                }
            }
        }

        if self.settings.show_outlines {
            for rings in projected.iter().flatten() {
                stroke_rings(&mut canvas, rings);
            }
        }

        canvas
    }

    /// Topmost feature containing (lon, lat)
    pub fn feature_at(&self, lon: f64, lat: f64) -> Option<usize> {
        let p = DVec2::new(lon, lat);
        self.regions
            .iter()
            .enumerate()
            .rev()
            .find(|(_, region)| {
                region.bounds.is_some_and(|b| b.contains(p)) && point_in_rings(p, &region.rings)
            })
            .map(|(id, _)| id)
    }

    pub fn toggle_fill(&mut self) {
        self.settings.show_fill = !self.settings.show_fill;
    }

    pub fn toggle_outlines(&mut self) {
        self.settings.show_outlines = !self.settings.show_outlines;
    }
}

impl Default for ChoroplethRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn to_ring(coords: &[Vec<f64>]) -> Ring {
    coords
        .iter()
        .filter(|c| c.len() >= 2)
        .map(|c| DVec2::new(c[0], c[1]))
        .collect()
}

/// Gather polygon rings (exteriors and holes) from any geometry
fn collect_rings(geometry: &Geometry, rings: &mut Vec<Ring>) {
    match &geometry.value {
        Value::Polygon(polygon) => {
            rings.extend(polygon.iter().map(|r| to_ring(r)));
        }
        Value::MultiPolygon(polygons) => {
            for polygon in polygons {
                rings.extend(polygon.iter().map(|r| to_ring(r)));
            }
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                collect_rings(g, rings);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(w: f64, s: f64, e: f64, n: f64) -> Geometry {
        Geometry::new(Value::Polygon(vec![vec![
            vec![w, s],
            vec![e, s],
            vec![e, n],
            vec![w, n],
            vec![w, s],
        ]]))
    }

    fn renderer() -> ChoroplethRenderer {
        let a = rect(0.0, 0.0, 10.0, 10.0);
        let b = rect(10.0, 0.0, 20.0, 10.0);
        let point = Geometry::new(Value::Point(vec![5.0, 5.0]));
        ChoroplethRenderer::from_geometries([Some(&a), Some(&b), None, Some(&point)])
    }

    #[test]
    fn keeps_one_region_per_feature() {
        let r = renderer();
        assert_eq!(r.len(), 4);
        assert!(r.has_data());
        let bounds = r.bounds().unwrap();
        assert_eq!(bounds.min, DVec2::new(0.0, 0.0));
        assert_eq!(bounds.max, DVec2::new(20.0, 10.0));
    }

    #[test]
    fn hit_test_finds_feature() {
        let r = renderer();
        assert_eq!(r.feature_at(5.0, 5.0), Some(0));
        assert_eq!(r.feature_at(15.0, 2.0), Some(1));
        assert_eq!(r.feature_at(25.0, 2.0), None);
    }

    #[test]
    fn render_paints_bands_and_highlight() {
        let r = renderer();
        let mut vp = Viewport::world(80, 40);
        vp.fit_bounds(r.bounds().unwrap());
        let mut selection = SelectionSet::new();
        selection.hover(Some(1));

        let canvas = r.render(40, 10, &vp, &[2, 4], &selection);
        let fills: Vec<Fill> = (0..canvas.height())
            .flat_map(|row| canvas.row(row).filter_map(|(_, f)| f).collect::<Vec<_>>())
            .collect();
        assert!(fills.iter().any(|f| f.band == 2 && !f.highlighted));
        assert!(fills.iter().any(|f| f.band == 4 && f.highlighted));
    }

    #[test]
    fn outlines_survive_zooming_past_fit() {
        let wide = rect(0.0, 0.0, 40.0, 5.0);
        let mut r = ChoroplethRenderer::from_geometries([Some(&wide)]);
        r.toggle_fill();
        let mut vp = Viewport::world(80, 40);
        vp.fit_bounds(r.bounds().unwrap());
        vp.zoom_in();

        // Sides are now off screen, top and bottom edges still cross it
        assert!(vp.project(0.0, 2.5).0 < 0);
        assert!(vp.project(40.0, 2.5).0 >= 80);
        let canvas = r.render(40, 10, &vp, &[0], &SelectionSet::new());
        for lat in [0.0, 5.0] {
            let (_, y) = vp.project(20.0, lat);
            assert!((0..40).contains(&y), "edge at lat {lat} left the canvas");
            let row = y as usize / 4;
            assert!(
                canvas.row(row).all(|(ch, _)| ch != '\u{2800}'),
                "edge at lat {lat} not drawn across row {row}"
            );
        }
    }

    #[test]
    fn fill_can_be_toggled_off() {
        let mut r = renderer();
        r.toggle_fill();
        let mut vp = Viewport::world(80, 40);
        vp.fit_bounds(r.bounds().unwrap());
        let canvas = r.render(40, 10, &vp, &[1, 1], &SelectionSet::new());
        assert!((0..canvas.height()).all(|row| canvas.row(row).all(|(_, f)| f.is_none())));
    }
}
