use crate::braille::{BrailleCanvas, Fill};
use glam::DVec2;

/// Draw a line using Bresenham's algorithm
pub fn draw_line(canvas: &mut BrailleCanvas, x0: i32, y0: i32, x1: i32, y1: i32) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    let mut x = x0;
    let mut y = y0;

    loop {
        canvas.set_pixel_signed(x, y);

        if x == x1 && y == y1 {
            break;
        }

        let e2 = 2 * err;

        if e2 >= dy {
            if x == x1 {
                break;
            }
            err += dy;
            x += sx;
        }

        if e2 <= dx {
            if y == y1 {
                break;
            }
            err += dx;
            y += sy;
        }
    }
}

/// Fill every cell whose center lies inside `rings` (pixel space, even-odd).
///
/// Holes and multipolygon parts are just more rings.
pub fn fill_rings(canvas: &mut BrailleCanvas, rings: &[Vec<DVec2>], fill: Fill) {
    let Some((min, max)) = pixel_extent(rings) else {
        return;
    };
    let rows = canvas.height();
    let cols = canvas.width();

    // Cell (cx, cy) is sampled at pixel (2cx + 1, 4cy + 2).
    let first_row = ((min.y - 2.0) / 4.0).ceil().max(0.0) as usize;
    let last_row = ((max.y - 2.0) / 4.0).floor().min(rows as f64 - 1.0);
    if last_row < 0.0 {
        return;
    }

    let mut crossings = Vec::new();
    for cy in first_row..=last_row as usize {
        let y = cy as f64 * 4.0 + 2.0;
        crossings.clear();
        for ring in rings {
            for edge in ring.windows(2) {
                let (a, b) = (edge[0], edge[1]);
                if (a.y > y) != (b.y > y) {
                    crossings.push(a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y));
                }
            }
        }
        crossings.sort_by(f64::total_cmp);

        for span in crossings.chunks_exact(2) {
            let start = ((span[0] - 1.0) / 2.0).ceil().max(0.0);
            let end = ((span[1] - 1.0) / 2.0).ceil().min(cols as f64);
            if end <= start {
                continue;
            }
            for cx in start as usize..end as usize {
                canvas.fill_cell(cx, cy, fill);
            }
        }
    }
}

/// Stroke ring outlines, each edge clipped to the canvas first
pub fn stroke_rings(canvas: &mut BrailleCanvas, rings: &[Vec<DVec2>]) {
    let max = DVec2::new(
        (canvas.width() * 2) as f64 - 1.0,
        (canvas.height() * 4) as f64 - 1.0,
    );
    for ring in rings {
        for edge in ring.windows(2) {
            if let Some((a, b)) = clip_segment(edge[0], edge[1], max) {
                draw_line(canvas, a.x as i32, a.y as i32, b.x as i32, b.y as i32);
            }
        }
    }
}

/// Liang-Barsky clip of segment `a`-`b` to the box `[0, max]`
fn clip_segment(a: DVec2, b: DVec2, max: DVec2) -> Option<(DVec2, DVec2)> {
    if !a.is_finite() || !b.is_finite() || max.x < 0.0 || max.y < 0.0 {
        return None;
    }
    let d = b - a;
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    for (p, q) in [(-d.x, a.x), (d.x, max.x - a.x), (-d.y, a.y), (d.y, max.y - a.y)] {
        if p == 0.0 {
            // Parallel to this edge of the box
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            if r > t1 {
                return None;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return None;
            }
            t1 = t1.min(r);
        }
    }
    Some((a + d * t0, a + d * t1))
}

/// Even-odd point-in-polygon over all rings
pub fn point_in_rings(p: DVec2, rings: &[Vec<DVec2>]) -> bool {
    let mut inside = false;
    for ring in rings {
        for edge in ring.windows(2) {
            let (a, b) = (edge[0], edge[1]);
            if (a.y > p.y) != (b.y > p.y) {
                let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if p.x < x {
                    inside = !inside;
                }
            }
        }
    }
    inside
}

fn pixel_extent(rings: &[Vec<DVec2>]) -> Option<(DVec2, DVec2)> {
    let mut points = rings.iter().flatten();
    let first = *points.next()?;
    Some(points.fold((first, first), |(lo, hi), p| (lo.min(*p), hi.max(*p))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<DVec2> {
        vec![
            DVec2::new(x0, y0),
            DVec2::new(x1, y0),
            DVec2::new(x1, y1),
            DVec2::new(x0, y1),
            DVec2::new(x0, y0),
        ]
    }

    const FILL: Fill = Fill { band: 3, highlighted: false };

    #[test]
    fn test_horizontal_line() {
        let mut canvas = BrailleCanvas::new(5, 1);
        draw_line(&mut canvas, 0, 0, 9, 0);
        assert_eq!(canvas.to_string(), "⠉⠉⠉⠉⠉");
    }

    #[test]
    fn test_vertical_line() {
        let mut canvas = BrailleCanvas::new(1, 2);
        draw_line(&mut canvas, 0, 0, 0, 7);
        assert_eq!(canvas.to_string(), "⡇\n⡇");
    }

    #[test]
    fn fills_cells_inside_square() {
        // 4x3 cells = 8x12 pixels; square covers pixels x 2..6, y 4..12
        let mut canvas = BrailleCanvas::new(4, 3);
        fill_rings(&mut canvas, &[square(2.0, 4.0, 6.0, 12.0)], FILL);
        for cy in 0..3 {
            for cx in 0..4 {
                let expected = (1..3).contains(&cx) && (1..3).contains(&cy);
                assert_eq!(canvas.fill_at(cx, cy).is_some(), expected, "cell ({cx}, {cy})");
            }
        }
    }

    #[test]
    fn holes_stay_empty() {
        let mut canvas = BrailleCanvas::new(6, 3);
        let outer = square(0.0, 0.0, 12.0, 12.0);
        let hole = square(4.0, 4.0, 8.0, 8.0);
        fill_rings(&mut canvas, &[outer, hole], FILL);
        assert!(canvas.fill_at(0, 1).is_some());
        assert!(canvas.fill_at(2, 1).is_none());
        assert!(canvas.fill_at(5, 1).is_some());
    }

    #[test]
    fn offscreen_polygon_is_clipped() {
        let mut canvas = BrailleCanvas::new(2, 2);
        fill_rings(&mut canvas, &[square(-50.0, -50.0, -10.0, -10.0)], FILL);
        fill_rings(&mut canvas, &[square(-10.0, -10.0, 100.0, 100.0)], FILL);
        assert!((0..2).all(|cy| canvas.row(cy).all(|(_, f)| f == Some(FILL))));
    }

    #[test]
    fn long_edges_are_clipped_not_dropped() {
        // 10x2 cells = 20x8 pixels; top and bottom edges run far past both sides
        let mut canvas = BrailleCanvas::new(10, 2);
        stroke_rings(&mut canvas, &[square(-40.0, 1.0, 120.0, 6.0)]);
        assert!(canvas.row(0).all(|(ch, _)| ch != '\u{2800}'));
        assert!(canvas.row(1).all(|(ch, _)| ch != '\u{2800}'));
    }

    #[test]
    fn clip_segment_cases() {
        let max = DVec2::new(19.0, 7.0);
        let (a, b) = clip_segment(DVec2::new(-10.0, 3.0), DVec2::new(30.0, 3.0), max).unwrap();
        assert!(a.distance(DVec2::new(0.0, 3.0)) < 1e-9);
        assert!(b.distance(DVec2::new(19.0, 3.0)) < 1e-9);
        assert!(clip_segment(DVec2::new(-10.0, -1.0), DVec2::new(30.0, -1.0), max).is_none());
        assert!(clip_segment(DVec2::new(25.0, 0.0), DVec2::new(30.0, 7.0), max).is_none());
        assert!(clip_segment(DVec2::new(f64::NAN, 0.0), DVec2::new(3.0, 3.0), max).is_none());
        assert!(clip_segment(DVec2::ZERO, DVec2::ONE, DVec2::splat(-1.0)).is_none());
    }

    #[test]
    fn point_in_polygon() {
        let rings = [square(0.0, 0.0, 10.0, 10.0), square(3.0, 3.0, 6.0, 6.0)];
        assert!(point_in_rings(DVec2::new(1.0, 1.0), &rings));
        assert!(!point_in_rings(DVec2::new(4.0, 4.0), &rings));
        assert!(!point_in_rings(DVec2::new(11.0, 1.0), &rings));
    }
}
