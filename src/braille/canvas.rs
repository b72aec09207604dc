/// Paint applied to a whole character cell underneath its dots
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fill {
    /// Color band from the active scale
    pub band: usize,
    pub highlighted: bool,
}

/// Braille Unicode canvas for high-resolution terminal graphics.
/// Each character cell holds a 2x4 dot grid (U+2800..U+28FF) for outlines
/// and an optional [`Fill`] for the region painted into it.
pub struct BrailleCanvas {
    width: usize,  // Characters
    height: usize, // Characters
    dots: Vec<u8>,
    fills: Vec<Option<Fill>>,
}

impl BrailleCanvas {
    /// Create a new canvas with the given character dimensions.
    /// Effective pixel resolution: width*2 x height*4
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            dots: vec![0u8; width * height],
            fills: vec![None; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Set a dot at the given pixel coordinates.
    /// Braille dot layout per character:
    /// ```text
    /// (0,0) (1,0)   bits: 0x01 0x08
    /// (0,1) (1,1)   bits: 0x02 0x10
    /// (0,2) (1,2)   bits: 0x04 0x20
    /// (0,3) (1,3)   bits: 0x40 0x80
    /// ```
    pub fn set_pixel(&mut self, x: usize, y: usize) {
        let cx = x / 2;
        let cy = y / 4;

        if cx >= self.width || cy >= self.height {
            return;
        }

        let bit = match (x % 2, y % 4) {
            (0, 0) => 0x01,
            (1, 0) => 0x08,
            (0, 1) => 0x02,
            (1, 1) => 0x10,
            (0, 2) => 0x04,
            (1, 2) => 0x20,
            (0, 3) => 0x40,
            (1, 3) => 0x80,
            _ => 0,
        };

        self.dots[cy * self.width + cx] |= bit;
    }

    /// Set a dot using signed coordinates (ignores negative values)
    pub fn set_pixel_signed(&mut self, x: i32, y: i32) {
        if x >= 0 && y >= 0 {
            self.set_pixel(x as usize, y as usize);
        }
    }

    /// Paint a character cell; later fills replace earlier ones.
    pub fn fill_cell(&mut self, cx: usize, cy: usize, fill: Fill) {
        if cx < self.width && cy < self.height {
            self.fills[cy * self.width + cx] = Some(fill);
        }
    }

    pub fn fill_at(&self, cx: usize, cy: usize) -> Option<Fill> {
        if cx < self.width && cy < self.height {
            self.fills[cy * self.width + cx]
        } else {
            None
        }
    }

    /// Braille glyph and fill for every cell of a row
    pub fn row(&self, row: usize) -> impl Iterator<Item = (char, Option<Fill>)> + '_ {
        let range = if row < self.height {
            row * self.width..(row + 1) * self.width
        } else {
            0..0
        };
        self.dots[range.clone()]
            .iter()
            .zip(&self.fills[range])
            .map(|(&bits, &fill)| (glyph(bits), fill))
    }

    /// Convert the dot layer to a string of Braille characters
    #[cfg(test)]
    pub fn to_string(&self) -> String {
        (0..self.height)
            .map(|r| self.row(r).map(|(ch, _)| ch).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn glyph(bits: u8) -> char {
    char::from_u32(0x2800 + bits as u32).unwrap_or(' ')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_pixel() {
        let mut canvas = BrailleCanvas::new(1, 1);
        canvas.set_pixel(0, 0);
        assert_eq!(canvas.to_string(), "⠁"); // U+2801
    }

    #[test]
    fn test_all_dots() {
        let mut canvas = BrailleCanvas::new(1, 1);
        for x in 0..2 {
            for y in 0..4 {
                canvas.set_pixel(x, y);
            }
        }
        assert_eq!(canvas.to_string(), "⣿"); // U+28FF
    }

    #[test]
    fn test_out_of_bounds_ignored() {
        let mut canvas = BrailleCanvas::new(2, 1);
        canvas.set_pixel(4, 0);
        canvas.set_pixel_signed(-1, 0);
        canvas.fill_cell(5, 5, Fill { band: 1, highlighted: false });
        assert_eq!(canvas.to_string(), "\u{2800}\u{2800}");
        assert!(canvas.row(0).all(|(_, fill)| fill.is_none()));
        assert_eq!(canvas.row(3).count(), 0);
    }

    #[test]
    fn test_fill_is_per_cell() {
        let mut canvas = BrailleCanvas::new(3, 2);
        let fill = Fill { band: 2, highlighted: true };
        canvas.fill_cell(1, 1, fill);
        assert_eq!(canvas.fill_at(1, 1), Some(fill));
        assert_eq!(canvas.fill_at(1, 0), None);
        let row: Vec<_> = canvas.row(1).map(|(_, f)| f).collect();
        assert_eq!(row, vec![None, Some(fill), None]);

        canvas.fill_cell(1, 1, Fill { band: 0, highlighted: false });
        assert_eq!(canvas.fill_at(1, 1).unwrap().band, 0);
    }
}
