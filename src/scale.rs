use crate::error::{ChoroplethError, Result};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// 8-bit RGB color, written as `#rrggbb`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Linear blend, `t` clamped to [0, 1]
    pub fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }

    /// Relative luminance in [0, 1], used to pick readable text on a swatch
    pub fn luminance(self) -> f64 {
        (0.2126 * self.r as f64 + 0.7152 * self.g as f64 + 0.0722 * self.b as f64) / 255.0
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = ChoroplethError;

    fn from_str(s: &str) -> Result<Self> {
        let hex = s.trim().trim_start_matches('#');
        let invalid = || ChoroplethError::InvalidConfiguration(format!("not a #rrggbb color: {s:?}"));
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        Ok(Rgb::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

/// Ordered colors for magnitude bands; index 0 is the "no/low" color
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorRamp {
    colors: Vec<Rgb>,
}

impl ColorRamp {
    pub fn new(colors: Vec<Rgb>) -> Result<Self> {
        if colors.len() < 2 {
            return Err(ChoroplethError::InvalidConfiguration(format!(
                "color ramp needs at least 2 colors, got {}",
                colors.len()
            )));
        }
        Ok(Self { colors })
    }

    /// Parse a comma-separated list of hex colors.
    pub fn parse(list: &str) -> Result<Self> {
        let colors = list
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(Rgb::from_str)
            .collect::<Result<Vec<_>>>()?;
        Self::new(colors)
    }

    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Build a scale for `counts` over this ramp.
    pub fn build(&self, counts: &[f64]) -> Result<ColorScale> {
        build(counts, self.colors.len(), &self.colors)
    }
}

impl Default for ColorRamp {
    fn default() -> Self {
        Self {
            colors: vec![
                Rgb::new(0xff, 0xff, 0xff),
                Rgb::new(0xfe, 0xf0, 0xd9),
                Rgb::new(0xfd, 0xcc, 0x8a),
                Rgb::new(0xfc, 0x8d, 0x59),
                Rgb::new(0xe3, 0x4a, 0x33),
                Rgb::new(0xb3, 0x00, 0x00),
            ],
        }
    }
}

/// Breakpoint → color mapping plus legend labels.
///
/// `breakpoints` and `colors` always have the same length and breakpoints are
/// strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorScale {
    breakpoints: Vec<f64>,
    colors: Vec<Rgb>,
    legend_labels: Vec<String>,
}

impl ColorScale {
    /// Single stop with no legend, used when there is nothing to spread.
    fn flat(value: f64, color: Rgb) -> Self {
        Self {
            breakpoints: vec![value],
            colors: vec![color],
            legend_labels: Vec::new(),
        }
    }

    pub fn breakpoints(&self) -> &[f64] {
        &self.breakpoints
    }

    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    pub fn legend_labels(&self) -> &[String] {
        &self.legend_labels
    }

    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }

    /// Index of the last breakpoint `<= value`; 0 below the first stop.
    pub fn band_for(&self, value: f64) -> usize {
        self.breakpoints
            .partition_point(|&bp| bp <= value)
            .saturating_sub(1)
    }

    /// Step color for `value`.
    pub fn color_for(&self, value: f64) -> Rgb {
        self.colors[self.band_for(value)]
    }

    /// Linear blend between neighbouring stops, clamped at both ends.
    pub fn interpolate(&self, value: f64) -> Rgb {
        let last = self.breakpoints.len() - 1;
        if value <= self.breakpoints[0] {
            return self.colors[0];
        }
        if value >= self.breakpoints[last] {
            return self.colors[last];
        }
        let lo = self.band_for(value);
        let hi = lo + 1;
        let span = self.breakpoints[hi] - self.breakpoints[lo];
        let t = (value - self.breakpoints[lo]) / span;
        self.colors[lo].lerp(self.colors[hi], t)
    }

    /// `(color, label)` pairs for legend rendering. Empty for flat scales.
    pub fn legend_entries(&self) -> impl Iterator<Item = (Rgb, &str)> {
        self.colors
            .iter()
            .copied()
            .zip(self.legend_labels.iter().map(String::as_str))
    }

    /// Map-engine paint expression over the `count` property.
    pub fn fill_expression(&self) -> Value {
        let mut expr = vec![json!("interpolate"), json!(["linear"]), json!(["get", "count"])];
        for (bp, color) in self.breakpoints.iter().zip(&self.colors) {
            expr.push(json!(bp));
            expr.push(json!(["to-color", color.to_string()]));
        }
        Value::Array(expr)
    }
}

/// Compute quantile breakpoints for `counts` over a ramp of `ramp_size` colors.
///
/// Non-integer inputs are ignored. An empty or all-zero input yields a single
/// stop at 0 painted with `colors[1]` and no legend.
pub fn build(counts: &[f64], ramp_size: usize, colors: &[Rgb]) -> Result<ColorScale> {
    if ramp_size < 2 {
        return Err(ChoroplethError::InvalidConfiguration(format!(
            "ramp size must be at least 2, got {ramp_size}"
        )));
    }
    if colors.len() != ramp_size {
        return Err(ChoroplethError::InvalidConfiguration(format!(
            "ramp size {ramp_size} does not match {} colors",
            colors.len()
        )));
    }

    let mut sorted: Vec<f64> = counts.iter().copied().filter(|v| is_integer(*v)).collect();
    if sorted.is_empty() {
        return Ok(ColorScale::flat(0.0, colors[1]));
    }
    sorted.sort_by(f64::total_cmp);

    let min_val = 0.0;
    let max_val = sorted[sorted.len() - 1];
    if max_val == min_val {
        return Ok(ColorScale::flat(min_val, colors[1]));
    }

    let last_rank = (sorted.len() - 1) as f64;
    let mut scale = ColorScale {
        breakpoints: Vec::with_capacity(ramp_size),
        colors: Vec::with_capacity(ramp_size),
        legend_labels: Vec::with_capacity(ramp_size),
    };

    for (idx, &color) in colors.iter().enumerate() {
        // Divisor is the ramp size, so the top color samples below the maximum.
        let pos = last_rank * (idx as f64 / ramp_size as f64);
        let base = pos.floor();
        let rest = pos - base;
        let base = base as usize;

        let value = match sorted.get(base + 1) {
            Some(&next) => sorted[base] + rest * (next - sorted[base]),
            None => sorted[base],
        };
        let value = round_for_display(value);

        if scale.breakpoints.last() != Some(&value) {
            scale.breakpoints.push(value);
            scale.colors.push(color);
            scale.legend_labels.push(format_label(value));
        }
    }

    Ok(scale)
}

fn is_integer(v: f64) -> bool {
    v.is_finite() && v.fract() == 0.0
}

/// Round up to 10s between 10 and 100, to 100s above 100.
fn round_for_display(value: f64) -> f64 {
    if value > 10.0 && value < 100.0 {
        (value / 10.0).ceil() * 10.0
    } else if value > 100.0 {
        (value / 100.0).ceil() * 100.0
    } else {
        value
    }
}

fn format_label(value: f64) -> String {
    value.to_string()
}
