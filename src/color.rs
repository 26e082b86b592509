use std::collections::BTreeMap;

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use crate::data::model::DelayCause;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

fn hsl_to_color32(hue: f32, saturation: f32, lightness: f32) -> Color32 {
    let rgb: Srgb = Hsl::new(hue, saturation, lightness).into_color();
    Color32::from_rgb(
        (rgb.red * 255.0) as u8,
        (rgb.green * 255.0) as u8,
        (rgb.blue * 255.0) as u8,
    )
}

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| hsl_to_color32((i as f32 / n as f32) * 360.0, 0.75, 0.55))
        .collect()
}

/// Fixed colour per delay cause, shared by the pie and bar charts.
pub fn cause_color(cause: DelayCause) -> Color32 {
    let palette = generate_palette(DelayCause::ALL.len());
    DelayCause::ALL
        .iter()
        .position(|c| *c == cause)
        .map(|i| palette[i])
        .unwrap_or(Color32::GRAY)
}

/// Sequential scale for delay magnitude: `t` in 0..=1 runs blue → yellow → red.
pub fn magnitude_color(t: f64) -> Color32 {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    hsl_to_color32(240.0 * (1.0 - t as f32), 0.8, 0.5)
}

// ---------------------------------------------------------------------------
// Color mapping: year → Color32 for trend series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct YearColors {
    mapping: BTreeMap<i32, Color32>,
    default_color: Color32,
}

impl YearColors {
    pub fn new(years: &[i32]) -> Self {
        let mapping = years
            .iter()
            .copied()
            .zip(generate_palette(years.len()))
            .collect();
        YearColors {
            mapping,
            default_color: Color32::LIGHT_BLUE,
        }
    }

    pub fn color_for(&self, year: i32) -> Color32 {
        self.mapping
            .get(&year)
            .copied()
            .unwrap_or(self.default_color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_has_requested_size() {
        assert!(generate_palette(0).is_empty());
        assert_eq!(generate_palette(7).len(), 7);
    }

    #[test]
    fn years_get_distinct_colours() {
        let colors = YearColors::new(&[2015, 2016]);
        assert_ne!(colors.color_for(2015), colors.color_for(2016));
        assert_eq!(colors.color_for(1999), Color32::LIGHT_BLUE);
    }

    #[test]
    fn magnitude_scale_is_clamped() {
        assert_eq!(magnitude_color(-1.0), magnitude_color(0.0));
        assert_eq!(magnitude_color(5.0), magnitude_color(1.0));
        assert_eq!(magnitude_color(f64::NAN), magnitude_color(0.0));
    }
}
