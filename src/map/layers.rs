/// Visual parameters of the three map overlays
///
/// Value domains and color ramps are fixed; tiles are rendered server side
/// with these ranges and the legend in the map view uses the same ramps.

use iced::Color;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerStyle {
    /// Layer name as shown in the map's layer control
    pub name: &'static str,
    pub min: f64,
    pub max: f64,
    /// CSS color names, low to high
    pub palette: &'static [&'static str],
    pub opacity: f32,
}

pub const NDVI_STYLE: LayerStyle = LayerStyle {
    name: "NDVI",
    min: 0.0,
    max: 1.0,
    palette: &["white", "yellow", "green"],
    opacity: 0.8,
};

pub const NO2_STYLE: LayerStyle = LayerStyle {
    name: "NO2 Concentration",
    min: 0.0,
    max: 0.0002,
    palette: &["green", "yellow", "red"],
    opacity: 0.6,
};

pub const THERMAL_STYLE: LayerStyle = LayerStyle {
    name: "Land Surface Temperature",
    min: 500.0,
    max: 4000.0,
    palette: &["blue", "lightblue", "green", "yellow", "orange", "red"],
    opacity: 0.5,
};

/// All overlays, in drawing order
pub const ALL_STYLES: [LayerStyle; 3] = [NDVI_STYLE, NO2_STYLE, THERMAL_STYLE];

/// RGB of the CSS named colors used by the palettes
fn named_rgb(name: &str) -> Option<[u8; 3]> {
    let rgb = match name {
        "white" => [0xff, 0xff, 0xff],
        "yellow" => [0xff, 0xff, 0x00],
        "green" => [0x00, 0x80, 0x00],
        "red" => [0xff, 0x00, 0x00],
        "blue" => [0x00, 0x00, 0xff],
        "lightblue" => [0xad, 0xd8, 0xe6],
        "orange" => [0xff, 0xa5, 0x00],
        _ => return None,
    };
    Some(rgb)
}

impl LayerStyle {
    fn rgb(&self) -> impl Iterator<Item = [u8; 3]> + '_ {
        self.palette.iter().map(|name| named_rgb(name).unwrap_or([0, 0, 0]))
    }

    /// Palette as lowercase hex without `#`, the form the tile service expects
    pub fn palette_hex(&self) -> Vec<String> {
        self.rgb()
            .map(|[r, g, b]| format!("{r:02x}{g:02x}{b:02x}"))
            .collect()
    }

    /// Color at position `t` in 0..=1 along the ramp, linearly interpolated
    pub fn color_at(&self, t: f32) -> Color {
        let stops: Vec<[u8; 3]> = self.rgb().collect();
        if stops.len() < 2 {
            return stops
                .first()
                .map(|[r, g, b]| Color::from_rgb8(*r, *g, *b))
                .unwrap_or(Color::BLACK);
        }

        let scaled = t.clamp(0.0, 1.0) * (stops.len() - 1) as f32;
        let i = (scaled.floor() as usize).min(stops.len() - 2);
        let frac = scaled - i as f32;
        let lerp = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * frac) / 255.0;
        let (a, b) = (stops[i], stops[i + 1]);
        Color::from_rgb(lerp(a[0], b[0]), lerp(a[1], b[1]), lerp(a[2], b[2]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palettes_are_known_colors() {
        for style in ALL_STYLES {
            for name in style.palette {
                assert!(named_rgb(name).is_some(), "{} uses unknown color {name}", style.name);
            }
            assert!(style.min < style.max);
        }
    }

    #[test]
    fn test_palette_hex() {
        assert_eq!(NO2_STYLE.palette_hex(), vec!["008000", "ffff00", "ff0000"]);
        assert_eq!(THERMAL_STYLE.palette_hex()[1], "add8e6");
    }

    #[test]
    fn test_color_ramp_endpoints() {
        assert_eq!(NDVI_STYLE.color_at(0.0), Color::from_rgb(1.0, 1.0, 1.0));
        assert_eq!(NDVI_STYLE.color_at(1.0), Color::from_rgb(0.0, 128.0 / 255.0, 0.0));
        // midpoint of a three stop ramp is the middle stop
        assert_eq!(NDVI_STYLE.color_at(0.5), Color::from_rgb(1.0, 1.0, 0.0));
        // out of range values clamp
        assert_eq!(NDVI_STYLE.color_at(7.0), NDVI_STYLE.color_at(1.0));
    }
}
