//! Named sequential colour scales.
//!
//! Each scale is a list of `(position, 0xRRGGBB)` stops on `[0, 1]`; colours
//! between stops are linearly interpolated.

use std::fmt;
use std::str::FromStr;

/// An RGB triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    const fn from_hex(hex: u32) -> Self {
        Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
    }

    /// Relative luminance in `[0, 1]` (sRGB, WCAG formula).
    pub fn luminance(self) -> f64 {
        fn channel(c: u8) -> f64 {
            let c = c as f64 / 255.0;
            if c <= 0.03928 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        }
        0.2126 * channel(self.0) + 0.7152 * channel(self.1) + 0.0722 * channel(self.2)
    }

    /// Black or white, whichever reads better on top of this colour.
    pub fn contrasting_text(self) -> Rgb {
        if self.luminance() < 0.408 {
            Rgb(0xf1, 0xf1, 0xf1)
        } else {
            Rgb(0, 0, 0)
        }
    }
}

/// Colours given to successive chart series.
pub const SERIES_PALETTE: [Rgb; 7] = [
    Rgb(31, 119, 180),
    Rgb(255, 127, 14),
    Rgb(44, 160, 44),
    Rgb(214, 39, 40),
    Rgb(148, 103, 189),
    Rgb(140, 86, 75),
    Rgb(227, 119, 194),
];

pub fn series_color(idx: usize) -> Rgb {
    SERIES_PALETTE[idx % SERIES_PALETTE.len()]
}

impl From<Rgb> for ratatui::style::Color {
    fn from(c: Rgb) -> Self {
        ratatui::style::Color::Rgb(c.0, c.1, c.2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Colormap {
    Viridis,
    Plasma,
    Inferno,
    Magma,
    Cividis,
    Greys,
    Blues,
    Greens,
    Reds,
    Hot,
    Jet,
}

const VIRIDIS: &[(f64, u32)] = &[
    (0.0, 0x440154),
    (0.125, 0x472c7a),
    (0.25, 0x3b518b),
    (0.375, 0x2c718e),
    (0.5, 0x21908d),
    (0.625, 0x27ad81),
    (0.75, 0x5cc863),
    (0.875, 0xaadc32),
    (1.0, 0xfde725),
];

const PLASMA: &[(f64, u32)] = &[
    (0.0, 0x0d0887),
    (0.125, 0x4c02a1),
    (0.25, 0x7e03a8),
    (0.375, 0xa92395),
    (0.5, 0xcc4778),
    (0.625, 0xe56b5d),
    (0.75, 0xf89441),
    (0.875, 0xfdc328),
    (1.0, 0xf0f921),
];

const INFERNO: &[(f64, u32)] = &[
    (0.0, 0x000004),
    (0.125, 0x1f0c48),
    (0.25, 0x550f6d),
    (0.375, 0x88226a),
    (0.5, 0xba3655),
    (0.625, 0xe35933),
    (0.75, 0xf98e09),
    (0.875, 0xf9cb35),
    (1.0, 0xfcffa4),
];

const MAGMA: &[(f64, u32)] = &[
    (0.0, 0x000004),
    (0.125, 0x1c1044),
    (0.25, 0x4f127b),
    (0.375, 0x812581),
    (0.5, 0xb5367a),
    (0.625, 0xe55064),
    (0.75, 0xfb8761),
    (0.875, 0xfec287),
    (1.0, 0xfcfdbf),
];

const CIVIDIS: &[(f64, u32)] = &[
    (0.0, 0x00224e),
    (0.125, 0x123570),
    (0.25, 0x3b496c),
    (0.375, 0x575d6d),
    (0.5, 0x707173),
    (0.625, 0x8a8678),
    (0.75, 0xa59c74),
    (0.875, 0xc3b369),
    (1.0, 0xfee838),
];

const GREYS: &[(f64, u32)] = &[
    (0.0, 0xffffff),
    (0.125, 0xf0f0f0),
    (0.25, 0xd9d9d9),
    (0.375, 0xbdbdbd),
    (0.5, 0x969696),
    (0.625, 0x737373),
    (0.75, 0x525252),
    (0.875, 0x252525),
    (1.0, 0x000000),
];

const BLUES: &[(f64, u32)] = &[
    (0.0, 0xf7fbff),
    (0.125, 0xdeebf7),
    (0.25, 0xc6dbef),
    (0.375, 0x9ecae1),
    (0.5, 0x6baed6),
    (0.625, 0x4292c6),
    (0.75, 0x2171b5),
    (0.875, 0x08519c),
    (1.0, 0x08306b),
];

const GREENS: &[(f64, u32)] = &[
    (0.0, 0xf7fcf5),
    (0.125, 0xe5f5e0),
    (0.25, 0xc7e9c0),
    (0.375, 0xa1d99b),
    (0.5, 0x74c476),
    (0.625, 0x41ab5d),
    (0.75, 0x238b45),
    (0.875, 0x006d2c),
    (1.0, 0x00441b),
];

const REDS: &[(f64, u32)] = &[
    (0.0, 0xfff5f0),
    (0.125, 0xfee0d2),
    (0.25, 0xfcbba1),
    (0.375, 0xfc9272),
    (0.5, 0xfb6a4a),
    (0.625, 0xef3b2c),
    (0.75, 0xcb181d),
    (0.875, 0xa50f15),
    (1.0, 0x67000d),
];

const HOT: &[(f64, u32)] = &[
    (0.0, 0x000000),
    (0.3, 0xe60000),
    (0.6, 0xffd200),
    (1.0, 0xffffff),
];

const JET: &[(f64, u32)] = &[
    (0.0, 0x000083),
    (0.125, 0x003caa),
    (0.375, 0x05ffff),
    (0.625, 0xffff00),
    (0.875, 0xfa0000),
    (1.0, 0x800000),
];

impl Colormap {
    pub const ALL: [Colormap; 11] = [
        Colormap::Viridis,
        Colormap::Plasma,
        Colormap::Inferno,
        Colormap::Magma,
        Colormap::Cividis,
        Colormap::Greys,
        Colormap::Blues,
        Colormap::Greens,
        Colormap::Reds,
        Colormap::Hot,
        Colormap::Jet,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Colormap::Viridis => "viridis",
            Colormap::Plasma => "plasma",
            Colormap::Inferno => "inferno",
            Colormap::Magma => "magma",
            Colormap::Cividis => "cividis",
            Colormap::Greys => "greys",
            Colormap::Blues => "blues",
            Colormap::Greens => "greens",
            Colormap::Reds => "reds",
            Colormap::Hot => "hot",
            Colormap::Jet => "jet",
        }
    }

    fn stops(self) -> &'static [(f64, u32)] {
        match self {
            Colormap::Viridis => VIRIDIS,
            Colormap::Plasma => PLASMA,
            Colormap::Inferno => INFERNO,
            Colormap::Magma => MAGMA,
            Colormap::Cividis => CIVIDIS,
            Colormap::Greys => GREYS,
            Colormap::Blues => BLUES,
            Colormap::Greens => GREENS,
            Colormap::Reds => REDS,
            Colormap::Hot => HOT,
            Colormap::Jet => JET,
        }
    }

    /// Colour at `t` in `[0, 1]`; values outside are clamped, NaN maps to 0.
    pub fn sample(self, t: f64) -> Rgb {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let stops = self.stops();
        let upper = stops
            .iter()
            .position(|(p, _)| *p >= t)
            .unwrap_or(stops.len() - 1);
        if upper == 0 {
            return Rgb::from_hex(stops[0].1);
        }
        let (p0, c0) = stops[upper - 1];
        let (p1, c1) = stops[upper];
        let f = if p1 > p0 { (t - p0) / (p1 - p0) } else { 0.0 };
        let (a, b) = (Rgb::from_hex(c0), Rgb::from_hex(c1));
        let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * f).round() as u8;
        Rgb(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
    }

    /// Like [`Colormap::sample`], optionally running the scale backwards.
    pub fn sample_directed(self, t: f64, reversed: bool) -> Rgb {
        self.sample(if reversed { 1.0 - t } else { t })
    }
}

impl fmt::Display for Colormap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Colormap {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Colormap::ALL
            .into_iter()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| {
                format!(
                    "unknown colormap '{}' (expected one of: {})",
                    s,
                    Colormap::ALL.map(|c| c.as_str()).join(", ")
                )
            })
    }
}

/// Map `value` from `[min, max]` onto `[0, 1]`. A degenerate range maps to 0.5.
pub fn normalize(value: f64, min: f64, max: f64) -> f64 {
    if max > min {
        (value - min) / (max - min)
    } else {
        0.5
    }
}
