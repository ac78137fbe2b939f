//! Display and chart options, with the ranges and defaults the forms enforce.

use crate::colormap::Colormap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionsError {
    #[error("bin count {0} is outside [{min}, {max}]", min = BinCount::MIN, max = BinCount::MAX)]
    BinCount(u32),
    #[error("figure height {0} is outside [{min}, {max}]", min = FigureHeight::MIN, max = FigureHeight::MAX)]
    FigureHeight(u32),
    #[error("unknown {kind} '{value}' (expected one of: {expected})")]
    UnknownChoice {
        kind: &'static str,
        value: String,
        expected: String,
    },
}

/// Declares a closed set of user choices with a stable text form.
macro_rules! choice {
    ($(#[$meta:meta])* $name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub enum $name {
            #[default]
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// The next choice, wrapping around.
            pub fn cycle(self) -> Self {
                let i = Self::ALL.iter().position(|c| *c == self).unwrap_or(0);
                Self::ALL[(i + 1) % Self::ALL.len()]
            }

            pub fn cycle_back(self) -> Self {
                let i = Self::ALL.iter().position(|c| *c == self).unwrap_or(0);
                Self::ALL[(i + Self::ALL.len() - 1) % Self::ALL.len()]
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = OptionsError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|c| c.as_str().eq_ignore_ascii_case(s))
                    .ok_or_else(|| OptionsError::UnknownChoice {
                        kind: $kind,
                        value: s.to_string(),
                        expected: Self::ALL
                            .iter()
                            .map(|c| c.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    })
            }
        }
    };
}

choice!(
    /// Bin normalisation of a histogram.
    Normalization, "normalization", {
        None => "None",
        Percent => "percent",
        Probability => "probability",
        Density => "density",
        ProbabilityDensity => "probability density",
    }
);

choice!(
    /// Distribution summary drawn above a histogram.
    Marginal, "marginal", {
        Box => "box",
        Violin => "violin",
        Rug => "rug",
    }
);

choice!(
    ScatterMode, "scatter mode", {
        Lines => "lines",
        Markers => "markers",
        LinesMarkers => "lines+markers",
    }
);

choice!(
    /// How a density contour is coloured.
    ContourStyle, "contour style", {
        Fill => "fill",
        Heatmap => "heatmap",
        Lines => "lines",
        None => "none",
    }
);

choice!(
    /// Background gradient applied to numeric table columns.
    TableColormap, "table colormap", {
        None => "None",
        Viridis => "viridis",
        Plasma => "plasma",
        Inferno => "inferno",
        Magma => "magma",
        Cividis => "cividis",
    }
);

choice!(
    ScaleDirection, "colormap scale", {
        Classic => "Classic",
        Reversed => "Reversed",
    }
);

impl TableColormap {
    pub fn colormap(self) -> Option<Colormap> {
        match self {
            TableColormap::None => None,
            TableColormap::Viridis => Some(Colormap::Viridis),
            TableColormap::Plasma => Some(Colormap::Plasma),
            TableColormap::Inferno => Some(Colormap::Inferno),
            TableColormap::Magma => Some(Colormap::Magma),
            TableColormap::Cividis => Some(Colormap::Cividis),
        }
    }
}

impl Normalization {
    /// Scale a raw bin count. `total` is the number of samples, `width` the bin width.
    pub fn apply(self, count: f64, total: f64, width: f64) -> f64 {
        let safe = |d: f64| if d > 0.0 { d } else { 1.0 };
        match self {
            Normalization::None => count,
            Normalization::Percent => 100.0 * count / safe(total),
            Normalization::Probability => count / safe(total),
            Normalization::Density => count / safe(width),
            Normalization::ProbabilityDensity => count / (safe(total) * safe(width)),
        }
    }

    pub fn axis_label(self) -> &'static str {
        match self {
            Normalization::None => "count",
            Normalization::Percent => "percent",
            Normalization::Probability => "probability",
            Normalization::Density => "density",
            Normalization::ProbabilityDensity => "probability density",
        }
    }
}

/// Colour scale choice for density plots: the renderer default or a named scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorScale {
    #[default]
    Default,
    Named(Colormap),
}

impl ColorScale {
    pub fn all() -> Vec<ColorScale> {
        std::iter::once(ColorScale::Default)
            .chain(Colormap::ALL.into_iter().map(ColorScale::Named))
            .collect()
    }

    pub fn colormap(self) -> Colormap {
        match self {
            ColorScale::Default => Colormap::Plasma,
            ColorScale::Named(c) => c,
        }
    }

    pub fn cycle(self) -> Self {
        let all = Self::all();
        let i = all.iter().position(|c| *c == self).unwrap_or(0);
        all[(i + 1) % all.len()]
    }

    pub fn cycle_back(self) -> Self {
        let all = Self::all();
        let i = all.iter().position(|c| *c == self).unwrap_or(0);
        all[(i + all.len() - 1) % all.len()]
    }
}

impl fmt::Display for ColorScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorScale::Default => f.write_str("Default"),
            ColorScale::Named(c) => {
                let name = c.as_str();
                let mut chars = name.chars();
                match chars.next() {
                    Some(first) => write!(f, "{}{}", first.to_ascii_uppercase(), chars.as_str()),
                    None => Ok(()),
                }
            }
        }
    }
}

impl FromStr for ColorScale {
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("default") {
            return Ok(ColorScale::Default);
        }
        s.parse::<Colormap>()
            .map(ColorScale::Named)
            .map_err(|_| OptionsError::UnknownChoice {
                kind: "color scale",
                value: s.trim().to_string(),
                expected: Self::all()
                    .iter()
                    .map(|c| c.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/// Number of histogram bins, always within `[MIN, MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinCount(u32);

impl BinCount {
    pub const MIN: u32 = 5;
    pub const MAX: u32 = 1000;
    pub const DEFAULT: u32 = 100;
    pub const STEP: u32 = 25;

    pub fn new(n: u32) -> Result<Self, OptionsError> {
        if (Self::MIN..=Self::MAX).contains(&n) {
            Ok(Self(n))
        } else {
            Err(OptionsError::BinCount(n))
        }
    }

    pub fn clamped(n: u32) -> Self {
        Self(n.clamp(Self::MIN, Self::MAX))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn increment(self) -> Self {
        Self::clamped(self.0.saturating_add(Self::STEP))
    }

    pub fn decrement(self) -> Self {
        Self::clamped(self.0.saturating_sub(Self::STEP))
    }
}

impl Default for BinCount {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

/// Figure height in pixels for exported charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FigureHeight(u32);

impl FigureHeight {
    pub const MIN: u32 = 200;
    pub const MAX: u32 = 1450;
    pub const DEFAULT: u32 = 700;
    pub const STEP: u32 = 50;

    pub fn new(px: u32) -> Result<Self, OptionsError> {
        if (Self::MIN..=Self::MAX).contains(&px) {
            Ok(Self(px))
        } else {
            Err(OptionsError::FigureHeight(px))
        }
    }

    pub fn clamped(px: u32) -> Self {
        Self(px.clamp(Self::MIN, Self::MAX))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn increment(self) -> Self {
        Self::clamped(self.0.saturating_add(Self::STEP))
    }

    pub fn decrement(self) -> Self {
        Self::clamped(self.0.saturating_sub(Self::STEP))
    }
}

impl Default for FigureHeight {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

/// Which optional views are shown. Edited directly, not through a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayOptions {
    pub show_headers: bool,
    pub show_table: bool,
    pub table_colormap: TableColormap,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            show_headers: false,
            show_table: true,
            table_colormap: TableColormap::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScatterOptions {
    pub x: Option<String>,
    pub y: Vec<String>,
    pub err_x: Vec<String>,
    pub err_y: Vec<String>,
    pub mode: ScatterMode,
    pub height: FigureHeight,
}

/// A plotted column with the error-bar columns assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorBarPair {
    pub y: String,
    pub err_x: Option<String>,
    pub err_y: Option<String>,
}

impl ScatterOptions {
    /// Pair error-bar columns with plotted columns by position.
    ///
    /// Returns a warning when a non-empty error list does not have exactly one
    /// entry per plotted column; plotted columns past the shorter list get no
    /// error bars and surplus error columns are ignored.
    pub fn error_bar_pairs(&self) -> (Vec<ErrorBarPair>, Option<String>) {
        let mismatched = |errs: &[String]| !errs.is_empty() && errs.len() != self.y.len();
        let warning = (mismatched(&self.err_x) || mismatched(&self.err_y)).then(|| {
            format!(
                "{} columns plotted but {} horizontal and {} vertical error-bar columns given; \
                 some columns are plotted without error bars",
                self.y.len(),
                self.err_x.len(),
                self.err_y.len()
            )
        });
        let pairs = self
            .y
            .iter()
            .enumerate()
            .map(|(i, y)| ErrorBarPair {
                y: y.clone(),
                err_x: self.err_x.get(i).cloned(),
                err_y: self.err_y.get(i).cloned(),
            })
            .collect();
        (pairs, warning)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HistogramOptions {
    pub columns: Vec<String>,
    pub marginal: Marginal,
    pub normalization: Normalization,
    pub bins: BinCount,
    pub height: FigureHeight,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DensityOptions {
    pub x: Option<String>,
    pub y: Option<String>,
    pub style: ContourStyle,
    pub scale: ColorScale,
    pub direction: ScaleDirection,
    pub height: FigureHeight,
}

impl DensityOptions {
    pub fn reversed(&self) -> bool {
        self.direction == ScaleDirection::Reversed
    }
}

/// Options of every chart form, as last submitted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChartOptions {
    pub scatter: Option<ScatterOptions>,
    pub histogram: Option<HistogramOptions>,
    pub density: Option<DensityOptions>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bin_count_range() {
        assert!(BinCount::new(0).is_err());
        assert!(BinCount::new(4).is_err());
        assert!(BinCount::new(1001).is_err());
        assert_eq!(BinCount::new(5).unwrap().get(), 5);
        assert_eq!(BinCount::clamped(0).get(), 5);
        assert_eq!(BinCount::clamped(5000).get(), 1000);
        assert_eq!(BinCount::default().get(), 100);
        assert_eq!(BinCount::default().increment().get(), 125);
        assert_eq!(BinCount::clamped(10).decrement().get(), 5);
    }

    #[test]
    fn choices_parse_and_cycle() {
        assert_eq!(
            "probability density".parse::<Normalization>(),
            Ok(Normalization::ProbabilityDensity)
        );
        assert_eq!("none".parse::<Normalization>(), Ok(Normalization::None));
        assert_eq!("lines+markers".parse::<ScatterMode>(), Ok(ScatterMode::LinesMarkers));
        assert!("bars".parse::<Marginal>().is_err());
        assert_eq!(Marginal::Rug.cycle(), Marginal::Box);
        assert_eq!(TableColormap::default(), TableColormap::None);
        assert_eq!(ContourStyle::default(), ContourStyle::Fill);
    }

    #[test]
    fn color_scale_text() {
        assert_eq!("Default".parse::<ColorScale>(), Ok(ColorScale::Default));
        assert_eq!(
            "Viridis".parse::<ColorScale>(),
            Ok(ColorScale::Named(Colormap::Viridis))
        );
        assert_eq!(ColorScale::Named(Colormap::Jet).to_string(), "Jet");
        assert_eq!(ColorScale::Default.cycle(), ColorScale::Named(Colormap::Viridis));
    }

    #[test]
    fn normalization_math() {
        assert_eq!(Normalization::None.apply(4.0, 10.0, 0.5), 4.0);
        assert_eq!(Normalization::Percent.apply(4.0, 10.0, 0.5), 40.0);
        assert_eq!(Normalization::Probability.apply(4.0, 10.0, 0.5), 0.4);
        assert_eq!(Normalization::Density.apply(4.0, 10.0, 0.5), 8.0);
        assert_eq!(Normalization::ProbabilityDensity.apply(4.0, 10.0, 0.5), 0.8);
    }

    #[test]
    fn error_bars_match() {
        let opts = ScatterOptions {
            y: vec!["BETX".into(), "BETY".into()],
            err_y: vec!["ERRBETX".into(), "ERRBETY".into()],
            ..Default::default()
        };
        let (pairs, warning) = opts.error_bar_pairs();
        assert!(warning.is_none());
        assert_eq!(pairs[1].err_y.as_deref(), Some("ERRBETY"));
        assert_eq!(pairs[1].err_x, None);
    }

    #[test]
    fn error_bar_mismatch_warns_and_pairs_prefix() {
        let opts = ScatterOptions {
            y: vec!["A".into(), "B".into(), "C".into()],
            err_x: vec!["EA".into()],
            ..Default::default()
        };
        let (pairs, warning) = opts.error_bar_pairs();
        assert!(warning.is_some());
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].err_x.as_deref(), Some("EA"));
        assert_eq!(pairs[1].err_x, None);
        assert_eq!(pairs[2].err_x, None);
    }

    #[test]
    fn surplus_error_columns_are_ignored() {
        let opts = ScatterOptions {
            y: vec!["A".into()],
            err_y: vec!["EA".into(), "EB".into()],
            ..Default::default()
        };
        let (pairs, warning) = opts.error_bar_pairs();
        assert!(warning.is_some());
        assert_eq!(pairs.len(), 1);
    }
}
