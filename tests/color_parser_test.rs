use ratatui::style::Color;
use tfsview::colormap::Rgb;
use tfsview::config::{rgb_to_256_color, rgb_to_basic_ansi, ColorParser, Theme, ThemeConfig};

fn color_enabled() -> bool {
    std::env::var("NO_COLOR").is_err()
}

#[test]
fn test_named_colors() {
    if !color_enabled() {
        return;
    }
    let parser = ColorParser::new();
    assert_eq!(parser.parse("red").unwrap(), Color::Red);
    assert_eq!(parser.parse("  Cyan ").unwrap(), Color::Cyan);
    assert_eq!(parser.parse("bright_blue").unwrap(), Color::Indexed(12));
    assert_eq!(parser.parse("bright white").unwrap(), Color::Indexed(15));
    assert_eq!(parser.parse("dark_gray").unwrap(), Color::Indexed(8));
    assert_eq!(parser.parse("light_grey").unwrap(), Color::Indexed(7));
    assert_eq!(parser.parse("reversed").unwrap(), Color::Reset);
}

#[test]
fn test_indexed_colors() {
    if !color_enabled() {
        return;
    }
    let parser = ColorParser::new();
    assert_eq!(parser.parse("indexed(236)").unwrap(), Color::Indexed(236));
    assert_eq!(parser.parse("Indexed(0)").unwrap(), Color::Indexed(0));
    assert!(parser.parse("indexed(256)").is_err());
    assert!(parser.parse("indexed(x)").is_err());
}

#[test]
fn test_hex_colors() {
    let parser = ColorParser::new();
    assert!(parser.parse("#ff8800").is_ok());
    assert!(parser.parse("#FFFFFF").is_ok());
    if color_enabled() {
        assert!(parser.parse("#gg0000").is_err());
        assert!(parser.parse("#fff").is_err());
    }
}

#[test]
fn test_unknown_names_are_rejected() {
    if !color_enabled() {
        return;
    }
    let parser = ColorParser::new();
    let err = parser.parse("chartreuse").unwrap_err();
    assert!(err.to_string().contains("Unknown color name"));
}

#[test]
fn test_256_color_mapping() {
    assert_eq!(rgb_to_256_color(0, 0, 0), 16);
    assert_eq!(rgb_to_256_color(255, 255, 255), 231);
    assert_eq!(rgb_to_256_color(255, 0, 0), 196);
    assert_eq!(rgb_to_256_color(0, 0, 255), 21);
}

#[test]
fn test_basic_ansi_mapping() {
    assert_eq!(rgb_to_basic_ansi(250, 10, 10), Color::Red);
    assert_eq!(rgb_to_basic_ansi(10, 250, 10), Color::Green);
    assert_eq!(rgb_to_basic_ansi(10, 10, 250), Color::Blue);
}

#[test]
fn test_terminal_color_never_panics_for_colormap_output() {
    let parser = ColorParser::new();
    for rgb in [Rgb(0, 0, 0), Rgb(13, 8, 135), Rgb(240, 249, 33), Rgb(255, 255, 255)] {
        let _ = parser.terminal_color(rgb);
    }
}

#[test]
fn test_theme_from_default_config() {
    let theme = Theme::from_config(&ThemeConfig::default()).unwrap();
    if color_enabled() {
        assert_eq!(theme.get("error"), Color::Red);
        assert_eq!(theme.get("controls_bg"), Color::Indexed(236));
    }
    assert!(theme.get_optional("no_such_color").is_none());
}
