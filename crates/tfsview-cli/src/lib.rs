//! Shared CLI definitions for tfsview.
//!
//! Used by the main application and by the build script (manpage) and
//! gen_docs binary (command-line-options markdown).

use clap::{CommandFactory, Parser, ValueEnum};
use std::path::{Path, PathBuf};

/// Compression format for TFS files
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum CompressionFormat {
    /// Gzip compression (.gz)
    Gzip,
    /// Zstandard compression (.zst)
    Zstd,
    /// Bzip2 compression (.bz2)
    Bzip2,
    /// XZ compression (.xz)
    Xz,
}

impl CompressionFormat {
    /// Detect compression format from file extension
    pub fn from_extension(path: &Path) -> Option<Self> {
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            match ext.to_lowercase().as_str() {
                "gz" => Some(Self::Gzip),
                "zst" | "zstd" => Some(Self::Zstd),
                "bz2" | "bz" => Some(Self::Bzip2),
                "xz" => Some(Self::Xz),
                _ => None,
            }
        } else {
            None
        }
    }

    /// Detect compression format from the leading magic bytes of a buffer
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0x1f, 0x8b]) {
            Some(Self::Gzip)
        } else if bytes.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            Some(Self::Zstd)
        } else if bytes.starts_with(b"BZh") {
            Some(Self::Bzip2)
        } else if bytes.starts_with(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]) {
            Some(Self::Xz)
        } else {
            None
        }
    }

    /// Get file extension for this compression format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Gzip => "gz",
            Self::Zstd => "zst",
            Self::Bzip2 => "bz2",
            Self::Xz => "xz",
        }
    }
}

/// Command-line arguments for tfsview
#[derive(Clone, Parser, Debug)]
#[command(
    name = "tfsview",
    version,
    about = "TFS file viewer, plotter and analyzer",
    long_about = include_str!("../long_about.txt")
)]
pub struct Args {
    /// TFS file to open. Use `-` to read from standard input
    /// (not required with --generate-config or --clear-cache)
    #[arg(required_unless_present_any = ["generate_config", "clear_cache"], value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Column to use as the table index
    #[arg(long = "index", value_name = "COLUMN")]
    pub index: Option<String>,

    /// Query applied to the table on startup, e.g. "BETX > 10 and S < 100"
    #[arg(long = "query", value_name = "EXPR")]
    pub query: Option<String>,

    /// Colormap for the table background gradient (None, viridis, plasma, inferno, magma, cividis)
    #[arg(long = "colormap", value_name = "NAME")]
    pub colormap: Option<String>,

    /// Specify the compression format explicitly (gzip, zstd, bzip2, xz).
    /// If not specified, compression is detected from magic bytes or the file extension.
    #[arg(long = "compression", value_enum)]
    pub compression: Option<CompressionFormat>,

    /// Write the profiling report of the (filtered) table as JSON to FILE and exit
    #[arg(long = "report", value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Write the (filtered) table as TFS to standard output and exit
    #[arg(long = "print", action)]
    pub print: bool,

    /// Datasets with more rows than this are sampled for the profiling report
    #[arg(long = "sampling-threshold", value_name = "N")]
    pub sampling_threshold: Option<usize>,

    /// Enable debug mode: verbose logging and a status line with cache counters
    #[arg(long = "debug", action)]
    pub debug: bool,

    /// Write logs to FILE instead of the cache directory
    #[arg(long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Clear all cache data and exit
    #[arg(long = "clear-cache", action)]
    pub clear_cache: bool,

    /// Generate default configuration file at ~/.config/tfsview/config.toml
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,
}

/// Escape `|` and newlines for use in markdown table cells.
fn escape_table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

fn value_placeholder(arg: &clap::Arg) -> String {
    arg.get_value_names()
        .map(|names| {
            names
                .iter()
                .map(|n: &clap::builder::Str| format!("<{}>", n.as_ref() as &str))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

/// Render command-line options as markdown.
pub fn render_options_markdown() -> String {
    let mut cmd = Args::command();
    cmd.build();

    let mut out = String::from("# Command Line Options\n\n");

    out.push_str("## Usage\n\n```\n");
    out.push_str(&cmd.render_usage().to_string());
    out.push_str("\n```\n\n");

    out.push_str("## Options\n\n");
    out.push_str("| Option | Description |\n");
    out.push_str("|--------|-------------|\n");

    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_ref().to_string();
        if id == "help" || id == "version" {
            continue;
        }

        let option_str = if arg.is_positional() {
            let placeholder = value_placeholder(arg);
            if arg.is_required_set() {
                placeholder
            } else {
                format!("[{placeholder}]")
            }
        } else {
            let mut parts = Vec::new();
            if let Some(s) = arg.get_short() {
                parts.push(format!("-{s}"));
            }
            if let Some(l) = arg.get_long() {
                parts.push(format!("--{l}"));
            }
            let op = parts.join(", ");
            let placeholder = if arg.get_action().takes_values() {
                value_placeholder(arg)
            } else {
                String::new()
            };
            if placeholder.is_empty() {
                op
            } else {
                format!("{op} {placeholder}")
            }
        };

        let help = arg
            .get_help()
            .map(|h| escape_table_cell(&h.to_string()))
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!("| `{option_str}` | {help} |\n"));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_detection() {
        assert_eq!(
            CompressionFormat::from_extension(Path::new("twiss.tfs.gz")),
            Some(CompressionFormat::Gzip)
        );
        assert_eq!(
            CompressionFormat::from_extension(Path::new("twiss.tfs.zst")),
            Some(CompressionFormat::Zstd)
        );
        assert_eq!(
            CompressionFormat::from_extension(Path::new("twiss.tfs.bz2")),
            Some(CompressionFormat::Bzip2)
        );
        assert_eq!(
            CompressionFormat::from_extension(Path::new("twiss.tfs.xz")),
            Some(CompressionFormat::Xz)
        );
        assert_eq!(CompressionFormat::from_extension(Path::new("twiss.tfs")), None);
        assert_eq!(CompressionFormat::from_extension(Path::new("twiss")), None);
    }

    #[test]
    fn test_compression_magic() {
        assert_eq!(
            CompressionFormat::from_magic(&[0x1f, 0x8b, 0x08]),
            Some(CompressionFormat::Gzip)
        );
        assert_eq!(
            CompressionFormat::from_magic(b"BZh91AY"),
            Some(CompressionFormat::Bzip2)
        );
        assert_eq!(CompressionFormat::from_magic(b"@ NAME %s \"x\""), None);
        assert_eq!(CompressionFormat::from_magic(&[]), None);
    }

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["tfsview", "twiss.tfs", "--index", "NAME", "--query", "S > 1"]);
        assert_eq!(args.path, Some(PathBuf::from("twiss.tfs")));
        assert_eq!(args.index.as_deref(), Some("NAME"));
        assert_eq!(args.query.as_deref(), Some("S > 1"));
        assert!(!args.print);
    }

    #[test]
    fn test_path_optional_with_generate_config() {
        let args = Args::parse_from(["tfsview", "--generate-config"]);
        assert!(args.path.is_none());
        assert!(args.generate_config);
    }

    #[test]
    fn test_render_options_markdown() {
        let md = render_options_markdown();
        assert!(md.contains("--index"));
        assert!(md.contains("--query"));
        assert!(md.contains("[<PATH>]"));
    }
}
