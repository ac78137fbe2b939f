//! User-facing error message formatting.
//!
//! Matches on typed errors (LoadError, PolarsError variants, io::ErrorKind)
//! instead of parsing strings.

use crate::tfs::TfsError;
use crate::upload::LoadError;
use polars::prelude::PolarsError;
use std::io;
use std::path::Path;

/// Message shown when an upload cannot be turned into a table.
pub fn user_message_from_load(err: &LoadError, name: &str) -> String {
    let detail = match err {
        LoadError::Io(e) => user_message_from_io(e, Some("(temporary file)")),
        LoadError::Decompress { format, source } => format!(
            "Not valid {:?} data: {}",
            format,
            user_message_from_io(source, None)
        ),
        LoadError::Parse(TfsError::Polars(pe)) => user_message_from_polars(pe),
        LoadError::Parse(TfsError::Io(e)) => user_message_from_io(e, None),
        LoadError::Parse(e) => format!("Not a valid TFS file ({})", e),
        LoadError::IndexNotFound { .. } => err.to_string(),
    };
    format!("Failed to load {}: {}", name, detail)
}

pub fn user_message_from_polars(err: &PolarsError) -> String {
    use polars::prelude::PolarsError as PE;

    match err {
        PE::ColumnNotFound(msg) => format!(
            "Column not found: {}. Check spelling and that the column exists.",
            msg
        ),
        PE::Duplicate(msg) => format!("Duplicate column: {}", msg),
        PE::IO { error, msg } => {
            user_message_from_io(error.as_ref(), msg.as_ref().map(|m| m.as_ref()))
        }
        PE::NoData(msg) => format!("No data: {}", msg),
        PE::SchemaMismatch(msg) => format!("Schema mismatch: {}", msg),
        PE::ShapeMismatch(msg) => format!("Row shape mismatch: {}", msg),
        PE::InvalidOperation(msg) => format!("Operation not allowed: {}", msg),
        PE::OutOfBounds(msg) => format!("Index or row out of bounds: {}", msg),
        PE::ComputeError(msg) => msg.to_string(),
        PE::Context { error, msg } => format!("{}: {}", msg, user_message_from_polars(error)),
        #[allow(unreachable_patterns)]
        _ => err.to_string(),
    }
}

/// Format an io::Error by its ErrorKind, with optional trailing context.
pub fn user_message_from_io(err: &io::Error, context: Option<&str>) -> String {
    use std::io::ErrorKind;

    let base: String = match err.kind() {
        ErrorKind::NotFound => "File or directory not found.".to_string(),
        ErrorKind::PermissionDenied => "Permission denied. Check read access.".to_string(),
        ErrorKind::InvalidData | ErrorKind::InvalidInput => {
            "Invalid or corrupted data.".to_string()
        }
        ErrorKind::UnexpectedEof => "Unexpected end of file.".to_string(),
        ErrorKind::OutOfMemory => "Out of memory.".to_string(),
        ErrorKind::StorageFull => {
            "No space left on device. Free up disk space and try again.".to_string()
        }
        ErrorKind::IsADirectory => "Path is a directory, not a file.".to_string(),
        _ => err.to_string(),
    };

    match context {
        Some(ctx) if !ctx.is_empty() => format!("{} {}", base, ctx),
        _ => base,
    }
}

/// Format a color_eyre Report by downcasting the cause chain to known types.
pub fn user_message_from_report(report: &color_eyre::eyre::Report, path: Option<&Path>) -> String {
    let prefix = |msg: String| match path {
        Some(p) => format!("Failed on {}: {}", p.display(), msg),
        None => msg,
    };
    for cause in report.chain() {
        if let Some(pe) = cause.downcast_ref::<PolarsError>() {
            return prefix(user_message_from_polars(pe));
        }
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return prefix(user_message_from_io(io_err, None));
        }
    }

    // First line only; reports can carry long sections
    let display = report.to_string();
    let first_line = display.lines().next().unwrap_or("An error occurred");
    prefix(first_line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_from_io_not_found() {
        let err = io::Error::new(io::ErrorKind::NotFound, "No such file");
        let msg = user_message_from_io(&err, None);
        assert!(msg.contains("not found"), "got: {}", msg);
    }

    #[test]
    fn test_user_message_from_io_permission_denied() {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "Permission denied");
        let msg = user_message_from_io(&err, None);
        assert!(msg.to_lowercase().contains("permission"), "got: {}", msg);
    }

    #[test]
    fn test_user_message_from_polars_column_not_found() {
        let err = PolarsError::ColumnNotFound("foo".into());
        let msg = user_message_from_polars(&err);
        assert!(msg.contains("foo"), "got: {}", msg);
        assert!(msg.contains("Column not found"), "got: {}", msg);
    }

    #[test]
    fn test_load_message_names_upload_and_line() {
        let err = LoadError::Parse(TfsError::Syntax {
            line: 3,
            message: "column names must precede the types line".into(),
        });
        let msg = user_message_from_load(&err, "twiss.tfs");
        assert!(msg.starts_with("Failed to load twiss.tfs"), "got: {}", msg);
        assert!(msg.contains("line 3"), "got: {}", msg);
    }

    #[test]
    fn test_report_falls_back_to_first_line() {
        let report = color_eyre::eyre::eyre!("first line\nsecond line");
        assert_eq!(user_message_from_report(&report, None), "first line");
    }
}
