//! Upload-and-load pipeline: raw bytes in, parsed TFS table out.
//!
//! The bytes are written to a transient `.tfs` file that the TFS reader then
//! parses. The transient file is a [`NamedTempFile`] and is removed when it
//! goes out of scope, so no path survives a call to [`load`].

use crate::tfs::{self, TfsError, TfsTable};
use std::fmt;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tfsview_cli::CompressionFormat;
use thiserror::Error;
use tracing::{debug, info, warn};

static NEXT_UPLOAD_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one upload. Every open, including re-opening the same path,
/// gets a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UploadId(u64);

impl UploadId {
    pub fn next() -> Self {
        Self(NEXT_UPLOAD_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not write the uploaded file to a temporary location: {0}")]
    Io(#[from] io::Error),
    #[error("could not decompress {format:?} data: {source}")]
    Decompress {
        format: CompressionFormat,
        #[source]
        source: io::Error,
    },
    #[error("could not parse TFS data: {0}")]
    Parse(TfsError),
    #[error("index column '{column}' not found (available: {available})")]
    IndexNotFound { column: String, available: String },
}

impl From<TfsError> for LoadError {
    fn from(err: TfsError) -> Self {
        match err {
            TfsError::IndexNotFound { column, available } => {
                LoadError::IndexNotFound { column, available }
            }
            other => LoadError::Parse(other),
        }
    }
}

/// Raw content of an opened file plus its identity.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub id: UploadId,
    pub name: String,
    pub bytes: Arc<[u8]>,
    /// Explicit compression, from `--compression` or the file extension.
    /// When `None` the magic bytes decide.
    pub compression: Option<CompressionFormat>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            id: UploadId::next(),
            name: name.into(),
            bytes: bytes.into(),
            compression: None,
        }
    }

    pub fn with_compression(mut self, compression: Option<CompressionFormat>) -> Self {
        self.compression = compression;
        self
    }

    pub fn from_path(path: &Path) -> io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, bytes).with_compression(CompressionFormat::from_extension(path)))
    }

    pub fn from_reader<R: Read>(name: impl Into<String>, mut reader: R) -> io::Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Ok(Self::new(name, bytes))
    }

    /// Same content under a new identity.
    pub fn reopened(&self) -> Self {
        Self {
            id: UploadId::next(),
            ..self.clone()
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Decompress `bytes` if they are compressed, either as `hint` says or as
/// their magic bytes say. Plain text is returned borrowed.
pub fn decompress(
    bytes: &[u8],
    hint: Option<CompressionFormat>,
) -> Result<std::borrow::Cow<'_, [u8]>, LoadError> {
    let Some(format) = CompressionFormat::from_magic(bytes).or(hint) else {
        return Ok(std::borrow::Cow::Borrowed(bytes));
    };
    let mut reader: Box<dyn Read + '_> = match format {
        CompressionFormat::Gzip => Box::new(flate2::read::GzDecoder::new(bytes)),
        CompressionFormat::Zstd => Box::new(
            zstd::Decoder::new(bytes).map_err(|source| LoadError::Decompress { format, source })?,
        ),
        CompressionFormat::Bzip2 => Box::new(bzip2::read::BzDecoder::new(bytes)),
        CompressionFormat::Xz => Box::new(xz2::read::XzDecoder::new(bytes)),
    };
    let mut out = Vec::new();
    reader
        .read_to_end(&mut out)
        .map_err(|source| LoadError::Decompress { format, source })?;
    debug!(?format, compressed = bytes.len(), decompressed = out.len(), "decompressed upload");
    Ok(std::borrow::Cow::Owned(out))
}

/// Parse raw TFS bytes. `index` of `None` or `""` means no explicit index.
pub fn load(bytes: &[u8], index: Option<&str>) -> Result<TfsTable, LoadError> {
    load_with_scratch(bytes, None, index, &std::env::temp_dir())
}

/// Parse an [`UploadedFile`], honouring its compression hint.
pub fn load_upload(upload: &UploadedFile, index: Option<&str>) -> Result<TfsTable, LoadError> {
    load_with_scratch(
        &upload.bytes,
        upload.compression,
        index,
        &std::env::temp_dir(),
    )
}

/// [`load`] with the transient file placed in `scratch_dir`.
pub fn load_with_scratch(
    bytes: &[u8],
    compression: Option<CompressionFormat>,
    index: Option<&str>,
    scratch_dir: &Path,
) -> Result<TfsTable, LoadError> {
    let content = decompress(bytes, compression)?;
    let transient = write_transient(&content, scratch_dir)?;
    let path: PathBuf = transient.path().to_path_buf();
    debug!(bytes = content.len(), path = %path.display(), "wrote transient TFS file");

    let result = tfs::read_tfs(&path, index).map_err(LoadError::from);
    drop(transient);

    match &result {
        Ok(table) => info!(
            rows = table.height(),
            columns = table.column_names().len(),
            headers = table.headers.len(),
            "loaded TFS table"
        ),
        Err(e) => warn!(error = %e, "failed to load TFS table"),
    }
    result
}

fn write_transient(content: &[u8], scratch_dir: &Path) -> Result<NamedTempFile, LoadError> {
    let mut temp = tempfile::Builder::new()
        .prefix("tfsview-")
        .suffix(".tfs")
        .tempfile_in(scratch_dir)?;
    temp.write_all(content)?;
    temp.flush()?;
    Ok(temp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tfs::HeaderValue;

    const SIMPLE: &str = "@ TITLE %s \"x\"\n* A B\n$ %d %d\n1 2\n5 9\n";

    #[test]
    fn upload_ids_are_unique() {
        let a = UploadedFile::new("a.tfs", b"x".to_vec());
        let b = a.reopened();
        assert_ne!(a.id, b.id);
        assert_eq!(a.bytes, b.bytes);
    }

    #[test]
    fn load_plain_bytes() {
        let table = load(SIMPLE.as_bytes(), None).unwrap();
        assert_eq!(table.height(), 2);
        assert_eq!(
            table.headers.get("TITLE"),
            Some(&HeaderValue::Str("x".to_string()))
        );
        assert_eq!(table.index(), None);
    }

    #[test]
    fn load_gzip_bytes() {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(SIMPLE.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();
        let table = load(&compressed, Some("A")).unwrap();
        assert_eq!(table.index(), Some("A"));
    }

    #[test]
    fn load_zstd_bytes() {
        let compressed = zstd::encode_all(SIMPLE.as_bytes(), 0).unwrap();
        let table = load(&compressed, None).unwrap();
        assert_eq!(table.height(), 2);
    }

    #[test]
    fn empty_index_means_no_index() {
        let table = load(SIMPLE.as_bytes(), Some("")).unwrap();
        assert_eq!(table.index(), None);
    }

    #[test]
    fn missing_index_is_reported() {
        let err = load(SIMPLE.as_bytes(), Some("NOPE")).unwrap_err();
        assert!(matches!(err, LoadError::IndexNotFound { ref column, .. } if column == "NOPE"));
    }

    #[test]
    fn corrupt_gzip_is_a_decompress_error() {
        let err = load(&[0x1f, 0x8b, 0x00, 0x01, 0x02], None).unwrap_err();
        assert!(matches!(err, LoadError::Decompress { .. }));
    }

    #[test]
    fn transient_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        load_with_scratch(SIMPLE.as_bytes(), None, None, dir.path()).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
        load_with_scratch(b"not a tfs file at all", None, None, dir.path()).unwrap_err();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
