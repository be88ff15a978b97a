//! Uploaded files and the checks every upload passes before its
//! contents are touched.
//!
//! Validation order is fixed: extension, then size cap, then contents.

use crate::error::{PipelineError, PipelineResult};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;
const MAX_UPLOAD_MB: u64 = MAX_UPLOAD_BYTES / 1024 / 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Tsv,
    Xlsx,
    Xls,
    Json,
}

impl FileFormat {
    /// Formats the local parser accepts.
    pub const LOCAL: &'static [FileFormat] = &[
        FileFormat::Csv,
        FileFormat::Tsv,
        FileFormat::Xlsx,
        FileFormat::Xls,
        FileFormat::Json,
    ];

    /// Formats the remote scoring service accepts.
    pub const REMOTE: &'static [FileFormat] = &[FileFormat::Csv, FileFormat::Xlsx, FileFormat::Xls];

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Tsv => "tsv",
            Self::Xlsx => "xlsx",
            Self::Xls => "xls",
            Self::Json => "json",
        }
    }

    /// Match on the lower-cased file-name suffix.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "tsv" => Some(Self::Tsv),
            "xlsx" => Some(Self::Xlsx),
            "xls" => Some(Self::Xls),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
enum Source {
    Disk(PathBuf),
    Memory(Vec<u8>),
}

/// A user-supplied file: a name, a size, and lazily-read contents.
#[derive(Debug, Clone)]
pub struct Upload {
    name: String,
    size: u64,
    source: Source,
}

impl Upload {
    /// Reference a file on disk. Only metadata is read here.
    pub fn from_path(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)?.len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            name,
            size,
            source: Source::Disk(path.to_path_buf()),
        })
    }

    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            source: Source::Memory(bytes),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Check extension and size cap against `accepted`, without reading
    /// the contents.
    pub fn validate(&self, accepted: &[FileFormat]) -> PipelineResult<FileFormat> {
        let format = FileFormat::from_file_name(&self.name)
            .filter(|f| accepted.contains(f))
            .ok_or_else(|| PipelineError::UnsupportedFormat {
                extension: Path::new(&self.name)
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
                    .unwrap_or_default(),
                accepted: accepted
                    .iter()
                    .map(|f| format!(".{}", f.extension()))
                    .collect::<Vec<_>>()
                    .join(", "),
            })?;

        if self.size > MAX_UPLOAD_BYTES {
            return Err(PipelineError::FileTooLarge {
                size_mb: self.size as f64 / 1024.0 / 1024.0,
                limit_mb: MAX_UPLOAD_MB,
            });
        }
        Ok(format)
    }

    pub fn read_bytes(&self) -> PipelineResult<Vec<u8>> {
        match &self.source {
            Source::Disk(path) => Ok(std::fs::read(path)?),
            Source::Memory(bytes) => Ok(bytes.clone()),
        }
    }

    /// Contents as UTF-8 text. A leading byte-order mark is dropped.
    pub fn read_text(&self) -> PipelineResult<String> {
        let bytes = self.read_bytes()?;
        let text = String::from_utf8(bytes)
            .map_err(|e| PipelineError::malformed(format!("{} is not valid UTF-8: {e}", self.name)))?;
        Ok(text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text))
    }
}

/// Summary of a successfully parsed upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: FileFormat,
    pub row_count: usize,
    pub column_count: usize,
}
