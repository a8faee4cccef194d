use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::AppError;
use crate::models::QueueDocument;

/// Single-file JSON store for the [`QueueDocument`].
///
/// Every read goes to disk and every write replaces the whole file, so the
/// file is always the source of truth between operations. There is no
/// locking: one process owns the file at a time.
#[derive(Debug, Clone)]
pub struct RecordStore {
    path: PathBuf,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document.
    ///
    /// A missing file yields an empty document. Missing keys load as empty
    /// lists. Content that is not a JSON object of the expected shape fails
    /// with [`AppError::ParseError`].
    pub fn load(&self) -> Result<QueueDocument, AppError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "Queue file absent, starting empty");
                return Ok(QueueDocument::default());
            }
            Err(e) => {
                return Err(AppError::IoError(format!(
                    "Failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };

        let value: serde_json::Value = serde_json::from_str(&raw).map_err(|e| {
            AppError::ParseError(format!("Invalid JSON in {}: {e}", self.path.display()))
        })?;
        if !value.is_object() {
            return Err(AppError::ParseError(format!(
                "{} must contain a JSON object",
                self.path.display()
            )));
        }

        serde_json::from_value(value).map_err(|e| {
            AppError::ParseError(format!(
                "Unexpected queue layout in {}: {e}",
                self.path.display()
            ))
        })
    }

    /// Overwrite the file with `doc`.
    ///
    /// The JSON is written to a sibling temp file first and renamed into
    /// place, so readers never observe a half-written document.
    pub fn save(&self, doc: &QueueDocument) -> Result<(), AppError> {
        write_json_atomic(&self.path, doc)
    }

    /// Load, apply `mutate`, save, and return whatever `mutate` returned.
    ///
    /// The document is saved even when `mutate` leaves it untouched, which
    /// normalizes a file that was missing keys on first use.
    pub fn update<T>(&self, mutate: impl FnOnce(&mut QueueDocument) -> T) -> Result<T, AppError> {
        let mut doc = self.load()?;
        let out = mutate(&mut doc);
        self.save(&doc)?;
        Ok(out)
    }
}

/// Serialize `value` as pretty JSON and move it into place at `path`.
///
/// Parent directories are created as needed.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), AppError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::IoError(format!("Failed to create {}: {e}", parent.display()))
        })?;
    }

    let json = serde_json::to_string_pretty(value)?;
    let tmp = tmp_path(path);
    fs::write(&tmp, json)
        .map_err(|e| AppError::IoError(format!("Failed to write {}: {e}", tmp.display())))?;
    fs::rename(&tmp, path)
        .map_err(|e| AppError::IoError(format!("Failed to replace {}: {e}", path.display())))?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
