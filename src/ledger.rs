use crate::cell::ParsedRow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all};
use std::path::PathBuf;
use thiserror::Error;

/// Metadata and parsed contents of one processed upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRecord {
    /// Email of the owning user.
    pub uploader_email: String,

    /// Original filename, unique per user.
    pub filename: String,

    /// File size in kilobytes.
    pub filesize_kb: u64,

    /// Number of data rows (header row excluded).
    pub rows: usize,

    /// Number of columns.
    pub columns: usize,

    /// The flattened rows, keyed by header.
    pub data: Vec<ParsedRow>,

    /// When the upload was processed.
    pub uploaded_at: DateTime<Utc>,
}

/// Summary view of an upload for listings (the parsed data stays on disk).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSummary {
    pub filename: String,
    pub filesize_kb: u64,
    pub rows: usize,
    pub columns: usize,
    pub uploaded_at: DateTime<Utc>,
}

impl From<&UploadRecord> for UploadSummary {
    fn from(record: &UploadRecord) -> Self {
        UploadSummary {
            filename: record.filename.clone(),
            filesize_kb: record.filesize_kb,
            rows: record.rows,
            columns: record.columns,
            uploaded_at: record.uploaded_at,
        }
    }
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("upload storage unavailable: {0}")]
    Io(#[from] std::io::Error),

    #[error("upload index corrupted: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Per-user upload records stored as JSON under the database directory.
///
/// Each user gets `<root>/<email>/uploads.json` holding their records.
/// Uniqueness of `(user, filename)` is enforced here: recording an upload
/// whose filename already exists for that user is a no-op.
#[derive(Debug, Clone)]
pub struct UploadLedger {
    root: PathBuf,
}

impl UploadLedger {
    /// Ledger rooted at the application database directory.
    pub fn new() -> Self {
        Self::with_root(crate::login::DATABASE_DIR)
    }

    /// Ledger rooted at an arbitrary directory (tests use a temp dir).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        UploadLedger { root: root.into() }
    }

    fn uploads_path(&self, email: &str) -> PathBuf {
        self.root.join(email).join("uploads.json")
    }

    /// Whether this user already has an upload with this filename.
    ///
    /// An unreadable index reads as "not uploaded"; the subsequent write
    /// will surface the real problem.
    pub fn has_uploaded(&self, email: &str, filename: &str) -> bool {
        self.load(email)
            .map(|records| records.iter().any(|r| r.filename == filename))
            .unwrap_or(false)
    }

    /// Record an upload unless the filename is already taken for the user.
    ///
    /// # Returns
    /// * `Ok(true)` - The record was persisted
    /// * `Ok(false)` - A record with this filename already existed; nothing
    ///   was written
    /// * `Err(LedgerError)` - Storage was unavailable or corrupted
    pub fn record_upload(&self, email: &str, record: UploadRecord) -> Result<bool, LedgerError> {
        let mut records = self.load(email)?;

        if records.iter().any(|r| r.filename == record.filename) {
            return Ok(false);
        }

        records.push(record);
        self.save(email, &records)?;
        Ok(true)
    }

    /// Summaries of all uploads for a user, for the dashboard listing.
    pub fn list_uploads(&self, email: &str) -> Result<Vec<UploadSummary>, LedgerError> {
        Ok(self.load(email)?.iter().map(UploadSummary::from).collect())
    }

    /// Fetch one upload with its parsed data.
    pub fn get_upload(
        &self,
        email: &str,
        filename: &str,
    ) -> Result<Option<UploadRecord>, LedgerError> {
        Ok(self
            .load(email)?
            .into_iter()
            .find(|r| r.filename == filename))
    }

    /// Delete one upload. Returns whether a record was removed.
    pub fn delete_upload(&self, email: &str, filename: &str) -> Result<bool, LedgerError> {
        let mut records = self.load(email)?;
        let before = records.len();
        records.retain(|r| r.filename != filename);

        if records.len() == before {
            return Ok(false);
        }

        self.save(email, &records)?;
        Ok(true)
    }

    /// Remove a user's whole upload directory (account deletion).
    pub fn delete_user_data(&self, email: &str) -> Result<(), LedgerError> {
        let dir = self.root.join(email);
        if dir.exists() {
            fs::remove_dir_all(dir)?;
        }
        Ok(())
    }

    fn load(&self, email: &str) -> Result<Vec<UploadRecord>, LedgerError> {
        let path = self.uploads_path(email);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let data = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&data)?)
    }

    fn save(&self, email: &str, records: &[UploadRecord]) -> Result<(), LedgerError> {
        let path = self.uploads_path(email);
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(records)?;
        fs::write(&path, json)?;
        Ok(())
    }
}

impl Default for UploadLedger {
    fn default() -> Self {
        Self::new()
    }
}
