use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Lifecycle state of a submission.
///
/// Monotonic: `Processing` moves exactly once to `Complete` or `Failed` and
/// is never reversed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Upload accepted, enhancement still running
    Processing,
    /// Processed artifact is available for download
    Complete,
    /// Enhancement failed; the artifact will never appear
    Failed,
}

/// One record per upload, keyed by submission id in the store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubmissionRecord {
    /// Filename as supplied by the client, purely descriptive
    pub original_filename: String,
    /// Current lifecycle state
    pub status: SubmissionStatus,
    /// Preset name requested at submission time, not re-validated after
    pub preset: String,
    /// Download path, derivable purely from the id, never changes
    pub download_link: String,
}

/// In-memory submission map mirrored to a single JSON document on disk.
///
/// Every mutation happens under one mutex that is held across the whole
/// read-modify-flush sequence, so two concurrent writers can never interleave
/// flushes and drop an update. The mirror is rewritten in full on every
/// mutation; there are no incremental writes and no cross-process locking.
pub struct MetadataStore {
    path: PathBuf,
    submissions: Mutex<HashMap<String, SubmissionRecord>>,
}

impl MetadataStore {
    /// Load the durable mirror at startup.
    ///
    /// An absent file initializes an empty store. An unparsable file is fatal:
    /// refusing to start is preferred over silently discarding records.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let submissions: HashMap<String, SubmissionRecord> = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).with_context(|| {
                format!(
                    "Metadata file {} exists but is not parsable; refusing to start",
                    path.display()
                )
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read metadata file {}", path.display()))
            }
        };

        info!(
            path = %path.display(),
            submissions = submissions.len(),
            "Metadata store loaded"
        );

        Ok(Self {
            path,
            submissions: Mutex::new(submissions),
        })
    }

    /// Insert or replace a record and synchronously flush the mirror
    pub async fn upsert(&self, id: &str, record: SubmissionRecord) -> Result<()> {
        let mut submissions = self.submissions.lock().await;
        submissions.insert(id.to_string(), record);
        self.flush(&submissions).await
    }

    /// Transition a record's status and synchronously flush the mirror.
    ///
    /// A missing id is logged and skipped rather than treated as an error; it
    /// can only mean the record never made it past creation.
    pub async fn set_status(&self, id: &str, status: SubmissionStatus) -> Result<()> {
        let mut submissions = self.submissions.lock().await;

        match submissions.get_mut(id) {
            Some(record) => {
                record.status = status;
                self.flush(&submissions).await
            }
            None => {
                warn!(submission_id = %id, "Status update for unknown submission");
                Ok(())
            }
        }
    }

    /// Look up a single record
    pub async fn get(&self, id: &str) -> Option<SubmissionRecord> {
        self.submissions.lock().await.get(id).cloned()
    }

    /// Snapshot of the full mapping for listing
    pub async fn all(&self) -> HashMap<String, SubmissionRecord> {
        self.submissions.lock().await.clone()
    }

    /// Overwrite the durable mirror with the current mapping.
    ///
    /// Callers must hold the submissions lock; the guard parameter enforces
    /// that the flush happens inside the mutation's critical section.
    async fn flush(&self, submissions: &HashMap<String, SubmissionRecord>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(submissions)
            .context("Failed to serialize submission metadata")?;

        tokio::fs::write(&self.path, bytes)
            .await
            .with_context(|| format!("Failed to write metadata file {}", self.path.display()))?;

        debug!(
            path = %self.path.display(),
            submissions = submissions.len(),
            "Metadata mirror flushed"
        );

        Ok(())
    }
}
