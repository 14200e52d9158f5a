use crate::artifacts::ArtifactStore;
use crate::enhancer;
use crate::metadata_store::{MetadataStore, SubmissionRecord, SubmissionStatus};
use crate::presets::{self, Stage};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info, instrument};
use uuid::Uuid;

/// Returned to the client the moment an upload is accepted
#[derive(Debug, Clone)]
pub struct UploadReceipt {
    pub track_id: String,
    pub download_url: String,
}

/// Orchestrates the submission state machine.
///
/// The synchronous half runs inside the request: assign an id, write the raw
/// upload, durably record `processing`, then schedule enhancement and return.
/// The asynchronous half runs in a background task per submission and moves
/// the record to `complete` or `failed`. The handler never waits for it.
pub struct SubmissionLifecycle {
    metadata_store: Arc<MetadataStore>,
    artifacts: Arc<ArtifactStore>,
    enhance_semaphore: Arc<Semaphore>,
}

impl SubmissionLifecycle {
    pub fn new(
        metadata_store: Arc<MetadataStore>,
        artifacts: Arc<ArtifactStore>,
        concurrency: usize,
    ) -> Self {
        Self {
            metadata_store,
            artifacts,
            enhance_semaphore: Arc::new(Semaphore::new(concurrency)),
        }
    }

    /// Accept an upload and schedule its enhancement.
    ///
    /// The `processing` record is flushed to the durable mirror before the
    /// background task is spawned, so a client holding the receipt is
    /// guaranteed to observe its submission in the listing.
    #[instrument(skip(self, data), fields(original_filename = %original_filename, preset = %preset))]
    pub async fn submit(
        &self,
        original_filename: &str,
        preset: &str,
        data: Vec<u8>,
    ) -> Result<UploadReceipt> {
        let id = Uuid::new_v4().to_string();
        let input_path = self.artifacts.upload_path(&id, original_filename);
        let output_path = self.artifacts.processed_path(&id);
        let size_bytes = data.len();

        tokio::fs::write(&input_path, data)
            .await
            .with_context(|| format!("Failed to write upload to {}", input_path.display()))?;

        let record = SubmissionRecord {
            original_filename: original_filename.to_string(),
            status: SubmissionStatus::Processing,
            preset: preset.to_string(),
            download_link: ArtifactStore::download_link(&id),
        };
        let download_url = record.download_link.clone();

        self.metadata_store.upsert(&id, record).await?;

        metrics::counter!("enhance.submissions.received").increment(1);
        metrics::counter!("enhance.bytes.uploaded").increment(size_bytes as u64);

        info!(
            submission_id = %id,
            size_bytes = size_bytes,
            "Upload received, enhancement scheduled"
        );

        let chain = presets::resolve(preset);
        tokio::spawn(run_enhancement(
            self.metadata_store.clone(),
            self.enhance_semaphore.clone(),
            id.clone(),
            input_path,
            output_path,
            chain,
        ));

        Ok(UploadReceipt {
            track_id: id,
            download_url,
        })
    }
}

/// Background completion transition for one submission.
///
/// Failures terminate the record at `failed` with the error logged against
/// the submission id; they are never propagated to any request.
#[instrument(skip(metadata_store, semaphore, input_path, output_path, chain), fields(submission_id = %id))]
async fn run_enhancement(
    metadata_store: Arc<MetadataStore>,
    semaphore: Arc<Semaphore>,
    id: String,
    input_path: PathBuf,
    output_path: PathBuf,
    chain: &'static [Stage],
) {
    let _permit = match semaphore.acquire().await {
        Ok(permit) => permit,
        // Closed semaphore means the process is tearing down
        Err(_) => return,
    };

    let start = Instant::now();
    let result = tokio::task::spawn_blocking(move || {
        enhancer::enhance_file(&input_path, &output_path, chain)
    })
    .await;

    // Flatten the join error into the enhancement result
    let result: Result<()> = match result {
        Ok(inner) => inner.map_err(Into::into),
        Err(join_error) => Err(join_error).context("Enhancement task panicked"),
    };

    match result {
        Ok(()) => {
            metrics::counter!("enhance.transforms.completed").increment(1);
            metrics::histogram!("enhance.transform.duration_seconds")
                .record(start.elapsed().as_secs_f64());

            if let Err(e) = metadata_store
                .set_status(&id, SubmissionStatus::Complete)
                .await
            {
                error!(submission_id = %id, error = %e, "Failed to persist completion");
            } else {
                info!(submission_id = %id, "Enhancement complete");
            }
        }
        Err(e) => {
            metrics::counter!("enhance.transforms.failed").increment(1);
            error!(submission_id = %id, error = %e, "Enhancement failed");

            if let Err(e) = metadata_store.set_status(&id, SubmissionStatus::Failed).await {
                error!(submission_id = %id, error = %e, "Failed to persist failure");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use std::collections::HashSet;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_wav_bytes() -> Vec<u8> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..400 {
                writer.write_sample(((i % 80) * 300 - 12000) as i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn test_lifecycle(dir: &TempDir) -> (Arc<SubmissionLifecycle>, Arc<MetadataStore>) {
        let storage = StorageConfig {
            upload_dir: dir.path().join("uploads"),
            processed_dir: dir.path().join("processed"),
            metadata_file: dir.path().join("submissions.json"),
            max_upload_bytes: 10 * 1024 * 1024,
        };
        std::fs::create_dir_all(&storage.upload_dir).unwrap();
        std::fs::create_dir_all(&storage.processed_dir).unwrap();

        let metadata_store = Arc::new(MetadataStore::load(&storage.metadata_file).unwrap());
        let artifacts = Arc::new(ArtifactStore::new(&storage));
        let lifecycle = Arc::new(SubmissionLifecycle::new(
            metadata_store.clone(),
            artifacts,
            4,
        ));
        (lifecycle, metadata_store)
    }

    async fn wait_for_terminal(store: &MetadataStore, id: &str) -> SubmissionStatus {
        for _ in 0..250 {
            if let Some(record) = store.get(id).await {
                if record.status != SubmissionStatus::Processing {
                    return record.status;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("submission {id} never left processing");
    }

    #[tokio::test]
    async fn test_submit_records_processing_before_returning() {
        let dir = TempDir::new().unwrap();
        let (lifecycle, store) = test_lifecycle(&dir);

        let receipt = lifecycle
            .submit("track.wav", "clean", test_wav_bytes())
            .await
            .unwrap();

        // Visible in the store the moment the receipt exists
        let record = store.get(&receipt.track_id).await.unwrap();
        assert_eq!(record.original_filename, "track.wav");
        assert_eq!(record.preset, "clean");
        assert_eq!(record.download_link, receipt.download_url);
        assert_eq!(
            receipt.download_url,
            format!("/download/enhanced_{}.wav", receipt.track_id)
        );
    }

    #[tokio::test]
    async fn test_submission_stays_processing_until_worker_runs() {
        let dir = TempDir::new().unwrap();
        let storage = StorageConfig {
            upload_dir: dir.path().join("uploads"),
            processed_dir: dir.path().join("processed"),
            metadata_file: dir.path().join("submissions.json"),
            max_upload_bytes: 10 * 1024 * 1024,
        };
        std::fs::create_dir_all(&storage.upload_dir).unwrap();
        std::fs::create_dir_all(&storage.processed_dir).unwrap();

        let store = Arc::new(MetadataStore::load(&storage.metadata_file).unwrap());
        let artifacts = Arc::new(ArtifactStore::new(&storage));
        // Zero permits: the background task can never start, so the record
        // must still read exactly as the upload left it
        let lifecycle = SubmissionLifecycle::new(store.clone(), artifacts, 0);

        let receipt = lifecycle
            .submit("track.wav", "clean", test_wav_bytes())
            .await
            .unwrap();

        let record = store.get(&receipt.track_id).await.unwrap();
        assert_eq!(record.status, SubmissionStatus::Processing);

        // Still processing after the scheduler has had every chance to run
        tokio::time::sleep(Duration::from_millis(50)).await;
        let record = store.get(&receipt.track_id).await.unwrap();
        assert_eq!(record.status, SubmissionStatus::Processing);
    }

    #[tokio::test]
    async fn test_submission_reaches_complete_with_artifact() {
        let dir = TempDir::new().unwrap();
        let (lifecycle, store) = test_lifecycle(&dir);

        let receipt = lifecycle
            .submit("track.wav", "bass", test_wav_bytes())
            .await
            .unwrap();

        let status = wait_for_terminal(&store, &receipt.track_id).await;
        assert_eq!(status, SubmissionStatus::Complete);

        let artifact = dir
            .path()
            .join("processed")
            .join(format!("enhanced_{}.wav", receipt.track_id));
        assert!(std::fs::metadata(&artifact).unwrap().len() > 0);
    }

    #[tokio::test]
    async fn test_unknown_preset_never_fails_the_upload() {
        let dir = TempDir::new().unwrap();
        let (lifecycle, store) = test_lifecycle(&dir);

        let receipt = lifecycle
            .submit("track.wav", "nonexistent", test_wav_bytes())
            .await
            .unwrap();

        let status = wait_for_terminal(&store, &receipt.track_id).await;
        assert_eq!(status, SubmissionStatus::Complete);
    }

    #[tokio::test]
    async fn test_undecodable_upload_terminates_at_failed() {
        let dir = TempDir::new().unwrap();
        let (lifecycle, store) = test_lifecycle(&dir);

        let bad = lifecycle
            .submit("garbage.wav", "clean", b"not a wav".to_vec())
            .await
            .unwrap();
        let good = lifecycle
            .submit("track.wav", "clean", test_wav_bytes())
            .await
            .unwrap();

        assert_eq!(
            wait_for_terminal(&store, &bad.track_id).await,
            SubmissionStatus::Failed
        );
        // The failure is isolated; other submissions proceed
        assert_eq!(
            wait_for_terminal(&store, &good.track_id).await,
            SubmissionStatus::Complete
        );
    }

    #[tokio::test]
    async fn test_concurrent_submissions_all_recorded() {
        let dir = TempDir::new().unwrap();
        let (lifecycle, store) = test_lifecycle(&dir);

        let mut handles = Vec::new();
        for i in 0..12 {
            let lifecycle = lifecycle.clone();
            handles.push(tokio::spawn(async move {
                lifecycle
                    .submit(&format!("track-{i}.wav"), "clean", test_wav_bytes())
                    .await
                    .unwrap()
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            let receipt = handle.await.unwrap();
            ids.insert(receipt.track_id);
        }
        assert_eq!(ids.len(), 12, "track ids must never be reused");
        assert_eq!(store.all().await.len(), 12);

        for id in &ids {
            assert_eq!(
                wait_for_terminal(&store, id).await,
                SubmissionStatus::Complete
            );
        }
    }
}
