use crate::config::StorageConfig;
use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Fixed container format for processed output
pub const PROCESSED_EXTENSION: &str = "wav";

/// Deterministic path layout for raw uploads and processed outputs.
///
/// Naming scheme:
/// - raw upload: `{upload_dir}/{id}_{original_filename}` so uploads keep a
///   human-readable name while the id prefix rules out collisions
/// - processed: `{processed_dir}/enhanced_{id}.wav`, pure function of the id
pub struct ArtifactStore {
    upload_dir: PathBuf,
    processed_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            upload_dir: config.upload_dir.clone(),
            processed_dir: config.processed_dir.clone(),
        }
    }

    /// Create the upload and processed directories if absent
    pub async fn ensure_dirs(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .context("Failed to create upload directory")?;
        tokio::fs::create_dir_all(&self.processed_dir)
            .await
            .context("Failed to create processed directory")?;

        debug!(
            upload_dir = %self.upload_dir.display(),
            processed_dir = %self.processed_dir.display(),
            "Artifact directories ready"
        );

        Ok(())
    }

    /// Path where the raw upload for `id` is written
    pub fn upload_path(&self, id: &str, original_filename: &str) -> PathBuf {
        self.upload_dir
            .join(format!("{id}_{}", sanitize_filename(original_filename)))
    }

    /// Filename of the processed output, as exposed in the download link
    pub fn processed_filename(id: &str) -> String {
        format!("enhanced_{id}.{PROCESSED_EXTENSION}")
    }

    /// Path where the processed output for `id` is written
    pub fn processed_path(&self, id: &str) -> PathBuf {
        self.processed_dir.join(Self::processed_filename(id))
    }

    /// Download link for `id`, derivable purely from the id
    pub fn download_link(id: &str) -> String {
        format!("/download/{}", Self::processed_filename(id))
    }

    /// Resolve a client-supplied filename inside the processed directory.
    ///
    /// Returns `None` for anything that is not a plain file name, so a path
    /// like `../submissions.json` can never escape the directory.
    pub fn resolve_processed(&self, filename: &str) -> Option<PathBuf> {
        if filename.is_empty() || Path::new(filename).file_name() != Some(OsStr::new(filename)) {
            return None;
        }
        Some(self.processed_dir.join(filename))
    }
}

/// Sanitize a client-supplied filename to a safe path component
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect();

    // A name of only dots would collapse into path navigation
    if cleaned.chars().all(|c| c == '.') {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Content type for a processed artifact filename
pub fn get_content_type(filename: &str) -> String {
    let extension = filename.rsplit('.').next().unwrap_or_default();
    match extension.to_lowercase().as_str() {
        "wav" => "audio/wav".to_string(),
        "mp3" => "audio/mpeg".to_string(),
        "flac" => "audio/flac".to_string(),
        "ogg" => "audio/ogg".to_string(),
        _ => "application/octet-stream".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;

    fn test_store() -> ArtifactStore {
        ArtifactStore::new(&StorageConfig::default())
    }

    #[test]
    fn test_upload_path_keeps_original_name() {
        let store = test_store();
        let path = store.upload_path("abc-123", "my song.wav");
        assert_eq!(path, PathBuf::from("uploads/abc-123_my_song.wav"));
    }

    #[test]
    fn test_processed_path_is_pure_function_of_id() {
        let store = test_store();
        assert_eq!(
            store.processed_path("abc-123"),
            PathBuf::from("processed/enhanced_abc-123.wav")
        );
        assert_eq!(
            ArtifactStore::download_link("abc-123"),
            "/download/enhanced_abc-123.wav"
        );
    }

    #[test]
    fn test_distinct_ids_never_collide() {
        let store = test_store();
        assert_ne!(store.processed_path("a"), store.processed_path("b"));
        // Identical original filenames are fine as long as ids differ
        assert_ne!(
            store.upload_path("a", "track.wav"),
            store.upload_path("b", "track.wav")
        );
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("track.wav"), "track.wav");
        assert_eq!(sanitize_filename("my song.wav"), "my_song.wav");
        assert_eq!(sanitize_filename("a/b/c.wav"), "a_b_c.wav");
        assert_eq!(sanitize_filename(".."), "upload");
    }

    #[test]
    fn test_resolve_processed_rejects_traversal() {
        let store = test_store();
        assert!(store.resolve_processed("enhanced_abc.wav").is_some());
        assert!(store.resolve_processed("../submissions.json").is_none());
        assert!(store.resolve_processed("a/b.wav").is_none());
        assert!(store.resolve_processed("").is_none());
    }

    #[test]
    fn test_get_content_type() {
        assert_eq!(get_content_type("enhanced_abc.wav"), "audio/wav");
        assert_eq!(get_content_type("track.MP3"), "audio/mpeg");
        assert_eq!(get_content_type("noext"), "application/octet-stream");
    }
}
