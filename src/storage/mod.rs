// Storage layer for uploaded dataset files

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod fs;

pub use fs::FsBlobStore;

/// Raw file storage keyed by relative paths.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, data: &[u8]) -> std::io::Result<()>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> std::io::Result<()>;
}

/// Keep only characters that are safe in a single path component.
pub(crate) fn sanitize_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload.csv".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Storage key for a dataset's original upload, bucketed by day.
pub fn dataset_file_key(dataset_id: Uuid, filename: &str, uploaded_at: DateTime<Utc>) -> String {
    format!(
        "datasets/{}/{}_{}",
        uploaded_at.format("%Y/%m/%d"),
        dataset_id.simple(),
        sanitize_filename(filename)
    )
}
