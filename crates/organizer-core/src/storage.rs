//! Object-storage abstraction for source uploads.
//!
//! Uploads land at deterministic paths (`/files/{uid}/{file_id}.{ext}`)
//! and report coarse progress through an [`UploadObserver`]. Failures map
//! onto the three transport codes of the backing service
//! (`unauthorized`, `canceled`, `unknown`) and are always surfaced to the
//! caller; nothing here retries.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use rand::Rng;

use crate::error::TransportError;

/// Transfer state reported alongside byte counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Running,
    Paused,
}

/// A single progress event for one upload.
#[derive(Debug, Clone, Copy)]
pub struct UploadProgress {
    pub state: UploadState,
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

/// Receives upload progress. Called from inside `upload`.
pub trait UploadObserver: Send + Sync {
    fn report(&self, progress: UploadProgress);
}

/// No-op observer for callers that do not render progress.
pub struct NoProgress;

impl UploadObserver for NoProgress {
    fn report(&self, _progress: UploadProgress) {}
}

/// Abstract object-storage backend.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload a blob to `path`. Progress events are reported to
    /// `observer`; the terminal outcome is the returned `Result`.
    async fn upload(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
        observer: &dyn UploadObserver,
    ) -> Result<(), TransportError>;

    /// Resolve a URL from which the uploaded blob can be fetched.
    async fn download_url(&self, path: &str) -> Result<String, TransportError>;
}

const FILE_ID_LEN: usize = 20;
const ALPHANUMERIC: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

/// Generate a 20-character alphanumeric file id.
pub fn new_file_id() -> String {
    let mut rng = rand::thread_rng();
    (0..FILE_ID_LEN)
        .map(|_| ALPHANUMERIC[rng.gen_range(0..ALPHANUMERIC.len())] as char)
        .collect()
}

/// Deterministic upload path for a user's file: `/files/{uid}/{id}.{ext}`.
///
/// The extension is taken from the original file name; files without an
/// extension keep the bare id.
pub fn upload_path(uid: &str, file_id: &str, file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => format!("/files/{uid}/{file_id}.{ext}"),
        _ => format!("/files/{uid}/{file_id}"),
    }
}

struct StoredBlob {
    bytes: Vec<u8>,
    content_type: String,
}

/// In-process object storage for tests and local use.
///
/// Reports one `Running` progress event per 256 KiB plus a final one, so
/// observers see the same shape of stream a remote backend produces.
pub struct MemoryObjectStorage {
    blobs: RwLock<HashMap<String, StoredBlob>>,
}

const PROGRESS_CHUNK: u64 = 256 * 1024;

impl MemoryObjectStorage {
    pub fn new() -> Self {
        MemoryObjectStorage {
            blobs: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored blobs. Used by tests to assert that rejected
    /// uploads produced no storage side effect.
    pub fn len(&self) -> usize {
        self.blobs.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn content_type_of(&self, path: &str) -> Option<String> {
        self.blobs
            .read()
            .unwrap()
            .get(path)
            .map(|blob| blob.content_type.clone())
    }
}

impl Default for MemoryObjectStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn upload(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
        observer: &dyn UploadObserver,
    ) -> Result<(), TransportError> {
        let total = bytes.len() as u64;
        let mut transferred = 0u64;
        while transferred < total {
            transferred = (transferred + PROGRESS_CHUNK).min(total);
            observer.report(UploadProgress {
                state: UploadState::Running,
                bytes_transferred: transferred,
                total_bytes: total,
            });
        }
        if total == 0 {
            observer.report(UploadProgress {
                state: UploadState::Running,
                bytes_transferred: 0,
                total_bytes: 0,
            });
        }
        self.blobs.write().unwrap().insert(
            path.to_string(),
            StoredBlob {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn download_url(&self, path: &str) -> Result<String, TransportError> {
        let blobs = self.blobs.read().unwrap();
        if !blobs.contains_key(path) {
            return Err(TransportError::Unknown);
        }
        Ok(format!("memory://{path}"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn file_ids_are_alphanumeric_and_sized() {
        let id = new_file_id();
        assert_eq!(id.len(), FILE_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(new_file_id(), id);
    }

    #[test]
    fn upload_path_keeps_extension() {
        assert_eq!(
            upload_path("u1", "abc123", "report.pdf"),
            "/files/u1/abc123.pdf"
        );
        assert_eq!(upload_path("u1", "abc123", "README"), "/files/u1/abc123");
    }

    struct Recorder(Mutex<Vec<UploadProgress>>);

    impl UploadObserver for Recorder {
        fn report(&self, progress: UploadProgress) {
            self.0.lock().unwrap().push(progress);
        }
    }

    #[tokio::test]
    async fn upload_reports_monotonic_progress() {
        let storage = MemoryObjectStorage::new();
        let recorder = Recorder(Mutex::new(Vec::new()));
        let bytes = vec![0u8; (PROGRESS_CHUNK * 2 + 10) as usize];

        storage
            .upload("/files/u1/a.bin", &bytes, "application/pdf", &recorder)
            .await
            .unwrap();

        let events = recorder.0.into_inner().unwrap();
        assert_eq!(events.len(), 3);
        assert!(events.windows(2).all(|w| {
            w[0].bytes_transferred <= w[1].bytes_transferred
        }));
        assert_eq!(events.last().unwrap().bytes_transferred, bytes.len() as u64);

        let url = storage.download_url("/files/u1/a.bin").await.unwrap();
        assert_eq!(url, "memory:///files/u1/a.bin");
    }

    #[tokio::test]
    async fn download_url_for_missing_blob_is_unknown() {
        let storage = MemoryObjectStorage::new();
        assert_eq!(
            storage.download_url("/files/u1/missing").await,
            Err(TransportError::Unknown)
        );
    }
}
