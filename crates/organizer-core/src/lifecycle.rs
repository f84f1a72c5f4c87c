//! Source lifecycle management.
//!
//! Drives a source through `creating → created → deleting` (or `error`) in
//! response to user actions. The `creating → created` transition itself
//! belongs to the external enrichment worker, which writes `rag_file_id`,
//! `summarization`, and `questions` back through the store; this manager
//! only observes it via [`subscribe`](SourceLifecycle::subscribe).
//!
//! Validation runs before any byte is uploaded, so a rejected file never
//! touches storage. Upload transport failures are surfaced as-is and never
//! retried. A source whose enrichment worker dies stays in `creating`;
//! no automatic reconciliation moves it to a terminal state.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::error::{Error, Result};
use crate::models::{Source, SourceStatus};
use crate::storage::{new_file_id, upload_path, ObjectStorage, UploadObserver};
use crate::store::{NotebookStore, SourcePatch, Subscription};
use crate::validate::{check_text_len, check_upload, SOURCE_NAME_LEN};

/// A file handed over by the caller for upload.
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Original file name, kept as the source's display name.
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Governs the states a user-uploaded source passes through.
pub struct SourceLifecycle {
    store: Arc<dyn NotebookStore>,
    storage: Arc<dyn ObjectStorage>,
    uid: String,
}

impl SourceLifecycle {
    pub fn new(
        store: Arc<dyn NotebookStore>,
        storage: Arc<dyn ObjectStorage>,
        uid: impl Into<String>,
    ) -> Self {
        SourceLifecycle {
            store,
            storage,
            uid: uid.into(),
        }
    }

    /// Validate, upload, and register a new source.
    ///
    /// On success exactly one record exists with `status = creating` and
    /// the parent notebook's `source_count` has grown by one. Validation
    /// failures are returned before any upload is attempted; upload
    /// failures are returned before any record is written.
    pub async fn add_source(
        &self,
        notebook_id: &str,
        file: UploadFile,
        observer: &dyn UploadObserver,
    ) -> Result<Source> {
        check_upload(&file.mime_type, file.bytes.len() as u64)?;

        let file_id = new_file_id();
        let path = upload_path(&self.uid, &file_id, &file.name);

        self.storage
            .upload(&path, &file.bytes, &file.mime_type, observer)
            .await?;
        let download_url = self.storage.download_url(&path).await?;

        let now = Utc::now();
        let source = Source {
            id: file_id,
            name: file.name,
            mime_type: file.mime_type,
            storage_path: path,
            rag_file_id: None,
            status: SourceStatus::Creating,
            download_url,
            summarization: None,
            questions: None,
            selected: false,
            created_at: now,
            updated_at: now,
        };
        self.store
            .insert_source(&self.uid, notebook_id, &source)
            .await?;
        self.store
            .increment_source_count(&self.uid, notebook_id, 1)
            .await?;

        info!(source = %source.id, notebook = %notebook_id, "source uploaded, awaiting enrichment");
        Ok(source)
    }

    /// Soft delete: mark the source `deleting` and return immediately.
    ///
    /// The actual removal from storage and index, and the final record
    /// deletion, belong to an external worker; this call does not block on
    /// them. The notebook's `source_count` is a historical counter and is
    /// not decremented.
    pub async fn delete_source(&self, notebook_id: &str, id: &str) -> Result<()> {
        self.require_source(notebook_id, id).await?;
        self.store
            .update_source(
                &self.uid,
                notebook_id,
                id,
                SourcePatch {
                    status: Some(SourceStatus::Deleting),
                    ..SourcePatch::default()
                },
            )
            .await?;
        info!(source = %id, "source marked deleting");
        Ok(())
    }

    /// Rename a source. Permitted only while the source is `created`.
    pub async fn rename_source(&self, notebook_id: &str, id: &str, new_name: &str) -> Result<()> {
        check_text_len("name", new_name, SOURCE_NAME_LEN.0, SOURCE_NAME_LEN.1)?;
        self.require_created(notebook_id, id).await?;
        self.store
            .update_source(
                &self.uid,
                notebook_id,
                id,
                SourcePatch {
                    name: Some(new_name.to_string()),
                    ..SourcePatch::default()
                },
            )
            .await?;
        Ok(())
    }

    /// Set the selection flag. Permitted only while the source is
    /// `created`; idempotent for a repeated value.
    pub async fn toggle_selected(&self, notebook_id: &str, id: &str, selected: bool) -> Result<()> {
        self.require_created(notebook_id, id).await?;
        self.store
            .update_source(
                &self.uid,
                notebook_id,
                id,
                SourcePatch {
                    selected: Some(selected),
                    ..SourcePatch::default()
                },
            )
            .await?;
        Ok(())
    }

    /// Live view of the notebook's sources, newest first. The caller owns
    /// the subscription and must cancel (or drop) it when its scope ends.
    pub fn subscribe(&self, notebook_id: &str) -> Subscription<Source> {
        self.store.subscribe_sources(&self.uid, notebook_id)
    }

    async fn require_source(&self, notebook_id: &str, id: &str) -> Result<Source> {
        self.store
            .get_source(&self.uid, notebook_id, id)
            .await?
            .ok_or_else(|| Error::not_found("source", id))
    }

    async fn require_created(&self, notebook_id: &str, id: &str) -> Result<Source> {
        let source = self.require_source(notebook_id, id).await?;
        if !source.is_created() {
            return Err(Error::StaleState {
                id: source.id,
                status: source.status,
            });
        }
        Ok(source)
    }
}
