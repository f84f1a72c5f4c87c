//! Core data models used throughout AI Organizer.
//!
//! These types mirror the documents held by the external store: one `User`
//! owns `Notebook`s, each notebook owns `Source`s, a chat transcript of
//! `Message`s, and pinned `Note`s. Field names serialize in camelCase to
//! match the store's wire contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account provisioning state. A user starts as `Creating` and becomes
/// `Created` once the external provisioning worker finishes corpus setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Creating,
    Created,
}

/// An account in the store, created on signup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub status: UserStatus,
    /// Name of the retrieval corpus provisioned for this account; set by
    /// the provisioning worker together with the `Created` transition.
    pub corpus_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A per-user container grouping sources, a chat transcript, and notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notebook {
    pub id: String,
    pub title: String,
    /// Eventually-consistent historical counter: incremented on every
    /// source creation, never decremented on delete.
    pub source_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle state of an uploaded source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    /// Uploaded, waiting for the external enrichment worker.
    Creating,
    /// Enriched: `rag_file_id`, `summarization` and `questions` populated.
    Created,
    /// Soft-deleted; an external worker performs the actual removal.
    Deleting,
    /// Enrichment failed.
    Error,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Creating => "creating",
            SourceStatus::Created => "created",
            SourceStatus::Deleting => "deleting",
            SourceStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-uploaded document attached to a notebook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: String,
    pub name: String,
    /// MIME type of the uploaded file.
    #[serde(rename = "type")]
    pub mime_type: String,
    pub storage_path: String,
    /// Identifier assigned by the external RAG indexing service once
    /// enrichment completes.
    pub rag_file_id: Option<String>,
    pub status: SourceStatus,
    pub download_url: String,
    pub summarization: Option<String>,
    pub questions: Option<Vec<String>>,
    /// User-toggled inclusion in the chat context. Only meaningful while
    /// `status == Created`; the store itself does not enforce this.
    pub selected: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Source {
    /// Whether this source has finished enrichment and can be selected,
    /// renamed, or used for chat.
    pub fn is_created(&self) -> bool {
        self.status == SourceStatus::Created
    }
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// Terminal outcome of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Success,
    Failed,
}

/// One turn in a notebook's transcript, ordered by `created_at` ascending.
///
/// Immutable once written, except that the external responder updates
/// `content` and `loading` of a model-role message while completing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub content: String,
    /// True while the external responder is still producing this turn.
    pub loading: bool,
    /// Snapshot of the RAG file ids selected at send time; never
    /// recomputed, even if sources are deleted later.
    pub rag_file_ids: Vec<String>,
    pub role: Role,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// A model turn still waiting on the external responder.
    pub fn is_pending(&self) -> bool {
        self.role == Role::Model && self.loading
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteStatus {
    Creating,
    Created,
}

/// A pinned copy of a model message's content. Append-only and read-only
/// once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub content: String,
    pub status: NoteStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_serializes_with_wire_field_names() {
        let source = Source {
            id: "s1".into(),
            name: "paper.pdf".into(),
            mime_type: "application/pdf".into(),
            storage_path: "/files/u1/abc.pdf".into(),
            rag_file_id: None,
            status: SourceStatus::Creating,
            download_url: "memory:///files/u1/abc.pdf".into(),
            summarization: None,
            questions: None,
            selected: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(&source).unwrap();
        assert_eq!(json["type"], "application/pdf");
        assert_eq!(json["status"], "creating");
        assert_eq!(json["ragFileId"], serde_json::Value::Null);
        assert!(json.get("downloadURL").is_none());
        assert_eq!(json["downloadUrl"], "memory:///files/u1/abc.pdf");
    }

    #[test]
    fn pending_is_model_and_loading_only() {
        let mut m = Message {
            id: "m1".into(),
            content: String::new(),
            loading: true,
            rag_file_ids: vec![],
            role: Role::Model,
            status: MessageStatus::Success,
            created_at: Utc::now(),
        };
        assert!(m.is_pending());
        m.loading = false;
        assert!(!m.is_pending());
        m.loading = true;
        m.role = Role::User;
        assert!(!m.is_pending());
    }
}
