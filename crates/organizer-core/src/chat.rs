//! Chat session coordination.
//!
//! Accepts a user query plus the currently selected sources, appends the
//! user turn to the transcript, and observes the model's asynchronous
//! reply. The coordinator never calls the model itself — an external
//! responder appends a model-role message (`loading = true`) and completes
//! or fails it; this code only writes the user turn and watches the
//! transcript.
//!
//! Per model turn the state machine is
//! `pending(loading=true) → completed(loading=false, success)` or
//! `pending → failed`. No timeout bounds a turn stuck in `pending`.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, ValidationError};
use crate::models::{Message, MessageStatus, Note, NoteStatus, Role, Source};
use crate::store::{NotebookStore, Subscription};
use crate::validate::{check_min_len, MESSAGE_MIN_LEN};

/// Coordinates a notebook's transcript and pinned notes.
pub struct ChatCoordinator {
    store: Arc<dyn NotebookStore>,
    uid: String,
}

impl ChatCoordinator {
    pub fn new(store: Arc<dyn NotebookStore>, uid: impl Into<String>) -> Self {
        ChatCoordinator {
            store,
            uid: uid.into(),
        }
    }

    /// The RAG file ids of sources that are both selected and enriched —
    /// the set a caller snapshots into [`send_message`](Self::send_message).
    pub async fn selected_rag_file_ids(&self, notebook_id: &str) -> Result<Vec<String>> {
        let sources = self.store.list_sources(&self.uid, notebook_id).await?;
        Ok(selected_rag_file_ids(&sources))
    }

    /// Append a user turn to the transcript.
    ///
    /// Preconditions: `content` is at least two characters, and at least
    /// one source is currently selected and `created`. The given
    /// `rag_file_ids` are recorded as an immutable snapshot on the
    /// message; they are never recomputed, even if sources are deleted
    /// later. The model's reply arrives asynchronously through the
    /// external responder and is observed via
    /// [`subscribe_transcript`](Self::subscribe_transcript).
    pub async fn send_message(
        &self,
        notebook_id: &str,
        content: &str,
        rag_file_ids: Vec<String>,
    ) -> Result<Message> {
        check_min_len("message", content, MESSAGE_MIN_LEN)?;

        let sources = self.store.list_sources(&self.uid, notebook_id).await?;
        if selected_rag_file_ids(&sources).is_empty() {
            return Err(ValidationError::NoSourcesSelected.into());
        }

        let message = Message {
            id: Uuid::new_v4().to_string(),
            content: content.to_string(),
            loading: false,
            rag_file_ids,
            role: Role::User,
            status: MessageStatus::Success,
            created_at: Utc::now(),
        };
        self.store
            .append_message(&self.uid, notebook_id, &message)
            .await?;
        debug!(notebook = %notebook_id, message = %message.id, "user turn appended");
        Ok(message)
    }

    /// Live transcript view, oldest first. Must be cancelled (or dropped)
    /// by the caller when its scope ends.
    pub fn subscribe_transcript(&self, notebook_id: &str) -> Subscription<Message> {
        self.store.subscribe_messages(&self.uid, notebook_id)
    }

    /// Delete every message in the notebook's transcript.
    ///
    /// Each deletion is an independent store operation, not a transaction:
    /// a `send_message` racing with a clear can survive or be lost
    /// nondeterministically. Accepted behavior for a chat tool.
    pub async fn clear_transcript(&self, notebook_id: &str) -> Result<()> {
        let messages = self.store.list_messages(&self.uid, notebook_id).await?;
        let count = messages.len();
        for message in messages {
            self.store
                .delete_message(&self.uid, notebook_id, &message.id)
                .await?;
        }
        info!(notebook = %notebook_id, count, "transcript cleared");
        Ok(())
    }

    /// Pin a model message's content as an immutable note.
    pub async fn pin_message(&self, notebook_id: &str, content: &str) -> Result<Note> {
        let note = Note {
            id: Uuid::new_v4().to_string(),
            content: content.to_string(),
            status: NoteStatus::Created,
            created_at: Utc::now(),
        };
        self.store.add_note(&self.uid, notebook_id, &note).await?;
        Ok(note)
    }

    /// Live view of pinned notes, newest first.
    pub fn subscribe_notes(&self, notebook_id: &str) -> Subscription<Note> {
        self.store.subscribe_notes(&self.uid, notebook_id)
    }
}

/// RAG file ids of sources that are selected and enriched, in snapshot
/// order.
pub fn selected_rag_file_ids(sources: &[Source]) -> Vec<String> {
    sources
        .iter()
        .filter(|s| s.is_created() && s.selected)
        .filter_map(|s| s.rag_file_id.clone())
        .collect()
}

/// Union of the suggested questions of every selected, enriched source.
///
/// Deduplicated, first occurrence wins. Derived on demand from a sources
/// snapshot and never persisted.
pub fn common_questions(sources: &[Source]) -> Vec<String> {
    let mut questions = Vec::new();
    for source in sources.iter().filter(|s| s.is_created() && s.selected) {
        for question in source.questions.iter().flatten() {
            if !questions.contains(question) {
                questions.push(question.clone());
            }
        }
    }
    questions
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::error::Error;
    use crate::models::SourceStatus;
    use crate::store::memory::MemoryStore;
    use crate::store::MessagePatch;

    const UID: &str = "u1";
    const NB: &str = "nb1";

    fn source(id: &str, status: SourceStatus, selected: bool, questions: &[&str]) -> Source {
        let now = Utc::now();
        Source {
            id: id.to_string(),
            name: format!("{id}.txt"),
            mime_type: "text/plain".into(),
            storage_path: format!("/files/{UID}/{id}.txt"),
            rag_file_id: Some(format!("rag-{id}")),
            status,
            download_url: String::new(),
            summarization: None,
            questions: if questions.is_empty() {
                None
            } else {
                Some(questions.iter().map(|q| q.to_string()).collect())
            },
            selected,
            created_at: now,
            updated_at: now,
        }
    }

    async fn coordinator_with(sources: Vec<Source>) -> (Arc<MemoryStore>, ChatCoordinator) {
        let store = Arc::new(MemoryStore::new());
        for s in &sources {
            store.insert_source(UID, NB, s).await.unwrap();
        }
        let chat = ChatCoordinator::new(store.clone(), UID);
        (store, chat)
    }

    #[tokio::test]
    async fn short_content_is_rejected_without_a_write() {
        let (store, chat) =
            coordinator_with(vec![source("a", SourceStatus::Created, true, &[])]).await;
        let err = chat
            .send_message(NB, "x", vec!["rag-a".into()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::TextTooShort { .. })
        ));
        assert!(store.list_messages(UID, NB).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_requires_a_selected_created_source() {
        // Only a creating-status, unselected source exists: refused.
        let (store, chat) =
            coordinator_with(vec![source("a", SourceStatus::Creating, false, &[])]).await;
        let err = chat.send_message(NB, "hello", vec![]).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::NoSourcesSelected)
        ));
        assert!(store.list_messages(UID, NB).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn selected_but_not_created_does_not_count() {
        let (_store, chat) =
            coordinator_with(vec![source("a", SourceStatus::Creating, true, &[])]).await;
        assert!(chat.send_message(NB, "hello", vec![]).await.is_err());
    }

    #[tokio::test]
    async fn sent_message_snapshots_rag_ids() {
        let (store, chat) = coordinator_with(vec![
            source("a", SourceStatus::Created, true, &[]),
            source("b", SourceStatus::Created, false, &[]),
        ])
        .await;

        let rag_ids = chat.selected_rag_file_ids(NB).await.unwrap();
        assert_eq!(rag_ids, vec!["rag-a".to_string()]);

        let message = chat.send_message(NB, "hello", rag_ids).await.unwrap();
        assert_eq!(message.role, Role::User);
        assert_eq!(message.status, MessageStatus::Success);
        assert!(!message.loading);

        // Deleting the source later does not rewrite the snapshot.
        store.remove_source(UID, NB, "a").await.unwrap();
        let listed = store.list_messages(UID, NB).await.unwrap();
        assert_eq!(listed[0].rag_file_ids, vec!["rag-a".to_string()]);
    }

    #[tokio::test]
    async fn transcript_is_ascending_and_observes_model_turn() {
        let (store, chat) =
            coordinator_with(vec![source("a", SourceStatus::Created, true, &[])]).await;
        let mut sub = chat.subscribe_transcript(NB);
        assert!(sub.next().await.unwrap().is_empty());

        chat.send_message(NB, "first question", vec!["rag-a".into()])
            .await
            .unwrap();
        assert_eq!(sub.next().await.unwrap().len(), 1);

        // External responder appends a pending model turn, then completes it.
        let reply = Message {
            id: "m-reply".into(),
            content: String::new(),
            loading: true,
            rag_file_ids: vec![],
            role: Role::Model,
            status: MessageStatus::Success,
            created_at: Utc::now() + Duration::milliseconds(5),
        };
        store.append_message(UID, NB, &reply).await.unwrap();
        let snapshot = sub.next().await.unwrap();
        assert!(snapshot[1].is_pending());

        store
            .update_message(
                UID,
                NB,
                "m-reply",
                MessagePatch {
                    content: Some("an answer".into()),
                    loading: Some(false),
                    status: Some(MessageStatus::Success),
                },
            )
            .await
            .unwrap();
        let snapshot = sub.next().await.unwrap();
        assert!(!snapshot[1].loading);
        assert_eq!(snapshot[1].content, "an answer");

        let times: Vec<_> = snapshot.iter().map(|m| m.created_at).collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted, "transcript must be createdAt ascending");
        sub.cancel();
    }

    #[tokio::test]
    async fn clear_transcript_deletes_every_message() {
        let (store, chat) =
            coordinator_with(vec![source("a", SourceStatus::Created, true, &[])]).await;
        for text in ["question one", "question two"] {
            chat.send_message(NB, text, vec!["rag-a".into()])
                .await
                .unwrap();
        }
        assert_eq!(store.list_messages(UID, NB).await.unwrap().len(), 2);

        chat.clear_transcript(NB).await.unwrap();
        assert!(store.list_messages(UID, NB).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pin_message_round_trip() {
        let (store, chat) = coordinator_with(vec![]).await;
        let note = chat.pin_message(NB, "Hello world").await.unwrap();
        assert_eq!(note.content, "Hello world");
        assert_eq!(note.status, NoteStatus::Created);

        let listed = store.list_notes(UID, NB).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].content, "Hello world");
    }

    #[test]
    fn common_questions_unions_selected_created_sources() {
        let sources = vec![
            source(
                "a",
                SourceStatus::Created,
                true,
                &["what is rust?", "why traits?"],
            ),
            source("b", SourceStatus::Created, true, &["why traits?", "how async?"]),
            // Selected but still enriching: contributes nothing.
            source("c", SourceStatus::Creating, true, &["ignored"]),
            // Enriched but not selected: contributes nothing.
            source("d", SourceStatus::Created, false, &["ignored too"]),
        ];
        assert_eq!(
            common_questions(&sources),
            vec![
                "what is rust?".to_string(),
                "why traits?".to_string(),
                "how async?".to_string(),
            ]
        );
    }

    #[test]
    fn common_questions_reacts_to_selection_changes() {
        let mut sources = vec![source("a", SourceStatus::Created, true, &["q1"])];
        assert_eq!(common_questions(&sources), vec!["q1".to_string()]);
        sources[0].selected = false;
        assert!(common_questions(&sources).is_empty());
    }
}
