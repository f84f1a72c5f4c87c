//! Storage abstraction for AI Organizer.
//!
//! The [`NotebookStore`] trait defines every operation the lifecycle
//! manager and chat coordinator need from the external document store:
//! per-collection CRUD, an atomic counter increment, and push
//! subscriptions that deliver a full result set on every commit.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.
//! [`memory::MemoryStore`] is the in-process implementation used by tests
//! and local tooling.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::models::{Message, MessageStatus, Note, Notebook, Source, SourceStatus, User};

/// Collections of the per-user document tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Users,
    Notebooks,
    Sources,
    Chat,
    Notes,
}

/// A committed change, broadcast to interested subscriptions.
///
/// Events carry only the affected scope, not the data; subscribers
/// re-snapshot their query, matching the external store's semantics of
/// pushing full result sets.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub uid: String,
    /// `None` for user-level collections.
    pub notebook_id: Option<String>,
}

/// Scope filter deciding which [`ChangeEvent`]s are relevant to one
/// subscription.
#[derive(Debug, Clone)]
pub(crate) struct Scope {
    collection: Collection,
    uid: String,
    notebook_id: Option<String>,
}

impl Scope {
    pub(crate) fn user(collection: Collection, uid: &str) -> Self {
        Scope {
            collection,
            uid: uid.to_string(),
            notebook_id: None,
        }
    }

    pub(crate) fn notebook(collection: Collection, uid: &str, notebook_id: &str) -> Self {
        Scope {
            collection,
            uid: uid.to_string(),
            notebook_id: Some(notebook_id.to_string()),
        }
    }

    fn matches(&self, event: &ChangeEvent) -> bool {
        event.collection == self.collection
            && event.uid == self.uid
            && match &self.notebook_id {
                Some(nb) => event.notebook_id.as_deref() == Some(nb.as_str()),
                None => true,
            }
    }
}

/// A live, push-driven view over one query.
///
/// The first call to [`next`](Subscription::next) yields the current
/// snapshot; every later call waits for a relevant commit and yields a
/// fresh full result set. Re-subscribing is always safe and starts from a
/// fresh snapshot. Delivery stops only when the subscription is cancelled
/// (or dropped) or the store itself goes away — there is no automatic
/// timeout, so callers own the unsubscribe.
pub struct Subscription<T> {
    rx: broadcast::Receiver<ChangeEvent>,
    scope: Scope,
    snapshot: Box<dyn Fn() -> Vec<T> + Send + Sync>,
    primed: bool,
}

impl<T> Subscription<T> {
    pub(crate) fn new(
        rx: broadcast::Receiver<ChangeEvent>,
        scope: Scope,
        snapshot: Box<dyn Fn() -> Vec<T> + Send + Sync>,
    ) -> Self {
        Subscription {
            rx,
            scope,
            snapshot,
            primed: false,
        }
    }

    /// Wait for the next result set.
    ///
    /// Returns `None` once the backing store has been dropped, after which
    /// no further updates can arrive.
    pub async fn next(&mut self) -> Option<Vec<T>> {
        if !self.primed {
            self.primed = true;
            return Some((self.snapshot)());
        }
        loop {
            match self.rx.recv().await {
                Ok(event) if self.scope.matches(&event) => return Some((self.snapshot)()),
                Ok(_) => continue,
                // Missed events collapse into one re-snapshot; every
                // delivery is a full result set, so nothing is lost.
                Err(broadcast::error::RecvError::Lagged(_)) => return Some((self.snapshot)()),
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Stop receiving updates. Dropping the subscription has the same
    /// effect; this form makes the hand-off explicit at call sites.
    pub fn cancel(self) {}
}

/// Field patch for a source. `None` leaves the field untouched.
///
/// Status transitions driven by the external enrichment worker (flipping
/// `creating` to `created` with `rag_file_id`, `summarization` and
/// `questions` filled in) arrive through the same patch shape.
#[derive(Debug, Clone, Default)]
pub struct SourcePatch {
    pub name: Option<String>,
    pub selected: Option<bool>,
    pub status: Option<SourceStatus>,
    pub rag_file_id: Option<String>,
    pub summarization: Option<String>,
    pub questions: Option<Vec<String>>,
}

/// Field patch for a model-role message being completed by the external
/// responder.
#[derive(Debug, Clone, Default)]
pub struct MessagePatch {
    pub content: Option<String>,
    pub loading: Option<bool>,
    pub status: Option<MessageStatus>,
}

/// Abstract document store backing the organizer.
///
/// Mutations are individually durable but not coordinated with each other:
/// only [`increment_source_count`](NotebookStore::increment_source_count)
/// is atomic under concurrent writers. Within one subscription stream,
/// updates arrive in commit order; across collections no ordering is
/// guaranteed.
#[async_trait]
pub trait NotebookStore: Send + Sync {
    // --- users ---
    async fn add_user(&self, user: &User) -> Result<()>;
    async fn get_user(&self, uid: &str) -> Result<Option<User>>;
    /// Provisioning-worker transition: `creating` → `created`, with the
    /// corpus name recorded.
    async fn mark_user_created(&self, uid: &str, corpus_name: &str) -> Result<()>;
    /// Live view of one account. Snapshots hold zero or one element.
    fn subscribe_user(&self, uid: &str) -> Subscription<User>;

    // --- notebooks ---
    async fn add_notebook(&self, uid: &str, notebook: &Notebook) -> Result<()>;
    async fn get_notebook(&self, uid: &str, id: &str) -> Result<Option<Notebook>>;
    async fn rename_notebook(&self, uid: &str, id: &str, title: &str) -> Result<()>;
    /// Atomic counter bump, safe under concurrent writers.
    async fn increment_source_count(&self, uid: &str, id: &str, delta: i64) -> Result<()>;
    /// Notebooks ordered by `created_at` descending.
    fn subscribe_notebooks(&self, uid: &str) -> Subscription<Notebook>;

    // --- sources ---
    async fn insert_source(&self, uid: &str, notebook_id: &str, source: &Source) -> Result<()>;
    async fn get_source(&self, uid: &str, notebook_id: &str, id: &str)
        -> Result<Option<Source>>;
    async fn update_source(
        &self,
        uid: &str,
        notebook_id: &str,
        id: &str,
        patch: SourcePatch,
    ) -> Result<()>;
    /// Hard removal; normally issued by the external deletion worker after
    /// the soft `deleting` transition.
    async fn remove_source(&self, uid: &str, notebook_id: &str, id: &str) -> Result<()>;
    /// Sources ordered by `created_at` descending.
    async fn list_sources(&self, uid: &str, notebook_id: &str) -> Result<Vec<Source>>;
    fn subscribe_sources(&self, uid: &str, notebook_id: &str) -> Subscription<Source>;

    // --- chat transcript ---
    async fn append_message(&self, uid: &str, notebook_id: &str, message: &Message)
        -> Result<()>;
    async fn update_message(
        &self,
        uid: &str,
        notebook_id: &str,
        id: &str,
        patch: MessagePatch,
    ) -> Result<()>;
    async fn delete_message(&self, uid: &str, notebook_id: &str, id: &str) -> Result<()>;
    /// Transcript ordered by `created_at` ascending.
    async fn list_messages(&self, uid: &str, notebook_id: &str) -> Result<Vec<Message>>;
    fn subscribe_messages(&self, uid: &str, notebook_id: &str) -> Subscription<Message>;

    // --- notes ---
    async fn add_note(&self, uid: &str, notebook_id: &str, note: &Note) -> Result<()>;
    /// Notes ordered by `created_at` descending.
    async fn list_notes(&self, uid: &str, notebook_id: &str) -> Result<Vec<Note>>;
    fn subscribe_notes(&self, uid: &str, notebook_id: &str) -> Subscription<Note>;
}
