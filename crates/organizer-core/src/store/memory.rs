//! In-memory [`NotebookStore`] implementation.
//!
//! Holds the per-user document tree in `HashMap`s and `Vec`s behind
//! `std::sync::RwLock`, and fans change events out over a
//! `tokio::sync::broadcast` channel. Every subscription re-snapshots its
//! query on each relevant event, so delivery is always a full result set.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;

use crate::models::{Message, Note, Notebook, Source, User, UserStatus};

use super::{
    ChangeEvent, Collection, MessagePatch, NotebookStore, Scope, SourcePatch, Subscription,
};

type NotebookKey = (String, String);

#[derive(Default)]
struct State {
    users: HashMap<String, User>,
    /// uid → notebooks, in insertion order.
    notebooks: HashMap<String, Vec<Notebook>>,
    /// (uid, notebook) → sources, in insertion order.
    sources: HashMap<NotebookKey, Vec<Source>>,
    /// (uid, notebook) → transcript, in append order.
    messages: HashMap<NotebookKey, Vec<Message>>,
    /// (uid, notebook) → notes, in append order.
    notes: HashMap<NotebookKey, Vec<Note>>,
}

/// In-process store used by tests and local tooling.
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
    events: broadcast::Sender<ChangeEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        MemoryStore {
            state: Arc::new(RwLock::new(State::default())),
            events,
        }
    }

    fn publish(&self, collection: Collection, uid: &str, notebook_id: Option<&str>) {
        // No receivers is fine; send only fails when nobody listens.
        let _ = self.events.send(ChangeEvent {
            collection,
            uid: uid.to_string(),
            notebook_id: notebook_id.map(str::to_string),
        });
    }

    fn key(uid: &str, notebook_id: &str) -> NotebookKey {
        (uid.to_string(), notebook_id.to_string())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable `created_at` descending: ascending stable sort, then reverse, so
/// same-instant records come out newest-insertion first.
fn sort_desc<T>(items: &mut [T], created_at: impl Fn(&T) -> chrono::DateTime<Utc>) {
    items.sort_by_key(|item| created_at(item));
    items.reverse();
}

#[async_trait]
impl NotebookStore for MemoryStore {
    async fn add_user(&self, user: &User) -> Result<()> {
        {
            let mut state = self.state.write().unwrap();
            state.users.insert(user.id.clone(), user.clone());
        }
        self.publish(Collection::Users, &user.id, None);
        Ok(())
    }

    async fn get_user(&self, uid: &str) -> Result<Option<User>> {
        let state = self.state.read().unwrap();
        Ok(state.users.get(uid).cloned())
    }

    async fn mark_user_created(&self, uid: &str, corpus_name: &str) -> Result<()> {
        {
            let mut state = self.state.write().unwrap();
            let user = match state.users.get_mut(uid) {
                Some(u) => u,
                None => bail!("user '{}' not found", uid),
            };
            user.status = UserStatus::Created;
            user.corpus_name = Some(corpus_name.to_string());
        }
        self.publish(Collection::Users, uid, None);
        Ok(())
    }

    fn subscribe_user(&self, uid: &str) -> Subscription<User> {
        let state = Arc::clone(&self.state);
        let id = uid.to_string();
        Subscription::new(
            self.events.subscribe(),
            Scope::user(Collection::Users, uid),
            Box::new(move || {
                let state = state.read().unwrap();
                state.users.get(&id).cloned().into_iter().collect()
            }),
        )
    }

    async fn add_notebook(&self, uid: &str, notebook: &Notebook) -> Result<()> {
        {
            let mut state = self.state.write().unwrap();
            state
                .notebooks
                .entry(uid.to_string())
                .or_default()
                .push(notebook.clone());
        }
        self.publish(Collection::Notebooks, uid, None);
        Ok(())
    }

    async fn get_notebook(&self, uid: &str, id: &str) -> Result<Option<Notebook>> {
        let state = self.state.read().unwrap();
        Ok(state
            .notebooks
            .get(uid)
            .and_then(|nbs| nbs.iter().find(|nb| nb.id == id))
            .cloned())
    }

    async fn rename_notebook(&self, uid: &str, id: &str, title: &str) -> Result<()> {
        {
            let mut state = self.state.write().unwrap();
            let notebook = state
                .notebooks
                .get_mut(uid)
                .and_then(|nbs| nbs.iter_mut().find(|nb| nb.id == id));
            match notebook {
                Some(nb) => nb.title = title.to_string(),
                None => bail!("notebook '{}' not found", id),
            }
        }
        self.publish(Collection::Notebooks, uid, None);
        Ok(())
    }

    async fn increment_source_count(&self, uid: &str, id: &str, delta: i64) -> Result<()> {
        {
            let mut state = self.state.write().unwrap();
            let notebook = state
                .notebooks
                .get_mut(uid)
                .and_then(|nbs| nbs.iter_mut().find(|nb| nb.id == id));
            match notebook {
                Some(nb) => {
                    nb.source_count = (nb.source_count as i64 + delta).max(0) as u32;
                }
                None => bail!("notebook '{}' not found", id),
            }
        }
        self.publish(Collection::Notebooks, uid, None);
        Ok(())
    }

    fn subscribe_notebooks(&self, uid: &str) -> Subscription<Notebook> {
        let state = Arc::clone(&self.state);
        let id = uid.to_string();
        Subscription::new(
            self.events.subscribe(),
            Scope::user(Collection::Notebooks, uid),
            Box::new(move || {
                let state = state.read().unwrap();
                let mut notebooks = state.notebooks.get(&id).cloned().unwrap_or_default();
                sort_desc(&mut notebooks, |nb| nb.created_at);
                notebooks
            }),
        )
    }

    async fn insert_source(&self, uid: &str, notebook_id: &str, source: &Source) -> Result<()> {
        {
            let mut state = self.state.write().unwrap();
            state
                .sources
                .entry(Self::key(uid, notebook_id))
                .or_default()
                .push(source.clone());
        }
        self.publish(Collection::Sources, uid, Some(notebook_id));
        Ok(())
    }

    async fn get_source(
        &self,
        uid: &str,
        notebook_id: &str,
        id: &str,
    ) -> Result<Option<Source>> {
        let state = self.state.read().unwrap();
        Ok(state
            .sources
            .get(&Self::key(uid, notebook_id))
            .and_then(|sources| sources.iter().find(|s| s.id == id))
            .cloned())
    }

    async fn update_source(
        &self,
        uid: &str,
        notebook_id: &str,
        id: &str,
        patch: SourcePatch,
    ) -> Result<()> {
        {
            let mut state = self.state.write().unwrap();
            let source = state
                .sources
                .get_mut(&Self::key(uid, notebook_id))
                .and_then(|sources| sources.iter_mut().find(|s| s.id == id));
            let source = match source {
                Some(s) => s,
                None => bail!("source '{}' not found", id),
            };
            if let Some(name) = patch.name {
                source.name = name;
            }
            if let Some(selected) = patch.selected {
                source.selected = selected;
            }
            if let Some(status) = patch.status {
                source.status = status;
            }
            if let Some(rag_file_id) = patch.rag_file_id {
                source.rag_file_id = Some(rag_file_id);
            }
            if let Some(summarization) = patch.summarization {
                source.summarization = Some(summarization);
            }
            if let Some(questions) = patch.questions {
                source.questions = Some(questions);
            }
            source.updated_at = Utc::now();
        }
        self.publish(Collection::Sources, uid, Some(notebook_id));
        Ok(())
    }

    async fn remove_source(&self, uid: &str, notebook_id: &str, id: &str) -> Result<()> {
        {
            let mut state = self.state.write().unwrap();
            if let Some(sources) = state.sources.get_mut(&Self::key(uid, notebook_id)) {
                sources.retain(|s| s.id != id);
            }
        }
        self.publish(Collection::Sources, uid, Some(notebook_id));
        Ok(())
    }

    async fn list_sources(&self, uid: &str, notebook_id: &str) -> Result<Vec<Source>> {
        let state = self.state.read().unwrap();
        let mut sources = state
            .sources
            .get(&Self::key(uid, notebook_id))
            .cloned()
            .unwrap_or_default();
        sort_desc(&mut sources, |s| s.created_at);
        Ok(sources)
    }

    fn subscribe_sources(&self, uid: &str, notebook_id: &str) -> Subscription<Source> {
        let state = Arc::clone(&self.state);
        let key = Self::key(uid, notebook_id);
        Subscription::new(
            self.events.subscribe(),
            Scope::notebook(Collection::Sources, uid, notebook_id),
            Box::new(move || {
                let state = state.read().unwrap();
                let mut sources = state.sources.get(&key).cloned().unwrap_or_default();
                sort_desc(&mut sources, |s| s.created_at);
                sources
            }),
        )
    }

    async fn append_message(
        &self,
        uid: &str,
        notebook_id: &str,
        message: &Message,
    ) -> Result<()> {
        {
            let mut state = self.state.write().unwrap();
            state
                .messages
                .entry(Self::key(uid, notebook_id))
                .or_default()
                .push(message.clone());
        }
        self.publish(Collection::Chat, uid, Some(notebook_id));
        Ok(())
    }

    async fn update_message(
        &self,
        uid: &str,
        notebook_id: &str,
        id: &str,
        patch: MessagePatch,
    ) -> Result<()> {
        {
            let mut state = self.state.write().unwrap();
            let message = state
                .messages
                .get_mut(&Self::key(uid, notebook_id))
                .and_then(|messages| messages.iter_mut().find(|m| m.id == id));
            let message = match message {
                Some(m) => m,
                None => bail!("message '{}' not found", id),
            };
            if let Some(content) = patch.content {
                message.content = content;
            }
            if let Some(loading) = patch.loading {
                message.loading = loading;
            }
            if let Some(status) = patch.status {
                message.status = status;
            }
        }
        self.publish(Collection::Chat, uid, Some(notebook_id));
        Ok(())
    }

    async fn delete_message(&self, uid: &str, notebook_id: &str, id: &str) -> Result<()> {
        {
            let mut state = self.state.write().unwrap();
            if let Some(messages) = state.messages.get_mut(&Self::key(uid, notebook_id)) {
                messages.retain(|m| m.id != id);
            }
        }
        self.publish(Collection::Chat, uid, Some(notebook_id));
        Ok(())
    }

    async fn list_messages(&self, uid: &str, notebook_id: &str) -> Result<Vec<Message>> {
        let state = self.state.read().unwrap();
        let mut messages = state
            .messages
            .get(&Self::key(uid, notebook_id))
            .cloned()
            .unwrap_or_default();
        // Ascending; stable sort keeps append order for same-instant turns.
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    fn subscribe_messages(&self, uid: &str, notebook_id: &str) -> Subscription<Message> {
        let state = Arc::clone(&self.state);
        let key = Self::key(uid, notebook_id);
        Subscription::new(
            self.events.subscribe(),
            Scope::notebook(Collection::Chat, uid, notebook_id),
            Box::new(move || {
                let state = state.read().unwrap();
                let mut messages = state.messages.get(&key).cloned().unwrap_or_default();
                messages.sort_by_key(|m| m.created_at);
                messages
            }),
        )
    }

    async fn add_note(&self, uid: &str, notebook_id: &str, note: &Note) -> Result<()> {
        {
            let mut state = self.state.write().unwrap();
            state
                .notes
                .entry(Self::key(uid, notebook_id))
                .or_default()
                .push(note.clone());
        }
        self.publish(Collection::Notes, uid, Some(notebook_id));
        Ok(())
    }

    async fn list_notes(&self, uid: &str, notebook_id: &str) -> Result<Vec<Note>> {
        let state = self.state.read().unwrap();
        let mut notes = state
            .notes
            .get(&Self::key(uid, notebook_id))
            .cloned()
            .unwrap_or_default();
        sort_desc(&mut notes, |n| n.created_at);
        Ok(notes)
    }

    fn subscribe_notes(&self, uid: &str, notebook_id: &str) -> Subscription<Note> {
        let state = Arc::clone(&self.state);
        let key = Self::key(uid, notebook_id);
        Subscription::new(
            self.events.subscribe(),
            Scope::notebook(Collection::Notes, uid, notebook_id),
            Box::new(move || {
                let state = state.read().unwrap();
                let mut notes = state.notes.get(&key).cloned().unwrap_or_default();
                sort_desc(&mut notes, |n| n.created_at);
                notes
            }),
        )
    }
}
