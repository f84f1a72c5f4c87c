//! Notebook and account operations.
//!
//! Thin write-side over the store: notebook creation and renaming with
//! title validation, plus signup. Account provisioning (corpus setup) is
//! performed by an external worker that flips the user from `creating` to
//! `created`; [`Accounts::subscribe`] observes that transition.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Notebook, User, UserStatus};
use crate::store::{NotebookStore, Subscription};
use crate::validate::{check_text_len, NOTEBOOK_TITLE_LEN};

/// Notebook directory for one user.
pub struct Notebooks {
    store: Arc<dyn NotebookStore>,
    uid: String,
}

impl Notebooks {
    pub fn new(store: Arc<dyn NotebookStore>, uid: impl Into<String>) -> Self {
        Notebooks {
            store,
            uid: uid.into(),
        }
    }

    /// Create a notebook with a validated title (3-20 characters).
    pub async fn add(&self, title: &str) -> Result<Notebook> {
        check_text_len("title", title, NOTEBOOK_TITLE_LEN.0, NOTEBOOK_TITLE_LEN.1)?;
        let notebook = Notebook {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            source_count: 0,
            created_at: Utc::now(),
        };
        self.store.add_notebook(&self.uid, &notebook).await?;
        info!(notebook = %notebook.id, "notebook created");
        Ok(notebook)
    }

    pub async fn get(&self, id: &str) -> Result<Notebook> {
        self.store
            .get_notebook(&self.uid, id)
            .await?
            .ok_or_else(|| Error::not_found("notebook", id))
    }

    pub async fn rename(&self, id: &str, title: &str) -> Result<()> {
        check_text_len("title", title, NOTEBOOK_TITLE_LEN.0, NOTEBOOK_TITLE_LEN.1)?;
        self.store.rename_notebook(&self.uid, id, title).await?;
        Ok(())
    }

    /// Live view of the user's notebooks, newest first.
    pub fn subscribe(&self) -> Subscription<Notebook> {
        self.store.subscribe_notebooks(&self.uid)
    }
}

/// Account signup and provisioning observation.
pub struct Accounts {
    store: Arc<dyn NotebookStore>,
}

impl Accounts {
    pub fn new(store: Arc<dyn NotebookStore>) -> Self {
        Accounts { store }
    }

    /// Register a new account in `creating` state. The external
    /// provisioning worker later marks it `created` with a corpus name.
    pub async fn sign_up(&self, uid: &str, email: &str) -> Result<User> {
        let user = User {
            id: uid.to_string(),
            email: email.to_string(),
            status: UserStatus::Creating,
            corpus_name: None,
            created_at: Utc::now(),
        };
        self.store.add_user(&user).await?;
        info!(user = %uid, "account registered, awaiting provisioning");
        Ok(user)
    }

    pub async fn get(&self, uid: &str) -> Result<User> {
        self.store
            .get_user(uid)
            .await?
            .ok_or_else(|| Error::not_found("user", uid))
    }

    /// Live view of one account; snapshots hold zero or one element.
    pub fn subscribe(&self, uid: &str) -> Subscription<User> {
        self.store.subscribe_user(uid)
    }
}
