//! # AI Organizer Core
//!
//! Domain logic for AI Organizer: data models, the document-store
//! abstraction with push subscriptions, the object-storage seam, the
//! source lifecycle manager, and the chat session coordinator.
//!
//! The hosted collaborators — document database, object storage, the
//! enrichment/provisioning/responder workers — stay behind the
//! [`store::NotebookStore`] and [`storage::ObjectStorage`] traits. This
//! crate ships in-memory implementations of both; everything here is
//! fire-and-forget mutation plus push-driven observation, with no retries,
//! timeouts, or cross-collection transactions.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy (validation, transport, parse, stale state) |
//! | [`validate`] | Upload and text-field validation rules |
//! | [`store`] | Document-store trait, patches, subscriptions |
//! | [`storage`] | Object-storage trait and upload progress |
//! | [`lifecycle`] | Source lifecycle manager |
//! | [`chat`] | Chat session coordinator and derived views |
//! | [`notebooks`] | Notebook and account operations |

pub mod chat;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod notebooks;
pub mod storage;
pub mod store;
pub mod validate;

pub use error::{Error, Result, TransportError, ValidationError};
