//! # AI Organizer tooling
//!
//! The catalog enrichment job: send one product image to a generative
//! model, parse the structured result, and write one row into a warehouse
//! table. Runs either as a task-array batch (one item per task instance,
//! selected by `CLOUD_RUN_TASK_INDEX`) or as an interactive HTTP service.
//!
//! Domain logic for the notebook application (source lifecycle, chat
//! coordination, stores) lives in the `organizer-core` crate; this crate
//! carries the native plumbing.
//!
//! ## Data Flow
//!
//! 1. An item `{name: "sku42.png"}` is resolved from the batch list or
//!    the request body ([`config`], [`enrich`]).
//! 2. The image URI and prompt go to the model endpoint ([`genai`]).
//! 3. The response text must parse as
//!    `{title, description, categories, tags}`; anything else is fatal to
//!    the attempt.
//! 4. Exactly one parameter-bound row is written ([`warehouse`]).
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and task-runner environment |
//! | [`db`] | Warehouse database connection |
//! | [`migrate`] | Schema migration |
//! | [`warehouse`] | Parameter-bound product table access |
//! | [`genai`] | Generative model client |
//! | [`enrich`] | Enrichment orchestration |
//! | [`server`] | Interactive HTTP mode |

pub mod config;
pub mod db;
pub mod enrich;
pub mod genai;
pub mod migrate;
pub mod server;
pub mod warehouse;
