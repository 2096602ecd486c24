//! # Context Relevance
//!
//! Business context for marketing analytics: promotions, launches, site
//! outages, strategy shifts, and standing conditions, recorded per client
//! and matched against the dates and periods a dashboard reports on.
//!
//! The relevance rules live in [`context_relevance_core`]; this crate adds
//! persistence, configuration, logging, the `ctxr` CLI, and an HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐
//! │   CLI    │   │   HTTP   │
//! │  (ctxr)  │   │  (axum)  │
//! └────┬─────┘   └────┬─────┘
//!      └──────┬───────┘
//!             ▼
//!    ┌─────────────────┐      ┌──────────────────────┐
//!    │ entries, report │─────▶│ context-relevance-core│
//!    └────────┬────────┘      │ registry / evaluator │
//!             ▼               │ comparison resolver  │
//!       ┌──────────┐          └──────────────────────┘
//!       │  SQLite  │
//!       └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and category overrides |
//! | [`logging`] | Tracing subscriber setup |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite `ContextStore` |
//! | [`entries`] | Create, edit, supersede, and list entries |
//! | [`report`] | Active-context and comparison reports |
//! | [`server`] | HTTP API |

pub mod config;
pub mod db;
pub mod entries;
pub mod logging;
pub mod migrate;
pub mod report;
pub mod server;
pub mod sqlite_store;
