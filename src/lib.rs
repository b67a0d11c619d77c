//! # Redirect Handler
//!
//! **Chain-consistent URL redirects for websites.**
//!
//! Redirect Handler keeps a table of `source → target` redirects per host,
//! collapses redirect chains and removes circular redirects on every write,
//! and answers incoming requests with the matching redirect before normal
//! routing runs.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────┐
//! │ CLI         │──▶│ ChainEngine   │──▶│  SQLite   │
//! │ add/import  │   │ (core crate)  │   │ redirects │
//! └─────────────┘   └──────────────┘   └────┬─────┘
//!                                           │
//!                                           ▼
//!                                    ┌──────────────┐
//!                                    │ HTTP server  │
//!                                    │ (middleware) │
//!                                    └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! redirects init                                # create database
//! redirects add old/page new/page --status 301  # add a redirect
//! redirects import redirects.csv                # bulk import
//! redirects export --output redirects.csv       # bulk export
//! redirects serve                               # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | Logger initialization |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite `RedirectStore` |
//! | [`notify`] | Redirect creation observers |
//! | [`add`] | `add` command |
//! | [`list`] | `list` command |
//! | [`remove`] | `remove*` commands |
//! | [`import`] | `import` command |
//! | [`export`] | `export` command |
//! | [`server`] | HTTP server and redirect middleware |

pub mod add;
pub mod config;
pub mod db;
pub mod export;
pub mod import;
pub mod list;
pub mod logging;
pub mod migrate;
pub mod notify;
pub mod remove;
pub mod server;
pub mod sqlite_store;

use std::sync::Arc;

use anyhow::Result;

use redirect_handler_core::ChainEngine;

use crate::config::Config;
use crate::notify::LogObserver;
use crate::sqlite_store::SqliteStore;

/// Opens the configured store and wraps it in a logging [`ChainEngine`].
pub async fn open_engine(config: &Config) -> Result<(Arc<SqliteStore>, ChainEngine)> {
    let store = Arc::new(SqliteStore::connect(config).await?);
    let engine = ChainEngine::new(store.clone()).with_observer(Arc::new(LogObserver));
    Ok((store, engine))
}
