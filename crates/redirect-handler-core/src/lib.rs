//! # Redirect Handler Core
//!
//! Shared logic for Redirect Handler: the redirect model, the store
//! abstraction, chain maintenance on insert, request-time resolution,
//! and bulk import reconciliation.
//!
//! This crate contains no async runtime, sqlx, filesystem I/O, or other
//! adapter concerns. Storage is reached only through the
//! [`store::RedirectStore`] trait.
//!
//! ## Data Flow
//!
//! ```text
//!   CLI add / asset hook ──┐
//!                          ▼
//!   ImportReconciler ──▶ ChainEngine ──▶ RedirectStore ◀── ResolutionService
//!                        (writes)                           (reads + hits)
//! ```

pub mod chain;
pub mod error;
pub mod import;
pub mod models;
pub mod resolve;
pub mod rows;
pub mod store;

pub use chain::{AddRedirect, ChainEngine, RedirectObserver};
pub use error::{RedirectError, RowError};
pub use import::{ImportOptions, ImportReconciler, ProtocolEntry};
pub use models::{NewRedirect, Redirect, RedirectType};
pub use resolve::{Outcome, ResolutionService, ResolveOptions};
pub use store::RedirectStore;
