//! AppSync - Application reconciliation for the VelaUX catalog
//!
//! Keeps the catalog consistent with live `Application` resources applied
//! either through the command line (CLI origin) or created in the console
//! (console origin):
//! - Canonical naming with cross-namespace collision handling
//! - Origin classification per event
//! - Ordered, fail-fast persistence of every sub-entity
//! - Revision cache keyed by composed name
//! - Cancellation and deadlines on every store and service call
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            AppSynchronizer              │
//! │   (add_or_update / delete_app)          │
//! └────────────────┬────────────────────────┘
//!                  │
//!      ┌───────────┼───────────┬──────────────┐
//!      ▼           ▼           ▼              ▼
//! ┌──────────┐ ┌──────────┐ ┌────────────┐ ┌──────────────┐
//! │ Origin   │ │ Name     │ │ Converter  │ │ Persist      │
//! │Classifier│ │ Resolver │ │            │ │ Pipeline     │
//! └──────────┘ └──────────┘ └────────────┘ └──────┬───────┘
//!                                                 ▼
//!                                   ┌──────────────────────────┐
//!                                   │ Services / DataStore     │
//!                                   └──────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use appsync::{AppSynchronizer, RevisionCache, SyncContext};
//! use catalog::MemoryStore;
//!
//! let sync = AppSynchronizer::new(Arc::new(MemoryStore::new()), Arc::new(RevisionCache::new()));
//! sync.add_or_update(&SyncContext::background(), &app).await?;
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod convert;
pub mod error;
pub mod naming;
pub mod origin;
pub mod persist;
pub mod services;
pub mod synchronizer;

// Re-export main types for convenience
pub use cache::{composed_name, CachedRevision, RevisionCache};
pub use config::SyncConfig;
pub use context::{CancelHandle, SyncContext};
pub use convert::{AppConverter, ConversionResult, DefaultConverter};
pub use error::{Result, ServiceError, SyncError};
pub use naming::{NameResolver, ResolvedApp};
pub use origin::{LabelClassifier, Origin, OriginClassifier, SyncEvent};
pub use persist::{PersistPipeline, PersistReport, PersistStep, PipelineServices};
pub use synchronizer::{AppDeletion, AppSynchronizer};
