//! Application catalog for VelaUX sync
//!
//! This crate holds everything the synchronizer reads and writes:
//!
//! - **Live resources**: the `Application` custom resource as observed on a cluster
//! - **Persisted entities**: application records and their sub-entities
//!   (project, targets, environment, bindings, components, policies,
//!   workflow, revisions, workflow records)
//! - **Datastore**: a key/value abstraction with "not found" signaling
//!
//! # Key Components
//!
//! - [`DataStore`]: Trait over the physical persistence engine
//! - [`DataStoreExt`]: Typed get/put/delete for any [`Entity`]
//! - [`MemoryStore`]: In-process store with write journal and fault injection
//! - [`Application`]: The live resource handed over by the watcher
//!
//! # Example
//!
//! ```ignore
//! use catalog::{DataStoreExt, MemoryStore, ApplicationRecord};
//!
//! let store = MemoryStore::new();
//! store.put(&ApplicationRecord::new("web")).await?;
//! let record: ApplicationRecord = store.get("web").await?;
//! ```

pub mod datastore;
pub mod error;
pub mod labels;
pub mod memory;
pub mod model;
pub mod resource;

// Re-export main types
pub use datastore::{DataStore, DataStoreExt};
pub use error::{Result, StoreError};
pub use memory::{JournalEntry, MemoryStore, StoreOp};
pub use model::*;
pub use resource::{
    Application, ApplicationSpec, ApplicationStatus, ComponentSpec, LatestRevision, ObjectMeta,
    PolicySpec, TraitSpec, WorkflowSpec, WorkflowStatus, WorkflowStepSpec, WorkflowStepStatus,
};
