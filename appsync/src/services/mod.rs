//! Collaborator services invoked by the synchronizer.
//!
//! - Traits for each collaborator
//! - Datastore-backed implementations
//! - Mocks for testing

pub mod mock;
pub mod store;
pub mod traits;

pub use mock::{MockApplicationService, MockWorkflowService, WorkflowSyncCall};
pub use store::StoreServices;
pub use traits::{ApplicationService, EnvService, ProjectService, TargetService, WorkflowService};
