//! Canonical record naming.
//!
//! An application declared as `name` in `namespace` is stored either under
//! the bare `name` or under the composed `name-namespace`. The bare name
//! belongs to at most one namespace at a time, recorded in the
//! sync-namespace label of the record that holds it. Every other namespace
//! using the same declared name is forced onto the composed key, so a name
//! freed by a delete cannot be silently reused by a different namespace.

use std::sync::Arc;

use catalog::{ApplicationRecord, DataStore, DataStoreExt};
use tracing::debug;

use crate::cache::composed_name;
use crate::context::SyncContext;
use crate::error::Result;

/// Outcome of resolving an application identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedApp {
    /// The existing record, if one is owned by this identity
    pub record: Option<ApplicationRecord>,
    /// Key the record lives under, or must be created under
    pub key: String,
}

impl ResolvedApp {
    fn found(record: ApplicationRecord) -> Self {
        let key = record.name.clone();
        Self {
            record: Some(record),
            key,
        }
    }

    fn vacant(key: String) -> Self {
        Self { record: None, key }
    }

    /// Whether a record already exists for this identity.
    pub fn exists(&self) -> bool {
        self.record.is_some()
    }
}

/// Resolves `(name, namespace)` to the canonical catalog key.
#[derive(Clone)]
pub struct NameResolver {
    store: Arc<dyn DataStore>,
}

impl NameResolver {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    /// Resolve the record for an application identity.
    ///
    /// 1. A record under the composed key is authoritative.
    /// 2. A record under the bare name is ours only if its sync-namespace
    ///    label matches; otherwise the composed key must be used.
    /// 3. With neither, the bare name is free to claim.
    ///
    /// Store failures other than "not found" are returned as-is.
    pub async fn resolve(
        &self,
        ctx: &SyncContext,
        name: &str,
        namespace: &str,
    ) -> Result<ResolvedApp> {
        let composed = composed_name(name, namespace);
        if let Some(record) = ctx
            .run(self.store.find::<ApplicationRecord>(&composed))
            .await?
        {
            return Ok(ResolvedApp::found(record));
        }

        match ctx.run(self.store.find::<ApplicationRecord>(name)).await? {
            Some(record) if record.sync_namespace() == Some(namespace) => {
                Ok(ResolvedApp::found(record))
            }
            Some(record) => {
                debug!(
                    app = name,
                    namespace,
                    owner = record.sync_namespace().unwrap_or_default(),
                    "bare name owned by another namespace, using composed key"
                );
                Ok(ResolvedApp::vacant(composed))
            }
            None => Ok(ResolvedApp::vacant(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog::labels::LABEL_SYNC_NAMESPACE;
    use crate::error::SyncError;
    use catalog::{MemoryStore, StoreError, StoreOp};

    fn owned(name: &str, namespace: &str) -> ApplicationRecord {
        ApplicationRecord::new(name).with_label(LABEL_SYNC_NAMESPACE, namespace)
    }

    #[tokio::test]
    async fn test_first_claim_uses_bare_name() {
        let store = Arc::new(MemoryStore::new());
        let resolver = NameResolver::new(store);
        let ctx = SyncContext::background();

        let resolved = resolver.resolve(&ctx, "web", "prod").await.unwrap();
        assert!(!resolved.exists());
        assert_eq!(resolved.key, "web");
    }

    #[tokio::test]
    async fn test_bare_name_owned_by_same_namespace() {
        let store = Arc::new(MemoryStore::new());
        store.put(&owned("web", "prod")).await.unwrap();
        let resolver = NameResolver::new(store);

        let resolved = resolver
            .resolve(&SyncContext::background(), "web", "prod")
            .await
            .unwrap();
        assert!(resolved.exists());
        assert_eq!(resolved.key, "web");
    }

    #[tokio::test]
    async fn test_bare_name_owned_by_other_namespace() {
        let store = Arc::new(MemoryStore::new());
        store.put(&owned("X", "ns-a")).await.unwrap();
        let resolver = NameResolver::new(store);

        let resolved = resolver
            .resolve(&SyncContext::background(), "X", "ns-b")
            .await
            .unwrap();
        assert!(!resolved.exists());
        assert_eq!(resolved.key, "X-ns-b");
    }

    #[tokio::test]
    async fn test_composed_key_is_authoritative() {
        let store = Arc::new(MemoryStore::new());
        store.put(&owned("web", "prod")).await.unwrap();
        store.put(&owned("web-prod", "prod")).await.unwrap();
        let resolver = NameResolver::new(store);

        let resolved = resolver
            .resolve(&SyncContext::background(), "web", "prod")
            .await
            .unwrap();
        assert_eq!(resolved.key, "web-prod");
        assert_eq!(resolved.record.unwrap().name, "web-prod");
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = Arc::new(MemoryStore::new());
        store.fail_on(StoreOp::Get, "application");
        let resolver = NameResolver::new(store);

        let err = resolver
            .resolve(&SyncContext::background(), "web", "prod")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SyncError::Store(StoreError::Backend(
                "injected get failure on application".to_string()
            ))
        );
    }
}
