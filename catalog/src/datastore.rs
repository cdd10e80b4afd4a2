//! Datastore abstraction.
//!
//! The physical persistence engine is a key/value store partitioned by
//! entity kind. Implementations only deal with JSON values; typed access
//! for any [`Entity`] is layered on top by [`DataStoreExt`].

use async_trait::async_trait;

use crate::error::{Result, StoreError};
use crate::model::{AppScoped, Entity};

/// Trait over the persistence engine.
///
/// Writes to a single key are assumed to be serialized by the engine.
/// `get_raw` and `delete_raw` return [`StoreError::NotFound`] for a missing key.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Read the record stored under `key`.
    async fn get_raw(&self, kind: &str, key: &str) -> Result<serde_json::Value>;

    /// Insert or overwrite the record stored under `key`.
    async fn put_raw(&self, kind: &str, key: &str, value: serde_json::Value) -> Result<()>;

    /// Remove the record stored under `key`.
    async fn delete_raw(&self, kind: &str, key: &str) -> Result<()>;

    /// All records of a kind, in key order.
    async fn list_raw(&self, kind: &str) -> Result<Vec<serde_json::Value>>;
}

/// Typed access on top of [`DataStore`].
#[async_trait]
pub trait DataStoreExt: DataStore {
    /// Fetch an entity by primary key.
    async fn get<E: Entity>(&self, key: &str) -> Result<E> {
        let value = self.get_raw(E::KIND, key).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Fetch an entity, mapping "not found" to `None`.
    async fn find<E: Entity>(&self, key: &str) -> Result<Option<E>> {
        match self.get::<E>(key).await {
            Ok(entity) => Ok(Some(entity)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Whether an entity exists under `key`.
    async fn exists<E: Entity>(&self, key: &str) -> Result<bool> {
        Ok(self.find::<E>(key).await?.is_some())
    }

    /// Insert or overwrite an entity under its primary key.
    async fn put<E: Entity>(&self, entity: &E) -> Result<()> {
        let value = serde_json::to_value(entity)?;
        self.put_raw(E::KIND, &entity.primary_key(), value).await
    }

    /// Remove an entity by primary key.
    async fn delete<E: Entity>(&self, key: &str) -> Result<()> {
        self.delete_raw(E::KIND, key).await
    }

    /// All entities of a kind.
    async fn list<E: Entity>(&self) -> Result<Vec<E>> {
        self.list_raw(E::KIND)
            .await?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(StoreError::from))
            .collect()
    }

    /// All entities of a kind owned by one application.
    async fn list_for_app<E: AppScoped>(&self, app_primary_key: &str) -> Result<Vec<E>> {
        Ok(self
            .list::<E>()
            .await?
            .into_iter()
            .filter(|e| e.app_primary_key() == app_primary_key)
            .collect())
    }
}

impl<T: DataStore + ?Sized> DataStoreExt for T {}
