//! In-memory tenant store.
//!
//! Backs tests and single-process deployments that run without Postgres.
//! A poisoned lock is recovered rather than propagated: the store holds no
//! invariants that a panicked writer could have half-applied across keys.

use async_trait::async_trait;
use common::types::{ConnectionId, OperationId, UserId};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{OperationRecord, StoreError, TenantStore, UnitRecord, UnitStatus};

/// In-memory implementation of [`TenantStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    operations: HashMap<OperationId, OperationRecord>,
    /// Channel names per operation, in creation order.
    channels: HashMap<OperationId, Vec<String>>,
    tokens: HashMap<String, OperationId>,
    units: HashMap<UserId, UnitRecord>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl TenantStore for MemoryStore {
    async fn get_operation(
        &self,
        id: &OperationId,
    ) -> Result<Option<OperationRecord>, StoreError> {
        Ok(self.lock().operations.get(id).cloned())
    }

    async fn insert_operation(&self, operation: OperationRecord) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.operations.contains_key(&operation.id) {
            return Err(StoreError::Conflict(format!(
                "operation {} already exists",
                operation.id
            )));
        }
        inner.operations.insert(operation.id.clone(), operation);
        Ok(())
    }

    async fn list_operations(&self) -> Result<Vec<OperationRecord>, StoreError> {
        let mut operations: Vec<OperationRecord> =
            self.lock().operations.values().cloned().collect();
        operations.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Ok(operations)
    }

    async fn channels(&self, op_id: &OperationId) -> Result<Vec<String>, StoreError> {
        Ok(self.lock().channels.get(op_id).cloned().unwrap_or_default())
    }

    async fn insert_channel(&self, op_id: &OperationId, name: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let channels = inner.channels.entry(op_id.clone()).or_default();
        if channels.iter().any(|existing| existing == name) {
            return Err(StoreError::Conflict(format!(
                "channel {name} already exists in {op_id}"
            )));
        }
        channels.push(name.to_string());
        Ok(())
    }

    async fn delete_channel(&self, op_id: &OperationId, name: &str) -> Result<(), StoreError> {
        if let Some(channels) = self.lock().channels.get_mut(op_id) {
            channels.retain(|existing| existing != name);
        }
        Ok(())
    }

    async fn insert_token(&self, token: &str, op_id: &OperationId) -> Result<(), StoreError> {
        self.lock().tokens.insert(token.to_string(), op_id.clone());
        Ok(())
    }

    async fn token_operation(&self, token: &str) -> Result<Option<OperationId>, StoreError> {
        Ok(self.lock().tokens.get(token).cloned())
    }

    async fn upsert_unit(&self, unit: UnitRecord) -> Result<(), StoreError> {
        self.lock().units.insert(unit.id.clone(), unit);
        Ok(())
    }

    async fn get_unit(&self, id: &UserId) -> Result<Option<UnitRecord>, StoreError> {
        Ok(self.lock().units.get(id).cloned())
    }

    async fn units_for_operation(
        &self,
        op_id: &OperationId,
    ) -> Result<Vec<UnitRecord>, StoreError> {
        Ok(self
            .lock()
            .units
            .values()
            .filter(|unit| &unit.op_id == op_id)
            .cloned()
            .collect())
    }

    async fn mark_unit_offline(
        &self,
        id: &UserId,
        connection_id: ConnectionId,
    ) -> Result<Option<UnitRecord>, StoreError> {
        let mut inner = self.lock();
        let Some(unit) = inner.units.get_mut(id) else {
            return Ok(None);
        };
        if unit.connection_id != Some(connection_id) {
            return Ok(None);
        }
        unit.status = UnitStatus::Offline;
        unit.connection_id = None;
        unit.last_seen = chrono::Utc::now();
        Ok(Some(unit.clone()))
    }
}
