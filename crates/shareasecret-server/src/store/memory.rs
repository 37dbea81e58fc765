use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::model::{DeletionReason, SecretRecord};
use super::{SecretStore, StoreError};
use crate::ids::{ManagementId, ViewingId};

/// In-memory store with the same semantics as [`Store`](super::Store).
///
/// One mutex guards both maps, so the uniqueness check and insert happen
/// under a single lock. Clones share the same records.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    secrets: HashMap<ViewingId, SecretRecord>,
    management_index: HashMap<ManagementId, ViewingId>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records, tombstones included.
    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.secrets.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Persistence("memory store lock poisoned".into()))
    }
}

impl SecretStore for MemoryStore {
    fn create(
        &self,
        viewing_id: &ViewingId,
        management_id: &ManagementId,
        cipher_text: &str,
        ttl: u64,
        created_at: i64,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        // Both kinds share one value space.
        let taken = viewing_id.as_str() == management_id.as_str()
            || inner.secrets.contains_key(viewing_id)
            || inner.management_index.contains_key(management_id)
            || ManagementId::parse(viewing_id.as_str())
                .is_ok_and(|m| inner.management_index.contains_key(&m))
            || ViewingId::parse(management_id.as_str())
                .is_ok_and(|v| inner.secrets.contains_key(&v));
        if taken {
            return Err(StoreError::DuplicateIdentifier);
        }

        inner.secrets.insert(
            viewing_id.clone(),
            SecretRecord {
                viewing_id: viewing_id.clone(),
                management_id: management_id.clone(),
                cipher_text: Some(cipher_text.to_owned()),
                ttl,
                created_at,
                deleted_at: None,
                deletion_reason: None,
            },
        );
        inner
            .management_index
            .insert(management_id.clone(), viewing_id.clone());
        Ok(())
    }

    fn fetch_cipher_text(&self, viewing_id: &ViewingId) -> Result<String, StoreError> {
        let inner = self.lock()?;
        inner
            .secrets
            .get(viewing_id)
            .filter(|r| r.deleted_at.is_none())
            .and_then(|r| r.cipher_text.clone())
            .ok_or(StoreError::NotFound)
    }

    fn fetch_viewing_id(&self, management_id: &ManagementId) -> Result<ViewingId, StoreError> {
        let inner = self.lock()?;
        inner
            .management_index
            .get(management_id)
            .filter(|v| inner.secrets.get(*v).is_some_and(SecretRecord::is_active))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn soft_delete(
        &self,
        management_id: &ManagementId,
        reason: DeletionReason,
        deleted_at: i64,
    ) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        let Some(viewing_id) = inner.management_index.get(management_id).cloned() else {
            return Ok(false);
        };
        Ok(inner
            .secrets
            .get_mut(&viewing_id)
            .is_some_and(|r| r.tombstone(reason, deleted_at)))
    }

    fn expired(&self, now: i64) -> Result<Vec<ManagementId>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .secrets
            .values()
            .filter(|r| r.is_active() && r.ttl_elapsed(now))
            .map(|r| r.management_id.clone())
            .collect())
    }

    fn record(&self, viewing_id: &ViewingId) -> Result<Option<SecretRecord>, StoreError> {
        Ok(self.lock()?.secrets.get(viewing_id).cloned())
    }
}
