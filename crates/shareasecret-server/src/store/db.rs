use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};
use tracing::debug;

use super::model::{DeletionReason, SecretRecord};
use super::{SecretStore, StoreError};
use crate::ids::{ManagementId, ViewingId};

/// viewing_id → bincode(SecretRecord)
const SECRETS: TableDefinition<&str, &[u8]> = TableDefinition::new("secrets");
/// management_id → viewing_id. Entries outlive deletion so ids are never reissued.
const MANAGEMENT_INDEX: TableDefinition<&str, &str> = TableDefinition::new("management_index");

/// Thread-safe handle to the redb store.
///
/// redb runs one write transaction at a time, so the uniqueness check and
/// insert in `create`, and the read-modify-write in `soft_delete`, are atomic.
#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
}

impl Store {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let db = Database::create(path)?;

        // Ensure all tables exist.
        let write_txn = db.begin_write()?;
        write_txn.open_table(SECRETS)?;
        write_txn.open_table(MANAGEMENT_INDEX)?;
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    fn load(&self, viewing_id: &str) -> Result<Option<SecretRecord>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SECRETS)?;
        let raw_bytes: Option<Vec<u8>> = table.get(viewing_id)?.map(|guard| guard.value().to_vec());
        raw_bytes.as_deref().map(decode).transpose()
    }
}

impl SecretStore for Store {
    fn create(
        &self,
        viewing_id: &ViewingId,
        management_id: &ManagementId,
        cipher_text: &str,
        ttl: u64,
        created_at: i64,
    ) -> Result<(), StoreError> {
        let record = SecretRecord {
            viewing_id: viewing_id.clone(),
            management_id: management_id.clone(),
            cipher_text: Some(cipher_text.to_owned()),
            ttl,
            created_at,
            deleted_at: None,
            deletion_reason: None,
        };
        let bytes = encode(&record)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut secrets = write_txn.open_table(SECRETS)?;
            let mut index = write_txn.open_table(MANAGEMENT_INDEX)?;

            // Both kinds share one value space, so check each id against both tables.
            let taken = viewing_id.as_str() == management_id.as_str()
                || secrets.get(viewing_id.as_str())?.is_some()
                || secrets.get(management_id.as_str())?.is_some()
                || index.get(management_id.as_str())?.is_some()
                || index.get(viewing_id.as_str())?.is_some();
            if taken {
                // Dropping the transaction aborts it.
                return Err(StoreError::DuplicateIdentifier);
            }

            secrets.insert(viewing_id.as_str(), bytes.as_slice())?;
            index.insert(management_id.as_str(), viewing_id.as_str())?;
        }
        write_txn.commit()?;

        debug!(ttl, "stored secret");
        Ok(())
    }

    fn fetch_cipher_text(&self, viewing_id: &ViewingId) -> Result<String, StoreError> {
        let mut record = self.load(viewing_id.as_str())?.ok_or(StoreError::NotFound)?;
        match (record.deleted_at, record.cipher_text.take()) {
            (None, Some(cipher_text)) => Ok(cipher_text),
            _ => Err(StoreError::NotFound),
        }
    }

    fn fetch_viewing_id(&self, management_id: &ManagementId) -> Result<ViewingId, StoreError> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(MANAGEMENT_INDEX)?;
        let secrets = read_txn.open_table(SECRETS)?;

        let viewing_id: Option<String> = index
            .get(management_id.as_str())?
            .map(|guard| guard.value().to_owned());
        let viewing_id = viewing_id.ok_or(StoreError::NotFound)?;

        let raw_bytes: Option<Vec<u8>> = secrets
            .get(viewing_id.as_str())?
            .map(|guard| guard.value().to_vec());
        let raw_bytes = raw_bytes
            .ok_or_else(|| StoreError::Persistence("index points at a missing record".into()))?;

        if decode(&raw_bytes)?.is_active() {
            ViewingId::parse(&viewing_id)
                .map_err(|_| StoreError::Persistence("corrupt viewing id in index".into()))
        } else {
            Err(StoreError::NotFound)
        }
    }

    fn soft_delete(
        &self,
        management_id: &ManagementId,
        reason: DeletionReason,
        deleted_at: i64,
    ) -> Result<bool, StoreError> {
        let write_txn = self.db.begin_write()?;
        let changed = {
            let index = write_txn.open_table(MANAGEMENT_INDEX)?;
            let mut secrets = write_txn.open_table(SECRETS)?;

            let viewing_id: Option<String> = index
                .get(management_id.as_str())?
                .map(|guard| guard.value().to_owned());

            // Clone the guard value immediately so the borrow ends before mutation.
            let raw_bytes: Option<Vec<u8>> = match &viewing_id {
                Some(v) => secrets.get(v.as_str())?.map(|guard| guard.value().to_vec()),
                None => None,
            };

            match (viewing_id, raw_bytes) {
                (Some(viewing_id), Some(bytes)) => {
                    let mut record = decode(&bytes)?;
                    if record.tombstone(reason, deleted_at) {
                        let updated = encode(&record)?;
                        secrets.insert(viewing_id.as_str(), updated.as_slice())?;
                        true
                    } else {
                        false
                    }
                }
                _ => false,
            }
        };
        write_txn.commit()?;

        if changed {
            debug!(%reason, "soft-deleted secret");
        }
        Ok(changed)
    }

    fn expired(&self, now: i64) -> Result<Vec<ManagementId>, StoreError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SECRETS)?;

        let mut ids = Vec::new();
        for item in table.iter()? {
            let (_k, v) = item?;
            let record = decode(v.value())?;
            if record.is_active() && record.ttl_elapsed(now) {
                ids.push(record.management_id.clone());
            }
        }
        Ok(ids)
    }

    fn record(&self, viewing_id: &ViewingId) -> Result<Option<SecretRecord>, StoreError> {
        self.load(viewing_id.as_str())
    }
}

fn encode(record: &SecretRecord) -> Result<Vec<u8>, StoreError> {
    Ok(bincode::serde::encode_to_vec(record, bincode::config::standard())?)
}

fn decode(bytes: &[u8]) -> Result<SecretRecord, StoreError> {
    let (record, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
    Ok(record)
}
