//! Durable record of each secret: ciphertext, both identifiers, TTL and
//! lifecycle status.
//!
//! The trait is synchronous. Implementations share state internally so
//! clones hit the same records, and must be safe to use from many requests
//! at once.

pub mod db;
pub mod error;
pub mod memory;
pub mod model;

pub use db::Store;
pub use error::StoreError;
pub use memory::MemoryStore;
pub use model::{DeletionReason, SecretRecord};

use crate::ids::{ManagementId, ViewingId};

pub trait SecretStore: Clone + Send + Sync + 'static {
    /// Persist a new active record.
    ///
    /// Fails with `DuplicateIdentifier` if either id was ever used before,
    /// checked atomically with the insert.
    fn create(
        &self,
        viewing_id: &ViewingId,
        management_id: &ManagementId,
        cipher_text: &str,
        ttl: u64,
        created_at: i64,
    ) -> Result<(), StoreError>;

    /// Ciphertext of an active record. Deleted and unknown ids are both `NotFound`.
    fn fetch_cipher_text(&self, viewing_id: &ViewingId) -> Result<String, StoreError>;

    /// Viewing id of an active record. Never touches the ciphertext.
    fn fetch_viewing_id(&self, management_id: &ManagementId) -> Result<ViewingId, StoreError>;

    /// Scrub the ciphertext and mark the record deleted.
    ///
    /// Returns whether a record changed. Unknown or already deleted ids
    /// return `Ok(false)`; the first deletion's reason and timestamp stick.
    fn soft_delete(
        &self,
        management_id: &ManagementId,
        reason: DeletionReason,
        deleted_at: i64,
    ) -> Result<bool, StoreError>;

    /// Management ids of active records whose TTL has elapsed at `now`.
    fn expired(&self, now: i64) -> Result<Vec<ManagementId>, StoreError>;

    /// Full record, tombstones included. Diagnostics only; not routed to HTTP.
    fn record(&self, viewing_id: &ViewingId) -> Result<Option<SecretRecord>, StoreError>;
}
