//! Secret lifecycle: create, view, manage, delete, expire.
//!
//! A secret is `ACTIVE` until deleted by its owner or swept after its TTL,
//! then `DELETED` for good. The viewing id only ever yields ciphertext; the
//! management id only ever yields the viewing link and the delete action.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::time;
use tracing::{error, info, warn};

use crate::ids::{ManagementId, ViewingId};
use crate::input::{Envelope, Ttl, ValidationError};
use crate::store::{DeletionReason, SecretStore, StoreError};

/// Fresh id pairs tried before giving up on a create. A 192-bit collision
/// does not happen by chance; repeated ones mean the generator is broken.
pub const MAX_CREATE_ATTEMPTS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Rejected input. The message is safe to show to the requester.
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    /// Unknown or deleted; deliberately not told apart.
    #[error("secret does not exist or has been deleted")]
    NotFound,
    /// Already logged; callers surface it without detail.
    #[error("internal error")]
    Internal,
}

/// What the owner of a management id gets to see.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ManagedSecret {
    pub management_id: ManagementId,
    pub viewing_url: String,
    pub delete_url: String,
}

/// Orchestrates the store and id generator. Cheap to clone.
#[derive(Clone)]
pub struct Lifecycle<S> {
    store: S,
    base_url: Arc<str>,
}

/// Unix timestamp in milliseconds.
pub fn now_millis() -> i64 {
    millis_since_epoch(SystemTime::now())
}

/// Saturates at `i64::MAX`; clocks before the epoch read as zero.
fn millis_since_epoch(at: SystemTime) -> i64 {
    let millis = at.duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
    i64::try_from(millis).unwrap_or(i64::MAX)
}

impl<S: SecretStore> Lifecycle<S> {
    /// `base_url` prefixes the links handed out by `manage`.
    pub fn new(store: S, base_url: impl AsRef<str>) -> Self {
        Self {
            store,
            base_url: Arc::from(base_url.as_ref().trim_end_matches('/')),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persist a new secret and return its management id.
    pub fn create(&self, envelope: &Envelope, ttl: Ttl) -> Result<ManagementId, LifecycleError> {
        let created_at = now_millis();

        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            // Two independent draws; neither id is derived from the other.
            let viewing_id = ViewingId::generate().map_err(|e| {
                error!(error = %e, "generating viewing id");
                LifecycleError::Internal
            })?;
            let management_id = ManagementId::generate().map_err(|e| {
                error!(error = %e, "generating management id");
                LifecycleError::Internal
            })?;

            match self.store.create(
                &viewing_id,
                &management_id,
                envelope.as_str(),
                ttl.as_secs(),
                created_at,
            ) {
                Ok(()) => {
                    info!(ttl = ttl.as_secs(), "secret created");
                    return Ok(management_id);
                }
                Err(StoreError::DuplicateIdentifier) => {
                    warn!(attempt, "identifier collision while creating secret");
                }
                Err(e) => {
                    error!(error = %e, "creating secret");
                    return Err(LifecycleError::Internal);
                }
            }
        }

        error!(
            attempts = MAX_CREATE_ATTEMPTS,
            "identifier collisions exhausted retries; generator is suspect"
        );
        Err(LifecycleError::Internal)
    }

    /// Ciphertext for a viewing id.
    pub fn view(&self, viewing_id: &str) -> Result<String, LifecycleError> {
        let Ok(id) = ViewingId::parse(viewing_id) else {
            return Err(LifecycleError::NotFound);
        };
        self.store.fetch_cipher_text(&id).map_err(|e| match e {
            StoreError::NotFound => LifecycleError::NotFound,
            e => {
                error!(error = %e, viewing_id = %id, "retrieving secret");
                LifecycleError::Internal
            }
        })
    }

    /// Shareable viewing link and delete action for a management id.
    pub fn manage(&self, management_id: &str) -> Result<ManagedSecret, LifecycleError> {
        let Ok(id) = ManagementId::parse(management_id) else {
            return Err(LifecycleError::NotFound);
        };
        let viewing_id = self.store.fetch_viewing_id(&id).map_err(|e| match e {
            StoreError::NotFound => LifecycleError::NotFound,
            e => {
                error!(error = %e, management_id = %id, "retrieving secret");
                LifecycleError::Internal
            }
        })?;

        Ok(ManagedSecret {
            viewing_url: format!("{}/secret/{}", self.base_url, viewing_id),
            delete_url: format!("{}/manage-secret/{}/delete", self.base_url, id),
            management_id: id,
        })
    }

    /// Delete on the owner's request. Succeeds for unknown and already
    /// deleted ids alike.
    pub fn delete(&self, management_id: &str) -> Result<(), LifecycleError> {
        let Ok(id) = ManagementId::parse(management_id) else {
            return Ok(());
        };
        self.soft_delete(&id, DeletionReason::UserDeleted, now_millis())
    }

    /// Entry point for whatever enforces TTLs.
    pub fn mark_expired(&self, management_id: &ManagementId, now: i64) -> Result<(), LifecycleError> {
        self.soft_delete(management_id, DeletionReason::Expired, now)
    }

    fn soft_delete(
        &self,
        id: &ManagementId,
        reason: DeletionReason,
        now: i64,
    ) -> Result<(), LifecycleError> {
        match self.store.soft_delete(id, reason, now) {
            Ok(true) => {
                info!(%reason, "secret deleted");
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => {
                error!(error = %e, management_id = %id, %reason, "deleting secret");
                Err(LifecycleError::Internal)
            }
        }
    }

    /// Mark every active secret whose TTL has elapsed at `now`. Returns how many.
    pub fn sweep_expired(&self, now: i64) -> Result<usize, LifecycleError> {
        let expired = self.store.expired(now).map_err(|e| {
            error!(error = %e, "listing expired secrets");
            LifecycleError::Internal
        })?;
        for id in &expired {
            self.mark_expired(id, now)?;
        }
        if !expired.is_empty() {
            info!(expired = expired.len(), "swept expired secrets");
        }
        Ok(expired.len())
    }

    /// Spawn a background Tokio task that calls `sweep_expired()` every `interval`.
    pub fn spawn_sweep(self, interval: Duration) {
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.tick().await; // skip first immediate tick
            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep_expired(now_millis()) {
                    warn!(error = %e, "background sweep error");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::ids::ID_LEN;
    use crate::store::testing::{BrokenStore, CollidingStore};
    use crate::store::MemoryStore;

    fn lifecycle() -> Lifecycle<MemoryStore> {
        Lifecycle::new(MemoryStore::new(), "https://share.example/")
    }

    fn envelope() -> Envelope {
        Envelope::parse("abc.def.ghi").unwrap()
    }

    fn viewing_id_of(managed: &ManagedSecret) -> &str {
        managed.viewing_url.rsplit('/').next().unwrap()
    }

    #[test]
    fn round_trip_create_manage_view() {
        let lc = lifecycle();
        let ttl = Ttl::parse("3600").unwrap();
        let management_id = lc.create(&envelope(), ttl).unwrap();
        assert_eq!(management_id.as_str().len(), ID_LEN);

        let managed = lc.manage(management_id.as_str()).unwrap();
        assert!(managed
            .viewing_url
            .starts_with("https://share.example/secret/"));
        assert_eq!(
            managed.delete_url,
            format!("https://share.example/manage-secret/{management_id}/delete")
        );

        let viewing_id = viewing_id_of(&managed);
        assert_ne!(viewing_id, management_id.as_str());
        assert_eq!(lc.view(viewing_id).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn clock_conversion_saturates() {
        assert_eq!(millis_since_epoch(UNIX_EPOCH), 0);
        assert_eq!(millis_since_epoch(UNIX_EPOCH - Duration::from_secs(5)), 0);
        assert_eq!(
            millis_since_epoch(UNIX_EPOCH + Duration::from_millis(1_700_000_000_123)),
            1_700_000_000_123
        );
        let far = UNIX_EPOCH
            .checked_add(Duration::from_secs(u64::MAX / 1_000))
            .unwrap();
        assert_eq!(millis_since_epoch(far), i64::MAX);
    }

    #[test]
    fn never_created_and_deleted_look_the_same() {
        let lc = lifecycle();
        let management_id = lc.create(&envelope(), Ttl::OneHour).unwrap();
        let managed = lc.manage(management_id.as_str()).unwrap();
        let viewing_id = viewing_id_of(&managed).to_owned();
        lc.delete(management_id.as_str()).unwrap();

        let deleted = lc.view(&viewing_id).unwrap_err().to_string();
        let unknown = lc
            .view(ViewingId::generate().unwrap().as_str())
            .unwrap_err()
            .to_string();
        let garbage = lc.view("../../etc/passwd").unwrap_err().to_string();
        assert_eq!(deleted, unknown);
        assert_eq!(unknown, garbage);

        assert!(matches!(lc.manage(management_id.as_str()), Err(LifecycleError::NotFound)));
    }

    #[test]
    fn delete_scrubs_ciphertext() {
        let lc = lifecycle();
        let management_id = lc.create(&envelope(), Ttl::OneHour).unwrap();
        let managed = lc.manage(management_id.as_str()).unwrap();
        let viewing_id = ViewingId::parse(viewing_id_of(&managed)).unwrap();

        lc.delete(management_id.as_str()).unwrap();

        let record = lc.store().record(&viewing_id).unwrap().unwrap();
        assert!(record.cipher_text.is_none());
        assert!(record.deleted_at.is_some());
        assert_eq!(record.deletion_reason, Some(DeletionReason::UserDeleted));
    }

    #[test]
    fn delete_is_idempotent() {
        let lc = lifecycle();
        let management_id = lc.create(&envelope(), Ttl::OneHour).unwrap();
        let managed = lc.manage(management_id.as_str()).unwrap();
        let viewing_id = ViewingId::parse(viewing_id_of(&managed)).unwrap();

        lc.delete(management_id.as_str()).unwrap();
        let first = lc.store().record(&viewing_id).unwrap().unwrap();
        lc.delete(management_id.as_str()).unwrap();
        let second = lc.store().record(&viewing_id).unwrap().unwrap();
        assert_eq!(first.deleted_at, second.deleted_at);
        assert_eq!(first.deletion_reason, second.deletion_reason);

        // Unknown and malformed ids succeed too.
        lc.delete(ManagementId::generate().unwrap().as_str()).unwrap();
        lc.delete("not-an-id").unwrap();
    }

    #[test]
    fn manage_never_exposes_ciphertext() {
        let lc = lifecycle();
        let management_id = lc.create(&envelope(), Ttl::OneHour).unwrap();
        let managed = lc.manage(management_id.as_str()).unwrap();
        let rendered = serde_json::to_string(&managed).unwrap();
        assert!(!rendered.contains("abc.def.ghi"));
    }

    #[test]
    fn view_rejects_management_id_and_vice_versa() {
        let lc = lifecycle();
        let management_id = lc.create(&envelope(), Ttl::OneHour).unwrap();
        let managed = lc.manage(management_id.as_str()).unwrap();
        let viewing_id = viewing_id_of(&managed).to_owned();

        assert!(matches!(lc.view(management_id.as_str()), Err(LifecycleError::NotFound)));
        assert!(matches!(lc.manage(&viewing_id), Err(LifecycleError::NotFound)));
    }

    #[test]
    fn secrets_stay_viewable_until_deleted() {
        let lc = lifecycle();
        let management_id = lc.create(&envelope(), Ttl::OneHour).unwrap();
        let managed = lc.manage(management_id.as_str()).unwrap();
        let viewing_id = viewing_id_of(&managed);
        for _ in 0..3 {
            assert_eq!(lc.view(viewing_id).unwrap(), "abc.def.ghi");
        }
    }

    #[test]
    fn collisions_are_retried() {
        let lc = Lifecycle::new(CollidingStore::new(MAX_CREATE_ATTEMPTS - 1), "");
        let management_id = lc.create(&envelope(), Ttl::OneHour).unwrap();
        assert_eq!(lc.store().attempts(), MAX_CREATE_ATTEMPTS);
        assert!(lc.manage(management_id.as_str()).is_ok());
    }

    #[test]
    fn exhausted_collisions_are_internal() {
        let lc = Lifecycle::new(CollidingStore::new(usize::MAX), "");
        assert!(matches!(
            lc.create(&envelope(), Ttl::OneHour),
            Err(LifecycleError::Internal)
        ));
        assert_eq!(lc.store().attempts(), MAX_CREATE_ATTEMPTS);
    }

    #[test]
    fn persistence_failures_are_internal() {
        let lc = Lifecycle::new(BrokenStore, "");
        let id = ManagementId::generate().unwrap();
        let viewing = ViewingId::generate().unwrap();
        assert!(matches!(lc.create(&envelope(), Ttl::OneHour), Err(LifecycleError::Internal)));
        assert!(matches!(lc.view(viewing.as_str()), Err(LifecycleError::Internal)));
        assert!(matches!(lc.manage(id.as_str()), Err(LifecycleError::Internal)));
        assert!(matches!(lc.delete(id.as_str()), Err(LifecycleError::Internal)));
        assert!(matches!(lc.sweep_expired(0), Err(LifecycleError::Internal)));
    }

    #[test]
    fn sweep_marks_elapsed_secrets_expired() {
        let lc = lifecycle();
        let short = lc.create(&envelope(), Ttl::OneHour).unwrap();
        let long = lc.create(&envelope(), Ttl::OneWeek).unwrap();

        // Not yet swept: still active regardless of the clock.
        assert!(lc.manage(short.as_str()).is_ok());

        let later = now_millis() + 2 * 3_600_000;
        assert_eq!(lc.sweep_expired(later).unwrap(), 1);
        assert!(matches!(lc.manage(short.as_str()), Err(LifecycleError::NotFound)));
        assert!(lc.manage(long.as_str()).is_ok());

        // Nothing left to do on a second pass.
        assert_eq!(lc.sweep_expired(later).unwrap(), 0);
    }

    #[test]
    fn mark_expired_records_reason() {
        let lc = lifecycle();
        let management_id = lc.create(&envelope(), Ttl::OneDay).unwrap();
        let managed = lc.manage(management_id.as_str()).unwrap();
        let viewing_id = ViewingId::parse(viewing_id_of(&managed)).unwrap();

        lc.mark_expired(&management_id, 42).unwrap();
        lc.delete(management_id.as_str()).unwrap();

        let record = lc.store().record(&viewing_id).unwrap().unwrap();
        assert_eq!(record.deleted_at, Some(42));
        assert_eq!(record.deletion_reason, Some(DeletionReason::Expired));
    }

    #[test]
    fn concurrent_creates_get_unique_ids() {
        let lc = lifecycle();
        let ids: Vec<ManagementId> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..100)
                .map(|_| {
                    let lc = lc.clone();
                    scope.spawn(move || lc.create(&envelope(), Ttl::OneHour).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut seen = HashSet::new();
        for id in &ids {
            assert!(seen.insert(id.as_str().to_owned()));
            let managed = lc.manage(id.as_str()).unwrap();
            assert!(seen.insert(viewing_id_of(&managed).to_owned()));
        }
        assert_eq!(seen.len(), 200);
        assert_eq!(lc.store().len(), 100);
    }
}
