use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

use crate::ids::{ManagementId, ViewingId};

/// Why a record left the active state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionReason {
    UserDeleted,
    Expired,
}

impl DeletionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserDeleted => "user_deleted",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for DeletionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored in redb as bincode-encoded bytes, keyed by viewing id.
/// `cipher_text` is the client-produced envelope; the server never decrypts it.
/// Deleted records stay behind as tombstones with the ciphertext scrubbed.
#[derive(Debug, Clone, Serialize, Deserialize, ZeroizeOnDrop)]
pub struct SecretRecord {
    #[zeroize(skip)]
    pub viewing_id: ViewingId,
    #[zeroize(skip)]
    pub management_id: ManagementId,
    /// `None` once deleted.
    pub cipher_text: Option<String>,
    /// Intended lifetime in seconds. Never decremented.
    pub ttl: u64,
    /// Unix timestamp (milliseconds).
    pub created_at: i64,
    /// Unix timestamp (milliseconds); `None` while active.
    pub deleted_at: Option<i64>,
    #[zeroize(skip)]
    pub deletion_reason: Option<DeletionReason>,
}

impl SecretRecord {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none() && self.cipher_text.is_some()
    }

    /// True once `ttl` has elapsed at `now` (milliseconds). Says nothing about
    /// whether the record has been swept yet.
    pub fn ttl_elapsed(&self, now: i64) -> bool {
        let ttl_ms = i64::try_from(self.ttl.saturating_mul(1000)).unwrap_or(i64::MAX);
        now >= self.created_at.saturating_add(ttl_ms)
    }

    /// Transition to deleted, scrubbing the ciphertext.
    /// Returns false (and changes nothing) if already deleted.
    pub(crate) fn tombstone(&mut self, reason: DeletionReason, deleted_at: i64) -> bool {
        if self.deleted_at.is_some() {
            return false;
        }
        if let Some(mut cipher_text) = self.cipher_text.take() {
            zeroize::Zeroize::zeroize(&mut cipher_text);
        }
        self.deleted_at = Some(deleted_at);
        self.deletion_reason = Some(reason);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ttl: u64, created_at: i64) -> SecretRecord {
        SecretRecord {
            viewing_id: ViewingId::generate().unwrap(),
            management_id: ManagementId::generate().unwrap(),
            cipher_text: Some("abc.def.ghi".into()),
            ttl,
            created_at,
            deleted_at: None,
            deletion_reason: None,
        }
    }

    #[test]
    fn tombstone_scrubs_and_is_applied_once() {
        let mut r = record(3600, 0);
        assert!(r.is_active());
        assert!(r.tombstone(DeletionReason::UserDeleted, 10));
        assert!(!r.is_active());
        assert!(r.cipher_text.is_none());

        assert!(!r.tombstone(DeletionReason::Expired, 20));
        assert_eq!(r.deleted_at, Some(10));
        assert_eq!(r.deletion_reason, Some(DeletionReason::UserDeleted));
    }

    #[test]
    fn ttl_elapsed_uses_milliseconds() {
        let r = record(60, 1_000);
        assert!(!r.ttl_elapsed(60_999));
        assert!(r.ttl_elapsed(61_000));
    }
}
