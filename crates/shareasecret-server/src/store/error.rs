/// Errors surfaced by a [`SecretStore`](super::SecretStore).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Viewing or management id already taken, by an active record or a tombstone.
    #[error("duplicate identifier")]
    DuplicateIdentifier,

    /// Unknown id, or the record is deleted. The two cases are not distinguished.
    #[error("not found")]
    NotFound,

    /// Underlying storage failed (I/O, corruption, poisoned lock).
    #[error("persistence failure: {0}")]
    Persistence(String),
}

macro_rules! persistence_from {
    ($($err:ty),* $(,)?) => {
        $(
            impl From<$err> for StoreError {
                fn from(err: $err) -> Self {
                    Self::Persistence(err.to_string())
                }
            }
        )*
    };
}

persistence_from!(
    redb::Error,
    redb::DatabaseError,
    redb::TransactionError,
    redb::TableError,
    redb::StorageError,
    redb::CommitError,
    bincode::error::EncodeError,
    bincode::error::DecodeError,
);
