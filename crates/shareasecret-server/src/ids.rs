use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

/// Random bytes behind every identifier (192 bits).
pub const ID_BYTES: usize = 24;
/// Length of the canonical lowercase hex encoding.
pub const ID_LEN: usize = ID_BYTES * 2;

#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// The OS entropy source refused to hand out bytes.
    #[error("entropy source failure: {0}")]
    GenerationFailure(String),
    /// Input is not a canonical identifier.
    #[error("malformed identifier")]
    Malformed,
}

/// Fill a fresh buffer from the OS RNG and hex-encode it.
/// Every call is an independent draw; nothing is cached between calls.
fn random_hex() -> Result<String, IdError> {
    let mut bytes = [0u8; ID_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| IdError::GenerationFailure(e.to_string()))?;
    Ok(hex::encode(bytes))
}

/// Exactly `ID_LEN` lowercase hex digits, nothing else.
fn is_canonical(s: &str) -> bool {
    s.len() == ID_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

macro_rules! capability_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Draw a new identifier from the OS RNG.
            pub fn generate() -> Result<Self, IdError> {
                random_hex().map(Self)
            }

            /// Accept client input only in canonical form.
            pub fn parse(raw: &str) -> Result<Self, IdError> {
                if is_canonical(raw) {
                    Ok(Self(raw.to_owned()))
                } else {
                    Err(IdError::Malformed)
                }
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

capability_id!(
    /// Read-only capability: resolves to the ciphertext of an active secret.
    ViewingId
);

capability_id!(
    /// Delete-only capability: resolves to the viewing link, never the ciphertext.
    ManagementId
);
