//! Validation of creation input: the encrypted envelope and its TTL.
//!
//! The server cannot check ciphertext without the password, so the envelope
//! check is structural only.

/// Separator between the envelope's three segments.
const ENVELOPE_SEPARATOR: char = '.';
/// Envelopes larger than this are rejected before touching the store.
pub const MAX_ENVELOPE_BYTES: usize = 1_048_576;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Unable to parse request form. Please try again.")]
    Form,
    #[error("Secret format is invalid. Please try again.")]
    EnvelopeShape,
    #[error("Secret is too large.")]
    EnvelopeTooLarge,
    #[error("Unable to parse the TTL (time to live) for the secret.")]
    TtlUnparseable,
    #[error("The TTL (time to live) for the secret is not supported.")]
    TtlUnsupported,
}

/// A client-encrypted secret: `segment.segment.segment`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope(String);

impl Envelope {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        if raw.len() > MAX_ENVELOPE_BYTES {
            return Err(ValidationError::EnvelopeTooLarge);
        }
        if raw.matches(ENVELOPE_SEPARATOR).count() != 2 {
            return Err(ValidationError::EnvelopeShape);
        }
        Ok(Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Accepted lifetimes for a secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    OneHour,
    SixHours,
    OneDay,
    ThreeDays,
    OneWeek,
}

impl Ttl {
    pub const ALL: [Ttl; 5] = [
        Ttl::OneHour,
        Ttl::SixHours,
        Ttl::OneDay,
        Ttl::ThreeDays,
        Ttl::OneWeek,
    ];

    pub fn as_secs(self) -> u64 {
        match self {
            Self::OneHour => 3_600,
            Self::SixHours => 21_600,
            Self::OneDay => 86_400,
            Self::ThreeDays => 259_200,
            Self::OneWeek => 604_800,
        }
    }

    pub fn from_secs(secs: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_secs() == secs)
    }

    /// Parse the form value: a whole number of seconds.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let secs: u64 = raw
            .trim()
            .parse()
            .map_err(|_| ValidationError::TtlUnparseable)?;
        Self::from_secs(secs).ok_or(ValidationError::TtlUnsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_needs_exactly_two_separators() {
        assert!(Envelope::parse("abc.def.ghi").is_ok());
        assert_eq!(Envelope::parse("abcdef"), Err(ValidationError::EnvelopeShape));
        assert_eq!(Envelope::parse("abc.def"), Err(ValidationError::EnvelopeShape));
        assert_eq!(Envelope::parse("a.b.c.d"), Err(ValidationError::EnvelopeShape));
        assert_eq!(Envelope::parse(""), Err(ValidationError::EnvelopeShape));
    }

    #[test]
    fn envelope_size_is_capped() {
        let mut big = "a".repeat(MAX_ENVELOPE_BYTES);
        big.push_str(".b.c");
        assert_eq!(Envelope::parse(&big), Err(ValidationError::EnvelopeTooLarge));
    }

    #[test]
    fn ttl_accepts_known_durations() {
        assert_eq!(Ttl::parse("3600").unwrap(), Ttl::OneHour);
        assert_eq!(Ttl::parse(" 604800 ").unwrap(), Ttl::OneWeek);
        for t in Ttl::ALL {
            assert_eq!(Ttl::from_secs(t.as_secs()), Some(t));
        }
    }

    #[test]
    fn ttl_rejects_garbage_and_unknown_values() {
        assert_eq!(Ttl::parse("soon"), Err(ValidationError::TtlUnparseable));
        assert_eq!(Ttl::parse("-1"), Err(ValidationError::TtlUnparseable));
        assert_eq!(Ttl::parse(""), Err(ValidationError::TtlUnparseable));
        assert_eq!(Ttl::parse("42"), Err(ValidationError::TtlUnsupported));
    }
}
