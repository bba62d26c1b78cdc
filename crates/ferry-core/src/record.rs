use crate::code::Code;
use crate::error::CoreError;
use crate::kind::ContentKind;
use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};

/// Time-to-live applied to every record at creation.
pub const DEFAULT_TTL: SignedDuration = SignedDuration::from_hours(24);

/// Maximum number of successful consumptions of a record, within `1..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quota(u8);

impl Quota {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 100;

    /// Clamps any requested value into the accepted range.
    ///
    /// Out-of-range requests are never rejected: `0` and negatives become `1`,
    /// anything above `100` becomes `100`.
    pub fn clamped(requested: i64) -> Self {
        let value = requested.clamp(i64::from(Self::MIN), i64::from(Self::MAX));
        Self(value as u8)
    }

    /// Strict constructor for values read back from storage.
    pub fn new(value: i64) -> Result<Self, CoreError> {
        if value < i64::from(Self::MIN) || value > i64::from(Self::MAX) {
            return Err(CoreError::InvalidQuota(value));
        }
        Ok(Self(value as u8))
    }

    pub fn get(self) -> u32 {
        u32::from(self.0)
    }
}

impl Default for Quota {
    fn default() -> Self {
        Self(Self::MIN)
    }
}

impl TryFrom<i64> for Quota {
    type Error = CoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quota> for i64 {
    fn from(value: Quota) -> Self {
        i64::from(value.0)
    }
}

/// Where the bytes of a record live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadRef {
    /// A blob in the upload directory, named `{code}_{file_name}`.
    Blob { file_name: String },
    /// Text stored inline with the metadata.
    Text { content: String, lang: String },
}

impl PayloadRef {
    pub fn kind(&self) -> ContentKind {
        match self {
            PayloadRef::Blob { .. } => ContentKind::File,
            PayloadRef::Text { .. } => ContentKind::Paste,
        }
    }
}

/// Whether a record may still be consumed at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Live,
    /// `now >= expires_at`.
    TimedOut,
    /// `current_uses >= max_uses`.
    Exhausted,
}

impl Liveness {
    pub fn is_live(self) -> bool {
        self == Liveness::Live
    }
}

/// Metadata of one stored artifact.
///
/// Only `current_uses` ever changes after insertion, and only upwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub code: Code,
    pub created_at: Timestamp,
    /// `created_at + ttl`, fixed at creation.
    pub expires_at: Timestamp,
    pub max_uses: Quota,
    pub current_uses: u32,
    pub payload: PayloadRef,
}

impl ContentRecord {
    /// Creates a fresh record with no recorded uses.
    pub fn new(
        code: Code,
        created_at: Timestamp,
        ttl: SignedDuration,
        max_uses: Quota,
        payload: PayloadRef,
    ) -> Self {
        Self {
            code,
            created_at,
            expires_at: created_at + ttl,
            max_uses,
            current_uses: 0,
            payload,
        }
    }

    pub fn kind(&self) -> ContentKind {
        self.payload.kind()
    }

    /// The single liveness predicate shared by the stores, the consumption
    /// gate and the sweeper. Time-out takes precedence over exhaustion.
    pub fn liveness(&self, now: Timestamp) -> Liveness {
        if now >= self.expires_at {
            Liveness::TimedOut
        } else if self.current_uses >= self.max_uses.get() {
            Liveness::Exhausted
        } else {
            Liveness::Live
        }
    }

    pub fn is_live(&self, now: Timestamp) -> bool {
        self.liveness(now).is_live()
    }

    /// True once the last permitted use has been recorded.
    pub fn is_exhausted(&self) -> bool {
        self.current_uses >= self.max_uses.get()
    }

    pub fn remaining_uses(&self) -> u32 {
        self.max_uses.get().saturating_sub(self.current_uses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paste(created_at: Timestamp, max_uses: u8) -> ContentRecord {
        ContentRecord::new(
            Code::new_unchecked("ABC234"),
            created_at,
            DEFAULT_TTL,
            Quota::clamped(i64::from(max_uses)),
            PayloadRef::Text {
                content: "hello".to_string(),
                lang: "plaintext".to_string(),
            },
        )
    }

    #[test]
    fn quota_clamps_out_of_range_requests() {
        assert_eq!(Quota::clamped(0).get(), 1);
        assert_eq!(Quota::clamped(-7).get(), 1);
        assert_eq!(Quota::clamped(55).get(), 55);
        assert_eq!(Quota::clamped(101).get(), 100);
        assert_eq!(Quota::clamped(i64::MAX).get(), 100);
        assert_eq!(Quota::default().get(), 1);
    }

    #[test]
    fn strict_quota_rejects_out_of_range_values() {
        assert!(Quota::new(0).is_err());
        assert!(Quota::new(101).is_err());
        assert_eq!(Quota::new(100).unwrap().get(), 100);
    }

    #[test]
    fn kind_follows_payload() {
        let record = paste(Timestamp::UNIX_EPOCH, 1);
        assert_eq!(record.kind(), ContentKind::Paste);

        let blob = PayloadRef::Blob {
            file_name: "report.pdf".to_string(),
        };
        assert_eq!(blob.kind(), ContentKind::File);
    }

    #[test]
    fn expires_exactly_at_ttl_boundary() {
        let created = Timestamp::from_second(1_700_000_000).unwrap();
        let record = paste(created, 3);

        let just_before = created + DEFAULT_TTL - SignedDuration::from_millis(1);
        assert_eq!(record.liveness(just_before), Liveness::Live);
        assert_eq!(record.liveness(created + DEFAULT_TTL), Liveness::TimedOut);
    }

    #[test]
    fn exhausted_when_uses_reach_quota() {
        let created = Timestamp::from_second(1_700_000_000).unwrap();
        let mut record = paste(created, 2);
        record.current_uses = 2;

        assert!(record.is_exhausted());
        assert_eq!(record.remaining_uses(), 0);
        assert_eq!(record.liveness(created), Liveness::Exhausted);
    }

    #[test]
    fn timeout_wins_over_exhaustion() {
        let created = Timestamp::from_second(1_700_000_000).unwrap();
        let mut record = paste(created, 1);
        record.current_uses = 1;

        let later = created + SignedDuration::from_hours(25);
        assert_eq!(record.liveness(later), Liveness::TimedOut);
    }
}
