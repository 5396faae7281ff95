//! Normalized attestation record handed to the rendering layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{Address, Uid};
use crate::payload::CoffeeSourcingPayload;

/// One registry entry with its decoded payload.
///
/// Records are immutable once fetched; revocation and expiration are
/// envelope timestamps, never payload edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationRecord {
    /// Registry-assigned identifier
    pub id: Uid,

    /// Schema used to encode the payload
    pub schema_id: Uid,

    pub attester: Address,

    pub recipient: Address,

    /// Related record, if any
    pub reference_id: Option<Uid>,

    /// Seconds since epoch
    pub created_at: u64,

    pub expires_at: Option<u64>,

    pub revoked_at: Option<u64>,

    pub revocable: bool,

    pub payload: CoffeeSourcingPayload,
}

impl AttestationRecord {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Whether the record had expired at `now` (seconds since epoch)
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Creation time as a UTC timestamp, `None` if out of chrono's range
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.created_at)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}
