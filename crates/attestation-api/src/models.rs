//! Request and response bodies for the Attestation API

use attestation_client::{AttestationRecord, CoffeeSourcingPayload, Uid};
use serde::{Deserialize, Serialize};

/// Single attestation lookup
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationResponse {
    pub attestation: AttestationRecord,

    /// Explorer link for the settlement transaction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_url: Option<String>,
}

/// Attestations for a recipient
#[derive(Debug, Serialize)]
pub struct AttestationsListResponse {
    pub attestations: Vec<AttestationRecord>,
    pub total: usize,
}

/// Request to create a new attestation
#[derive(Debug, Deserialize)]
pub struct SubmitAttestationRequest {
    /// Recipient address (0x + 40 hex digits)
    pub recipient: String,

    pub payload: CoffeeSourcingPayload,
}

/// Response from submission
#[derive(Debug, Serialize)]
pub struct SubmitAttestationResponse {
    pub success: bool,
    pub uid: Uid,
}
