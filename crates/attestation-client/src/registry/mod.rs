//! Attestation registry backends
//!
//! [`Registry`] is the seam between the client and the remote ledger:
//! - `eas`: contract registry reached over Ethereum JSON-RPC
//! - `mock`: in-memory registry for development and tests

pub mod eas;
pub mod mock;

use async_trait::async_trait;
use provenance_common::{Address, Uid};
use thiserror::Error;

pub use eas::EasRegistry;
pub use mock::MockRegistry;

/// Registry envelope exactly as the registry reports it, payload still encoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub uid: Uid,
    pub schema: Uid,
    pub attester: Address,
    pub recipient: Address,
    pub ref_uid: Option<Uid>,
    pub time: u64,
    pub expiration_time: Option<u64>,
    pub revocation_time: Option<u64>,
    pub revocable: bool,
    pub data: Vec<u8>,
}

/// Write request for a new attestation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationRequest {
    pub schema: Uid,
    pub recipient: Address,
    /// `0` for no expiration
    pub expiration_time: u64,
    pub revocable: bool,
    pub ref_uid: Uid,
    pub data: Vec<u8>,
    /// Native value sent along with the attestation
    pub value: u64,
}

/// Authenticated sender for write transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningSession {
    pub sender: Address,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Registry transport error: {0}")]
    Transport(String),

    #[error("Registry RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Malformed registry response: {0}")]
    Malformed(String),

    #[error("Transaction rejected: {0}")]
    Rejected(String),

    #[error("Timed out: {0}")]
    Timeout(String),
}

#[async_trait]
pub trait Registry: Send + Sync {
    /// Point lookup; `Ok(None)` when the registry has no such record
    async fn get_by_id(&self, uid: &Uid) -> Result<Option<RawRecord>, RegistryError>;

    /// Submit a new attestation and wait until it is confirmed
    async fn attest(
        &self,
        session: &SigningSession,
        request: &AttestationRequest,
    ) -> Result<Uid, RegistryError>;

    async fn chain_id(&self) -> Result<u64, RegistryError>;
}
