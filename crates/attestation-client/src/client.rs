//! Attestation Client
//!
//! Translates between the registry's wire representation and the typed
//! domain model. Two read operations are offered:
//! - [`AttestationClient::fetch`] returns a tagged result so callers can
//!   retry transport errors and alert on decode errors;
//! - [`AttestationClient::fetch_by_id`] collapses every failure into `None`
//!   after logging it, which is what the rendering layer consumes.

use provenance_common::{Address, AttestationRecord, CoffeeSourcingPayload, Uid};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::registry::{
    AttestationRequest, EasRegistry, MockRegistry, RawRecord, Registry, RegistryError,
    SigningSession,
};
use crate::schema::{self, DecodeError, EncodeError};

/// Read-path failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Invalid attestation uid: {0}")]
    InvalidId(String),

    #[error("Attestation not found: {0}")]
    NotFound(Uid),

    #[error(transparent)]
    Transport(RegistryError),

    #[error("Failed to decode attestation {uid}: {source}")]
    Decode { uid: Uid, source: DecodeError },
}

impl FetchError {
    /// Network failures and timeouts may succeed on retry. RPC errors and
    /// everything else point at configuration or data and will not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::Transport(RegistryError::Transport(_) | RegistryError::Timeout(_))
        )
    }
}

/// Write-path failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Signer not connected. Please connect wallet first.")]
    NotAuthenticated,

    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] EncodeError),

    #[error("Attestation submission failed: {0}")]
    SubmissionFailed(String),
}

/// Client for the attestation registry
pub struct AttestationClient {
    registry: Arc<dyn Registry>,

    /// Schema payloads are written with
    schema_uid: Uid,

    expected_chain_id: Option<u64>,

    signer: Option<SigningSession>,

    /// Serializes submissions; sender nonces are order-sensitive
    submit_lock: Mutex<()>,
}

impl AttestationClient {
    /// Create a client over an existing registry backend
    pub fn new(registry: Arc<dyn Registry>, schema_uid: Uid) -> Self {
        Self {
            registry,
            schema_uid,
            expected_chain_id: None,
            signer: None,
            submit_lock: Mutex::new(()),
        }
    }

    /// Build the registry backend the configuration asks for
    pub fn from_config(config: &Config) -> Result<Self, RegistryError> {
        let registry: Arc<dyn Registry> = if config.mock_mode {
            info!("Using mock attestation registry");
            Arc::new(MockRegistry::with_demo_records(config.schema_uid))
        } else {
            Arc::new(EasRegistry::from_config(config)?)
        };

        let mut client = Self::new(registry, config.schema_uid);
        client.expected_chain_id = config.chain_id;
        if let Some(sender) = config.sender {
            client.connect_signer(SigningSession { sender });
        }
        Ok(client)
    }

    pub fn with_expected_chain_id(mut self, chain_id: u64) -> Self {
        self.expected_chain_id = Some(chain_id);
        self
    }

    pub fn schema_uid(&self) -> Uid {
        self.schema_uid
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    /// Attach a signing session for the write path
    pub fn connect_signer(&mut self, session: SigningSession) {
        info!("Signer connected: {}", session.sender);
        self.signer = Some(session);
    }

    pub fn disconnect_signer(&mut self) {
        self.signer = None;
    }

    pub fn signer(&self) -> Option<&SigningSession> {
        self.signer.as_ref()
    }

    /// Fetch and decode one attestation, reporting why it failed
    pub async fn fetch(&self, id: &str) -> Result<AttestationRecord, FetchError> {
        let uid = Uid::from_hex(id).map_err(|_| FetchError::InvalidId(id.to_string()))?;

        let raw = self
            .registry
            .get_by_id(&uid)
            .await
            .map_err(|e| match e {
                RegistryError::Malformed(reason) => FetchError::Decode {
                    uid,
                    source: DecodeError::MalformedEnvelope(reason),
                },
                other => FetchError::Transport(other),
            })?
            .ok_or(FetchError::NotFound(uid))?;

        if raw.schema != self.schema_uid {
            warn!(
                "Attestation {} uses schema {}, expected {}",
                uid, raw.schema, self.schema_uid
            );
        }

        let payload = schema::decode_payload(&raw.data)
            .map_err(|source| FetchError::Decode { uid, source })?;

        Ok(into_record(raw, payload))
    }

    /// Fetch an attestation by uid; every failure is logged and becomes `None`
    pub async fn fetch_by_id(&self, id: &str) -> Option<AttestationRecord> {
        match self.fetch(id).await {
            Ok(record) => Some(record),
            Err(e @ FetchError::NotFound(_)) => {
                debug!("{}", e);
                None
            }
            Err(e @ FetchError::Decode { .. }) => {
                error!("Error fetching attestation: {}", e);
                None
            }
            Err(e) => {
                warn!("Error fetching attestation {}: {}", id, e);
                None
            }
        }
    }

    /// Attestations addressed to `recipient`.
    ///
    /// The registry contract has no recipient index; this needs an indexer
    /// integration and returns nothing until one exists.
    pub async fn list_for_recipient(&self, recipient: &Address) -> Vec<AttestationRecord> {
        warn!(
            "Listing attestations for {} requires an indexer integration; returning none",
            recipient
        );
        Vec::new()
    }

    /// Encode and submit a new sourcing attestation, returning its uid once confirmed
    pub async fn submit(
        &self,
        recipient: Address,
        payload: &CoffeeSourcingPayload,
    ) -> Result<Uid, SubmitError> {
        let session = self.signer.ok_or(SubmitError::NotAuthenticated)?;
        let data = schema::encode_payload(payload)?;

        let request = AttestationRequest {
            schema: self.schema_uid,
            recipient,
            expiration_time: 0,
            revocable: true,
            ref_uid: Uid::ZERO,
            data,
            value: 0,
        };

        let _guard = self.submit_lock.lock().await;
        info!(
            "Submitting attestation for {} from {} ({})",
            recipient, session.sender, payload.coffee_name
        );

        self.registry
            .attest(&session, &request)
            .await
            .map_err(|e| {
                error!("Error creating attestation: {}", e);
                SubmitError::SubmissionFailed(e.to_string())
            })
    }

    /// Check the registry answers and sits on the expected chain
    pub async fn health_check(&self) -> Result<bool, RegistryError> {
        let chain_id = self.registry.chain_id().await?;
        match self.expected_chain_id {
            Some(expected) if expected != chain_id => {
                warn!(
                    "Registry reports chain id {}, expected {}",
                    chain_id, expected
                );
                Ok(false)
            }
            _ => {
                debug!("Registry chain id: {}", chain_id);
                Ok(true)
            }
        }
    }
}

fn into_record(raw: RawRecord, payload: CoffeeSourcingPayload) -> AttestationRecord {
    AttestationRecord {
        id: raw.uid,
        schema_id: raw.schema,
        attester: raw.attester,
        recipient: raw.recipient,
        reference_id: raw.ref_uid,
        created_at: raw.time,
        expires_at: raw.expiration_time,
        revoked_at: raw.revocation_time,
        revocable: raw.revocable,
        payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: Uid = Uid([0x34; 32]);

    fn client_with(registry: MockRegistry) -> AttestationClient {
        AttestationClient::new(Arc::new(registry), SCHEMA)
    }

    #[tokio::test]
    async fn test_invalid_id_never_reaches_registry() {
        let registry = Arc::new(MockRegistry::new());
        // Would surface as a transport error if the lookup were attempted
        registry.fail_next_lookup();
        let client = AttestationClient::new(registry.clone(), SCHEMA);

        assert_eq!(
            client.fetch("0xdoesnotexist").await,
            Err(FetchError::InvalidId("0xdoesnotexist".to_string()))
        );
        assert!(registry.get_by_id(&Uid::ZERO).await.is_err());
    }

    #[tokio::test]
    async fn test_submit_requires_signer() {
        let client = client_with(MockRegistry::new());
        let result = client
            .submit(Address::new([1u8; 20]), &CoffeeSourcingPayload::default())
            .await;
        assert_eq!(result, Err(SubmitError::NotAuthenticated));
    }

    #[tokio::test]
    async fn test_health_check_compares_chain_id() {
        let client = client_with(MockRegistry::new());
        assert!(client.health_check().await.unwrap());

        let client = client_with(MockRegistry::new()).with_expected_chain_id(1);
        assert!(!client.health_check().await.unwrap());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(FetchError::Transport(RegistryError::Timeout("x".into())).is_retryable());
        assert!(FetchError::Transport(RegistryError::Transport("x".into())).is_retryable());
        assert!(!FetchError::Transport(RegistryError::Rpc {
            code: 3,
            message: "execution reverted".into()
        })
        .is_retryable());
        assert!(!FetchError::NotFound(Uid::ZERO).is_retryable());
        assert!(!FetchError::InvalidId("x".into()).is_retryable());
    }

    /// Answers every lookup with envelope bytes that cannot be decoded
    struct GarbageEnvelopeRegistry;

    #[async_trait::async_trait]
    impl Registry for GarbageEnvelopeRegistry {
        async fn get_by_id(&self, _uid: &Uid) -> Result<Option<RawRecord>, RegistryError> {
            crate::registry::eas::decode_attestation(&[0u8; 5])
        }

        async fn attest(
            &self,
            _session: &SigningSession,
            _request: &AttestationRequest,
        ) -> Result<Uid, RegistryError> {
            Err(RegistryError::Rejected("read-only".to_string()))
        }

        async fn chain_id(&self) -> Result<u64, RegistryError> {
            Ok(1)
        }
    }

    #[tokio::test]
    async fn test_malformed_envelope_is_a_decode_failure() {
        let client = AttestationClient::new(Arc::new(GarbageEnvelopeRegistry), SCHEMA);
        let uid = Uid::new([0x12; 32]);

        let err = client.fetch(&uid.to_hex()).await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::Decode {
                source: DecodeError::MalformedEnvelope(_),
                ..
            }
        ));
        assert!(!err.is_retryable());
        assert!(client.fetch_by_id(&uid.to_hex()).await.is_none());
    }

    #[test]
    fn test_from_config_mock_mode_connects_sender() {
        let config = Config::from_lookup(|key| match key {
            "ATTEST_MOCK_MODE" => Some("true".to_string()),
            "ATTEST_SENDER" => Some(format!("0x{}", "22".repeat(20))),
            _ => None,
        })
        .unwrap();

        let client = AttestationClient::from_config(&config).unwrap();
        assert_eq!(
            client.signer().map(|s| s.sender),
            Some(Address::new([0x22; 20]))
        );
        assert_eq!(client.schema_uid(), config.schema_uid);
    }
}
