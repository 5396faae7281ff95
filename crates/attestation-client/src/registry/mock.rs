//! Mock registry for development and testing
//!
//! Holds records in memory; no chain connection required.

use async_trait::async_trait;
use provenance_common::{Address, CoffeeSourcingPayload, Uid};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use super::{AttestationRequest, RawRecord, Registry, RegistryError, SigningSession};
use crate::abi;
use crate::schema;

/// Chain id reported by the mock (Sepolia)
pub const MOCK_CHAIN_ID: u64 = 11_155_111;

/// Mock registry
pub struct MockRegistry {
    records: RwLock<HashMap<Uid, RawRecord>>,

    /// Fail the next lookup with a transport error
    fail_next_lookup: AtomicBool,

    /// Revert the next attestation
    reject_next_attest: AtomicBool,

    /// Attestation counter, feeds deterministic uids
    nonce: AtomicU64,

    chain_id: u64,
}

impl Default for MockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRegistry {
    /// Create an empty mock registry
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    pub fn with_records(records: impl IntoIterator<Item = RawRecord>) -> Self {
        Self {
            records: RwLock::new(records.into_iter().map(|r| (r.uid, r)).collect()),
            fail_next_lookup: AtomicBool::new(false),
            reject_next_attest: AtomicBool::new(false),
            nonce: AtomicU64::new(0),
            chain_id: MOCK_CHAIN_ID,
        }
    }

    /// Mock registry holding the storefront's demo sourcing records
    pub fn with_demo_records(schema: Uid) -> Self {
        Self::with_records(demo_records(schema))
    }

    pub async fn insert(&self, record: RawRecord) {
        self.records.write().await.insert(record.uid, record);
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub fn fail_next_lookup(&self) {
        self.fail_next_lookup.store(true, Ordering::SeqCst);
    }

    pub fn reject_next_attest(&self) {
        self.reject_next_attest.store(true, Ordering::SeqCst);
    }

    /// Deterministic uid from the request and a counter
    fn next_uid(&self, sender: &Address, request: &AttestationRequest) -> Uid {
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);

        let mut preimage = Vec::with_capacity(32 + 20 + 20 + request.data.len() + 8);
        preimage.extend_from_slice(request.schema.as_bytes());
        preimage.extend_from_slice(request.recipient.as_bytes());
        preimage.extend_from_slice(sender.as_bytes());
        preimage.extend_from_slice(&request.data);
        preimage.extend_from_slice(&nonce.to_be_bytes());

        Uid::new(abi::keccak256(&preimage))
    }
}

#[async_trait]
impl Registry for MockRegistry {
    async fn get_by_id(&self, uid: &Uid) -> Result<Option<RawRecord>, RegistryError> {
        if self.fail_next_lookup.swap(false, Ordering::SeqCst) {
            return Err(RegistryError::Transport("mock registry unreachable".to_string()));
        }

        let record = self.records.read().await.get(uid).cloned();
        debug!("Mock registry: get_by_id({}) -> found={}", uid, record.is_some());
        Ok(record)
    }

    async fn attest(
        &self,
        session: &SigningSession,
        request: &AttestationRequest,
    ) -> Result<Uid, RegistryError> {
        if self.reject_next_attest.swap(false, Ordering::SeqCst) {
            return Err(RegistryError::Rejected("mock transaction reverted".to_string()));
        }

        let uid = self.next_uid(&session.sender, request);
        let record = RawRecord {
            uid,
            schema: request.schema,
            attester: session.sender,
            recipient: request.recipient,
            ref_uid: (!request.ref_uid.is_zero()).then_some(request.ref_uid),
            time: chrono::Utc::now().timestamp().max(0) as u64,
            expiration_time: (request.expiration_time != 0).then_some(request.expiration_time),
            revocation_time: None,
            revocable: request.revocable,
            data: request.data.clone(),
        };

        self.records.write().await.insert(uid, record);
        debug!("Mock registry: attest -> {}", uid);
        Ok(uid)
    }

    async fn chain_id(&self) -> Result<u64, RegistryError> {
        Ok(self.chain_id)
    }
}

/// Demo attester (the roastery) and recipient (the importer)
pub const DEMO_ATTESTER: Address = Address([
    0x74, 0x2d, 0x35, 0xcc, 0x66, 0x34, 0xc0, 0x53, 0x29, 0x25, 0xa3, 0xb8, 0x44, 0xbc, 0x9e,
    0x75, 0x95, 0xf0, 0xbe, 0xb0,
]);
pub const DEMO_RECIPIENT: Address = Address([
    0x8b, 0xa1, 0xf1, 0x09, 0x55, 0x1b, 0xd4, 0x32, 0x80, 0x30, 0x12, 0x64, 0x5a, 0xc1, 0x36,
    0xdd, 0xd6, 0x4d, 0xba, 0x72,
]);

/// The two sourcing records shown on the storefront's transparency page
pub fn demo_records(schema: Uid) -> Vec<RawRecord> {
    let yirgacheffe = CoffeeSourcingPayload {
        coffee_name: "Ethiopian Yirgacheffe".to_string(),
        origin: "Ethiopia".to_string(),
        date: "2024-01-15".to_string(),
        price: "24.99".to_string(),
        roast_level: "Light".to_string(),
        quantity: 500,
        certification: "Organic, Fair Trade".to_string(),
        farm: "Kochere Cooperative".to_string(),
        elevation: "1,700-2,200m".to_string(),
        varietal: "Heirloom".to_string(),
        processing_method: "Washed".to_string(),
        transaction_hash: String::new(),
    };
    let supremo = CoffeeSourcingPayload {
        coffee_name: "Colombian Supremo".to_string(),
        origin: "Colombia".to_string(),
        date: "2024-01-16".to_string(),
        price: "19.99".to_string(),
        roast_level: "Medium".to_string(),
        quantity: 750,
        certification: "Rainforest Alliance".to_string(),
        farm: "Finca El Paraiso".to_string(),
        elevation: "1,500-1,800m".to_string(),
        varietal: "Caturra, Colombia".to_string(),
        processing_method: "Washed".to_string(),
        transaction_hash: String::new(),
    };

    [
        ("0x1234567890abcdef1234567890abcdef1234567890abcdef1234567890abcdef", 1_704_067_200, yirgacheffe),
        ("0xabcdef1234567890abcdef1234567890abcdef1234567890abcdef1234567890", 1_704_153_600, supremo),
    ]
    .into_iter()
    .filter_map(|(uid, time, payload)| {
        Some(RawRecord {
            uid: Uid::from_hex(uid).ok()?,
            schema,
            attester: DEMO_ATTESTER,
            recipient: DEMO_RECIPIENT,
            ref_uid: None,
            time,
            expiration_time: None,
            revocation_time: None,
            revocable: true,
            data: schema::encode_payload(&payload).ok()?,
        })
    })
    .collect()
}
