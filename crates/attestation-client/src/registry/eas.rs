//! Contract registry over Ethereum JSON-RPC
//!
//! Reads go through `eth_call` of `getAttestation(bytes32)`; writes through
//! `eth_sendTransaction` on a node that holds the sender account, followed by
//! receipt polling until the `Attested` event shows up.

use async_trait::async_trait;
use provenance_common::{Address, Uid};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{AttestationRequest, RawRecord, Registry, RegistryError, SigningSession};
use crate::abi::{self, AbiError, Reader, Token};
use crate::config::Config;

pub const GET_ATTESTATION_SIGNATURE: &str = "getAttestation(bytes32)";
pub const ATTEST_SIGNATURE: &str = "attest((bytes32,(address,uint64,bool,bytes32,bytes,uint256)))";
pub const ATTESTED_EVENT_SIGNATURE: &str = "Attested(address,address,bytes32,bytes32)";

/// JSON-RPC registry client
pub struct EasRegistry {
    /// HTTP client, carries the per-request timeout
    client: Client,
    rpc_url: String,
    /// Registry contract
    address: Address,
    request_id: AtomicU64,
    confirmation_timeout: Duration,
    poll_interval: Duration,
}

/// JSON-RPC request
#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

/// JSON-RPC response
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

/// JSON-RPC error
#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct TransactionReceipt {
    /// `0x1` success, `0x0` reverted
    status: Option<String>,
    #[serde(default)]
    logs: Vec<Log>,
}

#[derive(Debug, Deserialize)]
struct Log {
    address: String,
    #[serde(default)]
    topics: Vec<String>,
    data: String,
}

impl EasRegistry {
    /// Create a new registry client
    pub fn new(
        rpc_url: impl Into<String>,
        address: Address,
        timeout: Duration,
    ) -> Result<Self, RegistryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            rpc_url: rpc_url.into(),
            address,
            request_id: AtomicU64::new(0),
            confirmation_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(2),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, RegistryError> {
        let rpc_url = config
            .rpc_url
            .clone()
            .ok_or_else(|| RegistryError::Transport("no registry RPC URL configured".to_string()))?;

        Ok(Self::new(rpc_url, config.registry_address, config.rpc_timeout())?
            .with_confirmation(config.confirmation_timeout(), config.poll_interval()))
    }

    pub fn with_confirmation(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self.poll_interval = poll_interval;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Make an RPC call; `Ok(None)` when the node answers with a null result
    async fn call_optional<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, RegistryError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);

        let request = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        debug!("Registry RPC call: {} id={}", method, id);

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RegistryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RegistryError::Transport(format!("HTTP {} - {}", status, body)));
        }

        let rpc_response: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| RegistryError::Malformed(e.to_string()))?;

        if let Some(error) = rpc_response.error {
            return Err(RegistryError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        Ok(rpc_response.result)
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, RegistryError> {
        self.call_optional(method, params)
            .await?
            .ok_or_else(|| RegistryError::Malformed(format!("empty result for {}", method)))
    }

    /// Read-only contract call against the latest block
    async fn eth_call(&self, data: &[u8]) -> Result<Vec<u8>, RegistryError> {
        let params = json!([
            { "to": self.address.to_hex(), "data": to_hex_data(data) },
            "latest"
        ]);
        let result: String = self.call("eth_call", params).await?;
        from_hex_data(&result)
    }

    async fn poll_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt, RegistryError> {
        loop {
            let receipt: Option<TransactionReceipt> = self
                .call_optional("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;

            if let Some(receipt) = receipt {
                return Ok(receipt);
            }

            debug!("No receipt yet for {}", tx_hash);
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt, RegistryError> {
        tokio::time::timeout(self.confirmation_timeout, self.poll_receipt(tx_hash))
            .await
            .map_err(|_| {
                RegistryError::Timeout(format!(
                    "no receipt for {} within {:?}",
                    tx_hash, self.confirmation_timeout
                ))
            })?
    }
}

#[async_trait]
impl Registry for EasRegistry {
    async fn get_by_id(&self, uid: &Uid) -> Result<Option<RawRecord>, RegistryError> {
        debug!("Fetching attestation {} from registry {}", uid, self.address);
        let data = self.eth_call(&get_attestation_calldata(uid)).await?;
        decode_attestation(&data)
    }

    async fn attest(
        &self,
        session: &SigningSession,
        request: &AttestationRequest,
    ) -> Result<Uid, RegistryError> {
        let params = json!([{
            "from": session.sender.to_hex(),
            "to": self.address.to_hex(),
            "data": to_hex_data(&attest_calldata(request)),
        }]);

        let tx_hash: String = self.call("eth_sendTransaction", params).await?;
        info!("Submitted attestation transaction {}", tx_hash);

        let receipt = self.wait_for_receipt(&tx_hash).await?;
        if receipt.status.as_deref() == Some("0x0") {
            warn!("Attestation transaction {} reverted", tx_hash);
            return Err(RegistryError::Rejected(format!("transaction {} reverted", tx_hash)));
        }

        let uid = uid_from_logs(&receipt.logs, &self.address)?;
        info!("Attestation {} confirmed in transaction {}", uid, tx_hash);
        Ok(uid)
    }

    async fn chain_id(&self) -> Result<u64, RegistryError> {
        let result: String = self.call("eth_chainId", json!([])).await?;
        parse_hex_u64(&result)
    }
}

/// Calldata for `getAttestation(uid)`
pub fn get_attestation_calldata(uid: &Uid) -> Vec<u8> {
    let mut data = abi::selector(GET_ATTESTATION_SIGNATURE).to_vec();
    data.extend_from_slice(&abi::encode(&[Token::FixedBytes(uid.0)]));
    data
}

/// Calldata for `attest(AttestationRequest)`
pub fn attest_calldata(request: &AttestationRequest) -> Vec<u8> {
    let mut data = abi::selector(ATTEST_SIGNATURE).to_vec();
    data.extend_from_slice(&abi::encode(&[Token::Tuple(vec![
        Token::FixedBytes(request.schema.0),
        Token::Tuple(vec![
            Token::Address(request.recipient.0),
            Token::Uint(request.expiration_time),
            Token::Bool(request.revocable),
            Token::FixedBytes(request.ref_uid.0),
            Token::Bytes(request.data.clone()),
            Token::Uint(request.value),
        ]),
    ])]));
    data
}

/// Topic hash of the registry's `Attested` event
pub fn attested_topic() -> [u8; 32] {
    abi::keccak256(ATTESTED_EVENT_SIGNATURE.as_bytes())
}

fn malformed(e: AbiError) -> RegistryError {
    RegistryError::Malformed(e.to_string())
}

/// Decode the `getAttestation` return value; a zero uid means "no such record".
pub fn decode_attestation(data: &[u8]) -> Result<Option<RawRecord>, RegistryError> {
    let tuple = Reader::new(data).tuple(0).map_err(malformed)?;

    let uid = Uid::new(tuple.bytes32(0).map_err(malformed)?);
    if uid.is_zero() {
        return Ok(None);
    }

    let nonzero = |v: u64| (v != 0).then_some(v);
    let ref_uid = Uid::new(tuple.bytes32(5).map_err(malformed)?);

    Ok(Some(RawRecord {
        uid,
        schema: Uid::new(tuple.bytes32(1).map_err(malformed)?),
        time: tuple.uint64(2).map_err(malformed)?,
        expiration_time: nonzero(tuple.uint64(3).map_err(malformed)?),
        revocation_time: nonzero(tuple.uint64(4).map_err(malformed)?),
        ref_uid: (!ref_uid.is_zero()).then_some(ref_uid),
        recipient: Address::new(tuple.address(6).map_err(malformed)?),
        attester: Address::new(tuple.address(7).map_err(malformed)?),
        revocable: tuple.boolean(8).map_err(malformed)?,
        data: tuple.bytes(9).map_err(malformed)?.to_vec(),
    }))
}

/// Encode a record the way `getAttestation` returns it
pub fn encode_attestation(record: &RawRecord) -> Vec<u8> {
    abi::encode(&[Token::Tuple(vec![
        Token::FixedBytes(record.uid.0),
        Token::FixedBytes(record.schema.0),
        Token::Uint(record.time),
        Token::Uint(record.expiration_time.unwrap_or(0)),
        Token::Uint(record.revocation_time.unwrap_or(0)),
        Token::FixedBytes(record.ref_uid.unwrap_or(Uid::ZERO).0),
        Token::Address(record.recipient.0),
        Token::Address(record.attester.0),
        Token::Bool(record.revocable),
        Token::Bytes(record.data.clone()),
    ])])
}

/// Pull the new uid out of the registry's `Attested` log
fn uid_from_logs(logs: &[Log], registry: &Address) -> Result<Uid, RegistryError> {
    let topic = format!("0x{}", hex::encode(attested_topic()));

    let log = logs
        .iter()
        .find(|log| {
            Address::from_hex(&log.address).is_ok_and(|a| a == *registry)
                && log
                    .topics
                    .first()
                    .is_some_and(|t| t.eq_ignore_ascii_case(&topic))
        })
        .ok_or_else(|| RegistryError::Rejected("no Attested event in receipt".to_string()))?;

    let data = from_hex_data(&log.data)?;
    let uid = Reader::new(&data).bytes32(0).map_err(malformed)?;
    Ok(Uid::new(uid))
}

fn to_hex_data(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

fn from_hex_data(s: &str) -> Result<Vec<u8>, RegistryError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(digits).map_err(|e| RegistryError::Malformed(format!("invalid hex data: {}", e)))
}

fn parse_hex_u64(s: &str) -> Result<u64, RegistryError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(digits, 16)
        .map_err(|e| RegistryError::Malformed(format!("invalid quantity {}: {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::WORD;

    fn raw() -> RawRecord {
        RawRecord {
            uid: Uid::new([0x12; 32]),
            schema: Uid::new([0x34; 32]),
            attester: Address::new([0x74; 20]),
            recipient: Address::new([0x8b; 20]),
            ref_uid: None,
            time: 1_704_067_200,
            expiration_time: None,
            revocation_time: Some(1_704_100_000),
            revocable: true,
            data: vec![1, 2, 3, 4, 5],
        }
    }

    #[test]
    fn test_get_attestation_calldata() {
        let data = get_attestation_calldata(&Uid::new([0xaa; 32]));
        assert_eq!(data.len(), 4 + WORD);
        assert_eq!(&data[..4], &abi::selector(GET_ATTESTATION_SIGNATURE));
        assert_eq!(&data[4..], &[0xaa; 32]);
    }

    #[test]
    fn test_decode_attestation_envelope() {
        let record = raw();
        let decoded = decode_attestation(&encode_attestation(&record)).unwrap().unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_zero_fields_become_none() {
        let mut record = raw();
        record.revocation_time = None;
        record.ref_uid = None;

        let bytes = encode_attestation(&record);
        // refUID is head word 5 of the tuple, after the 0x20 outer offset
        assert!(bytes[WORD + 5 * WORD..WORD + 6 * WORD].iter().all(|&b| b == 0));

        let decoded = decode_attestation(&bytes).unwrap().unwrap();
        assert_eq!(decoded.ref_uid, None);
        assert_eq!(decoded.revocation_time, None);
        assert_eq!(decoded.expiration_time, None);
    }

    #[test]
    fn test_zero_uid_means_not_found() {
        let mut record = raw();
        record.uid = Uid::ZERO;
        record.data = Vec::new();
        assert_eq!(decode_attestation(&encode_attestation(&record)).unwrap(), None);
    }

    #[test]
    fn test_malformed_return_data() {
        assert!(matches!(
            decode_attestation(&[]),
            Err(RegistryError::Malformed(_))
        ));
        let mut bytes = encode_attestation(&raw());
        bytes.truncate(bytes.len() - WORD);
        assert!(matches!(
            decode_attestation(&bytes),
            Err(RegistryError::Malformed(_))
        ));
    }

    #[test]
    fn test_attest_calldata_layout() {
        let request = AttestationRequest {
            schema: Uid::new([0x34; 32]),
            recipient: Address::new([0x8b; 20]),
            expiration_time: 0,
            revocable: true,
            ref_uid: Uid::ZERO,
            data: vec![9; 40],
            value: 0,
        };
        let data = attest_calldata(&request);
        assert_eq!(&data[..4], &abi::selector(ATTEST_SIGNATURE));

        let args = Reader::new(&data[4..]);
        let outer = args.tuple(0).unwrap();
        assert_eq!(outer.bytes32(0).unwrap(), [0x34; 32]);
        let inner = outer.tuple(1).unwrap();
        assert_eq!(inner.address(0).unwrap(), [0x8b; 20]);
        assert_eq!(inner.uint64(1).unwrap(), 0);
        assert!(inner.boolean(2).unwrap());
        assert_eq!(inner.bytes32(3).unwrap(), [0u8; 32]);
        assert_eq!(inner.bytes(4).unwrap(), &[9; 40][..]);
        assert_eq!(inner.uint64(5).unwrap(), 0);
    }

    #[test]
    fn test_uid_from_logs() {
        let registry = Address::new([0xc2; 20]);
        let topic = format!("0x{}", hex::encode(attested_topic()));
        let uid = Uid::new([0x55; 32]);

        let logs = vec![
            Log {
                address: Address::new([0x01; 20]).to_hex(),
                topics: vec![topic.clone()],
                data: to_hex_data(&[0x66; 32]),
            },
            Log {
                address: registry.to_hex().to_uppercase().replace("0X", "0x"),
                topics: vec![topic.to_uppercase().replace("0X", "0x")],
                data: to_hex_data(&uid.0),
            },
        ];
        assert_eq!(uid_from_logs(&logs, &registry).unwrap(), uid);
        assert!(matches!(
            uid_from_logs(&logs[..1], &registry),
            Err(RegistryError::Rejected(_))
        ));
    }

    #[test]
    fn test_parse_hex_u64() {
        assert_eq!(parse_hex_u64("0xaa36a7").unwrap(), 11_155_111);
        assert!(parse_hex_u64("0xzz").is_err());
    }
}
