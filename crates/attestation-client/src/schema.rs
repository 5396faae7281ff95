//! Coffee sourcing schema codec
//!
//! The schema is a fixed, ordered field list. [`Field::ALL`] is the single
//! source of truth for both encode and decode; [`COFFEE_SOURCING_SCHEMA`] is
//! the textual definition registered with the registry.
//!
//! Binary payloads are the ABI encoding of the field tuple. Decoding is
//! permissive: a blob written with a shorter field list (a smaller head) is
//! accepted as long as every required field is present, and the missing
//! trailing optional fields come back as empty strings.

use std::collections::HashMap;

use provenance_common::{Address, CoffeeSourcingPayload, Uid};
use serde_json::Value;
use thiserror::Error;

use crate::abi::{self, AbiError, Reader, Token, WORD};

/// Schema definition string as registered with the registry
pub const COFFEE_SOURCING_SCHEMA: &str = "bytes32 transactionHash,string coffeeName,string origin,string date,string price,string roastLevel,uint256 quantity,string certification,string farm,string elevation,string varietal,string processingMethod";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    Abi(#[from] AbiError),

    #[error("payload head has {found} fields, schema requires at least {required}")]
    TruncatedHead { found: usize, required: usize },

    #[error("payload head offset {0} is not word aligned")]
    MisalignedHead(usize),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("invalid value for `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("decoded items must be a JSON array")]
    NotAList,

    #[error("malformed registry envelope: {0}")]
    MalformedEnvelope(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("transactionHash must be empty or 0x followed by 64 lowercase hex digits, got `{0}`")]
    InvalidTransactionHash(String),
}

/// Primitive ABI type of a schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Bytes32,
    String,
    Uint256,
}

impl FieldType {
    pub fn abi_name(self) -> &'static str {
        match self {
            FieldType::Bytes32 => "bytes32",
            FieldType::String => "string",
            FieldType::Uint256 => "uint256",
        }
    }
}

/// Schema fields in encoding order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    TransactionHash,
    CoffeeName,
    Origin,
    Date,
    Price,
    RoastLevel,
    Quantity,
    Certification,
    Farm,
    Elevation,
    Varietal,
    ProcessingMethod,
}

impl Field {
    pub const ALL: [Field; 12] = [
        Field::TransactionHash,
        Field::CoffeeName,
        Field::Origin,
        Field::Date,
        Field::Price,
        Field::RoastLevel,
        Field::Quantity,
        Field::Certification,
        Field::Farm,
        Field::Elevation,
        Field::Varietal,
        Field::ProcessingMethod,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::TransactionHash => "transactionHash",
            Field::CoffeeName => "coffeeName",
            Field::Origin => "origin",
            Field::Date => "date",
            Field::Price => "price",
            Field::RoastLevel => "roastLevel",
            Field::Quantity => "quantity",
            Field::Certification => "certification",
            Field::Farm => "farm",
            Field::Elevation => "elevation",
            Field::Varietal => "varietal",
            Field::ProcessingMethod => "processingMethod",
        }
    }

    pub fn kind(self) -> FieldType {
        match self {
            Field::TransactionHash => FieldType::Bytes32,
            Field::Quantity => FieldType::Uint256,
            _ => FieldType::String,
        }
    }

    pub fn required(self) -> bool {
        matches!(
            self,
            Field::CoffeeName
                | Field::Origin
                | Field::Date
                | Field::Price
                | Field::RoastLevel
                | Field::Quantity
        )
    }

    /// Text-valued slot of the payload; `None` for `quantity`
    fn text_mut(self, payload: &mut CoffeeSourcingPayload) -> Option<&mut String> {
        Some(match self {
            Field::TransactionHash => &mut payload.transaction_hash,
            Field::CoffeeName => &mut payload.coffee_name,
            Field::Origin => &mut payload.origin,
            Field::Date => &mut payload.date,
            Field::Price => &mut payload.price,
            Field::RoastLevel => &mut payload.roast_level,
            Field::Quantity => return None,
            Field::Certification => &mut payload.certification,
            Field::Farm => &mut payload.farm,
            Field::Elevation => &mut payload.elevation,
            Field::Varietal => &mut payload.varietal,
            Field::ProcessingMethod => &mut payload.processing_method,
        })
    }

    fn text(self, payload: &CoffeeSourcingPayload) -> Option<&str> {
        Some(match self {
            Field::TransactionHash => &payload.transaction_hash,
            Field::CoffeeName => &payload.coffee_name,
            Field::Origin => &payload.origin,
            Field::Date => &payload.date,
            Field::Price => &payload.price,
            Field::RoastLevel => &payload.roast_level,
            Field::Quantity => return None,
            Field::Certification => &payload.certification,
            Field::Farm => &payload.farm,
            Field::Elevation => &payload.elevation,
            Field::Varietal => &payload.varietal,
            Field::ProcessingMethod => &payload.processing_method,
        })
    }
}

/// Smallest head (in words) that still carries every required field
fn min_head_words() -> usize {
    Field::ALL
        .iter()
        .rposition(|f| f.required())
        .map_or(0, |i| i + 1)
}

/// Registry schema uid: keccak256(schema ‖ resolver ‖ revocable)
pub fn schema_uid(resolver: Address, revocable: bool) -> Uid {
    let mut packed = Vec::with_capacity(COFFEE_SOURCING_SCHEMA.len() + 21);
    packed.extend_from_slice(COFFEE_SOURCING_SCHEMA.as_bytes());
    packed.extend_from_slice(resolver.as_bytes());
    packed.push(u8::from(revocable));
    Uid::new(abi::keccak256(&packed))
}

/// Encode a payload into the schema's byte layout
pub fn encode_payload(payload: &CoffeeSourcingPayload) -> Result<Vec<u8>, EncodeError> {
    let mut tokens = Vec::with_capacity(Field::ALL.len());
    for field in Field::ALL {
        let token = match field.kind() {
            FieldType::Bytes32 => {
                let text = field.text(payload).unwrap_or_default();
                Token::FixedBytes(transaction_hash_word(text).ok_or_else(|| {
                    EncodeError::InvalidTransactionHash(text.to_string())
                })?)
            }
            FieldType::Uint256 => Token::Uint(payload.quantity),
            FieldType::String => Token::String(field.text(payload).unwrap_or_default().to_string()),
        };
        tokens.push(token);
    }
    Ok(abi::encode(&tokens))
}

/// Decode schema bytes into a payload
pub fn decode_payload(data: &[u8]) -> Result<CoffeeSourcingPayload, DecodeError> {
    let reader = Reader::new(data);

    // The first dynamic field's offset marks the end of the head.
    let first_dynamic = Field::ALL
        .iter()
        .position(|f| f.kind() == FieldType::String)
        .unwrap_or(0);
    let head_bytes = reader.offset(first_dynamic)?;
    if head_bytes % WORD != 0 {
        return Err(DecodeError::MisalignedHead(head_bytes));
    }
    let head_words = head_bytes / WORD;
    let required = min_head_words();
    if head_words < required {
        return Err(DecodeError::TruncatedHead {
            found: head_words,
            required,
        });
    }

    let mut payload = CoffeeSourcingPayload::default();
    for (index, field) in Field::ALL.into_iter().enumerate() {
        if index >= head_words {
            break;
        }
        match field.kind() {
            FieldType::Bytes32 => {
                let text = bytes32_text(&reader.bytes32(index)?);
                set_text(&mut payload, field, text);
            }
            FieldType::Uint256 => {
                payload.quantity = reader.uint64(index).map_err(|e| match e {
                    AbiError::Overflow(_) => {
                        DecodeError::InvalidQuantity("value exceeds 64 bits".to_string())
                    }
                    other => DecodeError::Abi(other),
                })?;
            }
            FieldType::String => {
                let text = reader.string(index)?.to_string();
                set_text(&mut payload, field, text);
            }
        }
    }

    Ok(payload)
}

/// Decode the named item list produced by attestation SDKs and indexers:
/// `[{"name": "coffeeName", "type": "string", "value": ...}, ...]`.
///
/// Items are matched by name. A missing optional field becomes an empty
/// string; a missing required field is an error.
pub fn decode_items(items: &Value) -> Result<CoffeeSourcingPayload, DecodeError> {
    let list = items.as_array().ok_or(DecodeError::NotAList)?;
    let by_name: HashMap<&str, &Value> = list
        .iter()
        .filter_map(|item| Some((item.get("name")?.as_str()?, item_value(item))))
        .collect();

    let mut payload = CoffeeSourcingPayload::default();
    for field in Field::ALL {
        let Some(value) = by_name.get(field.name()).copied() else {
            if field.required() {
                return Err(DecodeError::MissingField(field.name()));
            }
            continue;
        };

        match field.kind() {
            FieldType::Uint256 => payload.quantity = parse_quantity(value)?,
            FieldType::Bytes32 => {
                let text = value.as_str().ok_or_else(|| invalid(field, "expected a hex string"))?;
                let bytes = parse_bytes32(text).ok_or_else(|| invalid(field, "expected 32 bytes of hex"))?;
                set_text(&mut payload, field, bytes32_text(&bytes));
            }
            FieldType::String => {
                let text = value.as_str().ok_or_else(|| invalid(field, "expected a string"))?;
                set_text(&mut payload, field, text.to_string());
            }
        }
    }

    Ok(payload)
}

static NULL: Value = Value::Null;

/// SDKs nest the value as `{"name", "type", "value"}`; indexers may flatten it.
fn item_value(item: &Value) -> &Value {
    match item.get("value") {
        Some(inner) if inner.get("type").is_some() && inner.get("value").is_some() => &inner["value"],
        Some(v) => v,
        None => &NULL,
    }
}

fn invalid(field: Field, reason: &str) -> DecodeError {
    DecodeError::InvalidField {
        field: field.name(),
        reason: reason.to_string(),
    }
}

fn set_text(payload: &mut CoffeeSourcingPayload, field: Field, text: String) {
    if let Some(slot) = field.text_mut(payload) {
        *slot = text;
    }
}

/// Quantity from a JSON number, decimal string, `0x` hex string or `{"hex": ...}`
fn parse_quantity(value: &Value) -> Result<u64, DecodeError> {
    let bad = || DecodeError::InvalidQuantity(value.to_string());
    match value {
        Value::Number(n) => n.as_u64().ok_or_else(bad),
        Value::String(s) => parse_uint_text(s).ok_or_else(bad),
        Value::Object(map) => map
            .get("hex")
            .and_then(Value::as_str)
            .and_then(parse_uint_text)
            .ok_or_else(bad),
        _ => Err(bad()),
    }
}

fn parse_uint_text(s: &str) -> Option<u64> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(digits) if !digits.is_empty() => u64::from_str_radix(digits, 16).ok(),
        Some(_) => None,
        None if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => s.parse().ok(),
        None => None,
    }
}

/// Word for a payload's transaction hash on the write path.
///
/// Only the forms decode gives back unchanged are accepted: empty (the zero
/// word) or `0x` followed by 64 lowercase hex digits, not all zero.
fn transaction_hash_word(text: &str) -> Option<[u8; 32]> {
    if text.is_empty() {
        return Some([0u8; 32]);
    }
    let digits = text.strip_prefix("0x")?;
    if digits.len() != 64 || !digits.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return None;
    }
    let word = parse_bytes32(text)?;
    (word != [0u8; 32]).then_some(word)
}

/// Lenient read of indexer values: empty text and a bare `0x` both mean
/// "no hash" (the zero word).
fn parse_bytes32(text: &str) -> Option<[u8; 32]> {
    let text = text.trim();
    if text.is_empty() || text == "0x" {
        return Some([0u8; 32]);
    }
    Uid::from_hex(text).ok().map(|uid| uid.0)
}

fn bytes32_text(bytes: &[u8; 32]) -> String {
    let uid = Uid::new(*bytes);
    if uid.is_zero() {
        String::new()
    } else {
        uid.to_hex()
    }
}
