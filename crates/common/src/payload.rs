//! Decoded coffee sourcing data carried inside an attestation

use serde::{Deserialize, Serialize};

/// Schema-specific payload of a coffee sourcing attestation.
///
/// Optional fields use the empty string for "not provided"; they are omitted
/// from serialized JSON and default to empty when deserializing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoffeeSourcingPayload {
    /// Name of the coffee
    pub coffee_name: String,

    /// Origin country/region
    pub origin: String,

    /// Transaction date as recorded by the writer
    pub date: String,

    /// Price paid in USD, decimal text (e.g. "24.99")
    pub price: String,

    /// Light, Medium, Dark, ...
    pub roast_level: String,

    /// Quantity purchased
    pub quantity: u64,

    /// Organic, Fair Trade, ...
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub certification: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub farm: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub elevation: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub varietal: String,

    /// Washed, Natural, ...
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub processing_method: String,

    /// Settlement transaction hash (`0x` + 64 hex digits)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub transaction_hash: String,
}

impl CoffeeSourcingPayload {
    /// Explorer link for the settlement transaction, if one was recorded
    pub fn transaction_url(&self, explorer_base: &str) -> Option<String> {
        if self.transaction_hash.is_empty() {
            return None;
        }
        Some(format!(
            "{}/tx/{}",
            explorer_base.trim_end_matches('/'),
            self.transaction_hash
        ))
    }
}
