//! Attestation Client
//!
//! Fetches coffee sourcing attestations from an attestation registry by uid,
//! decodes their schema-encoded payload and normalizes them into
//! [`AttestationRecord`]s for the storefront. Also carries the write path
//! for creating new attestations through a signing session.
//!
//! **Components:**
//! - `abi`: minimal Solidity ABI codec
//! - `schema`: the fixed coffee sourcing schema (encode/decode)
//! - `registry`: registry backends (JSON-RPC contract registry, mock)
//! - `client`: the client operations
//! - `config`: configuration management

pub mod abi;
pub mod client;
pub mod config;
pub mod registry;
pub mod schema;

pub use client::{AttestationClient, FetchError, SubmitError};
pub use config::Config;
pub use provenance_common::{Address, AttestationRecord, CoffeeSourcingPayload, Uid};
pub use registry::{EasRegistry, MockRegistry, RawRecord, Registry, RegistryError, SigningSession};
