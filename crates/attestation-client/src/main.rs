//! Attestation command-line tool
//!
//! Commands:
//! - fetch: Look up an attestation by uid and print it as JSON
//! - list: List attestations for a recipient
//! - submit: Create a new sourcing attestation
//! - decode / encode: Offline schema codec
//! - health: Check the registry connection

use anyhow::{Context, Result};
use attestation_client::{schema, Address, AttestationClient, CoffeeSourcingPayload, Config};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "attest-cli")]
#[command(about = "Coffee sourcing attestation lookup and submission")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch an attestation by uid
    Fetch {
        /// Attestation uid (0x + 64 hex digits)
        uid: String,
    },

    /// List attestations addressed to a recipient
    List {
        /// Recipient address
        recipient: String,
    },

    /// Submit a new sourcing attestation (requires ATTEST_SENDER)
    Submit {
        /// Recipient address
        #[arg(short, long)]
        recipient: String,

        /// JSON file with the sourcing payload
        #[arg(short, long)]
        payload: PathBuf,
    },

    /// Decode schema-encoded payload bytes or an indexer item list
    Decode {
        /// Payload bytes as hex
        #[arg(required_unless_present = "items", conflicts_with = "items")]
        data: Option<String>,

        /// JSON file with a named item list (`[{"name", "type", "value"}]`)
        #[arg(long)]
        items: Option<PathBuf>,
    },

    /// Encode a sourcing payload into schema bytes
    Encode {
        /// JSON file with the sourcing payload
        #[arg(short, long)]
        payload: PathBuf,
    },

    /// Check registry connectivity and chain id
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays machine-readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "attestation_client=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Decode { data, items } => {
            let payload = match (data, items) {
                (_, Some(path)) => {
                    let json = std::fs::read_to_string(&path).with_context(|| {
                        format!("Failed to read item list file: {}", path.display())
                    })?;
                    decode_item_list(&json)?
                }
                (Some(data), None) => decode_hex_payload(&data)?,
                (None, None) => anyhow::bail!("Nothing to decode"),
            };
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }

        Commands::Encode { payload } => {
            let payload = read_payload(&payload)?;
            let bytes = schema::encode_payload(&payload)?;
            println!("0x{}", hex::encode(bytes));
        }

        Commands::Fetch { uid } => {
            let client = connect()?;
            match client.fetch_by_id(&uid).await {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => anyhow::bail!("Attestation not found. Please check the UID."),
            }
        }

        Commands::List { recipient } => {
            let client = connect()?;
            let recipient = Address::from_hex(&recipient).context("Invalid recipient address")?;
            let records = client.list_for_recipient(&recipient).await;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }

        Commands::Submit { recipient, payload } => {
            let client = connect()?;
            let recipient = Address::from_hex(&recipient).context("Invalid recipient address")?;
            let payload = read_payload(&payload)?;
            let uid = client.submit(recipient, &payload).await?;
            println!("{}", uid);
        }

        Commands::Health => {
            let client = connect()?;
            if client.health_check().await? {
                println!("ok");
            } else {
                anyhow::bail!("Registry is on an unexpected chain");
            }
        }
    }

    Ok(())
}

fn connect() -> Result<AttestationClient> {
    let config = Config::from_env()?;
    info!("Registry: {}", config.registry_address);
    info!("Schema: {}", config.schema_uid);
    info!("Mock mode: {}", config.mock_mode);

    AttestationClient::from_config(&config).context("Failed to create attestation client")
}

fn read_payload(path: &Path) -> Result<CoffeeSourcingPayload> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload file: {}", path.display()))?;
    serde_json::from_str(&json).context("Failed to parse payload JSON")
}

fn decode_hex_payload(data: &str) -> Result<CoffeeSourcingPayload> {
    let digits = data.trim().trim_start_matches("0x");
    let bytes = hex::decode(digits).context("Payload is not valid hex")?;
    schema::decode_payload(&bytes).context("Failed to decode payload")
}

fn decode_item_list(json: &str) -> Result<CoffeeSourcingPayload> {
    let items: serde_json::Value =
        serde_json::from_str(json).context("Failed to parse item list JSON")?;
    schema::decode_items(&items).context("Failed to decode item list")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CoffeeSourcingPayload {
        CoffeeSourcingPayload {
            coffee_name: "Colombian Supremo".to_string(),
            origin: "Colombia".to_string(),
            date: "2024-01-16".to_string(),
            price: "19.99".to_string(),
            roast_level: "Medium".to_string(),
            quantity: 750,
            ..Default::default()
        }
    }

    #[test]
    fn test_cli_parses_decode_variants() {
        assert!(Cli::try_parse_from(["attest-cli", "decode", "0x00"]).is_ok());
        assert!(Cli::try_parse_from(["attest-cli", "decode", "--items", "items.json"]).is_ok());
        assert!(Cli::try_parse_from(["attest-cli", "decode"]).is_err());
        assert!(
            Cli::try_parse_from(["attest-cli", "decode", "0x00", "--items", "items.json"]).is_err()
        );
    }

    #[test]
    fn test_decode_hex_payload() {
        let bytes = schema::encode_payload(&sample()).unwrap();
        let decoded = decode_hex_payload(&format!("0x{}\n", hex::encode(bytes))).unwrap();
        assert_eq!(decoded, sample());

        assert!(decode_hex_payload("0xnothex").is_err());
    }

    #[test]
    fn test_decode_item_list() {
        let json = r#"[
            {"name": "coffeeName", "type": "string", "value": "Colombian Supremo"},
            {"name": "origin", "type": "string", "value": "Colombia"},
            {"name": "date", "type": "string", "value": "2024-01-16"},
            {"name": "price", "type": "string", "value": "19.99"},
            {"name": "roastLevel", "type": "string", "value": "Medium"},
            {"name": "quantity", "type": "uint256", "value": {"type": "BigNumber", "hex": "0x02ee"}}
        ]"#;
        assert_eq!(decode_item_list(json).unwrap(), sample());

        assert!(decode_item_list("not json").is_err());
        assert!(decode_item_list(r#"[{"name": "coffeeName", "value": "x"}]"#).is_err());
    }
}
