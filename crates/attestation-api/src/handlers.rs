//! API request handlers for the Attestation API

use attestation_client::{Address, AttestationClient, SubmitError};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::info;

use crate::models::{
    AttestationResponse, AttestationsListResponse, SubmitAttestationRequest,
    SubmitAttestationResponse,
};

/// Shared application state
pub struct AppState {
    pub client: AttestationClient,

    /// Block explorer base URL, for transaction links
    pub explorer_url: Option<String>,
}

impl AppState {
    pub fn new(client: AttestationClient) -> Self {
        Self {
            client,
            explorer_url: None,
        }
    }

    pub fn with_explorer_url(mut self, explorer_url: Option<String>) -> Self {
        self.explorer_url = explorer_url;
        self
    }
}

/// API Error type
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message
        });

        (self.status, Json(body)).into_response()
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::NotAuthenticated => ApiError {
                status: StatusCode::UNAUTHORIZED,
                message: "Please connect a wallet to create attestations.".to_string(),
            },
            SubmitError::InvalidPayload(e) => ApiError {
                status: StatusCode::BAD_REQUEST,
                message: e.to_string(),
            },
            SubmitError::SubmissionFailed(reason) => ApiError {
                status: StatusCode::BAD_GATEWAY,
                message: format!("Transaction failed: {}", reason),
            },
        }
    }
}

fn parse_address(address: &str) -> Result<Address, ApiError> {
    Address::from_hex(address).map_err(|_| ApiError {
        status: StatusCode::BAD_REQUEST,
        message: format!("Invalid address: {}", address),
    })
}

/// Health check endpoint
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "attestation-api"
    }))
}

/// Get attestation by uid; any read failure is reported as not found
pub async fn get_attestation_handler(
    State(state): State<Arc<AppState>>,
    Path(uid): Path<String>,
) -> Result<Json<AttestationResponse>, ApiError> {
    info!("Getting attestation: {}", uid);

    match state.client.fetch_by_id(&uid).await {
        Some(attestation) => {
            let transaction_url = state
                .explorer_url
                .as_deref()
                .and_then(|base| attestation.payload.transaction_url(base));

            Ok(Json(AttestationResponse {
                attestation,
                transaction_url,
            }))
        }
        None => Err(ApiError {
            status: StatusCode::NOT_FOUND,
            message: "Attestation not found. Please check the UID.".to_string(),
        }),
    }
}

/// List attestations addressed to a recipient
pub async fn list_recipient_attestations_handler(
    State(state): State<Arc<AppState>>,
    Path(address): Path<String>,
) -> Result<Json<AttestationsListResponse>, ApiError> {
    let recipient = parse_address(&address)?;
    info!("Listing attestations for recipient: {}", recipient);

    let attestations = state.client.list_for_recipient(&recipient).await;
    let total = attestations.len();

    Ok(Json(AttestationsListResponse {
        attestations,
        total,
    }))
}

/// Create a new sourcing attestation
pub async fn submit_attestation_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SubmitAttestationRequest>,
) -> Result<(StatusCode, Json<SubmitAttestationResponse>), ApiError> {
    let recipient = parse_address(&request.recipient)?;
    info!(
        "Submitting attestation for {}: {}",
        recipient, request.payload.coffee_name
    );

    let uid = state.client.submit(recipient, &request.payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(SubmitAttestationResponse { success: true, uid }),
    ))
}
