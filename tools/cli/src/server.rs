//! Demo HTTP server wiring the tokenization engine, the vault and the
//! transport envelope together.

use anyhow::Context;
use axum::{
    body::to_bytes,
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

use tokenvault_common::{Error, SensitiveString, TokenVaultConfig};
use tokenvault_crypto::{open, seal, SecretMaterial};
use tokenvault_storage::{
    create_default_registry, EncryptedTokenData, TokenMetadata, VaultConnector,
};
use tokenvault_tokenize::{AlgorithmRegistry, AlgorithmType, TokenizationContext};
use tokenvault_transport::{envelope_middleware, DecryptedPayload, EnvelopeFilter};

const MAX_PLAIN_BODY: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<AlgorithmRegistry>,
    pub vault: Arc<dyn VaultConnector>,
    pub secrets: Arc<SecretMaterial>,
    pub filter: Arc<EnvelopeFilter>,
}

/// Build the application router with the envelope middleware in front of
/// every route.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/tokens", post(create_token))
        .route("/api/tokens/{token}", get(get_token).delete(delete_token))
        .route("/api/vault/metrics", get(vault_metrics))
        .route("/health", get(health))
        .layer(from_fn_with_state(state.filter.clone(), envelope_middleware))
        .with_state(state)
}

/// Resolve the configured vault, then serve until the listener fails.
pub async fn serve(
    config: TokenVaultConfig,
    secrets: Arc<SecretMaterial>,
    addr: SocketAddr,
) -> anyhow::Result<()> {
    let vault = create_default_registry()
        .resolve_configured(&config.vault)
        .context("Failed to resolve vault backend")?;
    vault
        .initialize()
        .await
        .context("Failed to initialize vault backend")?;

    let filter = EnvelopeFilter::from_global(config.transport.clone())
        .context("Transport key unavailable")?;

    let state = AppState {
        registry: Arc::new(AlgorithmRegistry::with_defaults(secrets.clone())),
        vault,
        secrets,
        filter: Arc::new(filter),
    };

    info!(
        addr = %addr,
        backend = state.vault.backend(),
        envelope = config.transport.enabled,
        "TokenVault server listening"
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenizeRequest {
    card_number: String,
    merchant_id: String,
    #[serde(default)]
    algorithm: Option<String>,
    #[serde(default)]
    cof_contract_id: Option<String>,
    #[serde(default)]
    platform_id: Option<String>,
    #[serde(default)]
    customer_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    token: String,
    algorithm: AlgorithmType,
    token_format: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRecordView {
    token_id: String,
    masked_pan: String,
    metadata: TokenMetadata,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

async fn create_token(
    State(state): State<AppState>,
    request: Request,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let body: TokenizeRequest = read_payload(request).await?;

    let kind: AlgorithmType = body.algorithm.as_deref().unwrap_or("FPE").parse()?;
    let algorithm = state.registry.resolve(kind)?;

    let mut ctx = match body.cof_contract_id {
        Some(contract) => {
            TokenizationContext::card_on_file(body.card_number, body.merchant_id, contract)
        }
        None => TokenizationContext::new(body.card_number, body.merchant_id),
    };
    if let Some(platform) = body.platform_id {
        ctx = ctx.with_platform(platform);
    }
    if let Some(customer) = body.customer_id {
        ctx = ctx.with_customer(customer);
    }

    let token = algorithm.tokenize(&ctx)?;

    let pan = ctx.normalized_card_number()?;
    let sealed = seal(
        state.secrets.record_key().as_bytes(),
        pan.expose().as_bytes(),
        token.as_str().as_bytes(),
    )?;

    let mut metadata = TokenMetadata::new();
    if let Some(platform) = &ctx.platform_id {
        metadata.insert("platformId".to_string(), platform.clone());
    }
    let record = EncryptedTokenData::new(token.as_str(), sealed)
        .with_metadata("merchantId", ctx.merchant_id.as_str())
        .with_metadata("algorithm", kind.as_str());
    state.vault.store(record, metadata).await?;

    info!(algorithm = %kind, merchant_id = %ctx.merchant_id, "Token issued");

    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            token: token.into_string(),
            algorithm: kind,
            token_format: algorithm.token_format(),
        }),
    ))
}

async fn get_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<TokenRecordView>, ApiError> {
    let record = state.vault.retrieve(&token).await?;

    let plaintext = open(
        state.secrets.record_key().as_bytes(),
        &record.encrypted_data,
        record.token_id.as_bytes(),
    )?;
    let pan = SensitiveString::new(
        String::from_utf8(plaintext)
            .map_err(|_| Error::Crypto("stored card number is not UTF-8".to_string()))?,
    );

    Ok(Json(TokenRecordView {
        masked_pan: pan.masked(),
        token_id: record.token_id,
        metadata: record.metadata,
        created_at: record.created_at,
        updated_at: record.updated_at,
        version: record.version,
    }))
}

async fn delete_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.vault.delete(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn vault_metrics(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let vault = state.vault.metrics().await?;
    Ok(Json(json!({
        "vault": vault,
        "transport": state.filter.metrics(),
    })))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let healthy = state.vault.is_healthy().await;
    Json(json!({
        "status": if healthy { "ok" } else { "degraded" },
        "backend": state.vault.backend(),
    }))
}

/// Read a JSON body, preferring the decrypted envelope plaintext.
async fn read_payload<T: DeserializeOwned>(request: Request) -> Result<T, ApiError> {
    if let Some(payload) = request.extensions().get::<DecryptedPayload>() {
        return payload
            .json()
            .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)));
    }

    let bytes = to_bytes(request.into_body(), MAX_PLAIN_BODY)
        .await
        .map_err(|e| ApiError::bad_request(format!("Unreadable request body: {}", e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))
}

/// HTTP mapping of core errors.
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::InvalidContext(_) | Error::ValidationFailure(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::NotInitialized { .. } | Error::Storage { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::Crypto(_) | Error::Config(_) | Error::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = if status.is_server_error() {
            warn!(error = %err, "Request failed");
            status
                .canonical_reason()
                .unwrap_or("Internal error")
                .to_string()
        } else {
            err.to_string()
        };

        Self { status, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Method;
    use tokenvault_common::TransportSettings;
    use tokenvault_crypto::MasterKey;
    use tokenvault_storage::MemoryConnector;
    use tower::ServiceExt;

    async fn state() -> AppState {
        let secrets = Arc::new(SecretMaterial::new(MasterKey::from_bytes([1u8; 32])).unwrap());
        let vault = Arc::new(MemoryConnector::new());
        vault.initialize().await.unwrap();

        AppState {
            registry: Arc::new(AlgorithmRegistry::with_defaults(secrets.clone())),
            vault,
            filter: Arc::new(EnvelopeFilter::new(TransportSettings::default(), secrets.clone())),
            secrets,
        }
    }

    fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: Method, uri: &str) -> Request {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_token_lifecycle() {
        let app = router(state().await);

        let response = app
            .clone()
            .oneshot(json_request(
                Method::POST,
                "/api/tokens",
                json!({
                    "cardNumber": "4111 1111 1111 1111",
                    "merchantId": "MERCH001",
                    "algorithm": "FPE"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let issued = body_json(response).await;
        assert_eq!(issued["token"], "8519405831559537");
        assert_eq!(issued["algorithm"], "FPE");

        let response = app
            .clone()
            .oneshot(empty_request(Method::GET, "/api/tokens/8519405831559537"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let view = body_json(response).await;
        assert_eq!(view["maskedPan"], "411111******1111");
        assert_eq!(view["metadata"]["merchantId"], "MERCH001");
        assert_eq!(view["version"], 1);

        let response = app
            .clone()
            .oneshot(empty_request(Method::DELETE, "/api/tokens/8519405831559537"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(empty_request(Method::GET, "/api/tokens/8519405831559537"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_cof_requires_contract() {
        let app = router(state().await);
        let response = app
            .oneshot(json_request(
                Method::POST,
                "/api/tokens",
                json!({
                    "cardNumber": "4111111111111111",
                    "merchantId": "MERCH001",
                    "algorithm": "COF"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invalid_card_is_rejected_without_echo() {
        let app = router(state().await);
        let response = app
            .oneshot(json_request(
                Method::POST,
                "/api/tokens",
                json!({ "cardNumber": "4111-1111-XXXX", "merchantId": "MERCH001" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(!body["error"].as_str().unwrap_or("").contains("4111"));
    }

    #[tokio::test]
    async fn test_metrics_and_health() {
        let app = router(state().await);
        app.clone()
            .oneshot(json_request(
                Method::POST,
                "/api/tokens",
                json!({
                    "cardNumber": "4111111111111111",
                    "merchantId": "M1",
                    "algorithm": "SIMPLE"
                }),
            ))
            .await
            .unwrap();

        let metrics = body_json(
            app.clone()
                .oneshot(empty_request(Method::GET, "/api/vault/metrics"))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(metrics["vault"]["token_count"], 1);
        assert_eq!(metrics["vault"]["backend_type"], "memory");
        assert_eq!(metrics["transport"]["encryptedResponses"], 0);

        let health = body_json(
            app.oneshot(empty_request(Method::GET, "/health"))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(health["status"], "ok");
    }
}
