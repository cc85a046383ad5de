//! REST API
//!
//! HTTP surface for external callers: balance, reserve, and message-status
//! queries, deposit submission (approve the executable and send to the
//! sibling, as the user), and the manual relay trigger. Every response
//! uses the `ApiResponse` envelope; protocol errors surface as
//! `success = false` with the error's display text.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use warp::{
    http::{Method, StatusCode},
    Filter, Rejection, Reply,
};

use crate::chain::LocalNetwork;
use crate::config::Config;
use crate::relay::Relayer;
use crate::types::{Address, MessageId, TokenTransfer};

// ============================================================================
// SHARED REQUEST/RESPONSE STRUCTURES
// ============================================================================

/// Standardized response structure for all API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request was successful
    pub success: bool,
    /// Response data (if successful)
    pub data: Option<T>,
    /// Error message (if failed)
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> warp::reply::Json {
        warp::reply::json(&ApiResponse { success: true, data: Some(data), error: None })
    }

    fn err(message: impl Into<String>) -> warp::reply::Json {
        warp::reply::json(&ApiResponse::<T> {
            success: false,
            data: None,
            error: Some(message.into()),
        })
    }
}

/// Request structure for deposit submission: approves the source chain's
/// executable and initiates the cross-chain call as the sender. The
/// destination address comes from the sibling registry, never the request.
#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub source_chain: String,
    pub sender: Address,
    pub destination_chain: String,
    /// Payload bytes as 0x-hex
    pub payload: String,
    /// Accompanying token symbol; requires `amount`
    #[serde(default)]
    pub symbol: Option<String>,
    /// Accompanying token amount; requires `symbol`
    #[serde(default)]
    pub amount: Option<u128>,
}

// ============================================================================
// API HANDLERS
// ============================================================================

/// Handler for per-address token balances on one chain.
pub async fn get_balances_handler(
    chain_name: String,
    address: String,
    network: Arc<LocalNetwork>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let Some(chain) = network.chain(&chain_name) else {
        return Ok(ApiResponse::<()>::err(format!("unknown chain `{}`", chain_name)));
    };
    let holder: Address = match address.parse() {
        Ok(holder) => holder,
        Err(e) => return Ok(ApiResponse::<()>::err(format!("invalid address: {}", e))),
    };
    Ok(ApiResponse::ok(chain.balances_of(holder).await))
}

/// Handler for pool reserves. Tokens are referenced by their registered
/// symbols; the reply is oriented `(token_a, token_b)` in argument order.
pub async fn get_reserves_handler(
    chain_name: String,
    factory: String,
    token_a: String,
    token_b: String,
    network: Arc<LocalNetwork>,
) -> Result<impl warp::Reply, warp::Rejection> {
    #[derive(Serialize)]
    struct Reserves {
        reserve_a: u128,
        reserve_b: u128,
    }

    let Some(chain) = network.chain(&chain_name) else {
        return Ok(ApiResponse::<()>::err(format!("unknown chain `{}`", chain_name)));
    };
    let factory: Address = match factory.parse() {
        Ok(factory) => factory,
        Err(e) => return Ok(ApiResponse::<()>::err(format!("invalid factory address: {}", e))),
    };
    let token_a = match chain.token_address(&token_a).await {
        Ok(address) => address,
        Err(e) => return Ok(ApiResponse::<()>::err(e.to_string())),
    };
    let token_b = match chain.token_address(&token_b).await {
        Ok(address) => address,
        Err(e) => return Ok(ApiResponse::<()>::err(e.to_string())),
    };
    match chain.reserves(factory, token_a, token_b).await {
        Ok((reserve_a, reserve_b)) => Ok(ApiResponse::ok(Reserves { reserve_a, reserve_b })),
        Err(e) => Ok(ApiResponse::<()>::err(e.to_string())),
    }
}

/// Handler for message status by id. Every message that reached the
/// destination gateway has a terminal, queryable status here.
pub async fn get_message_handler(
    chain_name: String,
    id: String,
    network: Arc<LocalNetwork>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let Some(chain) = network.chain(&chain_name) else {
        return Ok(ApiResponse::<()>::err(format!("unknown chain `{}`", chain_name)));
    };
    let id: MessageId = match id.parse() {
        Ok(id) => id,
        Err(e) => return Ok(ApiResponse::<()>::err(format!("invalid message id: {}", e))),
    };
    match chain.message_record(id).await {
        Some(record) => Ok(ApiResponse::ok(record)),
        None => Ok(ApiResponse::<()>::err(format!("no message {} on `{}`", id, chain_name))),
    }
}

/// Handler for deposit submission.
pub async fn post_transfer_handler(
    request: TransferRequest,
    network: Arc<LocalNetwork>,
) -> Result<impl warp::Reply, warp::Rejection> {
    #[derive(Serialize)]
    struct Submitted {
        message_id: MessageId,
    }

    match submit_transfer(&request, &network).await {
        Ok(message_id) => {
            info!(
                "submitted transfer {} from `{}` to `{}`",
                message_id, request.source_chain, request.destination_chain
            );
            Ok(ApiResponse::ok(Submitted { message_id }))
        }
        Err(e) => Ok(ApiResponse::<()>::err(format!("{:#}", e))),
    }
}

async fn submit_transfer(request: &TransferRequest, network: &LocalNetwork) -> Result<MessageId> {
    let chain = network
        .chain(&request.source_chain)
        .with_context(|| format!("unknown chain `{}`", request.source_chain))?;

    let stripped = request.payload.strip_prefix("0x").unwrap_or(&request.payload);
    let payload = hex::decode(stripped).context("payload is not valid hex")?;

    let token = match (&request.symbol, request.amount) {
        (Some(symbol), Some(amount)) => Some(TokenTransfer { symbol: symbol.clone(), amount }),
        (None, None) => None,
        _ => anyhow::bail!("`symbol` and `amount` must be provided together"),
    };

    if let Some(transfer) = &token {
        chain
            .approve_executable(request.sender, &transfer.symbol, transfer.amount)
            .await
            .context("executable approval failed")?;
    }

    let id = chain
        .send_to_sibling(request.sender, &request.destination_chain, payload, token)
        .await
        .context("deposit failed")?;
    Ok(id)
}

/// Handler for the manual relay trigger. Reports whether a cycle ran or
/// was skipped because one was already in flight.
pub async fn post_relay_handler(
    relayer: Arc<Relayer>,
) -> Result<impl warp::Reply, warp::Rejection> {
    #[derive(Serialize)]
    struct Triggered {
        ran: bool,
    }

    let ran = relayer.trigger().await;
    Ok(ApiResponse::ok(Triggered { ran }))
}

// ============================================================================
// WARP FILTER HELPERS
// ============================================================================

/// Creates a warp filter that provides access to the chain network.
pub fn with_network(
    network: Arc<LocalNetwork>,
) -> impl Filter<Extract = (Arc<LocalNetwork>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || network.clone())
}

/// Creates a warp filter that provides access to the relayer.
pub fn with_relayer(
    relayer: Arc<Relayer>,
) -> impl Filter<Extract = (Arc<Relayer>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || relayer.clone())
}

// ============================================================================
// CORS CONFIGURATION
// ============================================================================

/// Creates a CORS filter based on the configured allowed origins.
fn create_cors_filter(allowed_origins: &[String]) -> warp::cors::Builder {
    let methods = vec![Method::GET, Method::POST, Method::OPTIONS];

    if allowed_origins.contains(&"*".to_string()) {
        warp::cors()
            .allow_any_origin()
            .allow_methods(methods)
            .allow_headers(vec!["content-type"])
    } else {
        let origins: Vec<&str> = allowed_origins.iter().map(|s| s.as_str()).collect();
        warp::cors()
            .allow_origins(origins)
            .allow_methods(methods)
            .allow_headers(vec!["content-type"])
    }
}

// ============================================================================
// REJECTION HANDLER
// ============================================================================

/// Global rejection handler converting warp rejections into the standard
/// envelope with an appropriate status code.
pub async fn handle_rejection(rej: Rejection) -> Result<impl Reply, std::convert::Infallible> {
    let (status, message) = if let Some(err) = rej.find::<warp::filters::body::BodyDeserializeError>()
    {
        (StatusCode::BAD_REQUEST, format!("Invalid JSON: {}", err))
    } else if rej.is_not_found() {
        (StatusCode::NOT_FOUND, "Endpoint not found".to_string())
    } else if rej.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed".to_string())
    } else {
        error!("Unhandled rejection: {:?}", rej);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(message),
        }),
        status,
    ))
}

// ============================================================================
// API SERVER IMPLEMENTATION
// ============================================================================

/// REST API server over the local network and relayer.
pub struct ApiServer {
    config: Arc<Config>,
    network: Arc<LocalNetwork>,
    relayer: Arc<Relayer>,
}

impl ApiServer {
    pub fn new(config: Config, network: Arc<LocalNetwork>, relayer: Arc<Relayer>) -> Self {
        Self { config: Arc::new(config), network, relayer }
    }

    /// Starts the API server and begins handling HTTP requests.
    pub async fn run(&self) -> Result<()> {
        info!(
            "starting API server on {}:{}",
            self.config.api.host, self.config.api.port
        );

        let routes = self.create_routes();

        let addr: std::net::SocketAddr =
            format!("{}:{}", self.config.api.host, self.config.api.port)
                .parse()
                .context("failed to parse API server address")?;

        warp::serve(routes).run(addr).await;

        Ok(())
    }

    /// Creates all API routes for the server.
    pub(crate) fn create_routes(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
        let network = self.network.clone();
        let relayer = self.relayer.clone();

        // Health check endpoint - returns service status
        let health = warp::path("health").and(warp::get()).map(|| {
            warp::reply::json(&ApiResponse::<String> {
                success: true,
                data: Some("swap-gmp service is running".to_string()),
                error: None,
            })
        });

        // Per-address balances on one chain
        let balances = warp::path!("chains" / String / "balances" / String)
            .and(warp::get())
            .and(with_network(network.clone()))
            .and_then(get_balances_handler);

        // Pool reserves behind a factory
        let reserves = warp::path!("chains" / String / "reserves" / String / String / String)
            .and(warp::get())
            .and(with_network(network.clone()))
            .and_then(get_reserves_handler);

        // Message status by id
        let message = warp::path!("chains" / String / "messages" / String)
            .and(warp::get())
            .and(with_network(network.clone()))
            .and_then(get_message_handler);

        // Deposit submission (approve + lock_and_call)
        let transfer = warp::path("transfer")
            .and(warp::post())
            .and(warp::body::json())
            .and(with_network(network))
            .and_then(post_transfer_handler);

        // Manual relay trigger
        let relay = warp::path("relay")
            .and(warp::post())
            .and(with_relayer(relayer))
            .and_then(post_relay_handler);

        health
            .or(balances)
            .or(reserves)
            .or(message)
            .or(transfer)
            .or(relay)
            .with(create_cors_filter(&self.config.api.cors_origins))
            .recover(handle_rejection)
    }

    /// Public method for testing - exposes routes for integration tests
    #[allow(dead_code)] // Used by tests
    pub fn test_routes(
        &self,
    ) -> impl Filter<Extract = impl warp::Reply, Error = std::convert::Infallible> + Clone {
        self.create_routes()
    }
}
