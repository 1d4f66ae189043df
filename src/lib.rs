pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod ports;
pub mod startup;
pub mod utils;
pub mod validation;

use std::sync::Arc;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;

use crate::config::{Config, RateLimit};
use crate::gateway::GatewayClient;
use crate::middleware::{
    bearer_auth_middleware, rate_limit_middleware, request_id_middleware,
    request_logger_middleware, security_headers_middleware, BearerAuth, IpFilterLayer,
    RateLimiter,
};
use crate::ports::TransactionRepository;

#[derive(Clone)]
pub struct AppState {
    pub gateway: GatewayClient,
    pub repository: Arc<dyn TransactionRepository>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, repository: Arc<dyn TransactionRepository>) -> Result<Self, gateway::GatewayError> {
        let gateway = GatewayClient::new(config.gateway.clone(), Arc::clone(&repository))?;
        Ok(Self {
            gateway,
            repository,
            config: Arc::new(config),
        })
    }
}

/// Builds the payment router. Each route carries its own guard chain, listed
/// in execution order; every route gets its own rate-limit counters.
pub fn create_app(state: AppState) -> Router {
    let auth = BearerAuth::new(state.config.gateway.api_key.as_str());
    let limits = state.config.rate_limits;
    let forwarded_for = state.config.forwarded_for;

    let guarded = |limit: RateLimit| {
        ServiceBuilder::new()
            .layer(from_fn(request_id_middleware))
            .layer(from_fn_with_state(forwarded_for, request_logger_middleware))
            .layer(from_fn(security_headers_middleware))
            .layer(from_fn_with_state(
                RateLimiter::new(limit).with_forwarded_for(forwarded_for),
                rate_limit_middleware,
            ))
            .layer(from_fn_with_state(auth.clone(), bearer_auth_middleware))
    };

    let callback_guard = ServiceBuilder::new()
        .layer(from_fn(request_id_middleware))
        .layer(from_fn_with_state(forwarded_for, request_logger_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(IpFilterLayer::new(state.config.allowed_ips.clone(), forwarded_for));

    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/payments/init",
            post(handlers::payments::init_payment).layer(guarded(limits.init)),
        )
        .route(
            "/payments/verify",
            post(handlers::payments::verify_payment).layer(guarded(limits.verify)),
        )
        .route(
            "/payments/status",
            get(handlers::payments::payment_status).layer(guarded(limits.status)),
        )
        .route(
            "/payments/refund",
            post(handlers::payments::refund_payment).layer(guarded(limits.refund)),
        )
        .route(
            "/payments/callback",
            post(handlers::callback::payment_callback).layer(callback_guard),
        )
        .with_state(state)
}
