use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::gateway::models::{
    PaymentInitRequest, PaymentInitResponse, PaymentStatusResponse, PaymentVerifyRequest,
    PaymentVerifyResponse, RefundRequest, RefundResponse,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub token: Option<String>,
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

pub async fn init_payment(
    State(state): State<AppState>,
    payload: Result<Json<PaymentInitRequest>, JsonRejection>,
) -> Result<Json<PaymentInitResponse>, AppError> {
    let request = json_body(payload)?;
    let response = state.gateway.initiate(request).await?;
    Ok(Json(response))
}

pub async fn verify_payment(
    State(state): State<AppState>,
    payload: Result<Json<PaymentVerifyRequest>, JsonRejection>,
) -> Result<Json<PaymentVerifyResponse>, AppError> {
    let request = json_body(payload)?;
    let response = state.gateway.verify_payment(&request.token).await?;
    Ok(Json(response))
}

pub async fn payment_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<PaymentStatusResponse>, AppError> {
    let token = query
        .token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::BadRequest("Token is required".to_string()))?;

    let response = state.gateway.payment_status(&token).await?;
    Ok(Json(response))
}

pub async fn refund_payment(
    State(state): State<AppState>,
    payload: Result<Json<RefundRequest>, JsonRejection>,
) -> Result<Json<RefundResponse>, AppError> {
    let request = json_body(payload)?;
    let response = state
        .gateway
        .refund_payment(&request.transaction_id, request.amount)
        .await?;
    Ok(Json(response))
}
