use axum::{
    extract::{rejection::FormRejection, State},
    Form, Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::domain::TransactionStatus;
use crate::error::AppError;
use crate::gateway::models::CallbackData;
use crate::ports::RepositoryError;
use crate::utils::sanitize::mask_value;
use crate::validation::validate_callback;
use crate::AppState;

/// Gateway notification about a payment outcome. Unknown tokens and storage
/// failures are logged and still acknowledged.
pub async fn payment_callback(
    State(state): State<AppState>,
    payload: Result<Form<CallbackData>, FormRejection>,
) -> Result<Json<Value>, AppError> {
    let Form(data) = payload.map_err(|_| AppError::BadRequest("Invalid form data".to_string()))?;
    validate_callback(&data)?;

    let token = mask_value(&data.token);
    tracing::info!(token = %token, status = %data.status, "received payment callback");

    match state.repository.get(&data.token).await {
        Ok(mut transaction) => {
            transaction.set_status(TransactionStatus::from(data.status.as_str()), Utc::now());
            if let Err(e) = state.repository.update(&transaction).await {
                tracing::error!(
                    error = %e,
                    transaction_id = %transaction.id,
                    "failed to update transaction from callback"
                );
            }
        }
        Err(RepositoryError::NotFound(_)) => {
            tracing::warn!(token = %token, "transaction not found for callback");
        }
        Err(e) => {
            tracing::error!(error = %e, token = %token, "failed to load transaction for callback");
        }
    }

    Ok(Json(json!({
        "status": true,
        "message": "Callback received successfully",
    })))
}
