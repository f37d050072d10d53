use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use stockline_core::requests::{
    CreateOrderRequest, CreateOrderResponse, PaymentResponse, ProcessReturnRequest, RecordPaymentRequest,
    ReturnResponse, StatusUpdateRequest, StatusUpdateResponse,
};
use stockline_order::OrderDetail;
use tracing::info;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/orders", post(create_order))
        .route("/v1/orders/{id}", get(get_order))
        .route("/v1/orders/{id}/status", post(update_status))
        .route("/v1/orders/{id}/payments", post(record_payment))
        .route("/v1/orders/{id}/returns", post(process_return))
}

async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), AppError> {
    info!(
        "Creating order for customer {} with {} line(s)",
        req.customer_id,
        req.lines.len()
    );
    let created = state.service.create_order(req).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderDetail>, AppError> {
    Ok(Json(state.service.get_order(&order_id).await?))
}

async fn update_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<Json<StatusUpdateResponse>, AppError> {
    Ok(Json(state.service.update_order_status(&order_id, req).await?))
}

async fn record_payment(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(req): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), AppError> {
    let payment = state.service.record_payment(&order_id, req).await?;
    Ok((StatusCode::CREATED, Json(payment)))
}

async fn process_return(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(req): Json<ProcessReturnRequest>,
) -> Result<(StatusCode, Json<ReturnResponse>), AppError> {
    let processed = state.service.process_return(&order_id, req).await?;
    Ok((StatusCode::CREATED, Json(processed)))
}
