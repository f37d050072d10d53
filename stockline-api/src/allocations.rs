use axum::{extract::State, routing::post, Json, Router};
use stockline_catalog::Allocation;
use stockline_core::requests::AllocationRequest;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/allocations", post(allocate))
}

/// FEFO quote for one product. Nothing is reserved.
async fn allocate(
    State(state): State<AppState>,
    Json(req): Json<AllocationRequest>,
) -> Result<Json<Allocation>, AppError> {
    let allocation = state.service.allocate(req).await?;
    Ok(Json(allocation))
}
