use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use stockline_catalog::StockLevel;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/products/{id}/stock", get(stock_level))
}

async fn stock_level(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<StockLevel>, AppError> {
    Ok(Json(state.service.stock_level(&product_id).await?))
}
