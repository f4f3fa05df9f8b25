use crate::{
    services::reports::{SalesSummary, StoreInventorySummary},
    ApiResponse, ApiResult, AppState,
};
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sales-summary", get(sales_summary))
        .route("/inventory-summary", get(inventory_summary))
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct SalesSummaryQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub store_id: Option<Uuid>,
}

pub async fn sales_summary(
    State(state): State<AppState>,
    Query(query): Query<SalesSummaryQuery>,
) -> ApiResult<SalesSummary> {
    let summary = state
        .report_service()
        .sales_summary(query.from, query.to, query.store_id)
        .await?;
    Ok(Json(ApiResponse::success(summary)))
}

pub async fn inventory_summary(
    State(state): State<AppState>,
) -> ApiResult<Vec<StoreInventorySummary>> {
    let summary = state.report_service().inventory_summary().await?;
    Ok(Json(ApiResponse::success(summary)))
}
