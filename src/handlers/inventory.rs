use crate::{
    commands::inventory::{RecordMovementCommand, TransferStockCommand},
    entities::{product, product_store, stock_movement, stock_movement::MovementType},
    errors::ServiceError,
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_stock_levels))
        .route("/low-stock", get(low_stock))
        .route("/movements", post(record_movement).get(list_movements))
        .route("/transfers", post(transfer_stock))
        .route("/:product_id/:store_id", get(get_stock))
        .route("/:product_id/:store_id/threshold", put(set_threshold))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordMovementRequest {
    pub product_id: Uuid,
    pub store_id: Uuid,
    /// One of: addition, reduction, transfer_out, transfer_in, adjustment.
    /// An adjustment quantity is the new absolute stock level.
    pub movement_type: String,
    pub quantity: i32,
    pub reason: String,
    pub notes: Option<String>,
    pub code: Option<String>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TransferStockRequest {
    pub product_id: Uuid,
    pub from_store_id: Uuid,
    pub to_store_id: Uuid,
    pub quantity: i32,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct StockListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub store_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct MovementListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub product_id: Option<Uuid>,
    pub store_id: Option<Uuid>,
}

/// Stock row joined with its product snapshot for display.
#[derive(Debug, Serialize)]
pub struct StockLevelRow {
    pub product_id: Uuid,
    pub store_id: Uuid,
    pub product_name: Option<String>,
    pub product_sku: Option<String>,
    pub stock: i32,
    pub low_stock_threshold: i32,
}

impl From<(product_store::Model, Option<product::Model>)> for StockLevelRow {
    fn from((level, product): (product_store::Model, Option<product::Model>)) -> Self {
        Self {
            product_id: level.product_id,
            store_id: level.store_id,
            product_name: product.as_ref().map(|p| p.name.clone()),
            product_sku: product.map(|p| p.sku),
            stock: level.stock,
            low_stock_threshold: level.low_stock_threshold,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MovementResponse {
    pub movement: stock_movement::Model,
    pub stock_level: product_store::Model,
}

#[derive(Debug, Serialize)]
pub struct TransferResponse {
    pub outbound: stock_movement::Model,
    pub inbound: stock_movement::Model,
    pub source_stock: product_store::Model,
    pub destination_stock: product_store::Model,
}

pub async fn list_stock_levels(
    State(state): State<AppState>,
    Query(query): Query<StockListQuery>,
) -> ApiResult<PaginatedResponse<StockLevelRow>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let (levels, total) = state
        .inventory_service()
        .list_stock_levels(page, limit, query.store_id)
        .await?;
    let items = levels.into_iter().map(StockLevelRow::from).collect();
    let total_pages = total.div_ceil(limit);

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page,
        limit,
        total_pages,
    })))
}

pub async fn low_stock(
    State(state): State<AppState>,
    Query(query): Query<StockListQuery>,
) -> ApiResult<Vec<StockLevelRow>> {
    let rows = state.inventory_service().low_stock(query.store_id).await?;
    Ok(Json(ApiResponse::success(
        rows.into_iter().map(StockLevelRow::from).collect(),
    )))
}

pub async fn get_stock(
    State(state): State<AppState>,
    Path((product_id, store_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<product_store::Model> {
    match state
        .inventory_service()
        .get_stock(&product_id, &store_id)
        .await?
    {
        Some(level) => Ok(Json(ApiResponse::success(level))),
        None => Err(ServiceError::NotFound(format!(
            "No stock record for product {} in store {}",
            product_id, store_id
        ))),
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetThresholdRequest {
    pub low_stock_threshold: i32,
}

pub async fn set_threshold(
    State(state): State<AppState>,
    Path((product_id, store_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<SetThresholdRequest>,
) -> ApiResult<product_store::Model> {
    let level = state
        .inventory_service()
        .set_low_stock_threshold(product_id, store_id, payload.low_stock_threshold)
        .await?;
    Ok(Json(ApiResponse::success(level)))
}

pub async fn record_movement(
    State(state): State<AppState>,
    Json(payload): Json<RecordMovementRequest>,
) -> ApiResult<MovementResponse> {
    let movement_type = MovementType::from_str(&payload.movement_type).map_err(|_| {
        ServiceError::ValidationError(format!(
            "Unknown movement type: {}",
            payload.movement_type
        ))
    })?;

    let result = state
        .inventory_service()
        .record_movement(RecordMovementCommand {
            product_id: payload.product_id,
            store_id: payload.store_id,
            movement_type,
            quantity: payload.quantity,
            reason: payload.reason,
            notes: payload.notes,
            code: payload.code,
            created_by: payload.created_by,
        })
        .await?;

    Ok(Json(ApiResponse::success(MovementResponse {
        movement: result.movement,
        stock_level: result.stock_level,
    })))
}

pub async fn list_movements(
    State(state): State<AppState>,
    Query(query): Query<MovementListQuery>,
) -> ApiResult<PaginatedResponse<stock_movement::Model>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let (items, total) = state
        .inventory_service()
        .list_movements(page, limit, query.product_id, query.store_id)
        .await?;
    let total_pages = total.div_ceil(limit);

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page,
        limit,
        total_pages,
    })))
}

pub async fn transfer_stock(
    State(state): State<AppState>,
    Json(payload): Json<TransferStockRequest>,
) -> ApiResult<TransferResponse> {
    let result = state
        .inventory_service()
        .transfer_stock(TransferStockCommand {
            product_id: payload.product_id,
            from_store_id: payload.from_store_id,
            to_store_id: payload.to_store_id,
            quantity: payload.quantity,
            notes: payload.notes,
            created_by: payload.created_by,
        })
        .await?;

    Ok(Json(ApiResponse::success(TransferResponse {
        outbound: result.outbound,
        inbound: result.inbound,
        source_stock: result.source_stock,
        destination_stock: result.destination_stock,
    })))
}
