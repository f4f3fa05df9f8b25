use crate::{
    entities::store,
    errors::ServiceError,
    handlers::inventory::StockLevelRow,
    services::stores::{CreateStoreInput, UpdateStoreInput},
    ApiResponse, ApiResult, AppState, ListQuery, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_store).get(list_stores))
        .route("/:id", get(get_store))
        .route("/:id", put(update_store))
        .route("/:id/inventory", get(store_inventory))
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct StoreInventoryQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

pub async fn create_store(
    State(state): State<AppState>,
    Json(payload): Json<CreateStoreInput>,
) -> ApiResult<store::Model> {
    let created = state.store_service().create_store(payload).await?;
    Ok(Json(ApiResponse::success(created)))
}

pub async fn list_stores(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<store::Model>> {
    let page = query.page.max(1);
    let limit = query.limit.clamp(1, 100);

    let (items, total) = state.store_service().list_stores(page, limit).await?;
    let total_pages = total.div_ceil(limit);

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page,
        limit,
        total_pages,
    })))
}

pub async fn get_store(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<store::Model> {
    match state.store_service().get_store(&id).await? {
        Some(model) => Ok(Json(ApiResponse::success(model))),
        None => Err(ServiceError::NotFound(format!("Store {} not found", id))),
    }
}

pub async fn update_store(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStoreInput>,
) -> ApiResult<store::Model> {
    let updated = state.store_service().update_store(id, payload).await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn store_inventory(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<StoreInventoryQuery>,
) -> ApiResult<PaginatedResponse<StockLevelRow>> {
    state
        .store_service()
        .get_store(&id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Store {} not found", id)))?;

    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let (levels, total) = state
        .inventory_service()
        .list_stock_levels(page, limit, Some(id))
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
