use crate::{
    entities::{product, product_store, store},
    errors::ServiceError,
    services::catalog::{CreateProductInput, UpdateProductInput},
    ApiResponse, ApiResult, AppState, ListQuery, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/:id", get(get_product))
        .route("/:id", put(update_product))
        .route("/:id", delete(delete_product))
        .route("/:id/stock", get(stock_by_store))
}

/// Per-store stock line for one product.
#[derive(Debug, Serialize)]
pub struct ProductStockRow {
    pub store_id: Uuid,
    pub store_code: Option<String>,
    pub store_name: Option<String>,
    pub stock: i32,
    pub low_stock_threshold: i32,
}

impl From<(product_store::Model, Option<store::Model>)> for ProductStockRow {
    fn from((level, store): (product_store::Model, Option<store::Model>)) -> Self {
        Self {
            store_id: level.store_id,
            store_code: store.as_ref().map(|s| s.code.clone()),
            store_name: store.map(|s| s.name),
            stock: level.stock,
            low_stock_threshold: level.low_stock_threshold,
        }
    }
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductInput>,
) -> ApiResult<product::Model> {
    let created = state.product_service().create_product(payload).await?;
    Ok(Json(ApiResponse::success(created)))
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<product::Model>> {
    let page = query.page.max(1);
    let limit = query.limit.clamp(1, 100);

    let (items, total) = state
        .product_service()
        .list_products(page, limit, query.search)
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

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<product::Model> {
    match state.product_service().get_product(&id).await? {
        Some(model) => Ok(Json(ApiResponse::success(model))),
        None => Err(ServiceError::NotFound(format!("Product {} not found", id))),
    }
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductInput>,
) -> ApiResult<product::Model> {
    let updated = state.product_service().update_product(id, payload).await?;
    Ok(Json(ApiResponse::success(updated)))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.product_service().delete_product(id).await?;
    Ok(Json(ApiResponse::success(json!({
        "product_id": id,
        "status": "deleted"
    }))))
}

pub async fn stock_by_store(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<ProductStockRow>> {
    state
        .product_service()
        .get_product(&id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))?;

    let rows = state.product_service().stock_by_store(id).await?;
    Ok(Json(ApiResponse::success(
        rows.into_iter().map(ProductStockRow::from).collect(),
    )))
}
