use crate::{
    commands::sales::{CreateSaleCommand, SaleLineInput, VoidSaleCommand},
    entities::sale::{self, PaymentMethod},
    errors::ServiceError,
    services::sales::SaleDetails,
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_sale).get(list_sales))
        .route("/:id", get(get_sale))
        .route("/:id", put(update_sale))
        .route("/:id", delete(delete_sale))
        .route("/:id/void", post(void_sale))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateSaleRequest {
    pub store_id: Uuid,
    pub cashier_id: Uuid,
    pub customer_id: Option<Uuid>,
    /// One of: cash, card, transfer
    pub payment_method: String,
    pub items: Vec<SaleLineRequest>,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub tax: Decimal,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SaleLineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub tax: Decimal,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VoidSaleRequest {
    pub voided_by: Uuid,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct SaleListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub store_id: Option<Uuid>,
}

pub async fn create_sale(
    State(state): State<AppState>,
    Json(payload): Json<CreateSaleRequest>,
) -> ApiResult<SaleDetails> {
    let payment_method = PaymentMethod::from_str(&payload.payment_method).map_err(|_| {
        ServiceError::ValidationError(format!(
            "Unknown payment method: {}",
            payload.payment_method
        ))
    })?;

    let command = CreateSaleCommand {
        store_id: payload.store_id,
        cashier_id: payload.cashier_id,
        customer_id: payload.customer_id,
        payment_method,
        items: payload
            .items
            .into_iter()
            .map(|line| SaleLineInput {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
                discount: line.discount,
                tax: line.tax,
            })
            .collect(),
        discount: payload.discount,
        tax: payload.tax,
    };

    let created = state.sale_service().create_sale(command).await?;
    // Re-read through the service so the response carries the payment too.
    match state.sale_service().get_sale(&created.sale.id).await? {
        Some(details) => Ok(Json(ApiResponse::success(details))),
        None => Ok(Json(ApiResponse::success(SaleDetails {
            sale: created.sale,
            items: created.items,
            payments: vec![],
        }))),
    }
}

pub async fn list_sales(
    State(state): State<AppState>,
    Query(query): Query<SaleListQuery>,
) -> ApiResult<PaginatedResponse<sale::Model>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let (items, total) = state
        .sale_service()
        .list_sales(page, limit, query.store_id)
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

pub async fn get_sale(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<SaleDetails> {
    match state.sale_service().get_sale(&id).await? {
        Some(details) => Ok(Json(ApiResponse::success(details))),
        None => Err(ServiceError::NotFound(format!("Sale {} not found", id))),
    }
}

/// Sales are immutable once created; updates are rejected unconditionally.
pub async fn update_sale(
    State(_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<SaleDetails> {
    Err(ServiceError::Conflict(format!(
        "Sale {} is immutable; process a return or void it instead",
        id
    )))
}

/// Sales are immutable once created; deletes are rejected unconditionally.
pub async fn delete_sale(
    State(_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<SaleDetails> {
    Err(ServiceError::Conflict(format!(
        "Sale {} cannot be deleted; process a return or void it instead",
        id
    )))
}

pub async fn void_sale(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VoidSaleRequest>,
) -> ApiResult<sale::Model> {
    let result = state
        .sale_service()
        .void_sale(VoidSaleCommand {
            sale_id: id,
            voided_by: payload.voided_by,
        })
        .await?;
    Ok(Json(ApiResponse::success(result.sale)))
}
