use crate::{
    commands::returns::{CreateReturnCommand, ReturnLineInput},
    entities::product_return::{self, RefundMethod, ReturnReason},
    errors::ServiceError,
    services::returns::ReturnDetails,
    ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_return).get(list_returns))
        .route("/:id", get(get_return))
        .route("/:id", delete(delete_return))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReturnRequest {
    pub sale_id: Uuid,
    /// One of: defective, wrong_item, customer_change_mind, damaged_shipping,
    /// not_as_described, duplicate_order, other
    pub reason: String,
    /// One of: original_payment, cash, store_credit, exchange
    pub refund_method: String,
    pub items: Vec<ReturnLineRequest>,
    pub notes: Option<String>,
    pub processed_by: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReturnLineRequest {
    pub sale_item_id: Uuid,
    pub quantity: i32,
    pub condition_notes: Option<String>,
}

#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct ReturnListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub sale_id: Option<Uuid>,
}

/// Return payload enriched with the sale status the return produced.
#[derive(Debug, Serialize)]
pub struct CreateReturnResponse {
    pub product_return: product_return::Model,
    pub items: Vec<crate::entities::return_item::Model>,
    pub sale_status: String,
}

pub async fn create_return(
    State(state): State<AppState>,
    Json(payload): Json<CreateReturnRequest>,
) -> ApiResult<CreateReturnResponse> {
    let reason = ReturnReason::from_str(&payload.reason).map_err(|_| {
        ServiceError::ValidationError(format!("Unknown return reason: {}", payload.reason))
    })?;
    let refund_method = RefundMethod::from_str(&payload.refund_method).map_err(|_| {
        ServiceError::ValidationError(format!(
            "Unknown refund method: {}",
            payload.refund_method
        ))
    })?;

    let command = CreateReturnCommand {
        sale_id: payload.sale_id,
        reason,
        refund_method,
        items: payload
            .items
            .into_iter()
            .map(|line| ReturnLineInput {
                sale_item_id: line.sale_item_id,
                quantity: line.quantity,
                condition_notes: line.condition_notes,
            })
            .collect(),
        notes: payload.notes,
        processed_by: payload.processed_by,
    };

    let created = state.return_service().create_return(command).await?;
    Ok(Json(ApiResponse::success(CreateReturnResponse {
        product_return: created.product_return,
        items: created.items,
        sale_status: created.sale_status,
    })))
}

pub async fn list_returns(
    State(state): State<AppState>,
    Query(query): Query<ReturnListQuery>,
) -> ApiResult<PaginatedResponse<product_return::Model>> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let (items, total) = state
        .return_service()
        .list_returns(page, limit, query.sale_id)
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

pub async fn get_return(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ReturnDetails> {
    match state.return_service().get_return(&id).await? {
        Some(details) => Ok(Json(ApiResponse::success(details))),
        None => Err(ServiceError::NotFound(format!("Return {} not found", id))),
    }
}

/// Deletes a return still in pending status; processed returns are kept.
pub async fn delete_return(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.return_service().delete_return(id).await?;
    Ok(Json(ApiResponse::success(json!({
        "return_id": id,
        "status": "deleted"
    }))))
}
