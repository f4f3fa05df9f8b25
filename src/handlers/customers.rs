use crate::{
    entities::customer,
    errors::ServiceError,
    services::customers::{CreateCustomerInput, UpdateCustomerInput},
    ApiResponse, ApiResult, AppState, ListQuery, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post, put},
    Router,
};
use uuid::Uuid;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_customer).get(list_customers))
        .route("/:id", get(get_customer))
        .route("/:id", put(update_customer))
}

pub async fn create_customer(
    State(state): State<AppState>,
    Json(payload): Json<CreateCustomerInput>,
) -> ApiResult<customer::Model> {
    let created = state.customer_service().create_customer(payload).await?;
    Ok(Json(ApiResponse::success(created)))
}

pub async fn list_customers(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<customer::Model>> {
    let page = query.page.max(1);
    let limit = query.limit.clamp(1, 100);

    let (items, total) = state
        .customer_service()
        .list_customers(page, limit, query.search)
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

pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<customer::Model> {
    match state.customer_service().get_customer(&id).await? {
        Some(model) => Ok(Json(ApiResponse::success(model))),
        None => Err(ServiceError::NotFound(format!("Customer {} not found", id))),
    }
}

pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCustomerInput>,
) -> ApiResult<customer::Model> {
    let updated = state
        .customer_service()
        .update_customer(id, payload)
        .await?;
    Ok(Json(ApiResponse::success(updated)))
}
