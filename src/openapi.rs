use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::errors::ErrorResponse;
use crate::handlers::inventory::{RecordMovementRequest, TransferStockRequest};
use crate::handlers::returns::{CreateReturnRequest, ReturnLineRequest};
use crate::handlers::sales::{CreateSaleRequest, SaleLineRequest, VoidSaleRequest};
use crate::services::catalog::{CreateProductInput, UpdateProductInput};
use crate::services::customers::{CreateCustomerInput, UpdateCustomerInput};
use crate::services::reports::{SalesSummary, StoreInventorySummary};
use crate::services::stores::{CreateStoreInput, UpdateStoreInput};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "storeline-api",
        description = "Retail point-of-sale backend: multi-store inventory, atomic sale processing, returns and refunds, customer records, and reporting"
    ),
    components(schemas(
        ErrorResponse,
        CreateSaleRequest,
        SaleLineRequest,
        VoidSaleRequest,
        RecordMovementRequest,
        TransferStockRequest,
        CreateReturnRequest,
        ReturnLineRequest,
        CreateProductInput,
        UpdateProductInput,
        CreateStoreInput,
        UpdateStoreInput,
        CreateCustomerInput,
        UpdateCustomerInput,
        SalesSummary,
        StoreInventorySummary,
    )),
    tags(
        (name = "sales", description = "Sale transaction processing"),
        (name = "inventory", description = "Stock levels, movements, transfers"),
        (name = "returns", description = "Product returns and refunds"),
        (name = "catalog", description = "Products, stores, customers"),
        (name = "reports", description = "Dashboard aggregates")
    )
)]
pub struct ApiDoc;

/// Swagger UI router serving the generated document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
