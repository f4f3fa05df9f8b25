mod common;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use common::TestApp;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use storeline_api::api_v1_routes;
use tower::ServiceExt;
use uuid::Uuid;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn status_endpoint_reports_ok() {
    let app = TestApp::new().await;
    let router = api_v1_routes().with_state(app.state.clone());

    let response = router
        .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let payload = body_json(response).await;
    assert_eq!(payload["data"]["status"], "ok");
}

#[tokio::test]
async fn sale_update_and_delete_are_rejected() {
    let app = TestApp::new().await;
    let store = app.seed_store("MAIN").await;
    let product = app.seed_product("WIDGET", dec!(10.00), dec!(4.00)).await;
    app.set_stock(product.id, store.id, 10).await;
    let sale = app
        .sell(store.id, product.id, 1, dec!(10.00))
        .await
        .unwrap();

    let router = api_v1_routes().with_state(app.state.clone());

    let response = router
        .clone()
        .oneshot(json_request(
            "PUT",
            &format!("/sales/{}", sale.sale.id),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = body_json(response).await;
    assert!(payload["message"]
        .as_str()
        .unwrap()
        .contains("immutable"));

    let response = router
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/sales/{}", sale.sale.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // The sale is untouched.
    let details = app
        .state
        .sale_service()
        .get_sale(&sale.sale.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(details.sale.code, sale.sale.code);
    assert_eq!(details.sale.status, "completed");
}

#[tokio::test]
async fn insufficient_stock_maps_to_unprocessable_entity() {
    let app = TestApp::new().await;
    let store = app.seed_store("MAIN").await;
    let product = app.seed_product("SCARCE", dec!(5.00), dec!(2.00)).await;
    app.set_stock(product.id, store.id, 1).await;

    let router = api_v1_routes().with_state(app.state.clone());
    let response = router
        .oneshot(json_request(
            "POST",
            "/sales",
            json!({
                "store_id": store.id,
                "cashier_id": Uuid::new_v4(),
                "payment_method": "cash",
                "items": [{
                    "product_id": product.id,
                    "quantity": 5,
                    "unit_price": "5.00"
                }]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = body_json(response).await;
    assert!(payload["message"]
        .as_str()
        .unwrap()
        .contains("Insufficient stock"));
    assert!(payload["timestamp"].is_string());
}

#[tokio::test]
async fn unknown_enums_map_to_unprocessable_entity() {
    let app = TestApp::new().await;
    let router = api_v1_routes().with_state(app.state.clone());

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/sales",
            json!({
                "store_id": Uuid::new_v4(),
                "cashier_id": Uuid::new_v4(),
                "payment_method": "barter",
                "items": [{
                    "product_id": Uuid::new_v4(),
                    "quantity": 1,
                    "unit_price": "1.00"
                }]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = router
        .oneshot(json_request(
            "POST",
            "/returns",
            json!({
                "sale_id": Uuid::new_v4(),
                "reason": "just_because",
                "refund_method": "cash",
                "items": [{"sale_item_id": Uuid::new_v4(), "quantity": 1}]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn missing_records_map_to_not_found() {
    let app = TestApp::new().await;
    let router = api_v1_routes().with_state(app.state.clone());

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/sales/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let payload = body_json(response).await;
    assert_eq!(payload["error"], "Not Found");
}

#[tokio::test]
async fn sale_response_includes_items_and_payment() {
    let app = TestApp::new().await;
    let store = app.seed_store("MAIN").await;
    let product = app.seed_product("WIDGET", dec!(10.00), dec!(4.00)).await;
    app.set_stock(product.id, store.id, 10).await;

    let router = api_v1_routes().with_state(app.state.clone());
    let response = router
        .oneshot(json_request(
            "POST",
            "/sales",
            json!({
                "store_id": store.id,
                "cashier_id": Uuid::new_v4(),
                "payment_method": "card",
                "items": [{
                    "product_id": product.id,
                    "quantity": 2,
                    "unit_price": "10.00"
                }]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let payload = body_json(response).await;
    let data = &payload["data"];
    assert_eq!(data["sale"]["items_count"], 2);
    assert_eq!(data["items"].as_array().unwrap().len(), 1);
    assert_eq!(data["payments"].as_array().unwrap().len(), 1);
    assert_eq!(app.stock_of(product.id, store.id).await, 8);
}
