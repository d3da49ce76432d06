use super::common::*;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Router;
use std::sync::Arc;
use tower::ServiceExt;

use crate::billing::router::billing_router;
use crate::billing::service::InvoiceRequest;
use crate::billing::sri::AuthorizationState;
use crate::store::InMemoryStore;

fn router_for(store: Arc<InMemoryStore>, gateway: Arc<ScriptedGateway>) -> Router {
    billing_router(Arc::new(build_service(store, gateway)))
}

fn post_json(uri: &str, request: &InvoiceRequest) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::post(uri)
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from(
            serde_json::to_vec(request).expect("serializable request"),
        ))
        .expect("request builds")
}

fn get(uri: &str) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::get(uri)
        .body(axum::body::Body::empty())
        .expect("request builds")
}

#[tokio::test]
async fn create_route_returns_created_invoice() {
    let router = router_for(seeded_store(), Arc::new(ScriptedGateway::default()));

    let response = router
        .oneshot(post_json("/api/v1/invoices", &invoice_request()))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["receipt_number_full"], "001-002-000000001");
    assert_eq!(payload["status"], "authorized");
    assert_eq!(payload["receipt_number"], "000000001");
    assert_eq!(payload["access_key"].as_str().map(str::len), Some(49));
}

#[tokio::test]
async fn create_route_reports_authorization_failures() {
    let gateway = Arc::new(ScriptedGateway::default());
    gateway.push_authorization(Ok(verdict(AuthorizationState::Rejected)));
    let store = seeded_store();
    let router = router_for(store, gateway);

    let response = router
        .clone()
        .oneshot(post_json("/api/v1/invoices", &invoice_request()))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["stage"], "xml_authorized");
    assert_eq!(payload["duplicate_sequence"], false);
    assert_eq!(payload["messages"][0]["identifier"], "56");

    let response = router
        .oneshot(get("/api/v1/companies/cmp-andina/receipt-errors"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["count"], 1);
    assert_eq!(payload["errors"][0]["stage"], "xml_authorized");
}

#[tokio::test]
async fn create_route_forbids_sales_without_subscription() {
    let router = router_for(bare_store(), Arc::new(ScriptedGateway::default()));

    let response = router
        .oneshot(post_json("/api/v1/invoices", &invoice_request()))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .is_some_and(|message| message.contains("no active subscription")));
}

#[tokio::test]
async fn unknown_invoice_is_not_found() {
    let router = router_for(seeded_store(), Arc::new(ScriptedGateway::default()));

    let response = router
        .oneshot(get("/api/v1/invoices/inv-missing"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn draft_is_emitted_and_credited_over_http() {
    let router = router_for(seeded_store(), Arc::new(ScriptedGateway::default()));
    let mut request = invoice_request();
    request.is_draft = true;

    let response = router
        .clone()
        .oneshot(post_json("/api/v1/invoices", &request))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let draft = read_json_body(response).await;
    let id = draft["id"].as_str().expect("invoice id").to_string();
    assert!(draft["receipt_number"].is_null());

    let response = router
        .clone()
        .oneshot(
            axum::http::Request::post(format!("/api/v1/invoices/{id}/emit"))
                .body(axum::body::Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json_body(response).await["status"], "authorized");

    let response = router
        .oneshot(
            axum::http::Request::post(format!("/api/v1/invoices/{id}/credit-notes"))
                .body(axum::body::Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let note = read_json_body(response).await;
    assert_eq!(note["invoice"], id.as_str());
    assert_eq!(note["receipt_number_full"], "001-002-000000001");
}

#[tokio::test]
async fn next_receipt_route_previews_numbers() {
    let router = router_for(seeded_store(), Arc::new(ScriptedGateway::default()));

    let response = router
        .clone()
        .oneshot(get("/api/v1/companies/cmp-andina/receipts/01/next"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["number"], "000000001");
    assert_eq!(payload["full_number"], "001-002-000000001");
    assert_eq!(payload["voucher_type"], "invoice");

    let response = router
        .oneshot(get("/api/v1/companies/cmp-andina/receipts/99/next"))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn quota_handler_reports_plan_usage() {
    let service = Arc::new(build_service(
        seeded_store(),
        Arc::new(ScriptedGateway::default()),
    ));

    let response = crate::billing::router::quota_handler::<InMemoryStore, ScriptedGateway>(
        State(service.clone()),
        Path(("cmp-andina".to_string(), "invoices".to_string())),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["can_create"], true);
    assert_eq!(payload["kind"], "invoice");

    let response = crate::billing::router::quota_handler::<InMemoryStore, ScriptedGateway>(
        State(service.clone()),
        Path(("cmp-andina".to_string(), "widgets".to_string())),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = crate::billing::router::quota_handler::<InMemoryStore, ScriptedGateway>(
        State(service),
        Path(("cmp-missing".to_string(), "invoices".to_string())),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
