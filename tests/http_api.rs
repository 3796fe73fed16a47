/// HTTP host tests driven through the router with `tower::ServiceExt::oneshot`
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::routing::get;
use axum::Router;
use rust_leadconnect::config::Config;
use rust_leadconnect::handlers::{self, AppState};
use rust_leadconnect::scoring::RuleBasedScorer;
use rust_leadconnect::storage::MemoryKeyValueStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn create_test_app() -> Router {
    let state = AppState::new(
        Config::default(),
        Arc::new(MemoryKeyValueStore::new()),
        Arc::new(RuleBasedScorer),
    )
    .unwrap();

    Router::new()
        .route("/health", get(handlers::health))
        .merge(handlers::api_routes())
        .with_state(Arc::new(state))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

const CSV: &str = "Contact Name,Company,Job Title,Industry,Company Size,Email,Website,Page Views,Downloads,Webinar Attended\n\
    Ann Lee,Northwind,VP Sales,finance,enterprise,ann@northwind.io,,12,3,yes\n\
    Bo Kim,Tiny Shop,Clerk,Retail,Small Business,,,0,0,no\n";

#[tokio::test]
async fn test_health() {
    let app = create_test_app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_view_defaults_to_all_leads_cards() {
    let app = create_test_app();
    let (status, body) = send(&app, Method::GET, "/api/v1/view", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["view"], "allLeadsView");
    assert_eq!(body["mode"], "card");
    assert_eq!(body["content"], "leads");
    assert_eq!(body["display"]["kind"], "cards");
    assert_eq!(body["display"]["cards"][0]["score"], 92);
    assert_eq!(body["kpis"]["conversionRate"], 57);
}

#[tokio::test]
async fn test_view_query_filters_and_mode() {
    let app = create_test_app();
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/view?mode=list&intent=warm&search=",
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["display"]["kind"], "table");
    let rows = body["display"]["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["score"], 76);

    let (status, _) = send(&app, Method::GET, "/api/v1/view?view=settings", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_navigate_to_analytics() {
    let app = create_test_app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/view/navigate",
        Some(json!({"view": "analyticsView"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "analytics");
    assert_eq!(body["topLeads"].as_array().unwrap().len(), 5);
    assert_eq!(body["industryBreakdown"][0]["industry"], "Technology");
}

#[tokio::test]
async fn test_reasoning_and_delete() {
    let app = create_test_app();

    let (status, body) = send(&app, Method::GET, "/api/v1/leads/2/reasoning", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scoreLabel"], "88%");

    let (status, _) = send(&app, Method::DELETE, "/api/v1/leads/2", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, "/api/v1/leads/2/reasoning", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::DELETE, "/api/v1/leads/2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_clear_shows_empty_state() {
    let app = create_test_app();
    let (status, body) = send(&app, Method::DELETE, "/api/v1/leads", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["display"]["kind"], "empty");
    assert_eq!(body["display"]["title"], "No leads found");
    assert_eq!(body["kpis"]["total"], 0);
    assert!(body["kpis"]["conversionRate"].is_null());
}

#[tokio::test]
async fn test_preview_then_import() {
    let app = create_test_app();

    let (status, preview) = send(
        &app,
        Method::POST,
        "/api/v1/import/preview",
        Some(json!({ "csv": CSV })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(preview["rowCount"], 2);
    assert_eq!(preview["suggestedMapping"]["companySize"], "Company Size");
    assert_eq!(preview["requiredFields"].as_array().unwrap().len(), 10);

    let (status, report) = send(
        &app,
        Method::POST,
        "/api/v1/import",
        Some(json!({ "csv": CSV, "mapping": preview["suggestedMapping"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(report["scored"], 2);
    assert_eq!(report["leadIds"], json!([8, 9]));

    let (_, reasoning) = send(&app, Method::GET, "/api/v1/leads/8/reasoning", None).await;
    assert_eq!(reasoning["headline"], "VP Sales at Northwind");
    assert_eq!(reasoning["scoreLabel"], "100%");

    let (_, progress) = send(&app, Method::GET, "/api/v1/import/progress", None).await;
    assert_eq!(progress["processed"], 2);
    assert_eq!(progress["message"], "Successfully imported 2 leads!");
}

#[tokio::test]
async fn test_import_errors_map_to_status_codes() {
    let app = create_test_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/import/preview",
        Some(json!({ "csv": "A,B\n\"open,1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Error parsing CSV"));

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/import",
        Some(json!({ "csv": CSV, "mapping": {"contact": "Contact Name"} })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().starts_with("Please map all required fields."));
}

#[tokio::test]
async fn test_feedback_for_unknown_lead() {
    let app = create_test_app();
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/leads/404/feedback",
        Some(json!({"correct": true})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/leads/1/feedback",
        Some(json!({"correct": false})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["message"], "Thank you for your feedback!");
}
