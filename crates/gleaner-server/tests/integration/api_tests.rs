use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tower::ServiceExt;

use gleaner_core::export;
use gleaner_core::testutil::{LISTING_URL, MockFetcher, StaticPageSource, detail_url, listing_html};

use crate::common::{
    TEST_ADMIN_TOKEN, send, setup_test_app, setup_test_app_no_auth, setup_test_app_with,
    start_request, wait_for_status,
};

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app(1);

    let (status, json) = send(
        &app.router,
        Request::get("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn initial_run_state_is_idle() {
    let app = setup_test_app(1);

    let (status, json) = send(
        &app.router,
        Request::get("/v1/run").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "idle");
    assert_eq!(json["progress"], 0);
    assert_eq!(json["records"], serde_json::json!([]));
    assert!(json["error_message"].is_null());
}

#[tokio::test]
async fn unauthenticated_start_returns_401() {
    let app = setup_test_app(1);

    let (status, json) = send(&app.router, start_request(LISTING_URL, None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "unauthorized");
}

#[tokio::test]
async fn wrong_token_returns_401() {
    let app = setup_test_app(1);

    let (status, _) = send(&app.router, start_request(LISTING_URL, Some("wrong-key"))).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn no_admin_token_returns_403() {
    let app = setup_test_app_no_auth();

    let (status, json) = send(&app.router, start_request(LISTING_URL, Some("any-token"))).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "forbidden");

    // Reads stay available.
    let (status, _) = send(
        &app.router,
        Request::get("/v1/run").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn invalid_url_returns_400() {
    let app = setup_test_app(1);

    let (status, json) = send(
        &app.router,
        start_request("not a url", Some(TEST_ADMIN_TOKEN)),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "bad_request");
}

#[tokio::test]
async fn start_and_complete_run() {
    let app = setup_test_app(3);

    let (status, json) = send(
        &app.router,
        start_request(LISTING_URL, Some(TEST_ADMIN_TOKEN)),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["status"], "running");
    assert_eq!(json["target"], LISTING_URL);

    let done = wait_for_status(&app.router, "complete").await;
    assert_eq!(done["progress"], 100);
    let records = done["records"].as_array().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0]["url"], detail_url(1));
    assert_eq!(records[0]["title"], "Item 1");
    assert_eq!(records[0]["price"], "1000");
    assert_eq!(records[0]["condition"], "N/A");
    assert_eq!(app.fetcher.calls().len(), 3);
}

#[tokio::test]
async fn failed_discovery_reports_error() {
    let html = r#"<div class="search-right-head-panel">Something else</div>"#;
    let app = setup_test_app_with(StaticPageSource::new(html), MockFetcher::new());

    send(
        &app.router,
        start_request(LISTING_URL, Some(TEST_ADMIN_TOKEN)),
    )
    .await;

    let failed = wait_for_status(&app.router, "error").await;
    assert!(
        failed["error_message"]
            .as_str()
            .unwrap()
            .contains("section not found")
    );
    assert_eq!(failed["records"], serde_json::json!([]));
}

#[tokio::test]
async fn cancel_returns_to_idle() {
    let (fetcher, _gate) = MockFetcher::with_detail_pages(2).gated(&detail_url(1));
    let app = setup_test_app_with(StaticPageSource::new(listing_html(2)), fetcher);

    send(
        &app.router,
        start_request(LISTING_URL, Some(TEST_ADMIN_TOKEN)),
    )
    .await;

    let (status, json) = send(
        &app.router,
        Request::delete("/v1/run")
            .header("authorization", format!("Bearer {TEST_ADMIN_TOKEN}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "idle");
    assert_eq!(json["progress"], 0);
    assert!(json["target"].is_null());
}

#[tokio::test]
async fn cancel_requires_token() {
    let app = setup_test_app(1);

    let (status, _) = send(
        &app.router,
        Request::delete("/v1/run").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn export_before_completion_returns_409() {
    let app = setup_test_app(1);

    let (status, json) = send(
        &app.router,
        Request::get("/v1/run/export").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "conflict");
}

#[tokio::test]
async fn export_completed_run_as_csv() {
    let app = setup_test_app(2);
    send(
        &app.router,
        start_request(LISTING_URL, Some(TEST_ADMIN_TOKEN)),
    )
    .await;
    wait_for_status(&app.router, "complete").await;

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/v1/run/export").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    let expected_name =
        export::default_filename(Some(LISTING_URL), chrono::Local::now().date_naive());
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"{expected_name}\"").as_str()
    );

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let records = export::read_csv(body.as_ref()).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].url, detail_url(2));
    assert_eq!(records[1].seller, "Seller 2");
}

#[tokio::test]
async fn export_uses_requested_filename() {
    let app = setup_test_app(1);
    send(
        &app.router,
        start_request(LISTING_URL, Some(TEST_ADMIN_TOKEN)),
    )
    .await;
    wait_for_status(&app.router, "complete").await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::get("/v1/run/export?filename=my%22run.csv")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"myrun.csv\""
    );
}

#[tokio::test]
async fn events_stream_starts_with_current_state() {
    let app = setup_test_app(1);

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/v1/run/events").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );

    let mut body = response.into_body();
    let frame = body.frame().await.unwrap().unwrap();
    let chunk = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
    assert!(chunk.contains("event: update"), "{chunk}");
    assert!(chunk.contains(r#""status":"idle""#), "{chunk}");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = setup_test_app(1);

    let (status, json) = send(
        &app.router,
        Request::get("/api-docs/openapi.json")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/v1/run"].is_object());
    assert!(json["paths"]["/v1/run/export"].is_object());
}
