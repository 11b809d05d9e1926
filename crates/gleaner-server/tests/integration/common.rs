use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use gleaner_core::testutil::{MockFetcher, NoReport, StaticPageSource, listing_html};
use gleaner_core::{RunCoordinator, ScrapeConfig, ScrapeWorker};
use gleaner_server::routes;
use gleaner_server::state::AppState;

pub const TEST_ADMIN_TOKEN: &str = "test-secret-key";

pub struct TestApp {
    pub router: Router,
    pub fetcher: MockFetcher,
    pub shutdown: CancellationToken,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// App whose listing page links to `items` detail pages, all of them served.
pub fn setup_test_app(items: usize) -> TestApp {
    build(
        StaticPageSource::new(listing_html(items)),
        MockFetcher::with_detail_pages(items),
        Some(TEST_ADMIN_TOKEN),
    )
}

pub fn setup_test_app_no_auth() -> TestApp {
    build(
        StaticPageSource::new(listing_html(1)),
        MockFetcher::with_detail_pages(1),
        None,
    )
}

pub fn setup_test_app_with(source: StaticPageSource, fetcher: MockFetcher) -> TestApp {
    build(source, fetcher, Some(TEST_ADMIN_TOKEN))
}

fn build(source: StaticPageSource, fetcher: MockFetcher, token: Option<&str>) -> TestApp {
    let shutdown = CancellationToken::new();
    let worker = ScrapeWorker::new(fetcher.clone(), &ScrapeConfig::default()).unwrap();
    let (coordinator, _task) = RunCoordinator::spawn(source, worker, NoReport, shutdown.clone());

    let state = Arc::new(AppState {
        coordinator,
        admin_token: token.map(String::from),
    });

    TestApp {
        router: routes::router(state),
        fetcher,
        shutdown,
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

pub fn start_request(url: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/v1/run").header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::json!({ "url": url }).to_string()))
        .unwrap()
}

/// Poll `GET /v1/run` until the run reports `status` (2 s limit).
pub async fn wait_for_status(router: &Router, status: &str) -> serde_json::Value {
    for _ in 0..200 {
        let (_, json) = send(router, Request::get("/v1/run").body(Body::empty()).unwrap()).await;
        if json["status"] == status {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run never reached status {status}");
}
