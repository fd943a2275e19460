use std::sync::atomic::AtomicBool;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use axum_prometheus::PrometheusMetricLayer;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use leadflow::funnel::{
    DispatchSettings, FunnelService, InMemoryMarketingBus, SubmissionDispatcher,
};
use leadflow::server::{
    demo_funnel, router, AppState, InMemoryConversionStore, InMemoryFunnelDirectory,
    InMemoryLeadStore, LoggingMailer,
};

fn metrics_handle() -> PrometheusHandle {
    // The Prometheus recorder is process-global; install it once for the
    // whole suite.
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    HANDLE
        .get_or_init(|| PrometheusMetricLayer::pair().1)
        .clone()
}

struct TestApp {
    router: Router,
    leads: Arc<InMemoryLeadStore>,
}

fn test_app() -> TestApp {
    let directory = Arc::new(InMemoryFunnelDirectory::with_funnels([demo_funnel()]));
    let leads = Arc::new(InMemoryLeadStore::default());
    let dispatcher = SubmissionDispatcher::new(
        leads.clone(),
        Arc::new(InMemoryConversionStore::default()),
        Arc::new(leadflow::funnel::HttpWebhookTransport::default()),
        Arc::new(LoggingMailer),
        Arc::new(InMemoryMarketingBus::default()),
        DispatchSettings {
            webhook_url: None,
            redirect_url: None,
            settle: Duration::ZERO,
        },
    );
    let service = Arc::new(FunnelService::new(directory, dispatcher));

    let state = AppState {
        readiness: Arc::new(AtomicBool::new(true)),
        metrics: metrics_handle(),
        service,
    };

    TestApp {
        router: router(state),
        leads,
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("body is json")
}

fn json_request(uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request builds")
}

#[tokio::test]
async fn healthcheck_is_ok() {
    let app = test_app();
    let response = app
        .router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .expect("request handled");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn funnel_definition_is_served_by_slug() {
    let app = test_app();
    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/api/v1/funnels/consulta-gratuita")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("request handled");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["slug"], "consulta-gratuita");
    assert_eq!(body["steps"][0]["type"], "question");
}

#[tokio::test]
async fn missing_funnel_is_404() {
    let app = test_app();
    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/api/v1/funnels/nao-existe")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("request handled");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn entry_endpoint_resolves_the_initial_step() {
    let app = test_app();
    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/api/v1/funnels/consulta-gratuita/entry")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("request handled");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["step"], "area");
}

#[tokio::test]
async fn next_endpoint_routes_by_selected_option() {
    let app = test_app();
    let response = app
        .router
        .oneshot(json_request(
            "/api/v1/funnels/consulta-gratuita/next",
            json!({
                "current_step": "area",
                "selected_option": "Direito Trabalhista"
            }),
        ))
        .await
        .expect("request handled");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "step");
    assert_eq!(body["value"], "contato");
}

#[tokio::test]
async fn next_endpoint_reports_dead_ends() {
    let app = test_app();
    let response = app
        .router
        .oneshot(json_request(
            "/api/v1/funnels/consulta-gratuita/next",
            json!({ "current_step": "contato" }),
        ))
        .await
        .expect("request handled");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "dead_end");
}

#[tokio::test]
async fn submission_returns_a_receipt_and_stores_the_lead() {
    let app = test_app();
    let response = app
        .router
        .oneshot(json_request(
            "/api/v1/funnels/consulta-gratuita/submissions",
            json!({
                "step_id": "contato",
                "answers": {
                    "area": "Direito Trabalhista",
                    "nome": "Ana",
                    "email": "ana@example.com"
                },
                "page": {
                    "page_url": "https://site.example/?utm_source=google",
                    "user_agent": "api-test"
                }
            }),
        ))
        .await
        .expect("request handled");

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["report"]["lead"]["status"], "succeeded");
    assert_eq!(body["report"]["webhook"]["status"], "skipped");
    assert_eq!(body["redirect"]["kind"], "internal");
    assert_eq!(body["redirect"]["path"], "/obrigado");
    assert_eq!(app.leads.leads().len(), 1);
}

#[tokio::test]
async fn submission_with_missing_required_field_is_unprocessable() {
    let app = test_app();
    let response = app
        .router
        .oneshot(json_request(
            "/api/v1/funnels/consulta-gratuita/submissions",
            json!({
                "step_id": "contato",
                "answers": { "nome": "Ana" }
            }),
        ))
        .await
        .expect("request handled");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert!(body["error"]
        .as_str()
        .expect("error message present")
        .contains("email"));
}
