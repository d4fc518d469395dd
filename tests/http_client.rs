//! HTTP transport tests using wiremock mock server.
//!
//! These tests verify:
//! - JSON and multipart encoding per workflow endpoint
//! - FastAPI error envelopes and request ids
//! - Timeouts and non-JSON bodies surfacing as workflow failures

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use constructai::{
    fixtures, package, Client, Config, Error, HttpRequestMetrics, MetricsCallbacks, Outcome,
    RequestOptions, Submission, ViewModel, WorkflowKind, WorkflowRequest, WorkflowState,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to create a client pointing at the mock server.
fn client_for_server(server: &MockServer) -> Client {
    Client::new(Config {
        base_url: Some(server.uri()),
        ..Default::default()
    })
    .expect("client creation should succeed")
}

#[tokio::test]
async fn site_assistant_posts_json_and_normalizes_reply() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/site-assistant"))
        .and(body_json(json!({
            "activity": "slab casting",
            "labour_count": 12,
            "site_condition": "dry"
        })))
        .and(header_exists("X-Request-Id"))
        .and(header_exists("X-ConstructAI-Client"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tasks_today": ["Pour slab", 7],
            "risk_alerts": "rain after 3pm"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for_server(&server);
    let machine = client.workflow(WorkflowKind::SiteAssistant);
    machine
        .submit(WorkflowRequest::site_assistant("slab casting", "12", "dry"))
        .await
        .expect("submit should succeed");

    let view = machine.view();
    let Some(constructai::WorkflowResponse::DailySite(plan)) = view.report() else {
        panic!("expected a daily site plan, got {view:?}");
    };
    assert_eq!(plan.tasks_today, vec!["Pour slab".to_string()]);
    assert!(plan.risk_alerts.is_empty());
    assert!(plan.materials_required.is_empty());
}

#[tokio::test]
async fn safety_monitor_with_image_posts_multipart() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/safety-monitor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::safety_report()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for_server(&server);
    let request = WorkflowRequest::safety_monitor("Scaffold on the north face")
        .with_image(vec![0xFF, 0xD8, 0xFF, 0xE0], "north-face.jpg");
    let raw = client
        .post(
            WorkflowKind::SafetyMonitor,
            package(&request).expect("valid request"),
            RequestOptions::default(),
        )
        .await
        .expect("post should succeed");
    assert_eq!(raw["risk_level"], "High");

    let received = server.received_requests().await.expect("recording enabled");
    let req = &received[0];
    let content_type = req
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("multipart/form-data"), "{content_type}");

    let body = String::from_utf8_lossy(&req.body).to_lowercase();
    assert!(body.contains("name=\"text\""));
    assert!(body.contains("scaffold on the north face"));
    assert!(body.contains("name=\"image\"; filename=\"north-face.jpg\""));
    assert!(body.contains("content-type: image/jpeg"));
}

#[tokio::test]
async fn valuation_is_form_encoded_without_attachments() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/real-estate-valuation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::valuation_report()))
        .mount(&server)
        .await;

    let client = client_for_server(&server);
    let machine = client.workflow(WorkflowKind::RealEstateValuation);
    machine
        .submit(WorkflowRequest::real_estate_valuation(
            "Whitefield, Bengaluru",
            1200,
            "Apartment",
            5,
            "gym, pool",
        ))
        .await
        .unwrap();

    let received = server.received_requests().await.unwrap();
    let body = String::from_utf8_lossy(&received[0].body).to_string();
    assert!(body.contains("name=\"area\""));
    assert!(body.contains("1200"));

    let report = machine.state();
    let Some(constructai::WorkflowResponse::Valuation(valuation)) =
        report.report().map(|r| &**r)
    else {
        panic!("expected valuation");
    };
    assert_eq!(valuation.market_value, 8_500_000.0);
    assert_eq!(valuation.roi, 4.2);
}

#[tokio::test]
async fn request_id_is_forwarded() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chatbot"))
        .and(header("X-Request-Id", "req-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::chat_reply()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for_server(&server);
    let submission = client
        .workflow(WorkflowKind::Chatbot)
        .submit_with_options(
            WorkflowRequest::chatbot("Curing time?"),
            RequestOptions::default().with_request_id("req-42"),
        )
        .await
        .unwrap();
    assert!(matches!(submission, Submission::Settled(Outcome::Success(_))));
}

#[tokio::test]
async fn fastapi_detail_becomes_api_error_and_workflow_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/crack-detection"))
        .respond_with(
            ResponseTemplate::new(500)
                .insert_header("X-Request-Id", "srv-9")
                .set_body_json(json!({"detail": "AI analysis failed: model overloaded"})),
        )
        .mount(&server)
        .await;

    let client = client_for_server(&server);
    let err = client
        .post(
            WorkflowKind::CrackDetection,
            package(&WorkflowRequest::crack_detection("hairline crack")).unwrap(),
            RequestOptions::default(),
        )
        .await
        .unwrap_err();
    match err {
        Error::Api(api) => {
            assert_eq!(api.status, 500);
            assert_eq!(api.message, "AI analysis failed: model overloaded");
            assert_eq!(api.request_id.as_deref(), Some("srv-9"));
        }
        other => panic!("expected api error, got {other:?}"),
    }

    let machine = client.workflow(WorkflowKind::CrackDetection);
    machine
        .submit(WorkflowRequest::crack_detection("hairline crack"))
        .await
        .unwrap();
    match machine.view() {
        ViewModel::Error { message, .. } => {
            assert_eq!(message, "Crack diagnosis failed. Please retry.")
        }
        other => panic!("expected error view, got {other:?}"),
    }
}

#[tokio::test]
async fn planner_timeout_fails_without_prior_report() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/project-planner"))
        .and(body_json(json!({"description": ""})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(fixtures::project_plan())
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let client = Client::new(Config {
        base_url: Some(server.uri()),
        timeout: Some(Duration::from_millis(50)),
        ..Default::default()
    })
    .unwrap();
    let machine = client.workflow(WorkflowKind::ProjectPlanner);
    machine
        .submit(WorkflowRequest::project_planner(""))
        .await
        .unwrap();

    let WorkflowState::Failed(info) = machine.state() else {
        panic!("expected failure");
    };
    assert!(info.cause.is_timeout(), "{:?}", info.cause);
    assert!(info.previous.is_none());

    let fallback = machine.view().report_or_empty().unwrap();
    let plan = fallback.as_planner().unwrap();
    assert!(plan.task_schedule.is_empty());
    assert_eq!(plan.cost_estimation.total_cost, 0.0);
    assert!(!machine.is_in_flight());
}

#[tokio::test]
async fn non_json_body_is_a_failure_not_a_panic() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/weather-advisor"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
        .mount(&server)
        .await;

    let client = client_for_server(&server);
    let machine = client.workflow(WorkflowKind::WeatherAdvisor);
    machine
        .submit(WorkflowRequest::weather_advisor("roofing", "light rain"))
        .await
        .unwrap();

    let WorkflowState::Failed(info) = machine.state() else {
        panic!("expected failure");
    };
    assert!(matches!(*info.cause, Error::Serialization(_)));
    assert_eq!(info.message, "Weather advisory failed. Please retry.");
}

#[tokio::test]
async fn http_metrics_callback_sees_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chatbot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::chat_reply()))
        .mount(&server)
        .await;

    let seen: Arc<Mutex<Vec<(u16, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let client = Client::new(Config {
        base_url: Some(server.uri()),
        metrics: Some(MetricsCallbacks {
            http_request: Some(Arc::new(move |m: HttpRequestMetrics| {
                sink.lock()
                    .unwrap()
                    .push((m.status.unwrap_or_default(), m.context.path.clone()));
            })),
            ..Default::default()
        }),
        ..Default::default()
    })
    .unwrap();

    client
        .workflow(WorkflowKind::Chatbot)
        .submit(WorkflowRequest::chatbot("hello"))
        .await
        .unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![(200, "/api/chatbot".to_string())]
    );
}
