//! Integration tests for the Dealpilot API.
//!
//! Each test builds its own in-memory database, engine and router and
//! drives it with `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use dealpilot_api::auth::load_or_generate_token;
use dealpilot_api::error::ErrorBody;
use dealpilot_api::handlers::{ExecutionsResponse, HealthResponse, RulesResponse};
use dealpilot_api::{create_router, AppState};
use dealpilot_automation::memory::{DealRecord, InMemoryDeals, InMemoryTasks, RecordingNotifier};
use dealpilot_automation::{AutomationEngine, Capabilities, SqliteRuleLogStore, SystemClock};
use dealpilot_core::types::{ActionType, NewRule, Timestamp, TriggerType};
use dealpilot_storage::{Database, RuleRepository};

// =============================================================================
// Helpers
// =============================================================================

const TEST_TOKEN: &str = "test-token-12345";

struct TestApp {
    state: AppState,
    db: Arc<Database>,
    deals: Arc<InMemoryDeals>,
    tasks: Arc<InMemoryTasks>,
    org: Uuid,
    deal: Uuid,
}

fn make_app() -> TestApp {
    let db = Arc::new(Database::in_memory().unwrap());
    let deals = Arc::new(InMemoryDeals::new());
    let tasks = Arc::new(InMemoryTasks::new());
    let deal = DealRecord::new(Uuid::new_v4(), "Acme", &["lead", "proposal", "won"]);
    let deal_id = deal.id;
    deals.insert(deal);

    let engine = Arc::new(AutomationEngine::new(
        Arc::new(SqliteRuleLogStore::new(Arc::clone(&db))),
        Capabilities {
            pipeline: deals.clone(),
            tasks: tasks.clone(),
            notifier: Arc::new(RecordingNotifier::new()),
            fields: deals.clone(),
        },
        Arc::new(SystemClock),
        Duration::from_secs(5),
    ));

    TestApp {
        state: AppState::new(Arc::clone(&db), engine, TEST_TOKEN.to_string()),
        db,
        deals,
        tasks,
        org: Uuid::new_v4(),
        deal: deal_id,
    }
}

impl TestApp {
    fn router(&self) -> axum::Router {
        create_router(self.state.clone(), 3040)
    }

    fn add_rule(&self, action_type: ActionType, config: Value, cooldown_hours: u32) -> Uuid {
        let repo = RuleRepository::new(Arc::clone(&self.db));
        repo.insert(
            NewRule {
                org_id: self.org,
                name: format!("{} rule", action_type),
                description: None,
                is_active: true,
                trigger_type: TriggerType::ProposalRequested,
                call_type_filter: None,
                action_type,
                action_config: config,
                min_confidence: 0.7,
                cooldown_hours,
                created_by: None,
            },
            Timestamp::now(),
        )
        .unwrap()
        .id
    }

    fn signal_json(&self, confidence: f64) -> String {
        json!({
            "trigger_type": "proposal_requested",
            "confidence": confidence,
            "deal_id": self.deal,
            "org_id": self.org,
            "context": {"deal_name": "Acme"},
            "observed_at": Timestamp::now().0,
        })
        .to_string()
    }
}

fn authed_get(uri: &str) -> Request<Body> {
    Request::get(uri)
        .header("authorization", format!("Bearer {}", TEST_TOKEN))
        .body(Body::empty())
        .unwrap()
}

fn authed_post_json(uri: &str, json: &str) -> Request<Body> {
    Request::post(uri)
        .header("authorization", format!("Bearer {}", TEST_TOKEN))
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

// =============================================================================
// Public endpoints
// =============================================================================

#[tokio::test]
async fn test_health_no_auth_required() {
    let app = make_app();
    let resp = app
        .router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(health.status, "healthy");
    assert_eq!(health.version, "0.1.0");
}

// =============================================================================
// Auth
// =============================================================================

#[tokio::test]
async fn test_missing_token_returns_401() {
    let app = make_app();
    let uri = format!("/rules?org_id={}", app.org);
    let resp = app
        .router()
        .oneshot(Request::get(uri.as_str()).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body: ErrorBody = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body.error, "unauthorized");
    assert_eq!(body.message, "Missing Authorization header");
}

#[tokio::test]
async fn test_wrong_token_returns_401() {
    let app = make_app();
    let resp = app
        .router()
        .oneshot(
            Request::post("/signals")
                .header("authorization", "Bearer not-the-token")
                .header("content-type", "application/json")
                .body(Body::from(app.signal_json(0.9)))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(app.tasks.tasks().is_empty());
}

#[tokio::test]
async fn test_generated_token_guards_router() {
    let dir = tempfile::tempdir().unwrap();
    let token = load_or_generate_token(&dir.path().join("api_token"));
    let mut app = make_app();
    app.state.api_token = token.clone();

    let resp = app
        .router()
        .oneshot(
            Request::get(format!("/executions?org_id={}", app.org).as_str())
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

// =============================================================================
// Signals
// =============================================================================

#[tokio::test]
async fn test_signal_runs_matching_rule_and_logs_it() {
    let app = make_app();
    let rule_id = app.add_rule(
        ActionType::CreateTask,
        json!({"title_template": "Send proposal to {{deal_name}}", "due_days": 2}),
        24,
    );

    let resp = app
        .router()
        .oneshot(authed_post_json("/signals", &app.signal_json(0.9)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let report = body_json(resp).await;
    assert_eq!(report["outcomes"].as_array().unwrap().len(), 1);
    assert_eq!(report["outcomes"][0]["rule_id"], json!(rule_id));
    assert_eq!(report["outcomes"][0]["status"], "success");
    assert_eq!(report["outcomes"][0]["logged"], true);

    let tasks = app.tasks.tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].1.title, "Send proposal to Acme");

    // Same signal again: cooldown applies.
    let resp = app
        .router()
        .oneshot(authed_post_json("/signals", &app.signal_json(0.9)))
        .await
        .unwrap();
    let report = body_json(resp).await;
    assert_eq!(report["outcomes"][0]["status"], "skipped");
    assert_eq!(report["outcomes"][0]["error_message"], "cooldown active");

    let resp = app
        .router()
        .oneshot(authed_get(&format!("/executions?org_id={}", app.org)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let listed: ExecutionsResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(listed.count, 2);
    assert!(listed.executions.iter().all(|e| e.rule_id == Some(rule_id)));

    let resp = app
        .router()
        .oneshot(authed_get(&format!("/executions/stats?org_id={}", app.org)))
        .await
        .unwrap();
    let stats = body_json(resp).await;
    assert_eq!(stats["counts"]["success"], 1);
    assert_eq!(stats["counts"]["skipped"], 1);
    assert_eq!(stats["total"], 2);
}

#[tokio::test]
async fn test_signal_below_threshold_produces_no_entries() {
    let app = make_app();
    app.add_rule(ActionType::AdvanceStage, json!({}), 0);

    let resp = app
        .router()
        .oneshot(authed_post_json("/signals", &app.signal_json(0.5)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let report = body_json(resp).await;
    assert!(report["outcomes"].as_array().unwrap().is_empty());
    assert_eq!(app.deals.get(app.deal).unwrap().stage(), Some("lead"));

    let resp = app
        .router()
        .oneshot(authed_get(&format!("/executions/stats?org_id={}", app.org)))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["total"], 0);
}

#[tokio::test]
async fn test_out_of_range_confidence_is_422() {
    let app = make_app();
    let resp = app
        .router()
        .oneshot(authed_post_json("/signals", &app.signal_json(1.7)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: ErrorBody = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body.error, "unprocessable_entity");
}

// =============================================================================
// Rules
// =============================================================================

#[tokio::test]
async fn test_create_and_list_rules() {
    let app = make_app();
    let new_rule = json!({
        "org_id": app.org,
        "name": "Advance on commitment",
        "trigger_type": "verbal_commitment",
        "action_type": "advance_stage",
        "min_confidence": 0.8,
        "cooldown_hours": 24
    });
    let resp = app
        .router()
        .oneshot(authed_post_json("/rules", &new_rule.to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = app
        .router()
        .oneshot(authed_get(&format!("/rules?org_id={}", app.org)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let listed: RulesResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(listed.rules.len(), 1);
    assert_eq!(listed.rules[0].name, "Advance on commitment");
    assert!(listed.rules[0].is_active);
}

#[tokio::test]
async fn test_create_rule_with_bad_config_is_422() {
    let app = make_app();
    let new_rule = json!({
        "org_id": app.org,
        "name": "Notify nobody",
        "trigger_type": "pricing_discussed",
        "action_type": "send_notification",
        "action_config": {"channels": [], "message_template": "Pricing on {{deal_name}}"},
        "min_confidence": 0.5
    });
    let resp = app
        .router()
        .oneshot(authed_post_json("/rules", &new_rule.to_string()))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_rules_require_org_id() {
    let app = make_app();
    let resp = app.router().oneshot(authed_get("/rules")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body.message, "org_id is required");
}

// =============================================================================
// Executions
// =============================================================================

#[tokio::test]
async fn test_unknown_status_filter_is_400() {
    let app = make_app();
    let resp = app
        .router()
        .oneshot(authed_get("/executions?status=exploded"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_invalid_uuid_filter_is_400() {
    let app = make_app();
    let resp = app
        .router()
        .oneshot(authed_get("/executions?deal_id=not-a-uuid"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
