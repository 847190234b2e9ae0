#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use chrono::Utc;
use corrmon_ai::{RuleSuggester, RuleSuggestion, SuggestionReport, Tokenizer};
use corrmon_server::app;
use corrmon_server::config::ServerConfig;
use corrmon_server::state::{AiLimits, AiRuntime, AppState};
use corrmon_storage::auth::hash_password;
use corrmon_storage::Store;
use serde_json::Value;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub struct TestContext {
    pub temp_dir: TempDir,
    pub state: AppState,
    pub app: axum::Router,
    /// FakeSuggester 的调用计数（未启用 AI 时恒为 0）
    pub suggest_calls: Arc<AtomicUsize>,
}

/// 固定应答的假建议器，只记录被调用了几次
pub struct FakeSuggester {
    pub calls: Arc<AtomicUsize>,
}

#[async_trait]
impl RuleSuggester for FakeSuggester {
    fn provider(&self) -> &str {
        "fake"
    }

    fn model_name(&self) -> &str {
        "fake-model"
    }

    async fn suggest(&self, _alerts_json: &str) -> Result<SuggestionReport> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SuggestionReport {
            has_results: true,
            results: vec![RuleSuggestion {
                cel_rule: "(labels.service == \"api\")".to_string(),
                timeframe: 10,
                group_by: vec!["labels.host".to_string()],
                chain_of_thought: "api alerts share a host".to_string(),
                why_too_general: "could match unrelated api alerts".to_string(),
                why_too_specific: "misses alerts without labels.service".to_string(),
                short_rule_name: Some("api-by-host".to_string()),
                score: 77,
            }],
            summary: Some("one plausible grouping".to_string()),
        })
    }
}

/// 每字节一个 token，预算测试可精确控制
pub struct ByteTokenizer;

impl Tokenizer for ByteTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        text.len()
    }
}

pub async fn build_test_context(enable_ai: bool) -> Result<TestContext> {
    corrmon_common::id::init(1, 1);

    let temp_dir = tempfile::tempdir()?;
    let db_path = temp_dir.path().join("corrmon-test.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let store = Arc::new(Store::new(&db_url).await?);

    let password_hash = hash_password("changeme")?;
    let _ = store.create_user("default", "admin", &password_hash).await?;

    let suggest_calls = Arc::new(AtomicUsize::new(0));
    let ai = if enable_ai {
        Some(AiRuntime {
            suggester: Arc::new(FakeSuggester {
                calls: suggest_calls.clone(),
            }),
            tokenizer: Arc::new(ByteTokenizer),
            limits: AiLimits {
                max_model_tokens: 100_000,
                reserved_tokens: 1_000,
                alert_pull_limit: 1000,
            },
        })
    } else {
        None
    };

    let state = AppState {
        store,
        ai,
        start_time: Utc::now(),
        jwt_secret: Arc::new("test-secret".to_string()),
        token_expire_secs: 3600,
        config: Arc::new(ServerConfig::default()),
    };

    let app = app::build_http_app(state.clone());

    Ok(TestContext {
        temp_dir,
        state,
        app,
        suggest_calls,
    })
}

pub async fn request_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value, Option<String>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder = builder.header("Content-Type", "application/json");

    let req_body = body.unwrap_or(Value::Null).to_string();
    let req = builder
        .body(Body::from(req_body))
        .expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");

    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}

pub async fn request_no_body(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
) -> (StatusCode, Value, Option<String>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }

    let req = builder.body(Body::empty()).expect("request should build");

    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should be handled");
    let status = resp.status();
    let trace_id = resp
        .headers()
        .get("x-trace-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let bytes = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should read");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice::<Value>(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()))
    };

    (status, json, trace_id)
}

pub async fn login_and_get_token(app: &axum::Router) -> String {
    let (status, body, _) = request_json(
        app,
        "POST",
        "/v1/auth/login",
        None,
        Some(serde_json::json!({
            "username": "admin",
            "password": "changeme",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["data"]["token"]
        .as_str()
        .expect("login response should contain token")
        .to_string()
}

/// 一个通过全部校验的规则请求体
pub fn valid_rule_body(name: &str) -> Value {
    serde_json::json!({
        "name": name,
        "sql_query": { "sql": "((labels.host = ?))", "params": ["web-01"] },
        "cel_query": "(labels.host == \"web-01\")",
        "timeframe_secs": 600,
        "time_unit": "seconds",
        "grouping_criteria": ["labels.host"],
        "group_description": "host {{ labels.host }}",
        "require_approve": false,
    })
}
