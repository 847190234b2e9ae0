mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use common::{build_test_context, login_and_get_token, request_json, request_no_body, valid_rule_body};
use corrmon_common::types::AlertSnapshot;
use corrmon_server::config::ServerConfig;
use corrmon_server::state::AppState;
use corrmon_server::{app, auth};
use serde_json::json;
use tower::util::ServiceExt;

#[tokio::test]
async fn health_is_public() {
    let ctx = build_test_context(true).await.unwrap();
    let (status, body, trace_id) = request_no_body(&ctx.app, "GET", "/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["err_code"], 0);
    assert_eq!(body["data"]["ai_enabled"], true);
    assert!(trace_id.is_some());
}

async fn preflight_origin(app: &axum::Router, origin: &str) -> Option<String> {
    let req = Request::builder()
        .method("GET")
        .uri("/v1/health")
        .header("Origin", origin)
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    resp.headers()
        .get("access-control-allow-origin")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
}

#[tokio::test]
async fn cors_honors_configured_origins() {
    let ctx = build_test_context(false).await.unwrap();

    // 默认配置：放开所有来源
    let allowed = preflight_origin(&ctx.app, "http://anywhere.example").await;
    assert_eq!(allowed.as_deref(), Some("*"));

    // 配置了白名单：只回显名单内的 origin
    let mut config = ServerConfig::default();
    config.server.cors_allowed_origins = vec!["http://example.com".to_string()];
    let state = AppState {
        config: Arc::new(config),
        ..ctx.state.clone()
    };
    let restricted_app = app::build_http_app(state);

    let allowed = preflight_origin(&restricted_app, "http://example.com").await;
    assert_eq!(allowed.as_deref(), Some("http://example.com"));

    let denied = preflight_origin(&restricted_app, "http://evil.example").await;
    assert_eq!(denied, None);
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let ctx = build_test_context(false).await.unwrap();
    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/auth/login",
        None,
        Some(json!({"username": "admin", "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["err_code"], 1002);
}

#[tokio::test]
async fn rules_require_authentication() {
    let ctx = build_test_context(false).await.unwrap();
    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/rules", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["err_code"], 1002);

    let (status, _, _) =
        request_no_body(&ctx.app, "GET", "/v1/rules", Some("not-a-valid-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn rules_crud_flow() {
    let ctx = build_test_context(false).await.unwrap();
    let token = login_and_get_token(&ctx.app).await;

    // create
    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/rules",
        Some(&token),
        Some(valid_rule_body("web-host-group")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
    let rule_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["name"], "web-host-group");
    assert_eq!(body["data"]["incidents"], 0);
    assert_eq!(body["data"]["definition_sql"]["params"][0], "web-01");

    // list
    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/rules", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["id"], rule_id.as_str());
    assert!(body["data"]["items"][0]["distribution"]
        .as_array()
        .unwrap()
        .is_empty());

    // update
    let mut changed = valid_rule_body("web-host-group-v2");
    changed["timeframe_secs"] = json!(1200);
    let (status, body, _) = request_json(
        &ctx.app,
        "PUT",
        &format!("/v1/rules/{rule_id}"),
        Some(&token),
        Some(changed.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "update failed: {body}");
    assert_eq!(body["data"]["name"], "web-host-group-v2");
    assert_eq!(body["data"]["timeframe_secs"], 1200);
    assert_eq!(body["data"]["updated_by"], "admin");

    // update unknown id
    let (status, body, _) = request_json(
        &ctx.app,
        "PUT",
        "/v1/rules/does-not-exist",
        Some(&token),
        Some(changed),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["err_code"], 1004);

    // delete
    let (status, _, _) = request_no_body(
        &ctx.app,
        "DELETE",
        &format!("/v1/rules/{rule_id}"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = request_no_body(
        &ctx.app,
        "DELETE",
        &format!("/v1/rules/{rule_id}"),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body, _) = request_no_body(&ctx.app, "GET", "/v1/rules", Some(&token)).await;
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn create_rule_validates_payload() {
    let ctx = build_test_context(false).await.unwrap();
    let token = login_and_get_token(&ctx.app).await;

    let cases = [
        // (mutation, expected message fragment)
        (json!({"sql_query": {"sql": "", "params": []}}), "SQL is required"),
        (json!({"sql_query": {"sql": "x = ?"}}), "SQL parameters"),
        (json!({"cel_query": ""}), "CEL expression"),
        (json!({"name": "  "}), "Rule name"),
        (json!({"timeframe_secs": 0}), "Timeframe"),
        (json!({"time_unit": "fortnights"}), "Time unit"),
    ];

    for (mutation, fragment) in cases {
        let mut body = valid_rule_body("validation-case");
        for (k, v) in mutation.as_object().unwrap() {
            body[k] = v.clone();
        }
        let (status, resp, _) =
            request_json(&ctx.app, "POST", "/v1/rules", Some(&token), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "case {fragment}: {resp}");
        assert_eq!(resp["err_code"], 1001);
        assert!(
            resp["err_msg"].as_str().unwrap().contains(fragment),
            "expected '{fragment}' in {resp}"
        );
    }
}

#[tokio::test]
async fn duplicate_rule_name_conflicts() {
    let ctx = build_test_context(false).await.unwrap();
    let token = login_and_get_token(&ctx.app).await;

    let (status, _, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/rules",
        Some(&token),
        Some(valid_rule_body("dup")),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/rules",
        Some(&token),
        Some(valid_rule_body("dup")),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["err_code"], 1005);
}

#[tokio::test]
async fn write_requires_scope() {
    let ctx = build_test_context(false).await.unwrap();

    // 只有读权限的 token
    let token = auth::create_token(
        &ctx.state.jwt_secret,
        "u1",
        "viewer",
        "default",
        &["read:rules"],
        3600,
    )
    .unwrap();

    let (status, _, _) = request_no_body(&ctx.app, "GET", "/v1/rules", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/rules",
        Some(&token),
        Some(valid_rule_body("nope")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["err_code"], 1006);
}

#[tokio::test]
async fn suggest_unavailable_without_ai_config() {
    let ctx = build_test_context(false).await.unwrap();
    let token = login_and_get_token(&ctx.app).await;

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/v1/rules/suggest", Some(&token)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["err_code"], 1106);
}

#[tokio::test]
async fn suggest_without_alerts_skips_the_model() {
    let ctx = build_test_context(true).await.unwrap();
    let token = login_and_get_token(&ctx.app).await;

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/v1/rules/suggest", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["hasResults"], false);
    assert!(body["data"]["results"].as_array().unwrap().is_empty());
    assert_eq!(ctx.suggest_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn suggest_returns_report_for_seeded_alerts() {
    let ctx = build_test_context(true).await.unwrap();
    let token = login_and_get_token(&ctx.app).await;

    let base = Utc::now();
    for i in 0..5 {
        ctx.state
            .store
            .insert_alert(&AlertSnapshot {
                id: format!("a{i}"),
                tenant_id: "default".to_string(),
                fingerprint: format!("fp-{i}"),
                event_json: format!(
                    "{{\"name\":\"HighCpu\",\"labels\":{{\"host\":\"web-0{i}\",\"service\":\"api\"}}}}"
                ),
                received_at: base + Duration::seconds(i),
            })
            .await
            .unwrap();
    }

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/v1/rules/suggest", Some(&token)).await;
    assert_eq!(status, StatusCode::OK, "suggest failed: {body}");
    assert_eq!(body["data"]["hasResults"], true);
    assert_eq!(body["data"]["results"][0]["CELRule"], "(labels.service == \"api\")");
    assert_eq!(body["data"]["results"][0]["Score"], 77);
    assert_eq!(body["data"]["summery"], "one plausible grouping");
    assert_eq!(ctx.suggest_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn alerts_from_other_tenants_stay_invisible() {
    let ctx = build_test_context(true).await.unwrap();
    let token = login_and_get_token(&ctx.app).await;

    ctx.state
        .store
        .insert_alert(&AlertSnapshot {
            id: "other-1".to_string(),
            tenant_id: "other-tenant".to_string(),
            fingerprint: "fp-x".to_string(),
            event_json: "{\"name\":\"DiskFull\"}".to_string(),
            received_at: Utc::now(),
        })
        .await
        .unwrap();

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/v1/rules/suggest", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["hasResults"], false);
    assert_eq!(ctx.suggest_calls.load(Ordering::SeqCst), 0);
}
