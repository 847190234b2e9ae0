use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use corrmon_ai::{select_alerts, AlertRecord, SuggestionReport};
use corrmon_common::id;
use corrmon_storage::RuleRow;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::api::pagination::PaginationParams;
use crate::api::{
    error_response, success_empty_response, success_paginated_response, success_response, ApiError,
};
use crate::auth::{require_scope, Claims};
use crate::logging::TraceId;
use crate::state::AppState;

const VALID_TIME_UNITS: [&str; 4] = ["seconds", "minutes", "hours", "days"];

/// 分布图统计的时间范围（天）
const DISTRIBUTION_WINDOW_DAYS: i64 = 7;

/// 规则里的 SQL 过滤定义
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SqlQuery {
    /// 参数化 SQL 片段
    #[serde(default)]
    pub sql: String,
    /// SQL 占位符参数
    #[serde(default)]
    pub params: Option<Vec<Value>>,
}

/// 创建/更新规则的请求体
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RuleUpsertRequest {
    /// 规则名称（租户内唯一）
    #[serde(default)]
    pub name: String,
    pub sql_query: SqlQuery,
    /// CEL 过滤表达式
    #[serde(default)]
    pub cel_query: String,
    /// 关联时间窗口（秒）
    #[serde(default)]
    pub timeframe_secs: i64,
    #[serde(default = "default_time_unit")]
    pub time_unit: String,
    /// 分组字段，如 labels.host
    #[serde(default)]
    pub grouping_criteria: Vec<String>,
    #[serde(default)]
    pub group_description: Option<String>,
    /// 触发前是否需要人工批准
    #[serde(default)]
    pub require_approve: bool,
}

fn default_time_unit() -> String {
    "seconds".to_string()
}

/// 分钟级事件数量桶
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DistributionPoint {
    /// 分钟键（`YYYY-MM-DD HH:MM`）
    pub minute: String,
    pub count: i64,
}

/// 规则响应（附带事件统计）
#[derive(Serialize, ToSchema)]
pub struct RuleResponse {
    pub id: String,
    pub name: String,
    pub definition_sql: Value,
    pub definition_cel: String,
    pub timeframe_secs: i64,
    pub time_unit: String,
    pub grouping_criteria: Vec<String>,
    pub group_description: Option<String>,
    pub require_approve: bool,
    pub created_by: String,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// 最近一段时间按分钟聚合的触发分布
    pub distribution: Vec<DistributionPoint>,
    /// 历史触发事件总数
    pub incidents: u64,
}

fn to_response(
    row: RuleRow,
    distribution: Vec<DistributionPoint>,
    incidents: u64,
) -> RuleResponse {
    RuleResponse {
        id: row.id,
        name: row.name,
        definition_sql: row.definition_sql,
        definition_cel: row.definition_cel,
        timeframe_secs: row.timeframe_secs,
        time_unit: row.time_unit,
        grouping_criteria: row.grouping_criteria,
        group_description: row.group_description,
        require_approve: row.require_approve,
        created_by: row.created_by,
        updated_by: row.updated_by,
        created_at: row.created_at,
        updated_at: row.updated_at,
        distribution,
        incidents,
    }
}

/// 请求体校验；返回第一个不满足项的描述
fn validate_upsert(req: &RuleUpsertRequest) -> Option<&'static str> {
    if req.sql_query.sql.trim().is_empty() {
        return Some("SQL is required");
    }
    if req.sql_query.params.is_none() {
        return Some("SQL parameters are required");
    }
    if req.cel_query.trim().is_empty() {
        return Some("CEL expression is required");
    }
    if req.name.trim().is_empty() {
        return Some("Rule name is required");
    }
    if req.timeframe_secs <= 0 {
        return Some("Timeframe must be positive");
    }
    if !VALID_TIME_UNITS.contains(&req.time_unit.as_str()) {
        return Some("Time unit must be one of seconds, minutes, hours, days");
    }
    None
}

fn to_rule_row(tenant_id: &str, id: String, actor: &str, req: &RuleUpsertRequest) -> RuleRow {
    let now = Utc::now();
    RuleRow {
        id,
        tenant_id: tenant_id.to_string(),
        name: req.name.trim().to_string(),
        definition_sql: serde_json::json!({
            "sql": req.sql_query.sql,
            "params": req.sql_query.params.clone().unwrap_or_default(),
        }),
        definition_cel: req.cel_query.clone(),
        timeframe_secs: req.timeframe_secs,
        time_unit: req.time_unit.clone(),
        grouping_criteria: req.grouping_criteria.clone(),
        group_description: req.group_description.clone(),
        require_approve: req.require_approve,
        created_by: actor.to_string(),
        updated_by: Some(actor.to_string()),
        created_at: now,
        updated_at: now,
    }
}

/// 分页查询关联规则列表，每条附带事件总数与最近 7 天的分钟级分布。
/// 默认排序：`created_at` 倒序；默认分页：`limit=20&offset=0`。
#[utoipa::path(
    get,
    path = "/v1/rules",
    tag = "Rules",
    security(("bearer_auth" = [])),
    params(PaginationParams),
    responses(
        (status = 200, description = "规则分页列表", body = Vec<RuleResponse>),
        (status = 401, description = "未认证", body = ApiError),
        (status = 403, description = "缺少 read:rules 权限", body = ApiError)
    )
)]
async fn list_rules(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> impl IntoResponse {
    if let Err(resp) = require_scope(&claims, &trace_id, "read:rules") {
        return resp;
    }
    let tenant_id = &claims.tenant_id;
    let limit = pagination.limit();
    let offset = pagination.offset();

    let total = match state.store.count_rules(tenant_id).await {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "Failed to count rules");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            );
        }
    };

    let rows = match state.store.list_rules(tenant_id, limit, offset).await {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "Failed to list rules");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            );
        }
    };

    let incident_counts = match state.store.incident_counts(tenant_id).await {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "Failed to count incidents");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            );
        }
    };

    let since = Utc::now() - Duration::days(DISTRIBUTION_WINDOW_DAYS);
    let mut distribution = match state.store.incident_distribution(tenant_id, since).await {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "Failed to query incident distribution");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            );
        }
    };

    let items: Vec<RuleResponse> = rows
        .into_iter()
        .map(|row| {
            let incidents = incident_counts.get(&row.id).copied().unwrap_or(0);
            let buckets = distribution
                .remove(&row.id)
                .unwrap_or_default()
                .into_iter()
                .map(|b| DistributionPoint {
                    minute: b.minute,
                    count: b.count,
                })
                .collect();
            to_response(row, buckets, incidents)
        })
        .collect();

    success_paginated_response(StatusCode::OK, &trace_id, items, total, limit, offset)
}

/// 创建关联规则。
#[utoipa::path(
    post,
    path = "/v1/rules",
    tag = "Rules",
    security(("bearer_auth" = [])),
    request_body = RuleUpsertRequest,
    responses(
        (status = 201, description = "规则创建成功", body = RuleResponse),
        (status = 400, description = "请求参数错误", body = ApiError),
        (status = 401, description = "未认证", body = ApiError),
        (status = 409, description = "规则名已存在", body = ApiError)
    )
)]
async fn create_rule(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Json(req): Json<RuleUpsertRequest>,
) -> impl IntoResponse {
    if let Err(resp) = require_scope(&claims, &trace_id, "write:rules") {
        return resp;
    }
    if let Some(msg) = validate_upsert(&req) {
        return error_response(StatusCode::BAD_REQUEST, &trace_id, "bad_request", msg);
    }

    let row = to_rule_row(&claims.tenant_id, id::next_id(), &claims.username, &req);
    match state.store.insert_rule(&row).await {
        Ok(created) => {
            tracing::info!(rule_id = %created.id, name = %created.name, "Rule created");
            success_response(
                StatusCode::CREATED,
                &trace_id,
                to_response(created, Vec::new(), 0),
            )
        }
        Err(e) if e.is_unique_violation() => error_response(
            StatusCode::CONFLICT,
            &trace_id,
            "conflict",
            &format!("Rule '{}' already exists", req.name.trim()),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to insert rule");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// 更新关联规则（整体替换定义）。
#[utoipa::path(
    put,
    path = "/v1/rules/{id}",
    tag = "Rules",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "规则 ID")
    ),
    request_body = RuleUpsertRequest,
    responses(
        (status = 200, description = "规则更新成功", body = RuleResponse),
        (status = 400, description = "请求参数错误", body = ApiError),
        (status = 404, description = "规则不存在", body = ApiError),
        (status = 409, description = "规则名已存在", body = ApiError)
    )
)]
async fn update_rule(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(rule_id): Path<String>,
    Json(req): Json<RuleUpsertRequest>,
) -> impl IntoResponse {
    if let Err(resp) = require_scope(&claims, &trace_id, "update:rules") {
        return resp;
    }
    if let Some(msg) = validate_upsert(&req) {
        return error_response(StatusCode::BAD_REQUEST, &trace_id, "bad_request", msg);
    }

    let row = to_rule_row(&claims.tenant_id, rule_id.clone(), &claims.username, &req);
    match state.store.update_rule(&claims.tenant_id, &rule_id, &row).await {
        Ok(Some(updated)) => {
            tracing::info!(rule_id = %updated.id, "Rule updated");
            success_response(StatusCode::OK, &trace_id, to_response(updated, Vec::new(), 0))
        }
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Rule '{rule_id}' not found"),
        ),
        Err(e) if e.is_unique_violation() => error_response(
            StatusCode::CONFLICT,
            &trace_id,
            "conflict",
            &format!("Rule '{}' already exists", req.name.trim()),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to update rule");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// 删除关联规则。
#[utoipa::path(
    delete,
    path = "/v1/rules/{id}",
    tag = "Rules",
    security(("bearer_auth" = [])),
    params(
        ("id" = String, Path, description = "规则 ID")
    ),
    responses(
        (status = 200, description = "规则删除成功"),
        (status = 404, description = "规则不存在", body = ApiError)
    )
)]
async fn delete_rule(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
    Path(rule_id): Path<String>,
) -> impl IntoResponse {
    if let Err(resp) = require_scope(&claims, &trace_id, "delete:rules") {
        return resp;
    }
    match state.store.delete_rule(&claims.tenant_id, &rule_id).await {
        Ok(true) => {
            tracing::info!(rule_id = %rule_id, "Rule deleted");
            success_empty_response(StatusCode::OK, &trace_id, "rule deleted")
        }
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Rule '{rule_id}' not found"),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to delete rule");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
        }
    }
}

/// 基于历史告警生成规则建议。
/// 从最近的告警中选出不超出模型 token 预算的前缀，交给 LLM 分析；
/// 未配置 AI 时返回 503。
#[utoipa::path(
    get,
    path = "/v1/rules/suggest",
    tag = "Rules",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "规则建议报告"),
        (status = 401, description = "未认证", body = ApiError),
        (status = 502, description = "模型调用失败", body = ApiError),
        (status = 503, description = "规则建议功能未启用", body = ApiError)
    )
)]
async fn suggest_rules(
    Extension(trace_id): Extension<TraceId>,
    Extension(claims): Extension<Claims>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    if let Err(resp) = require_scope(&claims, &trace_id, "read:rules") {
        return resp;
    }
    let Some(ai) = &state.ai else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            &trace_id,
            "disabled_system_config",
            "Rule suggestion is not configured (missing API key)",
        );
    };
    let tenant_id = &claims.tenant_id;

    tracing::info!(tenant_id = %tenant_id, "Fetching alerts for rule suggestion");
    let alerts = match state
        .store
        .last_alerts(tenant_id, ai.limits.alert_pull_limit)
        .await
    {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load alerts");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            );
        }
    };

    let records: Vec<AlertRecord> = alerts
        .into_iter()
        .map(|a| AlertRecord {
            event_json: a.event_json,
            timestamp: a.received_at,
        })
        .collect();

    let selection = match select_alerts(
        ai.tokenizer.as_ref(),
        &records,
        ai.limits.max_model_tokens,
        ai.limits.reserved_tokens,
    ) {
        Ok(sel) => sel,
        Err(e) => {
            tracing::error!(error = %e, "Alert selection failed");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "internal_error",
                "Failed to prepare alerts for the model",
            );
        }
    };

    // 没有可送的告警就不浪费一次模型调用
    if selection.is_empty() {
        return success_response(StatusCode::OK, &trace_id, SuggestionReport::empty());
    }

    tracing::info!(
        selected = selection.len(),
        used_tokens = selection.used_tokens,
        model = %ai.suggester.model_name(),
        "Requesting rule suggestions"
    );

    let content = corrmon_ai::prompt::alerts_user_content(&selection.serialized);
    match ai.suggester.suggest(&content).await {
        Ok(report) => {
            tracing::info!(
                has_results = report.has_results,
                suggestions = report.results.len(),
                "Rule suggestions received"
            );
            success_response(StatusCode::OK, &trace_id, report)
        }
        Err(e) => {
            tracing::error!(error = %e, "AI provider request failed");
            error_response(
                StatusCode::BAD_GATEWAY,
                &trace_id,
                "upstream_error",
                "AI provider request failed",
            )
        }
    }
}

pub fn rule_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_rules, create_rule))
        .routes(routes!(update_rule, delete_rule))
        .routes(routes!(suggest_rules))
}
