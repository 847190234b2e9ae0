use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use corrmon_common::types::{LoginRequest, LoginResponse};
use corrmon_storage::auth::verify_password;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::api::{error_response, success_response, ApiError};
use crate::logging::TraceId;
use crate::state::AppState;

/// 规则相关的全部权限，登录时整套签发
pub const RULE_SCOPES: [&str; 4] = ["read:rules", "write:rules", "update:rules", "delete:rules"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub tenant_id: String,
    pub scopes: Vec<String>,
    pub iat: u64,
    pub exp: u64,
}

impl Claims {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

pub fn create_token(
    secret: &str,
    user_id: &str,
    username: &str,
    tenant_id: &str,
    scopes: &[&str],
    expire_secs: u64,
) -> anyhow::Result<String> {
    let now = chrono::Utc::now().timestamp() as u64;
    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        tenant_id: tenant_id.to_string(),
        scopes: scopes.iter().map(|s| s.to_string()).collect(),
        iat: now,
        exp: now + expire_secs,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// 取 JWT 签名密钥；未配置时生成随机密钥并告警。
/// 随机密钥在重启后失效，已签发的 token 会全部作废。
pub fn resolve_jwt_secret(configured: Option<&str>) -> String {
    match configured {
        Some(secret) => secret.to_string(),
        None => {
            tracing::warn!(
                "auth.jwt_secret not configured, generated a random secret; tokens will not survive restarts"
            );
            corrmon_storage::auth::generate_token()
        }
    }
}

pub fn validate_token(secret: &str, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// 权限检查；不足时给出 403 响应
pub fn require_scope(claims: &Claims, trace_id: &str, scope: &str) -> Result<(), Response> {
    if claims.has_scope(scope) {
        Ok(())
    } else {
        Err(error_response(
            StatusCode::FORBIDDEN,
            trace_id,
            "forbidden",
            &format!("Missing required scope '{scope}'"),
        ))
    }
}

/// JWT 鉴权中间件
pub async fn jwt_auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let trace_id = req
        .extensions()
        .get::<TraceId>()
        .map(|t| t.0.clone())
        .unwrap_or_default();

    let auth_header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let token = match auth_header {
        None => {
            return error_response(
                StatusCode::UNAUTHORIZED,
                &trace_id,
                "unauthorized",
                "missing authorization header",
            );
        }
        Some(header) => match header.strip_prefix("Bearer ") {
            Some(token) if !token.is_empty() => token,
            _ => {
                return error_response(
                    StatusCode::UNAUTHORIZED,
                    &trace_id,
                    "unauthorized",
                    "invalid authorization header",
                );
            }
        },
    };

    match validate_token(&state.jwt_secret, token) {
        Ok(claims) => {
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        Err(e) => {
            if matches!(e.kind(), jsonwebtoken::errors::ErrorKind::ExpiredSignature) {
                error_response(
                    StatusCode::UNAUTHORIZED,
                    &trace_id,
                    "token_expired",
                    "token expired",
                )
            } else {
                error_response(
                    StatusCode::UNAUTHORIZED,
                    &trace_id,
                    "unauthorized",
                    "invalid token",
                )
            }
        }
    }
}

/// 登录接口
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "登录成功", body = LoginResponse),
        (status = 400, description = "请求参数错误", body = ApiError),
        (status = 401, description = "用户名或密码错误", body = ApiError)
    )
)]
pub async fn login(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> impl IntoResponse {
    if req.username.is_empty() || req.password.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "username and password are required",
        );
    }

    let user = match state.store.get_user_by_username(&req.username).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            return error_response(
                StatusCode::UNAUTHORIZED,
                &trace_id,
                "unauthorized",
                "invalid credentials",
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to query user");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "internal error",
            );
        }
    };

    match verify_password(&req.password, &user.password_hash) {
        Ok(true) => {}
        _ => {
            return error_response(
                StatusCode::UNAUTHORIZED,
                &trace_id,
                "unauthorized",
                "invalid credentials",
            );
        }
    }

    match create_token(
        &state.jwt_secret,
        &user.id,
        &user.username,
        &user.tenant_id,
        &RULE_SCOPES,
        state.token_expire_secs,
    ) {
        Ok(token) => success_response(
            StatusCode::OK,
            &trace_id,
            LoginResponse {
                token,
                expires_in: state.token_expire_secs,
            },
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to create token");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "internal_error",
                "internal error",
            )
        }
    }
}
