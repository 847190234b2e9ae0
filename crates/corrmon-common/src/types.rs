use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 登录请求
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// 登录响应
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct LoginResponse {
    pub token: String,
    /// Token 有效期（秒）
    pub expires_in: u64,
}

/// 历史告警记录（跨 crate 传递的只读快照）。
///
/// `event` 为原始告警的结构化负载，不同来源的告警不要求同构；
/// `received_at` 为服务端收到该告警的时间。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSnapshot {
    pub id: String,
    pub tenant_id: String,
    pub fingerprint: String,
    /// 原始事件负载（JSON 文本，入库时未做规范化）
    pub event_json: String,
    pub received_at: DateTime<Utc>,
}
