use std::sync::Arc;

use chrono::{DateTime, Utc};
use corrmon_ai::{RuleSuggester, Tokenizer};
use corrmon_storage::Store;

use crate::config::ServerConfig;

/// 规则建议运行时：模型客户端 + token 计数器 + 预算参数。
/// 未配置 API key 时整体缺省，相关接口返回 503。
#[derive(Clone)]
pub struct AiRuntime {
    pub suggester: Arc<dyn RuleSuggester>,
    pub tokenizer: Arc<dyn Tokenizer>,
    pub limits: AiLimits,
}

#[derive(Debug, Clone, Copy)]
pub struct AiLimits {
    pub max_model_tokens: usize,
    pub reserved_tokens: usize,
    pub alert_pull_limit: usize,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub ai: Option<AiRuntime>,
    pub start_time: DateTime<Utc>,
    pub jwt_secret: Arc<String>,
    pub token_expire_secs: u64,
    pub config: Arc<ServerConfig>,
}
