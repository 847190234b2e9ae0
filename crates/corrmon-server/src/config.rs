use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub ai: AiConfig,
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// CORS 允许的 origins 列表，为空时允许所有来源（开发模式）
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

fn default_http_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// 显式连接 URL；未设置时使用 data_dir 下的 SQLite 库
    #[serde(default)]
    pub url: Option<String>,
}

impl DatabaseConfig {
    pub fn connection_url(&self) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => format!("sqlite://{}/corrmon.db?mode=rwc", self.data_dir),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            url: None,
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_token_expire_secs")]
    pub token_expire_secs: u64,
    #[serde(default = "default_username")]
    pub default_username: String,
    #[serde(default = "default_password")]
    pub default_password: String,
    /// 新用户归属的默认租户
    #[serde(default = "default_tenant")]
    pub default_tenant: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_expire_secs: default_token_expire_secs(),
            default_username: default_username(),
            default_password: default_password(),
            default_tenant: default_tenant(),
        }
    }
}

fn default_token_expire_secs() -> u64 {
    86400
}

fn default_username() -> String {
    "admin".to_string()
}

fn default_password() -> String {
    "changeme".to_string()
}

fn default_tenant() -> String {
    "default".to_string()
}

/// 规则建议（LLM）相关配置。
/// `api_key` 缺省时回退到 OPENAI_API_KEY 环境变量；仍然没有则关闭建议功能。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_ai_model")]
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    /// token 计数用的编码模型（与对话模型解耦）
    #[serde(default = "default_tokenizer_model")]
    pub tokenizer_model: String,
    #[serde(default = "default_max_model_tokens")]
    pub max_model_tokens: usize,
    /// 预留给模型回答的 token
    #[serde(default = "default_reserved_tokens")]
    pub reserved_tokens: usize,
    /// 每次建议最多从库里取多少条告警
    #[serde(default = "default_alert_pull_limit")]
    pub alert_pull_limit: usize,
    #[serde(default = "default_ai_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<usize>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_ai_model(),
            base_url: None,
            tokenizer_model: default_tokenizer_model(),
            max_model_tokens: default_max_model_tokens(),
            reserved_tokens: default_reserved_tokens(),
            alert_pull_limit: default_alert_pull_limit(),
            timeout_secs: default_ai_timeout_secs(),
            temperature: None,
            max_tokens: None,
        }
    }
}

fn default_ai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_tokenizer_model() -> String {
    "gpt-4".to_string()
}

fn default_max_model_tokens() -> usize {
    128_000
}

fn default_reserved_tokens() -> usize {
    10_000
}

fn default_alert_pull_limit() -> usize {
    1000
}

fn default_ai_timeout_secs() -> u64 {
    120
}
