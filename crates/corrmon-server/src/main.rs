use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use corrmon_ai::{OpenAiProvider, RuleSuggester, TiktokenTokenizer, Tokenizer};
use corrmon_storage::auth::hash_password;
use corrmon_storage::Store;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use corrmon_server::app;
use corrmon_server::config::{AiConfig, ServerConfig};
use corrmon_server::state::{AiLimits, AiRuntime, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    corrmon_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("corrmon=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config_path = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("config/server.toml");

    let config = match ServerConfig::load(config_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(
                path = %config_path,
                error = %e,
                "Config file not loaded, using defaults"
            );
            ServerConfig::default()
        }
    };

    run_server(config).await
}

async fn run_server(config: ServerConfig) -> Result<()> {
    std::fs::create_dir_all(&config.database.data_dir)?;

    let db_url = config.database.connection_url();
    let store = Arc::new(Store::new(&db_url).await?);

    seed_default_user(&store, &config).await?;

    let ai = build_ai_runtime(&config.ai)?;

    let jwt_secret = corrmon_server::auth::resolve_jwt_secret(config.auth.jwt_secret.as_deref());

    let state = AppState {
        store,
        ai,
        start_time: Utc::now(),
        jwt_secret: Arc::new(jwt_secret),
        token_expire_secs: config.auth.token_expire_secs,
        config: Arc::new(config.clone()),
    };

    let app = app::build_http_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.http_port));
    tracing::info!(addr = %addr, "HTTP server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// 首次启动时写入默认管理员账户
async fn seed_default_user(store: &Store, config: &ServerConfig) -> Result<()> {
    if store.count_users().await? > 0 {
        return Ok(());
    }
    let hash = hash_password(&config.auth.default_password)?;
    let user = store
        .create_user(
            &config.auth.default_tenant,
            &config.auth.default_username,
            &hash,
        )
        .await?;
    tracing::info!(username = %user.username, tenant_id = %user.tenant_id, "Seeded default user");
    Ok(())
}

/// 组装规则建议运行时。
/// API key 可来自配置或 OPENAI_API_KEY；都没有时功能关闭。
/// tokenizer 加载失败视为配置错误，直接让启动失败。
fn build_ai_runtime(cfg: &AiConfig) -> Result<Option<AiRuntime>> {
    let api_key = cfg
        .api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok());
    let Some(api_key) = api_key else {
        tracing::warn!("No AI API key configured, rule suggestion disabled");
        return Ok(None);
    };

    let tokenizer: Arc<dyn Tokenizer> = Arc::new(TiktokenTokenizer::for_model(&cfg.tokenizer_model)?);
    let suggester: Arc<dyn RuleSuggester> = Arc::new(OpenAiProvider::new(
        api_key,
        Some(cfg.model.clone()),
        cfg.base_url.clone(),
        Some(cfg.timeout_secs),
        cfg.temperature,
        cfg.max_tokens,
    )?);

    tracing::info!(
        model = %cfg.model,
        tokenizer_model = %cfg.tokenizer_model,
        max_model_tokens = cfg.max_model_tokens,
        reserved_tokens = cfg.reserved_tokens,
        "Rule suggestion enabled"
    );

    Ok(Some(AiRuntime {
        suggester,
        tokenizer,
        limits: AiLimits {
            max_model_tokens: cfg.max_model_tokens,
            reserved_tokens: cfg.reserved_tokens,
            alert_pull_limit: cfg.alert_pull_limit,
        },
    }))
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
