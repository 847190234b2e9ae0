//! 按 token 预算挑选送入模型的告警子集。

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::prompt;
use crate::tokenizer::Tokenizer;

/// 待挑选的告警（事件体保持为 JSON 文本，序列化时才解析）
#[derive(Debug, Clone)]
pub struct AlertRecord {
    pub event_json: String,
    pub timestamp: DateTime<Utc>,
}

/// 模型上下文中固定占用的 token：系统提示词 + function calling 模式
#[derive(Debug, Clone, Copy)]
pub struct PromptOverhead {
    pub system_prompt_tokens: usize,
    pub schema_tokens: usize,
}

impl PromptOverhead {
    pub fn measure(tokenizer: &dyn Tokenizer) -> Result<Self> {
        let schema = serde_json::to_string(&prompt::suggestion_functions())
            .context("Failed to serialize suggestion schema")?;
        Ok(Self {
            system_prompt_tokens: tokenizer.count_tokens(prompt::SYSTEM_PROMPT),
            schema_tokens: tokenizer.count_tokens(&schema),
        })
    }

    pub fn total(&self) -> usize {
        self.system_prompt_tokens + self.schema_tokens
    }
}

/// 挑选结果。
///
/// `serialized` 保存计数时用过的文本，后续构造用户消息必须复用它们，
/// 否则实际发送的内容会偏离预算。
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub serialized: Vec<String>,
    pub used_tokens: usize,
    pub available_tokens: usize,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.serialized.is_empty()
    }

    pub fn len(&self) -> usize {
        self.serialized.len()
    }
}

#[derive(Serialize)]
struct SerializedAlert<'a> {
    event: serde_json::Value,
    timestamp: &'a str,
}

/// 告警的送模序列化形式：`{"event":...,"timestamp":"<RFC 3339>"}`
fn serialize_alert(alert: &AlertRecord) -> Result<String> {
    let event: serde_json::Value = serde_json::from_str(&alert.event_json)
        .context("Alert event is not valid JSON")?;
    let timestamp = alert.timestamp.to_rfc3339();
    serde_json::to_string(&SerializedAlert {
        event,
        timestamp: &timestamp,
    })
    .context("Failed to serialize alert")
}

/// 贪心前缀选择：按给定顺序累加每条告警的 token 数，
/// 第一条放不下的告警处停止（不跳过后面的小告警，保持前缀性质）。
///
/// 可用预算 = `max_model_tokens - reserved_tokens - 固定开销`；
/// 预算不足时返回空选择（合法结果，不是错误）。
pub fn select_alerts(
    tokenizer: &dyn Tokenizer,
    alerts: &[AlertRecord],
    max_model_tokens: usize,
    reserved_tokens: usize,
) -> Result<Selection> {
    let overhead = PromptOverhead::measure(tokenizer)?;
    let available_tokens = max_model_tokens
        .saturating_sub(reserved_tokens)
        .saturating_sub(overhead.total());

    let mut selection = Selection {
        available_tokens,
        ..Default::default()
    };
    if available_tokens == 0 {
        return Ok(selection);
    }

    for alert in alerts {
        let text = serialize_alert(alert)?;
        let alert_tokens = tokenizer.count_tokens(&text);
        if selection.used_tokens + alert_tokens > available_tokens {
            break;
        }
        selection.used_tokens += alert_tokens;
        selection.serialized.push(text);
    }

    tracing::debug!(
        candidates = alerts.len(),
        selected = selection.len(),
        used_tokens = selection.used_tokens,
        available_tokens = selection.available_tokens,
        "Selected alerts under token budget"
    );

    Ok(selection)
}
