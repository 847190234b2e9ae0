use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// 单条规则建议（字段名对齐 function calling 模式）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSuggestion {
    #[serde(rename = "CELRule")]
    pub cel_rule: String,
    /// 时间窗口（分钟）
    #[serde(rename = "Timeframe")]
    pub timeframe: i64,
    #[serde(rename = "GroupBy")]
    pub group_by: Vec<String>,
    #[serde(rename = "ChainOfThought")]
    pub chain_of_thought: String,
    #[serde(rename = "WhyTooGeneral")]
    pub why_too_general: String,
    #[serde(rename = "WhyTooSpecific")]
    pub why_too_specific: String,
    #[serde(rename = "ShortRuleName", default)]
    pub short_rule_name: Option<String>,
    /// 1-100 打分
    #[serde(rename = "Score")]
    pub score: i64,
}

/// 模型返回的建议报告。
///
/// `summery` 是历史数据格式里的拼写，serde 层消化掉。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionReport {
    #[serde(rename = "hasResults")]
    pub has_results: bool,
    #[serde(default)]
    pub results: Vec<RuleSuggestion>,
    #[serde(rename = "summery", default)]
    pub summary: Option<String>,
}

impl SuggestionReport {
    /// 无可用告警时的空报告
    pub fn empty() -> Self {
        Self {
            has_results: false,
            results: Vec::new(),
            summary: None,
        }
    }
}

/// 规则建议器 trait（支持多模型扩展）
#[async_trait]
pub trait RuleSuggester: Send + Sync {
    /// 模型提供商名称
    fn provider(&self) -> &str;

    /// 模型名称
    fn model_name(&self) -> &str;

    /// 基于告警批次（JSON 数组文本）生成规则建议
    async fn suggest(&self, alerts_json: &str) -> Result<SuggestionReport>;
}
