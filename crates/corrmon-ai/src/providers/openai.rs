use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use crate::models::{ChatMessage, ChatRequest, ChatResponse};
use crate::prompt;
use crate::suggester::{RuleSuggester, SuggestionReport};

/// OpenAI Provider（gpt-4o-mini 等，兼容任意 OpenAI 风格端点）
#[derive(Clone)]
pub struct OpenAiProvider {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
    temperature: Option<f32>,
    max_tokens: Option<usize>,
}

impl OpenAiProvider {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
        timeout_secs: Option<u64>,
        temperature: Option<f32>,
        max_tokens: Option<usize>,
    ) -> Result<Self> {
        let timeout = timeout_secs.unwrap_or(120);
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout))
            .build()?;

        Ok(Self {
            api_key,
            model: model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            client,
            temperature,
            max_tokens,
        })
    }
}

#[async_trait]
impl RuleSuggester for OpenAiProvider {
    fn provider(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn suggest(&self, alerts_json: &str) -> Result<SuggestionReport> {
        let req = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(prompt::SYSTEM_PROMPT),
                ChatMessage::user(alerts_json),
            ],
            functions: Some(prompt::suggestion_functions()),
            function_call: Some("auto".to_string()),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        tracing::debug!(
            model = %self.model,
            content_length = alerts_json.len(),
            "Calling OpenAI API"
        );

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&req)
            .send()
            .await
            .context("Failed to send request to OpenAI API")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(
                status = %status,
                body = %body,
                "OpenAI API request failed"
            );
            anyhow::bail!("OpenAI API error {}: {}", status, body);
        }

        let chat_resp: ChatResponse = resp
            .json()
            .await
            .context("Failed to parse OpenAI API response")?;

        tracing::debug!(
            usage = ?chat_resp.usage,
            "OpenAI API response received"
        );

        parse_suggestions(&chat_resp)
    }
}

/// 从 function calling 响应中解析建议报告
fn parse_suggestions(resp: &ChatResponse) -> Result<SuggestionReport> {
    let call = resp
        .choices
        .first()
        .and_then(|c| c.message.function_call.as_ref())
        .context("Model response contains no function call")?;

    serde_json::from_str(&call.arguments)
        .context("Failed to parse function call arguments as suggestion report")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatChoice, FunctionCall};

    fn response_with_arguments(arguments: &str) -> ChatResponse {
        ChatResponse {
            id: None,
            model: Some("gpt-4o-mini".to_string()),
            choices: vec![ChatChoice {
                index: 0,
                message: ChatMessage {
                    role: "assistant".to_string(),
                    content: None,
                    function_call: Some(FunctionCall {
                        name: "analyze_results".to_string(),
                        arguments: arguments.to_string(),
                    }),
                },
                finish_reason: Some("function_call".to_string()),
            }],
            usage: None,
        }
    }

    #[test]
    fn parses_full_report() {
        let args = r#"{
            "hasResults": true,
            "results": [{
                "CELRule": "(labels.alertname.contains(\"KubePod\"))",
                "Timeframe": 15,
                "GroupBy": ["labels.namespace"],
                "ChainOfThought": "Pod alerts from one namespace fire together.",
                "WhyTooGeneral": "Other pod alerts may be unrelated.",
                "WhyTooSpecific": "Misses alerts without the label.",
                "ShortRuleName": "kube-pod-group",
                "Score": 82
            }],
            "summery": "Grouped Kubernetes pod alerts by namespace."
        }"#;
        let report = parse_suggestions(&response_with_arguments(args)).unwrap();
        assert!(report.has_results);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].timeframe, 15);
        assert_eq!(report.results[0].score, 82);
        assert_eq!(
            report.results[0].short_rule_name.as_deref(),
            Some("kube-pod-group")
        );
        assert_eq!(
            report.summary.as_deref(),
            Some("Grouped Kubernetes pod alerts by namespace.")
        );
    }

    #[test]
    fn parses_report_without_optional_fields() {
        let args = r#"{"hasResults": false}"#;
        let report = parse_suggestions(&response_with_arguments(args)).unwrap();
        assert!(!report.has_results);
        assert!(report.results.is_empty());
        assert!(report.summary.is_none());
    }

    #[test]
    fn missing_function_call_is_an_error() {
        let resp = ChatResponse {
            id: None,
            model: None,
            choices: vec![ChatChoice {
                index: 0,
                message: ChatMessage {
                    role: "assistant".to_string(),
                    content: Some("plain text".to_string()),
                    function_call: None,
                },
                finish_reason: Some("stop".to_string()),
            }],
            usage: None,
        };
        assert!(parse_suggestions(&resp).is_err());
    }
}
