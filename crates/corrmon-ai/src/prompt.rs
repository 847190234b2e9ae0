//! 规则建议的提示词与 function calling 模式定义。

use serde_json::json;

/// 系统提示词：描述告警形态、关联规则格式与打分要求
pub const SYSTEM_PROMPT: &str = r#"* We operate an alert correlation platform that ingests alerts from many monitoring systems.
* Alerts arrive as JSON objects. They come from different sources and configurations, so they do not share a common shape even within one project.
* Some alerts are correlated: they indicate the same underlying problem and fire within the same timeframe.
* We describe grouping rules with a CEL filter, group-by fields and a timeframe in minutes. Alerts that pass the CEL filter, fall into the same timeframe and share the group-by field values are grouped into one incident. A rule may have only group-by fields and no CEL filter.
* Examples of CEL filters (illustrative only):
    1. (service == "backend"), group by: empty
    2. (labels.alertname.contains("cpu")), group by: empty
* You will receive a batch of past alerts. Identify which alerts look related and propose grouping rules (CEL filter, group-by fields, timeframe in minutes) for them. A human reviews and approves every suggestion, so a proposal does not need certainty, but it must be plausible.
* For each proposal, explain your reasoning, argue why it might be too general and why it might be too specific, and assign a score from 1 to 100.
* Avoid rules that are too general. Grouping every alert from one aggregator does not make sense, because many unrelated systems write alerts through it.
* If you cannot come up with suggestions that make sense, say so."#;

/// OpenAI function calling 的结果模式。
///
/// 字段名（含 `summery` 的历史拼写）是对外数据格式的一部分，不能改。
pub fn suggestion_functions() -> serde_json::Value {
    json!([
        {
            "name": "analyze_results",
            "description": "Analyze and return results based on the given criteria, including chain of thought and critical analysis of each rule",
            "parameters": {
                "type": "object",
                "properties": {
                    "hasResults": {
                        "type": "boolean",
                        "description": "Indicates whether there are any meaningful results to return"
                    },
                    "results": {
                        "type": "array",
                        "description": "An array of analysis results",
                        "items": {
                            "type": "object",
                            "properties": {
                                "CELRule": {
                                    "type": "string",
                                    "description": "Common Expression Language (CEL) rule describing the condition to match"
                                },
                                "Timeframe": {
                                    "type": "integer",
                                    "description": "The time window in minutes for analyzing the data"
                                },
                                "GroupBy": {
                                    "type": "array",
                                    "description": "An array of fields to group the results by, e.g., ['labels.host_name']",
                                    "items": { "type": "string" }
                                },
                                "ChainOfThought": {
                                    "type": "string",
                                    "description": "Detailed reasoning process for arriving at this rule and its parameters"
                                },
                                "WhyTooGeneral": {
                                    "type": "string",
                                    "description": "Devil's advocate argument for why this rule might be too general or broad"
                                },
                                "WhyTooSpecific": {
                                    "type": "string",
                                    "description": "Devil's advocate argument for why this rule might be too specific or narrow"
                                },
                                "ShortRuleName": {
                                    "type": "string",
                                    "description": "Short name for the rule, 20 characters or less"
                                },
                                "Score": {
                                    "type": "integer",
                                    "description": "A score from 1 to 100 indicating the severity or importance of the result",
                                    "minimum": 1,
                                    "maximum": 100
                                }
                            },
                            "required": ["CELRule", "Timeframe", "GroupBy", "Score", "ChainOfThought", "WhyTooGeneral", "WhyTooSpecific"],
                            "additionalProperties": false
                        }
                    },
                    "summery": {
                        "type": "string",
                        "description": "One liner summery of the results, mention what you noticed in the data and how you created the rules"
                    }
                },
                "required": ["hasResults", "results"],
                "additionalProperties": false
            }
        }
    ])
}

/// 把已序列化的告警拼成用户消息（JSON 数组文本）。
///
/// 必须复用选择阶段计过 token 的文本，保证预算与实际发送一致。
pub fn alerts_user_content(serialized: &[String]) -> String {
    format!("[{}]", serialized.join(","))
}
