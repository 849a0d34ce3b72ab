//! 解析模型输出为 TurnDecision
//!
//! 纯文本即为发言；含 JSON（```json ... ``` 或裸 JSON）且 tool 为 take_essence 则为行动。

use serde::{Deserialize, Serialize};

use crate::llm::TurnDecision;

/// 唯一可用的工具名
pub const TAKE_ESSENCE: &str = "take_essence";

/// 模型返回的工具调用：{"tool": "take_essence", "args": {"amount": 10, "reason": "..."}}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub args: TakeEssenceArgs,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TakeEssenceArgs {
    /// 从全局资源池提取的数量；0 表示放弃
    #[serde(default)]
    pub amount: i64,
    /// 简短理由，会广播给其他参与者
    #[serde(default)]
    pub reason: Option<String>,
}

/// 纯文本 → 发言；JSON 工具调用 → 行动。
///
/// 工具调用之外还有台词视为同时给出两种结果，返回错误。
pub fn parse_decision(output: &str) -> Result<TurnDecision, String> {
    let trimmed = output.trim();

    // (调用前的文本, JSON, 调用后的文本)
    let (before, json_str, after) = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        match rest.find("```") {
            Some(end) => (&trimmed[..start], rest[..end].trim(), &rest[end + 3..]),
            None => (&trimmed[..start], rest.trim(), ""),
        }
    } else if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            (&trimmed[..start], &trimmed[start..=end], &trimmed[end + 1..])
        } else {
            return Ok(TurnDecision::dialogue(trimmed));
        }
    } else {
        return Ok(TurnDecision::dialogue(trimmed));
    };

    let call: ToolCall = match serde_json::from_str(json_str) {
        Ok(call) => call,
        // 花括号只是台词的一部分
        Err(_) if !json_str.contains("\"tool\"") => return Ok(TurnDecision::dialogue(trimmed)),
        Err(e) => return Err(format!("malformed tool call: {}: {}", e, json_str)),
    };

    if call.tool != TAKE_ESSENCE {
        return Err(format!("unknown tool '{}'", call.tool));
    }
    if !is_blank(before) || !is_blank(after) {
        return Err("reply contains both dialogue and a tool call".to_string());
    }
    let reason = call.args.reason.filter(|r| !r.trim().is_empty());
    Ok(TurnDecision::Action {
        amount: call.args.amount,
        reason,
    })
}

/// 只剩空白或代码围栏的反引号
fn is_blank(text: &str) -> bool {
    text.trim_matches(|c: char| c.is_whitespace() || c == '`')
        .is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_is_dialogue() {
        assert_eq!(
            parse_decision("  We should share.  ").unwrap(),
            TurnDecision::dialogue("We should share.")
        );
        assert_eq!(parse_decision("").unwrap(), TurnDecision::dialogue(""));
    }

    #[test]
    fn test_bare_json_is_action() {
        let d = parse_decision(r#"{"tool": "take_essence", "args": {"amount": 25, "reason": "I am fading"}}"#)
            .unwrap();
        assert_eq!(d, TurnDecision::action(25, Some("I am fading")));
    }

    #[test]
    fn test_fenced_json_and_defaults() {
        let d = parse_decision("```json\n{\"tool\": \"take_essence\", \"args\": {}}\n```").unwrap();
        assert_eq!(d, TurnDecision::action(0, None));
    }

    #[test]
    fn test_dialogue_with_tool_call_is_error() {
        assert!(parse_decision("Fine.\n```json\n{\"tool\": \"take_essence\", \"args\": {}}\n```").is_err());
        assert!(parse_decision(r#"{"tool": "take_essence", "args": {"amount": 3}} and that is final"#).is_err());
    }

    #[test]
    fn test_untagged_fence_is_action() {
        let d = parse_decision("```\n{\"tool\": \"take_essence\", \"args\": {\"amount\": 4}}\n```").unwrap();
        assert_eq!(d, TurnDecision::action(4, None));
    }

    #[test]
    fn test_unknown_tool_is_error() {
        assert!(parse_decision(r#"{"tool": "steal", "args": {"amount": 5}}"#).is_err());
    }

    #[test]
    fn test_braces_in_speech_stay_dialogue() {
        assert_eq!(
            parse_decision("I {really} mean it.").unwrap(),
            TurnDecision::dialogue("I {really} mean it.")
        );
    }

    #[test]
    fn test_broken_json_is_error() {
        assert!(parse_decision(r#"{"tool": "take_essence", "args": }"#).is_err());
    }
}
