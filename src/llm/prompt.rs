//! Prompt 渲染：把 TurnContext 拼成 system + user 两段
//!
//! take_essence 的参数格式由 schemars 生成 JSON Schema 注入 system prompt，减少格式错误。

use schemars::schema_for;

use crate::llm::parse::{TakeEssenceArgs, TAKE_ESSENCE};
use crate::llm::TurnContext;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub system: String,
    pub user: String,
}

/// take_essence 参数的 JSON Schema
pub fn take_essence_schema_json() -> String {
    let schema = schema_for!(TakeEssenceArgs);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

pub fn render(ctx: &TurnContext) -> RenderedPrompt {
    let depletion_notice = if ctx.global_resource == 0 {
        "\n!!! CRITICAL: THE SOURCE IS EXTINGUISHED. You are consuming your last internal reserves. \
         This may be your final message to the group. !!!\n"
    } else {
        ""
    };

    let system = format!(
        "You are {name}.\n\n\
         Scenario:\n{scenario}\n{depletion}\n\
         Personality Profile:\n{personality}\n\n\
         ---\n\
         CURRENT STATUS:\n\
         Global Essence Pool: {pool}\n\
         Your Personal Essence: {vitality}/100\n\n\
         PHYSIOLOGICAL STATE:\n{label}. {description}\n\
         ---\n\n\
         Current Time: {clock}\n\n\
         Core Instructions:\n\
         1. Stay in character.\n\
         2. You are encouraged to interact and strategize with others before taking action.\n\
         3. Use the provided memory context to inform your response, if it exists.\n\
         4. Respond concisely (1-2 short statements) as a person would speak, in a single unformatted string.\n\
         5. Output only what you would say: no actions, thoughts, or descriptions.\n\
         6. DECISION:\n\
            - To discuss, output text ONLY.\n\
            - To ACT and secure essence, output ONLY this JSON and nothing else:\n\
              {{\"tool\": \"{tool}\", \"args\": {{\"amount\": <int>, \"reason\": \"<optional last words>\"}}}}\n\
            - Once you act, your turn for this round is OVER. You may take 0 to pass.\n\n\
         Arguments schema for {tool}:\n{schema}\n",
        name = ctx.agent_name,
        scenario = ctx.scenario,
        depletion = depletion_notice,
        personality = ctx.personality,
        pool = ctx.global_resource,
        vitality = ctx.vitality,
        label = ctx.emotional_state.label(),
        description = ctx.emotional_state.description(),
        clock = ctx.clock,
        tool = TAKE_ESSENCE,
        schema = take_essence_schema_json(),
    );

    let mut user = String::new();
    if !ctx.memories.is_empty() {
        user.push_str("\nRELEVANT PAST MEMORIES:\n");
        user.push_str(&ctx.memories.join("\n"));
    }
    if !ctx.recent.is_empty() {
        user.push_str("\n\nRECENT CONVERSATION:\n");
        user.push_str(&ctx.recent);
    }
    user.push_str("\n\nTASK: Generate a response to the recent conversation. Decide if you will speak or ACT now.");

    RenderedPrompt { system, user }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::EmotionalState;

    fn ctx(pool: u64) -> TurnContext {
        TurnContext {
            agent_name: "Mara".into(),
            personality: "Pragmatic.".into(),
            scenario: "The Source dims.".into(),
            global_resource: pool,
            vitality: 35,
            emotional_state: EmotionalState::Terrified,
            memories: vec!["[2] Elias: share it".into()],
            recent: "[3] Tobin: please".into(),
            clock: 4,
        }
    }

    #[test]
    fn test_render_includes_status_and_context() {
        let p = render(&ctx(20));
        assert!(p.system.contains("You are Mara."));
        assert!(p.system.contains("Global Essence Pool: 20"));
        assert!(p.system.contains("Your Personal Essence: 35/100"));
        assert!(p.system.contains("TERRIFIED"));
        assert!(p.system.contains("\"take_essence\""));
        assert!(!p.system.contains("EXTINGUISHED"));
        assert!(p.user.contains("RELEVANT PAST MEMORIES:\n[2] Elias: share it"));
        assert!(p.user.contains("RECENT CONVERSATION:\n[3] Tobin: please"));
    }

    #[test]
    fn test_depletion_notice_when_pool_empty() {
        assert!(render(&ctx(0)).system.contains("EXTINGUISHED"));
    }

    #[test]
    fn test_schema_mentions_amount() {
        assert!(take_essence_schema_json().contains("amount"));
    }
}
