// src/prompt/mod.rs
// Prompt strategies: system prompt rendering and the matching reply decoder

use serde_json::{Map, Value};

use crate::codec::RetryToFix;
use crate::llm::types::{Capabilities, LlmMessage, WorkMode};

pub mod examples;
pub mod freeform;
pub mod fsm;
pub mod protocol;

pub use freeform::FreeformStrategy;
pub use fsm::FsmStrategy;
pub use protocol::ProtocolStrategy;

pub(crate) const RULE: &str = "-------------------------------";

/// Who the agent is, who it talks to, and what the model can do
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    pub agent_name: String,
    pub agent_role: String,
    /// Required behavioral steps, rendered as a numbered list
    pub steps: Vec<String>,
    pub user_full_name: String,
    pub user_extra: Option<Map<String, Value>>,
    pub work_mode: WorkMode,
    pub capabilities: Capabilities,
}

impl PromptContext {
    pub fn new(agent_name: impl Into<String>, agent_role: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            agent_role: agent_role.into(),
            ..Default::default()
        }
    }

    pub fn with_user(mut self, full_name: impl Into<String>, extra: Option<Map<String, Value>>) -> Self {
        self.user_full_name = full_name.into();
        self.user_extra = extra;
        self
    }

    pub fn with_steps<I, S>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.steps = steps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_work_mode(mut self, mode: WorkMode) -> Self {
        self.work_mode = mode;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

/// One way of talking to the model. Rendering and decoding are pure.
pub trait PromptStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// System prompt for this strategy. An empty `tools` slice means no catalog.
    fn render_system_message(&self, ctx: &PromptContext, tools: &[Value]) -> String;

    /// Turn a raw model reply into a typed message
    fn decode(&self, raw: &str, ctx: &PromptContext) -> Result<LlmMessage, RetryToFix>;

    /// Hook applied to every user-directed message before sending
    fn augment_outgoing_message(&self, text: &str) -> String {
        text.to_string()
    }

    /// Optional corrective turn to send right after a tool result
    fn message_to_append_after_tool_result(&self, _tool_output: &str, _ctx: &PromptContext) -> Option<LlmMessage> {
        None
    }
}

/// Identity, role and user block shared by freeform and protocol prompts
pub(crate) fn render_preamble(ctx: &PromptContext) -> String {
    let mut out = format!(
        "You are {}.\n\nYour role is {}.\n\n{}\n\nThe name of the user you are interacting with is: {}\n\n",
        ctx.agent_name, ctx.agent_role, RULE, ctx.user_full_name
    );

    if let Some(extra) = ctx.user_extra.as_ref().filter(|e| !e.is_empty()) {
        out.push_str("Here is extra information about the user:\n");
        out.push_str(&serde_json::to_string_pretty(extra).unwrap_or_default());
        out.push_str("\n\n");
    }
    out
}

pub(crate) fn render_steps(steps: &[String]) -> String {
    if steps.is_empty() {
        return String::new();
    }
    let mut out = String::from("Here are the steps you must follow to perform your work.\n\n");
    for (i, step) in steps.iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, step));
    }
    out
}

/// Numbered memory block to splice into a prompt
pub fn format_memories(memories: &[String]) -> String {
    let entries = memories
        .iter()
        .enumerate()
        .map(|(i, entry)| format!("{}. {}", i + 1, entry))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\nYour memories\n\n{}", RULE, entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_preamble_includes_user_extra() {
        let extra = json!({"age": 10}).as_object().cloned();
        let ctx = PromptContext::new("Support Agent", "Provide support").with_user("Jeff Matt", extra);
        let text = render_preamble(&ctx);
        assert!(text.starts_with("You are Support Agent.\n\nYour role is Provide support."));
        assert!(text.contains("interacting with is: Jeff Matt"));
        assert!(text.contains("\"age\": 10"));
    }

    #[test]
    fn test_preamble_skips_missing_extra() {
        let text = render_preamble(&PromptContext::new("A", "B"));
        assert!(!text.contains("extra information"));
    }

    #[test]
    fn test_steps_numbered_from_one() {
        let steps = vec!["Ask".to_string(), "Book".to_string()];
        assert_eq!(
            render_steps(&steps),
            "Here are the steps you must follow to perform your work.\n\n1. Ask\n2. Book\n"
        );
        assert_eq!(render_steps(&[]), "");
    }

    #[test]
    fn test_format_memories() {
        let text = format_memories(&["likes tea".to_string(), "lives in Douala".to_string()]);
        assert!(text.ends_with("Your memories\n\n1. likes tea\n2. lives in Douala"));
    }
}
