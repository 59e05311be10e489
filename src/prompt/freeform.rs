// src/prompt/freeform.rs
// No response contract: the reply text is the message

use serde_json::Value;

use super::{render_preamble, render_steps, PromptContext, PromptStrategy};
use crate::codec::{decode_freeform_reply, RetryToFix};
use crate::llm::types::LlmMessage;

#[derive(Debug, Clone, Copy, Default)]
pub struct FreeformStrategy;

impl PromptStrategy for FreeformStrategy {
    fn name(&self) -> &'static str {
        "freeform"
    }

    fn render_system_message(&self, ctx: &PromptContext, _tools: &[Value]) -> String {
        let mut prompt = render_preamble(ctx);
        prompt.push_str(&render_steps(&ctx.steps));
        prompt
    }

    fn decode(&self, raw: &str, ctx: &PromptContext) -> Result<LlmMessage, RetryToFix> {
        decode_freeform_reply(raw, ctx.work_mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::{MessageKind, WorkMode};

    #[test]
    fn test_no_format_contract() {
        let ctx = PromptContext::new("Helper", "answer questions").with_steps(["Greet"]);
        let prompt = FreeformStrategy.render_system_message(&ctx, &[]);
        assert!(!prompt.contains("+++"));
        assert!(prompt.ends_with("1. Greet\n"));
    }

    #[test]
    fn test_reply_is_verbatim() {
        let ctx = PromptContext::new("Helper", "chat").with_work_mode(WorkMode::Chat);
        let message = FreeformStrategy.decode("+++ kind +++\nnot parsed", &ctx).unwrap();
        assert_eq!(message.kind, MessageKind::Message);
        assert_eq!(message.content.as_deref(), Some("+++ kind +++\nnot parsed"));
        assert_eq!(FreeformStrategy.augment_outgoing_message("hi"), "hi");
    }
}
