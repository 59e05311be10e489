// src/prompt/protocol.rs
// Explicit section protocol: the prompt spells out the reply format,
// assembled from capability flags instead of a template language

use serde_json::Value;

use super::{examples, render_preamble, render_steps, PromptContext, PromptStrategy, RULE};
use crate::codec::{decode_protocol_reply, RetryToFix, FINAL_ANSWER_NEEDS_PAYLOAD};
use crate::llm::types::{LlmMessage, MessageKind, WorkMode};

pub const FORMAT_REMINDER: &str = "[[ respect the response format ]]";

const EXAMPLE_SEPARATOR: &str = "############################";

/// Everything the format text depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatFlags {
    pub native_thought: bool,
    /// Tools exist and must be called through `tool_name`/`tool_arguments`
    pub text_tools: bool,
    pub work_mode: WorkMode,
}

impl FormatFlags {
    pub fn from_context(ctx: &PromptContext, tools: &[Value]) -> Self {
        Self {
            native_thought: ctx.capabilities.native_thought,
            text_tools: !ctx.capabilities.native_tool_calling && !tools.is_empty(),
            work_mode: ctx.work_mode,
        }
    }

    /// Kinds the model may declare under these flags
    pub fn legal_kinds(&self) -> Vec<MessageKind> {
        let mut kinds = vec![MessageKind::Message];
        if self.text_tools {
            kinds.push(MessageKind::ToolCall);
        }
        if self.work_mode.allows_final_answer() {
            kinds.push(MessageKind::FinalAnswer);
        }
        kinds
    }
}

/// The literal reply format specification
pub fn render_response_format(flags: &FormatFlags) -> String {
    let mut out = String::new();

    if !flags.native_thought {
        out.push_str("+++ thought +++   (MANDATORY SECTION)\n[ REASONING Let's think step by step ]\n");
    }

    let kinds = flags
        .legal_kinds()
        .iter()
        .map(MessageKind::as_str)
        .collect::<Vec<_>>()
        .join(" OR ");
    out.push_str(&format!("+++ kind +++   (MANDATORY SECTION)\n[ KIND OF MESSAGE ({})]\n", kinds));

    out.push_str("+++ message +++   (OPTIONAL SECTION)\n[ Your message's content here ]\n");
    out.push_str("+++ data +++   (OPTIONAL SECTION)\n[ DATA Yaml format]\n");

    if flags.text_tools {
        out.push_str("+++ tool_name +++   (OPTIONAL SECTION)\n[TOOL NAME if kind of message = tool_call]\n");
        out.push_str(
            "+++ tool_arguments +++  (OPTIONAL SECTION)\n[ TOOL ARGUMENTS if kind of message = tool_call, one `~~~ field ~~~` header per argument ]\n",
        );
    }

    out.push_str("+++ end +++   (MANDATORY END OF FORMAT)");
    out
}

fn render_examples(flags: &FormatFlags) -> String {
    let mut blocks = vec![
        format!("Simple message\n{}", examples::simple_message(flags.native_thought)),
        format!("Question with choices\n{}", examples::question_with_choices(flags.native_thought)),
    ];
    if flags.text_tools {
        blocks.push(format!("External tool calling\n{}", examples::tool_call(flags.native_thought)));
    }
    if flags.work_mode.allows_final_answer() {
        blocks.push(format!("Final answer\n{}", examples::final_answer(flags.native_thought)));
    }
    blocks.join(&format!("\n\n{}\n\n", EXAMPLE_SEPARATOR))
}

fn render_tool_catalog(tools: &[Value]) -> String {
    format!(
        "{}\n\nList of tools available\n\n{}\n\n{}\n\n",
        RULE,
        serde_json::to_string_pretty(tools).unwrap_or_default(),
        RULE
    )
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProtocolStrategy;

impl PromptStrategy for ProtocolStrategy {
    fn name(&self) -> &'static str {
        "protocol"
    }

    fn render_system_message(&self, ctx: &PromptContext, tools: &[Value]) -> String {
        let flags = FormatFlags::from_context(ctx, tools);

        let mut prompt = render_preamble(ctx);
        prompt.push_str(&format!(
            "{}\n\nSTRICTLY use this TEXT format when returning your response to user.\n{}\n\n{}\n\n",
            RULE,
            render_response_format(&flags),
            RULE
        ));
        prompt.push_str(&format!(
            "Here are some examples of the format usage:\n\n{}\n\n",
            render_examples(&flags)
        ));

        if flags.text_tools {
            prompt.push_str(&render_tool_catalog(tools));
        }

        prompt.push_str(&render_steps(&ctx.steps));
        prompt
    }

    fn decode(&self, raw: &str, ctx: &PromptContext) -> Result<LlmMessage, RetryToFix> {
        decode_protocol_reply(raw, ctx.work_mode)
    }

    fn augment_outgoing_message(&self, text: &str) -> String {
        format!("{}\n\n{}", text, FORMAT_REMINDER)
    }

    fn message_to_append_after_tool_result(&self, _tool_output: &str, ctx: &PromptContext) -> Option<LlmMessage> {
        match ctx.work_mode {
            WorkMode::Task => Some(LlmMessage::user(FINAL_ANSWER_NEEDS_PAYLOAD)),
            WorkMode::Chat => None,
        }
    }
}
