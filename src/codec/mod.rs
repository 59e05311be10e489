// src/codec/mod.rs
// Decodes section-delimited model replies into typed messages

use std::collections::BTreeMap;
use std::str::FromStr;

use tracing::debug;

use crate::llm::types::{LlmMessage, MessageKind, Role, ToolCall, WorkMode};

pub mod data;
pub mod sections;

pub use sections::{scan_fields, scan_reply, RawSection};

pub const FINAL_ANSWER_NEEDS_PAYLOAD: &str =
    "For kind == final_answer there must be a `message` or `data` section where you put the answer.";

/// Recoverable decode failure. The instruction goes back to the model as a new user turn.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{instruction}")]
pub struct RetryToFix {
    pub instruction: String,
}

impl RetryToFix {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
        }
    }

    /// Corrective user turn to resend
    pub fn to_user_message(&self) -> LlmMessage {
        LlmMessage::user(self.instruction.clone())
    }
}

/// Section names a reply may use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionName {
    Thought,
    Kind,
    Message,
    Data,
    ToolName,
    ToolArguments,
}

impl SectionName {
    pub const ALL: [SectionName; 6] = [
        SectionName::Thought,
        SectionName::Kind,
        SectionName::Message,
        SectionName::Data,
        SectionName::ToolName,
        SectionName::ToolArguments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionName::Thought => "thought",
            SectionName::Kind => "kind",
            SectionName::Message => "message",
            SectionName::Data => "data",
            SectionName::ToolName => "tool_name",
            SectionName::ToolArguments => "tool_arguments",
        }
    }
}

impl FromStr for SectionName {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SectionName::ALL.into_iter().find(|name| name.as_str() == s).ok_or(())
    }
}

/// Final answers must carry text or data
pub fn ensure_final_answer_payload(message: &LlmMessage) -> Result<(), RetryToFix> {
    if message.kind == MessageKind::FinalAnswer && !message.has_payload() {
        return Err(RetryToFix::new(FINAL_ANSWER_NEEDS_PAYLOAD));
    }
    Ok(())
}

fn non_empty(body: String) -> Option<String> {
    if body.is_empty() { None } else { Some(body) }
}

/// Decode a `tool_arguments` body into field → value
pub fn decode_tool_arguments(body: &str) -> BTreeMap<String, String> {
    scan_fields(body).into_iter().map(|s| (s.name, s.body)).collect()
}

/// Decode a reply written in the explicit section protocol.
///
/// `thought` is dropped. Missing `kind` defaults per work mode. Unknown
/// section names, unknown kinds and malformed `data` are all `RetryToFix`.
pub fn decode_protocol_reply(raw: &str, mode: WorkMode) -> Result<LlmMessage, RetryToFix> {
    let mut kind = None;
    let mut content = None;
    let mut data = None;
    let mut tool_name = None;
    let mut tool_arguments = None;

    for section in scan_reply(raw) {
        let name = section.name.parse::<SectionName>().map_err(|_| {
            RetryToFix::new(format!(
                "Unknown section `{}`. Use only these sections: {}, end.",
                section.name,
                SectionName::ALL.map(|n| n.as_str()).join(", ")
            ))
        })?;

        match name {
            SectionName::Thought => {}
            SectionName::Kind => {
                if !section.body.is_empty() {
                    let parsed = section.body.parse::<MessageKind>().map_err(|_| {
                        RetryToFix::new(format!(
                            "Unknown kind `{}`. kind must be one of: message, tool_call, final_answer.",
                            section.body
                        ))
                    })?;
                    kind = Some(parsed);
                }
            }
            SectionName::Message => content = non_empty(section.body),
            SectionName::Data => {
                data = data::decode_data_section(&section.body).map_err(|e| {
                    RetryToFix::new(format!("The `data` section must be valid YAML ({}).", e))
                })?;
            }
            SectionName::ToolName => tool_name = non_empty(section.body),
            SectionName::ToolArguments => {
                let fields = decode_tool_arguments(&section.body);
                tool_arguments = if fields.is_empty() { None } else { Some(fields) };
            }
        }
    }

    let tool_calls = tool_name.map(|name| vec![ToolCall::function(name, tool_arguments)]);

    let message = LlmMessage {
        role: Role::Assistant,
        content,
        data,
        tool_calls,
        kind: kind.unwrap_or_else(|| mode.default_kind()),
        response_format: None,
    };

    ensure_final_answer_payload(&message)?;
    debug!("Decoded reply: {}", message);
    Ok(message)
}

/// Freeform replies: the text is the content, kind comes from the work mode
pub fn decode_freeform_reply(raw: &str, mode: WorkMode) -> Result<LlmMessage, RetryToFix> {
    let message = LlmMessage {
        role: Role::Assistant,
        content: non_empty(raw.to_string()),
        data: None,
        tool_calls: None,
        kind: mode.default_kind(),
        response_format: None,
    };
    ensure_final_answer_payload(&message)?;
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_thought_never_surfaces() {
        let reply = "+++ thought +++\nsecret plan\n+++ kind +++\nmessage\n+++ message +++\nHi!\n+++ end +++";
        let message = decode_protocol_reply(reply, WorkMode::Chat).unwrap();
        assert_eq!(message.content.as_deref(), Some("Hi!"));
        assert!(!message.to_string().contains("secret plan"));
    }

    #[test]
    fn test_missing_kind_defaults_by_mode() {
        let reply = "+++ message +++\nDone.\n+++ end +++";
        assert_eq!(decode_protocol_reply(reply, WorkMode::Chat).unwrap().kind, MessageKind::Message);
        assert_eq!(
            decode_protocol_reply(reply, WorkMode::Task).unwrap().kind,
            MessageKind::FinalAnswer
        );
    }

    #[test]
    fn test_empty_optional_sections_are_absent() {
        let reply = "+++ kind +++\nmessage\n+++ message +++\nok\n+++ data +++\n\n+++ tool_name +++\n\n+++ tool_arguments +++\n\n+++ end +++";
        let message = decode_protocol_reply(reply, WorkMode::Task).unwrap();
        assert!(message.data.is_none());
        assert!(message.tool_calls.is_none());
    }

    #[test]
    fn test_final_answer_with_data_only_is_valid() {
        let reply = "+++ kind +++\nfinal_answer\n+++ data +++\ntotal: 3\n+++ end +++";
        let message = decode_protocol_reply(reply, WorkMode::Task).unwrap();
        assert_eq!(message.data, Some(json!({"total": 3})));
        assert!(message.content.is_none());
    }

    #[test]
    fn test_unknown_section_asks_for_fix() {
        let reply = "+++ kind +++\nmessage\n+++ mesage +++\nhi\n+++ end +++";
        let err = decode_protocol_reply(reply, WorkMode::Chat).unwrap_err();
        assert!(err.instruction.contains("`mesage`"));
    }

    #[test]
    fn test_unknown_kind_asks_for_fix() {
        let reply = "+++ kind +++\nanswer\n+++ message +++\nhi\n+++ end +++";
        let err = decode_protocol_reply(reply, WorkMode::Chat).unwrap_err();
        assert!(err.instruction.contains("`answer`"));
    }

    #[test]
    fn test_bad_yaml_asks_for_fix() {
        let reply = "+++ kind +++\nmessage\n+++ message +++\nhi\n+++ data +++\na: [1,\n+++ end +++";
        let err = decode_protocol_reply(reply, WorkMode::Chat).unwrap_err();
        assert!(err.instruction.starts_with("The `data` section"));
    }

    #[test]
    fn test_tool_name_without_arguments() {
        let reply = "+++ kind +++\ntool_call\n+++ tool_name +++\ncurrent_day\n+++ end +++";
        let message = decode_protocol_reply(reply, WorkMode::Task).unwrap();
        let call = message.first_tool_call().unwrap();
        assert_eq!(call.name, "current_day");
        assert_eq!(call.arguments, None);
    }

    #[test]
    fn test_empty_arguments_section_is_absent() {
        let reply = "+++ kind +++\ntool_call\n+++ tool_name +++\nnow\n+++ tool_arguments +++\n\n+++ end +++";
        let message = decode_protocol_reply(reply, WorkMode::Task).unwrap();
        assert_eq!(message.first_tool_call().unwrap().arguments, None);
    }

    #[test]
    fn test_empty_data_is_not_a_final_answer() {
        for body in ["{}", "[]", "''", "~"] {
            let reply = format!("+++ kind +++\nfinal_answer\n+++ data +++\n{}\n+++ end +++", body);
            let err = decode_protocol_reply(&reply, WorkMode::Task).unwrap_err();
            assert_eq!(err.instruction, FINAL_ANSWER_NEEDS_PAYLOAD, "data body {:?}", body);
        }
    }

    #[test]
    fn test_freeform_task_reply_needs_text() {
        assert!(decode_freeform_reply("", WorkMode::Task).is_err());
        let message = decode_freeform_reply("  raw text  ", WorkMode::Chat).unwrap();
        assert_eq!(message.content.as_deref(), Some("  raw text  "));
    }

    #[test]
    fn test_retry_becomes_user_turn() {
        let turn = RetryToFix::new(FINAL_ANSWER_NEEDS_PAYLOAD).to_user_message();
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.content.as_deref(), Some(FINAL_ANSWER_NEEDS_PAYLOAD));
    }
}
