// src/llm/types.rs
// Message, tool call and capability types shared by prompts, codec and gateway

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Speaker of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Closed classification of a decoded reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Message,
    ToolCall,
    FinalAnswer,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Message => "message",
            MessageKind::ToolCall => "tool_call",
            MessageKind::FinalAnswer => "final_answer",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "message" => Ok(MessageKind::Message),
            "tool_call" => Ok(MessageKind::ToolCall),
            "final_answer" => Ok(MessageKind::FinalAnswer),
            _ => Err(()),
        }
    }
}

/// How the agent is driven: to completion of a task, or as an open conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkMode {
    #[default]
    Task,
    Chat,
}

impl WorkMode {
    /// Kind assumed when a reply does not declare one
    pub fn default_kind(&self) -> MessageKind {
        match self {
            WorkMode::Task => MessageKind::FinalAnswer,
            WorkMode::Chat => MessageKind::Message,
        }
    }

    /// Whether `final_answer` is a legal terminal kind in this mode
    pub fn allows_final_answer(&self) -> bool {
        matches!(self, WorkMode::Task)
    }
}

impl FromStr for WorkMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "task" => Ok(WorkMode::Task),
            "chat" => Ok(WorkMode::Chat),
            _ => Err(()),
        }
    }
}

/// What the underlying model can do natively
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// Provider-side function calling
    pub native_tool_calling: bool,
    /// Hidden reasoning before the visible reply
    pub native_thought: bool,
}

/// A request from the model to run one tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(rename = "type")]
    pub call_type: String,
    /// Raw field values; coercion to the tool's signature happens in the tool layer.
    /// `None` when the model sent no arguments at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<BTreeMap<String, String>>,
}

impl ToolCall {
    pub fn function(name: impl Into<String>, arguments: Option<BTreeMap<String, String>>) -> Self {
        Self {
            name: name.into(),
            call_type: "function".to_string(),
            arguments,
        }
    }

    /// Build from a provider-native call whose arguments arrive as a JSON object string.
    /// Non-string values keep their JSON text; a blank string or `{}` means no arguments.
    pub fn from_json_arguments(name: impl Into<String>, arguments: &str) -> Result<Self, String> {
        let mut fields = BTreeMap::new();
        if !arguments.trim().is_empty() {
            let parsed: Value = serde_json::from_str(arguments)
                .map_err(|e| format!("tool arguments are not valid JSON: {}", e))?;
            let object = parsed
                .as_object()
                .ok_or_else(|| "tool arguments must be a JSON object".to_string())?;
            for (key, value) in object {
                let text = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                fields.insert(key.clone(), text);
            }
        }
        let arguments = if fields.is_empty() { None } else { Some(fields) };
        Ok(Self::function(name, arguments))
    }

    /// Value of one argument field, if present
    pub fn argument(&self, field: &str) -> Option<&str> {
        self.arguments.as_ref()?.get(field).map(String::as_str)
    }
}

/// `null`, blank strings and empty collections carry nothing
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(text) => text.trim().is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// One chat message, either sent to or decoded from the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    pub kind: MessageKind,
    /// Expected-output schema attached to a user turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,
}

impl LlmMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            data: None,
            tool_calls: None,
            kind: MessageKind::Message,
            response_format: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn with_response_format(mut self, schema: Value) -> Self {
        self.response_format = Some(schema);
        self
    }

    /// True when the message carries non-empty text or non-empty structured data
    pub fn has_payload(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.is_empty())
            || self.data.as_ref().is_some_and(|d| !is_empty_value(d))
    }

    pub fn first_tool_call(&self) -> Option<&ToolCall> {
        self.tool_calls.as_ref().and_then(|calls| calls.first())
    }
}

impl fmt::Display for LlmMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.role.as_str(), self.kind)?;
        if let Some(content) = &self.content {
            write!(f, " content={:?}", content)?;
        }
        if let Some(data) = &self.data {
            write!(f, " data={}", data)?;
        }
        if let Some(calls) = &self.tool_calls {
            for call in calls {
                match &call.arguments {
                    Some(arguments) => write!(f, " tool={}({:?})", call.name, arguments)?,
                    None => write!(f, " tool={}()", call.name)?,
                }
            }
        }
        Ok(())
    }
}
