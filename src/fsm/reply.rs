// src/fsm/reply.rs
// FSM-mode replies: free text, a run of `+`, then the asserted state name

use tracing::debug;

use super::StateMachine;
use crate::codec::{ensure_final_answer_payload, RetryToFix};
use crate::llm::types::{LlmMessage, MessageKind, Role};

pub const STATE_SEPARATOR: char = '+';

/// A decoded FSM turn and the state the model claims to be in
#[derive(Debug, Clone, PartialEq)]
pub struct FsmTurn {
    pub message: LlmMessage,
    pub state: Option<String>,
}

/// Split into (visible text, asserted state).
///
/// State names never contain the separator, so the split happens on the last
/// separator run: `+` inside the message text (`2+2`) stays in the content.
/// No separator means no asserted state.
pub fn split_reply(raw: &str) -> (Option<String>, Option<String>) {
    let non_empty = |s: &str| {
        let s = s.trim();
        if s.is_empty() { None } else { Some(s.to_string()) }
    };

    match raw.rfind(STATE_SEPARATOR) {
        Some(last) => {
            let run_start = raw[..last].trim_end_matches(STATE_SEPARATOR).len();
            (non_empty(&raw[..run_start]), non_empty(&raw[last + 1..]))
        }
        None => (non_empty(raw), None),
    }
}

/// Trusting decode: the asserted state is taken at face value
pub fn decode_reply(raw: &str, machine: &StateMachine) -> Result<FsmTurn, RetryToFix> {
    let (content, state) = split_reply(raw);

    let kind = if state.as_deref() == Some(machine.end()) {
        MessageKind::FinalAnswer
    } else {
        MessageKind::Message
    };

    let message = LlmMessage {
        role: Role::Assistant,
        content,
        data: None,
        tool_calls: None,
        kind,
        response_format: None,
    };
    ensure_final_answer_payload(&message)?;

    debug!("FSM reply asserts state {:?} ({})", state, kind);
    Ok(FsmTurn { message, state })
}

/// Decode and reject states the graph does not authorize from `prior`
pub fn decode_reply_strict(raw: &str, machine: &StateMachine, prior: Option<&str>) -> Result<FsmTurn, RetryToFix> {
    let turn = decode_reply(raw, machine)?;

    let Some(state) = turn.state.as_deref() else {
        return Err(RetryToFix::new(format!(
            "End your reply with a line of `{}` characters followed by the current state name.",
            STATE_SEPARATOR
        )));
    };

    if machine.state(state).is_none() {
        let known = machine.states().iter().map(|s| s.name.as_str()).collect::<Vec<_>>().join(", ");
        return Err(RetryToFix::new(format!(
            "`{}` is not a declared state. The declared states are: {}.",
            state, known
        )));
    }

    if !machine.allows(prior, state) {
        let from = prior.unwrap_or("[*]");
        return Err(RetryToFix::new(format!(
            "No declared transition leads from `{}` to `{}`. Stay in `{}` or follow one of its transitions.",
            from,
            state,
            prior.unwrap_or(machine.initial())
        )));
    }

    Ok(turn)
}
