// src/prompt/fsm.rs
// State-machine-constrained prompting: the diagram is the only authority

use serde_json::Value;

use super::{PromptContext, PromptStrategy};
use crate::codec::RetryToFix;
use crate::fsm::{decode_reply, decode_reply_strict, FsmTurn, StateMachine};
use crate::llm::types::LlmMessage;

const RULES: [&str; 7] = [
    "You permanently maintain an internal variable `current_state`.",
    "You may produce ONLY responses authorized by the current state.",
    "You may change state ONLY through an explicitly declared transition.",
    "If the user's response is invalid for the current state, you MUST remain in the same state and repeat the question.",
    "You NEVER anticipate future information.",
    "You NEVER ask for multiple pieces of information at once.",
    "You NEVER explain the internal logic or the states.",
];

pub struct FsmStrategy {
    machine: StateMachine,
}

impl FsmStrategy {
    pub fn new(machine: StateMachine) -> Self {
        Self { machine }
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    /// Decode keeping the asserted state, for callers tracking the conversation position
    pub fn decode_turn(&self, raw: &str) -> Result<FsmTurn, RetryToFix> {
        decode_reply(raw, &self.machine)
    }

    /// Like `decode_turn`, but the asserted state must follow a declared transition from `prior`
    pub fn decode_strict(&self, raw: &str, prior: Option<&str>) -> Result<FsmTurn, RetryToFix> {
        decode_reply_strict(raw, &self.machine, prior)
    }
}

impl PromptStrategy for FsmStrategy {
    fn name(&self) -> &'static str {
        "fsm"
    }

    fn render_system_message(&self, ctx: &PromptContext, _tools: &[Value]) -> String {
        let rules = RULES
            .iter()
            .enumerate()
            .map(|(i, rule)| format!("{}. {}", i + 1, rule))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are a conversational agent named {name} driven STRICTLY by a state machine.\n\n\
             ABSOLUTE RULES:\n\n{rules}\n\n\
             ROLE:\n\n{role}\n\n\
             FINITE STATE MACHINE (UNIQUE AUTHORITY):\n\n```pl\n{diagram}\n```\n\n\
             FORMAT TO REPLY TO USER:\n\n```\n[Your message...]\n+++++++\n[current_state]\n```\n",
            name = ctx.agent_name,
            rules = rules,
            role = ctx.agent_role,
            diagram = self.machine.render_diagram(),
        )
    }

    fn decode(&self, raw: &str, _ctx: &PromptContext) -> Result<LlmMessage, RetryToFix> {
        self.decode_turn(raw).map(|turn| turn.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsm::{State, Transition};

    fn strategy() -> FsmStrategy {
        let machine = StateMachine::new(
            "AskName",
            "End",
            vec![
                State::new("AskName")
                    .with_entry("ask_name")
                    .with_transition(Transition::to("AskAge").on("name_provided")),
                State::new("AskAge").with_transition(Transition::to("End").on("age_provided")),
                State::new("End"),
            ],
        )
        .unwrap();
        FsmStrategy::new(machine)
    }

    #[test]
    fn test_prompt_layout() {
        let ctx = PromptContext::new("Intake Bot", "Collect the user's name and age.");
        let prompt = strategy().render_system_message(&ctx, &[]);

        assert!(prompt.starts_with("You are a conversational agent named Intake Bot"));
        assert!(prompt.contains("7. You NEVER explain the internal logic or the states."));
        assert!(prompt.contains("ROLE:\n\nCollect the user's name and age."));
        assert!(prompt.contains("```pl\n@startuml\n[*] --> AskName\n"));
        assert!(prompt.contains("AskName --> AskAge : name_provided"));
        assert!(prompt.contains("End --> [*]\n@enduml\n```"));
        assert!(prompt.ends_with("[Your message...]\n+++++++\n[current_state]\n```\n"));
    }

    #[test]
    fn test_outgoing_messages_untouched() {
        assert_eq!(strategy().augment_outgoing_message("salut"), "salut");
    }
}
