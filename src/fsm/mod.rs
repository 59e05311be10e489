// src/fsm/mod.rs
// Declarative conversation state machine and its PlantUML rendering

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub mod reply;

pub use reply::{decode_reply, decode_reply_strict, FsmTurn, STATE_SEPARATOR};

/// One labeled edge. No event means an automatic transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    pub next_state: String,
}

impl Transition {
    pub fn to(next_state: impl Into<String>) -> Self {
        Self {
            next_state: next_state.into(),
            ..Default::default()
        }
    }

    pub fn on(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn then(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn is_automatic(&self) -> bool {
        self.event.as_deref().is_none_or(str::is_empty)
    }
}

/// A named state. Actions are opaque identifiers interpreted by the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    #[serde(default, rename = "do", skip_serializing_if = "Option::is_none")]
    pub do_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit: Option<String>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

impl State {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_entry(mut self, action: impl Into<String>) -> Self {
        self.entry = Some(action.into());
        self
    }

    pub fn with_do(mut self, action: impl Into<String>) -> Self {
        self.do_action = Some(action.into());
        self
    }

    pub fn with_exit(mut self, action: impl Into<String>) -> Self {
        self.exit = Some(action.into());
        self
    }

    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transitions.push(transition);
        self
    }

    /// `state Name`, plus a braced action block when any action is set
    pub fn render_declaration(&self) -> String {
        let mut out = format!("state {}", self.name);

        let actions: Vec<(&str, &str)> = [
            ("entry", present(&self.entry)),
            ("do", present(&self.do_action)),
            ("exit", present(&self.exit)),
        ]
        .into_iter()
        .filter_map(|(tag, action)| action.map(|a| (tag, a)))
        .collect();

        if !actions.is_empty() {
            out.push_str(" {");
            for (tag, action) in actions {
                out.push_str(&format!("\n  {} / {}()", tag, action));
            }
            out.push_str("\n}");
        }
        out
    }

    /// `<state> --> <target> [: event] [[condition]] [/ action]`
    pub fn render_transition(&self, transition: &Transition) -> String {
        let mut parts = vec![self.name.clone()];
        if !transition.next_state.is_empty() {
            parts.push(format!("--> {}", transition.next_state));
        }
        if let Some(event) = present(&transition.event) {
            parts.push(format!(": {}", event));
        }
        if let Some(condition) = present(&transition.condition) {
            parts.push(format!("[{}]", condition));
        }
        if let Some(action) = present(&transition.action) {
            parts.push(format!("/ {}", action));
        }
        parts.join(" ")
    }

    pub fn render(&self) -> String {
        let mut out = self.render_declaration();
        if !self.transitions.is_empty() {
            out.push_str("\n\n");
            for transition in &self.transitions {
                out.push_str(&self.render_transition(transition));
                out.push('\n');
            }
        }
        out
    }

    pub fn can_reach(&self, target: &str) -> bool {
        self.name == target || self.transitions.iter().any(|t| t.next_state == target)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FsmError {
    #[error("State `{0}` is declared more than once")]
    DuplicateState(String),

    #[error("Unknown {role} state `{name}`")]
    UnknownState { role: &'static str, name: String },

    #[error("Transition from `{from}` targets unknown state `{to}`")]
    UnknownTarget { from: String, to: String },
}

/// The whole conversation graph, validated at construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StateMachineSpec")]
pub struct StateMachine {
    initial: String,
    end: String,
    states: Vec<State>,
}

#[derive(Deserialize)]
struct StateMachineSpec {
    initial: String,
    end: String,
    states: Vec<State>,
}

impl TryFrom<StateMachineSpec> for StateMachine {
    type Error = FsmError;

    fn try_from(spec: StateMachineSpec) -> Result<Self, Self::Error> {
        StateMachine::new(spec.initial, spec.end, spec.states)
    }
}

impl StateMachine {
    pub fn new(initial: impl Into<String>, end: impl Into<String>, states: Vec<State>) -> Result<Self, FsmError> {
        let initial = initial.into();
        let end = end.into();

        let mut names = HashSet::new();
        for state in &states {
            if !names.insert(state.name.as_str()) {
                return Err(FsmError::DuplicateState(state.name.clone()));
            }
        }
        for (role, name) in [("initial", &initial), ("end", &end)] {
            if !names.contains(name.as_str()) {
                return Err(FsmError::UnknownState { role, name: name.clone() });
            }
        }
        for state in &states {
            for transition in &state.transitions {
                if !transition.next_state.is_empty() && !names.contains(transition.next_state.as_str()) {
                    return Err(FsmError::UnknownTarget {
                        from: state.name.clone(),
                        to: transition.next_state.clone(),
                    });
                }
            }
        }

        Ok(Self { initial, end, states })
    }

    /// Load a machine definition from a YAML (or JSON) file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading state machine from {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing state machine {}", path.display()))
    }

    pub fn initial(&self) -> &str {
        &self.initial
    }

    pub fn end(&self) -> &str {
        &self.end
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.iter().find(|s| s.name == name)
    }

    /// Whether a declared transition (or staying put) leads from `from` to `to`.
    /// With no prior state, only the initial state is legal.
    pub fn allows(&self, from: Option<&str>, to: &str) -> bool {
        match from {
            None => to == self.initial,
            Some(from) => self.state(from).is_some_and(|s| s.can_reach(to)),
        }
    }

    /// The `@startuml` … `@enduml` block embedded in FSM prompts
    pub fn render_diagram(&self) -> String {
        let mut states = String::new();
        for state in &self.states {
            states.push_str(&state.render());
            states.push_str("\n\n");
        }

        format!(
            "@startuml\n[*] --> {}\n\n{}\n{} --> [*]\n@enduml",
            self.initial, states, self.end
        )
    }
}
