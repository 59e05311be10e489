// src/lib.rs

pub mod codec;
pub mod config;
pub mod fsm;
pub mod llm;
pub mod prompt;
