// src/main.rs

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use parley::codec::RetryToFix;
use parley::config::CONFIG;
use parley::fsm::StateMachine;
use parley::llm::{Capabilities, CompletionGateway, LlmMessage, OpenAiCompatibleTransport, WorkMode};
use parley::prompt::{FreeformStrategy, FsmStrategy, PromptContext, PromptStrategy, ProtocolStrategy};

const MAX_FIX_ATTEMPTS: usize = 3;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Render prompt contracts, decode model replies, run one completion")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the system prompt for a strategy
    Render {
        #[command(flatten)]
        agent: AgentArgs,
    },
    /// Decode a model reply read from stdin and print it as JSON
    Decode {
        #[command(flatten)]
        agent: AgentArgs,

        /// Reject FSM states not reachable from --prior-state
        #[arg(long)]
        strict: bool,

        /// State asserted by the previous FSM turn
        #[arg(long)]
        prior_state: Option<String>,
    },
    /// Send one user message through the configured provider and decode the reply
    Ask {
        #[command(flatten)]
        agent: AgentArgs,

        message: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyKind {
    Freeform,
    Protocol,
    Fsm,
}

#[derive(clap::Args)]
struct AgentArgs {
    #[arg(long, value_enum, default_value = "protocol")]
    strategy: StrategyKind,

    #[arg(long, default_value = "Assistant")]
    agent_name: String,

    #[arg(long, default_value = "help the user")]
    role: String,

    #[arg(long, default_value = "")]
    user_name: String,

    /// Behavioral step, repeatable
    #[arg(long = "step")]
    steps: Vec<String>,

    /// task or chat (defaults to PARLEY_WORK_MODE)
    #[arg(long)]
    mode: Option<String>,

    #[arg(long)]
    native_tools: bool,

    #[arg(long)]
    native_thought: bool,

    /// JSON file holding an array of tool schemas
    #[arg(long)]
    tools: Option<PathBuf>,

    /// YAML/JSON state machine definition (required for --strategy fsm)
    #[arg(long)]
    fsm: Option<PathBuf>,
}

impl AgentArgs {
    fn context(&self) -> Result<PromptContext> {
        let mode = self.mode.as_deref().unwrap_or(&CONFIG.work_mode);
        let work_mode: WorkMode = mode
            .parse()
            .map_err(|_| anyhow!("invalid work mode '{}', expected task or chat", mode))?;

        Ok(PromptContext::new(&self.agent_name, &self.role)
            .with_user(&self.user_name, None)
            .with_steps(self.steps.iter().cloned())
            .with_work_mode(work_mode)
            .with_capabilities(Capabilities {
                native_tool_calling: self.native_tools,
                native_thought: self.native_thought,
            }))
    }

    fn tools(&self) -> Result<Vec<Value>> {
        let Some(path) = &self.tools else {
            return Ok(Vec::new());
        };
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("{} must hold a JSON array", path.display()))
    }

    fn fsm_strategy(&self) -> Result<FsmStrategy> {
        let path = self
            .fsm
            .as_ref()
            .ok_or_else(|| anyhow!("--fsm <file> is required for the fsm strategy"))?;
        Ok(FsmStrategy::new(StateMachine::from_file(path)?))
    }

    fn strategy(&self) -> Result<Box<dyn PromptStrategy>> {
        Ok(match self.strategy {
            StrategyKind::Freeform => Box::new(FreeformStrategy),
            StrategyKind::Protocol => Box::new(ProtocolStrategy),
            StrategyKind::Fsm => Box::new(self.fsm_strategy()?),
        })
    }
}

fn print_json(message: &LlmMessage) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(message)?);
    Ok(())
}

fn retry_exit(fix: RetryToFix) -> ! {
    eprintln!("retry: {}", fix.instruction);
    std::process::exit(2);
}

async fn ask(agent: &AgentArgs, user_message: &str) -> Result<()> {
    let ctx = agent.context()?;
    let strategy = agent.strategy()?;
    let tools = agent.tools()?;

    let transport = Arc::new(OpenAiCompatibleTransport::new(CONFIG.timeout(), CONFIG.azure_api_version.clone())?);
    let mut gateway = CompletionGateway::from_config(&CONFIG, transport)?;
    info!("Asking {} via {} ({} strategy)", gateway.model(), CONFIG.provider, strategy.name());

    let mut messages = vec![
        LlmMessage::system(strategy.render_system_message(&ctx, &tools)),
        LlmMessage::user(strategy.augment_outgoing_message(user_message)),
    ];
    // Native tool calling takes the catalog on the wire; otherwise it lives in the prompt
    let wire_tools: &[Value] = if ctx.capabilities.native_tool_calling { &tools } else { &[] };

    for _ in 0..MAX_FIX_ATTEMPTS {
        let reply = gateway.complete(&messages, wire_tools, None).await?;
        if reply.tool_calls.is_some() {
            return print_json(&reply);
        }

        let raw = reply.content.clone().unwrap_or_default();
        match strategy.decode(&raw, &ctx) {
            Ok(message) => return print_json(&message),
            Err(fix) => {
                warn!("Reply rejected, asking the model to fix it: {}", fix);
                messages.push(LlmMessage::assistant(raw));
                messages.push(fix.to_user_message());
            }
        }
    }

    Err(anyhow!("model did not produce a valid reply after {} attempts", MAX_FIX_ATTEMPTS))
}

#[tokio::main]
async fn main() -> Result<()> {
    let level = CONFIG.log_level.parse::<Level>().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    match args.command {
        Command::Render { agent } => {
            let ctx = agent.context()?;
            println!("{}", agent.strategy()?.render_system_message(&ctx, &agent.tools()?));
        }
        Command::Decode {
            agent,
            strict,
            prior_state,
        } => {
            let mut raw = String::new();
            std::io::stdin().read_to_string(&mut raw)?;
            let ctx = agent.context()?;

            let decoded = match agent.strategy {
                StrategyKind::Fsm if strict => agent
                    .fsm_strategy()?
                    .decode_strict(&raw, prior_state.as_deref())
                    .map(|turn| turn.message),
                _ => agent.strategy()?.decode(&raw, &ctx),
            };
            match decoded {
                Ok(message) => print_json(&message)?,
                Err(fix) => retry_exit(fix),
            }
        }
        Command::Ask { agent, message } => ask(&agent, &message).await?,
    }

    Ok(())
}
