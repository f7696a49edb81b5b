//! A thin terminal front end over `forge-agent`. Reads one line of input at
//! a time from stdin, runs it through the engine, and prints the streamed
//! assistant response. Config loading, credential resolution, and the real
//! TUI are all out of scope — this exists to prove the engine is
//! callable end to end.

mod provider;

use clap::Parser;
use forge_agent::config::{Config, ModelSelection, Options, ProviderDefinition};
use forge_agent::event_bus::EventBus;
use forge_agent::events::AgentEventKind;
use forge_agent::permission::PermissionBroker;
use forge_agent::session::memory::{InMemoryMessageService, InMemorySessionService};
use forge_agent::tools::builtins::register_builtins;
use forge_agent::tools::registry::ToolRegistry;
use forge_agent::{AgentCore, ModelSlot};
use forge_provider::ModelInfo;
use provider::OpenAiCompatibleProvider;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
struct Args {
    /// Provider base URL, OpenAI-compatible.
    #[arg(long, default_value = "https://api.openai.com/v1")]
    base_url: String,
    /// Environment variable holding the API key.
    #[arg(long, default_value = "OPENAI_API_KEY")]
    api_key_env: String,
    /// Large model id used for turns.
    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,
    /// Small model id used for titles/summaries.
    #[arg(long, default_value = "gpt-4o-mini")]
    small_model: String,
    #[arg(long)]
    debug: bool,
    /// Skip the Permission Broker entirely (yolo mode).
    #[arg(long)]
    yolo: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    forge_telemetry::init(args.debug);

    let api_key = std::env::var(&args.api_key_env).unwrap_or_default();
    let main_provider: Arc<dyn forge_provider::ChatProvider> = Arc::new(OpenAiCompatibleProvider::new(
        args.base_url.clone(),
        api_key.clone(),
        args.model.clone(),
    ));
    let small_provider: Arc<dyn forge_provider::ChatProvider> = Arc::new(OpenAiCompatibleProvider::new(
        args.base_url.clone(),
        api_key,
        args.small_model.clone(),
    ));

    let mut providers = HashMap::new();
    providers.insert(
        "default".to_string(),
        ProviderDefinition {
            id: "default".into(),
            base_url: Some(args.base_url.clone()),
            api_key_env: Some(args.api_key_env.clone()),
        },
    );

    let config = Config {
        large_model: ModelSelection {
            provider_id: "default".into(),
            model_id: args.model.clone(),
        },
        small_model: ModelSelection {
            provider_id: "default".into(),
            model_id: args.small_model.clone(),
        },
        providers,
        options: Options {
            debug: args.debug,
            disable_auto_summarize: false,
        },
    };

    let mut registry = ToolRegistry::new();
    register_builtins(&mut registry);

    let event_bus = Arc::new(EventBus::new());
    let permission_broker = Arc::new(PermissionBroker::new(event_bus.clone()));
    permission_broker.set_bypass(args.yolo);

    let core = Arc::new(AgentCore::new(
        event_bus,
        permission_broker,
        Arc::new(InMemorySessionService::new()),
        Arc::new(InMemoryMessageService::new()),
        Arc::new(registry),
        config,
        ModelSlot {
            provider: main_provider,
            info: ModelInfo {
                id: args.model.clone(),
                ..Default::default()
            },
            provider_id: "default".into(),
            model_id: args.model,
        },
        ModelSlot {
            provider: small_provider,
            info: ModelInfo {
                id: args.small_model.clone(),
                ..Default::default()
            },
            provider_id: "default".into(),
            model_id: args.small_model,
        },
    ));

    let session = core
        .session_service
        .create(None)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    println!("forge ready. session {} — type a message, Ctrl-D to exit.", session.id);

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = stdin.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let mut events = forge_agent::agent::run(core.clone(), session.id.clone(), line, Vec::new()).await?;
        loop {
            match events.recv().await {
                Ok(event) => match event.kind {
                    AgentEventKind::AssistantContentDelta { delta, .. } => {
                        print!("{delta}");
                        std::io::stdout().flush().ok();
                    }
                    AgentEventKind::Response { done: true, .. } => {
                        println!();
                        break;
                    }
                    AgentEventKind::Error { error, .. } => {
                        eprintln!("\nerror: {error}");
                        break;
                    }
                    _ => {}
                },
                Err(_) => break,
            }
        }
    }

    Ok(())
}
