use std::error::Error;
use std::io::Write;

use clap::Parser;
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

use polymcp::config::{AgentArgs, AgentConfig, Cli, Command, ServeArgs, ServeConfig};
use polymcp::llm::{
    create_provider, Agent, AgentEvent, ContentDelta, RemoteToolExecutor, StdioToolExecutor,
    StreamEvent, ToolRouter,
};
use polymcp::{demo, mcp, ServerInfo, ToolServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Serve(args) => serve(args).await,
        Command::Agent(args) => agent(args).await,
    }
}

async fn serve(args: ServeArgs) -> Result<(), Box<dyn Error>> {
    let config = ServeConfig::from(args);
    let registry = demo::registry()?;
    let info = ServerInfo::new(config.title.clone()).with_version(env!("CARGO_PKG_VERSION"));

    if config.stdio {
        mcp::serve_stdio(&registry, &info).await?;
        return Ok(());
    }

    let addr = config.addr()?;
    ToolServer::new(registry, info).run(addr).await;
    Ok(())
}

async fn agent(args: AgentArgs) -> Result<(), Box<dyn Error>> {
    let config = AgentConfig::from_args(args)?;
    let provider = create_provider(config.provider)?;
    tracing::info!(
        provider = %provider.name(),
        servers = ?config.servers,
        stdio = config.stdio_servers.len(),
        "starting agent"
    );

    let mut router = ToolRouter::new();
    if !config.servers.is_empty() {
        let remote = RemoteToolExecutor::connect(&config.servers).await?;
        let declarations = remote.declarations();
        router = router.with(Box::new(remote), declarations);
    }
    if !config.stdio_servers.is_empty() {
        let stdio = StdioToolExecutor::connect(config.stdio_servers).await?;
        let declarations = stdio.declarations();
        router = router.with(Box::new(stdio), declarations);
    }

    let declarations = router.declarations();
    let mut agent = Agent::new(
        provider,
        Box::new(router),
        declarations,
        config.generation,
        None,
    )
    .with_max_iterations(config.max_iterations);
    if let Some(system) = config.system {
        agent = agent.with_system(system);
    }

    let mut stream = agent.run(config.prompt).await?;
    let mut stdout = std::io::stdout();

    while let Some(event) = stream.next().await {
        match event? {
            AgentEvent::LlmEvent(StreamEvent::ContentDelta {
                delta: ContentDelta::TextDelta { text },
                ..
            }) => {
                print!("{}", text);
                stdout.flush()?;
            }
            AgentEvent::ToolExecutionStarted { name, input, .. } => {
                eprintln!("\n[calling {} with {}]", name, input);
            }
            AgentEvent::ToolExecutionCompleted { name, result, .. } => {
                eprintln!("[{} returned {}]", name, result);
            }
            AgentEvent::ToolExecutionFailed { name, error, .. } => {
                eprintln!("[{} failed: {}]", name, error);
            }
            AgentEvent::Completed { .. } => {
                println!();
            }
            _ => {}
        }
    }

    Ok(())
}
