//! Command line and environment configuration for the `polymcp` binary
//!
//! Most flags can also come from the environment (`POLYMCP_*` for the server,
//! the provider variables read by [`ProviderConfig::from_env`] for the agent).
//! `.env` files are loaded by the binary before parsing.

use std::net::{IpAddr, SocketAddr};

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::llm::{
    GenerationConfig, LlmError, ProviderConfig, ProviderKind, StdioServerConfig, StdioToolError,
};

/// Errors raised while turning CLI arguments into runtime settings
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid listen address '{host}': {message}")]
    InvalidAddress { host: String, message: String },

    #[error("Agent needs at least one --server URL or --stdio command")]
    NoServers,

    #[error("Invalid --stdio command: {0}")]
    StdioCommand(#[from] StdioToolError),

    #[error("Provider configuration error: {0}")]
    Provider(#[from] LlmError),
}

#[derive(Parser, Debug)]
#[command(
    name = "polymcp",
    about = "Expose Rust functions as HTTP tools and drive them with LLM agents",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(about = "Serve the bundled demo tools over HTTP or MCP stdio")]
    Serve(ServeArgs),

    #[command(about = "Ask an LLM agent a question using tools on remote servers")]
    Agent(AgentArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Interface to bind
    #[arg(long, env = "POLYMCP_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "POLYMCP_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Title reported by `GET /`
    #[arg(long, env = "POLYMCP_TITLE", default_value = "MCP Tool Server")]
    pub title: String,

    /// Speak MCP JSON-RPC on stdin/stdout instead of HTTP
    #[arg(long)]
    pub stdio: bool,
}

#[derive(Args, Debug, Clone)]
pub struct AgentArgs {
    /// openai, anthropic, ollama, kimi or deepseek
    #[arg(long, env = "POLYMCP_PROVIDER", default_value = "openai")]
    pub provider: String,

    /// Overrides the provider's model variable and default
    #[arg(long)]
    pub model: Option<String>,

    /// Tool server base URL; repeat for several servers
    #[arg(long = "server")]
    pub servers: Vec<String>,

    /// MCP server command to spawn, e.g. "npx @playwright/mcp@latest"; repeatable
    #[arg(long = "stdio")]
    pub stdio_servers: Vec<String>,

    #[arg(long, default_value_t = 1024)]
    pub max_tokens: u32,

    #[arg(long, default_value_t = 10)]
    pub max_iterations: usize,

    #[arg(long)]
    pub system: Option<String>,

    pub prompt: String,
}

/// Resolved settings for `polymcp serve`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
    pub title: String,
    pub stdio: bool,
}

impl ServeConfig {
    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidAddress {
                host: self.host.clone(),
                message: e.to_string(),
            })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl From<ServeArgs> for ServeConfig {
    fn from(args: ServeArgs) -> Self {
        Self {
            host: args.host,
            port: args.port,
            title: args.title,
            stdio: args.stdio,
        }
    }
}

/// Resolved settings for `polymcp agent`
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub provider: ProviderConfig,
    pub generation: GenerationConfig,
    pub servers: Vec<String>,
    pub stdio_servers: Vec<StdioServerConfig>,
    pub max_iterations: usize,
    pub system: Option<String>,
    pub prompt: String,
}

impl AgentConfig {
    /// Resolve provider settings from the environment, then apply flags
    pub fn from_args(args: AgentArgs) -> Result<Self, ConfigError> {
        Self::resolve(args, |name| std::env::var(name).ok())
    }

    /// Same as [`from_args`](Self::from_args) with a custom variable source
    pub fn resolve(
        args: AgentArgs,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if args.servers.is_empty() && args.stdio_servers.is_empty() {
            return Err(ConfigError::NoServers);
        }
        let stdio_servers = args
            .stdio_servers
            .iter()
            .map(|command| StdioServerConfig::parse(command))
            .collect::<Result<Vec<_>, _>>()?;

        let kind: ProviderKind = args.provider.parse()?;
        let mut provider = ProviderConfig::from_lookup(kind, lookup)?;
        if let Some(model) = args.model {
            provider = provider.with_model(model);
            provider.validate()?;
        }

        Ok(Self {
            provider,
            generation: GenerationConfig::new(args.max_tokens),
            servers: args.servers,
            stdio_servers,
            max_iterations: args.max_iterations,
            system: args.system,
            prompt: args.prompt,
        })
    }
}
