mod completion;
mod executor;
mod groq_backend;
mod llm;
mod session;

use anyhow::{Context, Result};
use clap::Parser;
use completion::CompletionClient;
use executor::{KubectlExecutor, ShellRunner};
use groq_backend::{GroqBackend, GroqConfig};
use kubechat_core::{GuardrailChain, ToolRegistry};
use session::ChatSession;
use std::io;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// API key for the completion service
    #[arg(long, env = "GROQ_API_KEY", default_value = "", hide_env_values = true)]
    api_key: String,

    /// Model identifier sent with every completion request
    #[arg(short, long, env = "KUBECHAT_MODEL", default_value = "llama3-8b-8192")]
    model: String,

    /// Base URL of the OpenAI-compatible endpoint
    #[arg(long, env = "GROQ_BASE_URL", default_value = "https://api.groq.com/openai/v1")]
    base_url: String,

    /// Seconds to wait for a completion response (1 to 86400)
    #[arg(
        long,
        env = "KUBECHAT_REQUEST_TIMEOUT",
        default_value = "60",
        value_parser = clap::value_parser!(u64).range(1..=MAX_TIMEOUT_SECS)
    )]
    request_timeout: u64,

    /// Seconds a kubectl command may run before it is killed (1 to 86400)
    #[arg(
        long,
        env = "KUBECHAT_COMMAND_TIMEOUT",
        default_value = "60",
        value_parser = clap::value_parser!(u64).range(1..=MAX_TIMEOUT_SECS)
    )]
    command_timeout: u64,
}

/// One day
const MAX_TIMEOUT_SECS: u64 = 86_400;

fn main() -> Result<()> {
    // A missing .env is fine; the environment may already be set
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    // Absence of a key is left for the completion service to reject
    if args.api_key.is_empty() {
        tracing::warn!("GROQ_API_KEY is not set");
    }

    let backend = GroqBackend::new(GroqConfig {
        api_key: args.api_key,
        model: args.model,
        base_url: args.base_url,
        timeout: Duration::from_secs(args.request_timeout),
    })
    .context("Failed to initialize completion backend")?;

    let executor = KubectlExecutor::new(
        ShellRunner::new(Duration::from_secs(args.command_timeout)),
        GuardrailChain::kubectl_default(),
    );
    let registry = ToolRegistry::new().register(Box::new(executor));
    let client = CompletionClient::new(backend, registry.descriptors());

    let mut session = ChatSession::new(client, registry);
    session
        .run(io::stdin().lock(), io::stdout())
        .context("Console I/O failed")?;

    tracing::debug!(messages = session.conversation().len(), "Session ended");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_timeouts_are_bounded() {
        for value in ["0", "86401", "18446744073709551615"] {
            assert!(Args::try_parse_from(["kubechat", "--command-timeout", value]).is_err());
            assert!(Args::try_parse_from(["kubechat", "--request-timeout", value]).is_err());
        }
    }

    #[test]
    fn test_timeout_accepts_upper_bound() {
        let args = Args::try_parse_from(["kubechat", "--command-timeout", "86400"]).unwrap();
        assert_eq!(args.command_timeout, MAX_TIMEOUT_SECS);
    }
}
