//! agentlab CLI - run the lab agent against a hosted model

mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use agentlab_core::agent::{AgentRunner, ToolCallingAgent};
use agentlab_core::batch::{BatchSummary, run_batch};
use agentlab_core::config::{self, AgentLabConfig};
use agentlab_core::error::{AgentLabError, ProviderError};
use agentlab_core::invocation::{
    AutoConfirm, Confirmer, InvocationPolicy, SafeInvoker, StdinConfirmer,
};
use agentlab_core::llm::{LLMProvider, OpenAICompatibleProvider};
use agentlab_core::tools::builtin::{SystemClock, builtin_registry};
use agentlab_core::tools::{ToolExecutionContext, ToolRuntime, ToolRuntimeConfig};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "agentlab")]
#[command(about = "Tool-calling lab agent with a guarded invocation wrapper", long_about = None)]
#[command(version)]
struct Cli {
    /// Extra configuration file, layered over agentlab.toml
    #[arg(long, global = true, env = "AGENTLAB_CONFIG")]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Warnings and errors only
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run queries through the agent
    Run(RunArgs),
    /// Check whether the endpoint is currently rate limiting
    Probe {
        /// Model to probe instead of the configured one
        #[arg(long)]
        model: Option<String>,
    },
    /// Built-in tools
    Tools {
        #[command(subcommand)]
        command: ToolCommands,
    },
    /// Version information
    Version,
}

#[derive(Args)]
struct RunArgs {
    /// Queries to run; defaults to the configured list
    queries: Vec<String>,

    /// Skip every model call
    #[arg(long, conflicts_with = "no_dry_run")]
    dry_run: bool,

    /// Call the model even if configuration says dry run
    #[arg(long)]
    no_dry_run: bool,

    /// Do not ask before each call
    #[arg(short, long)]
    yes: bool,

    /// Pause after each successful call, in milliseconds
    #[arg(long)]
    cooldown_ms: Option<u64>,

    /// Model to use instead of the configured one
    #[arg(long)]
    model: Option<String>,

    /// Do not offer tools to the model
    #[arg(long)]
    no_tools: bool,
}

#[derive(Subcommand)]
enum ToolCommands {
    /// List built-in tools
    List,
    /// Run one tool locally
    Call {
        /// Tool name
        name: String,
        /// JSON object of arguments, or a bare string for single-argument tools
        arg: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = %format!("{:#}", err), "agentlab failed");
            eprintln!("❌ {:#}", err);
            exit_code_for(&err)
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// 1 for startup problems (missing token, bad configuration), 2 for a rate limit
fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<AgentLabError>() {
        Some(AgentLabError::RateLimited(_)) => ExitCode::from(2),
        _ => ExitCode::from(1),
    }
}

async fn dispatch(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Version => {
            println!("agentlab {}", env!("CARGO_PKG_VERSION"));
            println!("agentlab-core {}", agentlab_core::VERSION);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Tools { command } => run_tools(command).await,
        Commands::Probe { model } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(model) = model {
                config.llm.model = model;
            }
            probe(&config).await
        }
        Commands::Run(args) => {
            let config = load_config(cli.config.as_deref())?;
            run(config, args).await
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<AgentLabConfig> {
    if let Some(env_file) = config::load_dotenv() {
        info!(path = %env_file.display(), "Loaded .env");
    }
    Ok(AgentLabConfig::load_with(path)?)
}

fn apply_overrides(config: &mut AgentLabConfig, args: &RunArgs) -> Result<()> {
    if args.dry_run {
        config.invocation.dry_run = true;
    }
    if args.no_dry_run {
        config.invocation.dry_run = false;
    }
    if args.yes {
        config.invocation.confirm = false;
    }
    if let Some(cooldown_ms) = args.cooldown_ms {
        config.invocation.cooldown_ms = cooldown_ms;
    }
    if let Some(model) = &args.model {
        config.llm.model = model.clone();
    }
    if args.no_tools {
        config.agent.tools_enabled = false;
    }
    if !args.queries.is_empty() {
        config.queries = args.queries.clone();
    }
    config.validate()?;
    Ok(())
}

async fn run(mut config: AgentLabConfig, args: RunArgs) -> Result<ExitCode> {
    apply_overrides(&mut config, &args)?;

    // Checked before anything can touch the network, dry run included.
    let token = config.resolve_token()?;
    info!(var = %config.llm.token_env, "Token loaded");

    if config.invocation.dry_run {
        warn!("DRY_RUN is enabled, no API calls will be made");
    }

    let provider = Arc::new(OpenAICompatibleProvider::from_config(&config.llm, token)?);
    let model = provider.model_info();
    info!(provider = %model.provider, model = %model.model_name, "Language model initialized");

    let registry = Arc::new(builtin_registry(Arc::new(SystemClock)));
    let tools = if config.agent.tools_enabled {
        registry.descriptors()
    } else {
        Vec::new()
    };
    info!(tools = tools.len(), "Tools initialized");

    let runtime = ToolRuntime::with_config(
        ToolRuntimeConfig::default().with_timeout(config.agent.tool_timeout),
    );
    let agent: Arc<dyn AgentRunner> = Arc::new(
        ToolCallingAgent::new(provider, registry)
            .with_runtime(runtime)
            .with_max_steps(config.agent.max_steps),
    );
    let confirmer: Arc<dyn Confirmer> = if config.invocation.confirm {
        Arc::new(StdinConfirmer::stdin())
    } else {
        Arc::new(AutoConfirm)
    };

    let invoker = SafeInvoker::new(agent, confirmer, InvocationPolicy::from(&config.invocation))
        .with_system_prompt(&config.agent.system_prompt)
        .with_tools(tools);

    println!("\nRunning queries:\n");
    let summary = run_batch(&invoker, &config.queries, |_, report| {
        output::print_query(report)
    })
    .await;
    output::print_summary(&summary);

    batch_result(&summary)
}

/// A batch stopped by the provider surfaces as [`AgentLabError::RateLimited`]
fn batch_result(summary: &BatchSummary) -> Result<ExitCode> {
    if summary.halted_by_rate_limit {
        return Err(AgentLabError::RateLimited(ProviderError::with_status(
            429,
            format!("batch stopped, {} queries not attempted", summary.remaining),
        ))
        .into());
    }
    Ok(ExitCode::SUCCESS)
}

async fn probe(config: &AgentLabConfig) -> Result<ExitCode> {
    let token = config.resolve_token()?;
    let provider = OpenAICompatibleProvider::from_config(&config.llm, token)?;

    let report = provider.probe().await;
    output::print_probe(&report);

    Ok(if report.is_rate_limited() {
        ExitCode::from(2)
    } else if report.ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

async fn run_tools(command: ToolCommands) -> Result<ExitCode> {
    let registry = builtin_registry(Arc::new(SystemClock));

    match command {
        ToolCommands::List => {
            for tool in registry.list() {
                println!("{:<18} {}", tool.name, tool.description);
            }
            Ok(ExitCode::SUCCESS)
        }
        ToolCommands::Call { name, arg } => {
            let args = parse_tool_arg(arg.as_deref())?;
            let envelope = ToolRuntime::new()
                .execute_by_name(&registry, &name, args, &ToolExecutionContext::new())
                .await;

            if envelope.is_success() {
                println!("{}", envelope.to_model_content());
                Ok(ExitCode::SUCCESS)
            } else {
                eprintln!("❌ {}", envelope.to_model_content());
                Ok(ExitCode::from(1))
            }
        }
    }
}

/// Objects are passed through; anything else is handed to the tool as a bare
/// string.
fn parse_tool_arg(arg: Option<&str>) -> Result<Value> {
    let Some(arg) = arg else {
        return Ok(Value::Object(Default::default()));
    };
    if arg.trim_start().starts_with('{') {
        return serde_json::from_str(arg).context("Tool arguments look like JSON but do not parse");
    }
    Ok(Value::String(arg.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run_args(argv: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(argv).unwrap();
        match cli.command {
            Commands::Run(args) => args,
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_overrides() {
        let args = run_args(&[
            "agentlab",
            "run",
            "--no-dry-run",
            "--yes",
            "--cooldown-ms",
            "1500",
            "--model",
            "openai/gpt-4o-mini",
            "--no-tools",
            "What is 2 + 2?",
        ]);
        let mut config = AgentLabConfig::default();
        apply_overrides(&mut config, &args).unwrap();

        assert!(!config.invocation.dry_run);
        assert!(!config.invocation.confirm);
        assert_eq!(config.invocation.cooldown_ms, 1500);
        assert_eq!(config.llm.model, "openai/gpt-4o-mini");
        assert!(!config.agent.tools_enabled);
        assert_eq!(config.queries, vec!["What is 2 + 2?".to_string()]);
    }

    #[test]
    fn test_run_without_flags_keeps_config() {
        let args = run_args(&["agentlab", "run"]);
        let mut config = AgentLabConfig::default();
        apply_overrides(&mut config, &args).unwrap();
        assert_eq!(config, AgentLabConfig::default());
    }

    #[test]
    fn test_exit_codes() {
        let missing = anyhow::Error::from(AgentLabError::MissingToken {
            var: "GITHUB_TOKEN".into(),
        });
        assert_eq!(exit_code_for(&missing), ExitCode::from(1));

        let provider = anyhow::Error::from(AgentLabError::from(ProviderError::with_status(
            503,
            "unavailable",
        )));
        assert_eq!(exit_code_for(&provider), ExitCode::from(1));
    }

    #[test]
    fn test_halted_batch_exits_with_rate_limit_code() {
        let finished = BatchSummary {
            completed: 2,
            ..BatchSummary::default()
        };
        assert_eq!(batch_result(&finished).unwrap(), ExitCode::SUCCESS);

        let halted = BatchSummary {
            completed: 1,
            remaining: 3,
            halted_by_rate_limit: true,
            ..BatchSummary::default()
        };
        let err = batch_result(&halted).unwrap_err();
        assert!(err.to_string().contains("3 queries not attempted"));
        assert_eq!(exit_code_for(&err), ExitCode::from(2));
    }

    #[test]
    fn test_parse_tool_arg() {
        assert_eq!(parse_tool_arg(None).unwrap(), json!({}));
        assert_eq!(
            parse_tool_arg(Some(r#"{"expression": "1 + 1"}"#)).unwrap(),
            json!({"expression": "1 + 1"})
        );
        assert_eq!(parse_tool_arg(Some("Hello World")).unwrap(), json!("Hello World"));
        assert!(parse_tool_arg(Some("{oops")).is_err());
    }

    #[tokio::test]
    async fn test_tools_call_runs_locally() {
        let code = run_tools(ToolCommands::Call {
            name: "reverse_string".into(),
            arg: Some("Hello World".into()),
        })
        .await
        .unwrap();
        assert_eq!(code, ExitCode::SUCCESS);

        let code = run_tools(ToolCommands::Call {
            name: "calculator".into(),
            arg: Some("1 / 0".into()),
        })
        .await
        .unwrap();
        assert_eq!(code, ExitCode::from(1));
    }
}
