// curatebench demo binary
//
// Usage: curatebench [--no-tools] <model_id> <prompt>
//
// Loads configuration from the environment (and .env), routes the prompt to
// OpenRouter or Bedrock by model id, offers the built-in curation tools, and
// prints the normalized InvocationResult as JSON.

use anyhow::{bail, Context};
use curatebench::tools::builtin;
use curatebench::{version, BenchConfig, InvocationRequest, ModelRouter, ToolExecutor};
use std::process::ExitCode;
use std::sync::Arc;

const USAGE: &str = "Usage: curatebench [--no-tools] <model_id> <prompt>";

struct Args {
    model_id: String,
    prompt: String,
    with_tools: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut with_tools = true;
    let mut positional = Vec::new();

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--no-tools" => with_tools = false,
            "-h" | "--help" => bail!("{}", USAGE),
            "-V" | "--version" => bail!("curatebench {}", version::version_string()),
            _ => positional.push(arg),
        }
    }

    match <[String; 2]>::try_from(positional) {
        Ok([model_id, prompt]) => Ok(Args {
            model_id,
            prompt,
            with_tools,
        }),
        Err(_) => bail!("{}", USAGE),
    }
}

async fn run(args: Args) -> anyhow::Result<bool> {
    let config = BenchConfig::from_env().context("Failed to load configuration")?;
    let registry = Arc::new(builtin::default_registry().context("Failed to register built-in tools")?);
    let mut executor = ToolExecutor::new(Arc::clone(&registry));

    let mut request = InvocationRequest::new(&args.model_id, &args.prompt);
    if args.with_tools {
        request = request.with_tools(registry.specs());
    }

    tracing::info!(
        "curatebench {} invoking {} ({} tools)",
        version::version_string(),
        request.model_id,
        request.tools.len()
    );

    let router = ModelRouter::from_config(config);
    let executor = args.with_tools.then_some(&mut executor);
    let result = router.invoke(&request, executor).await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(result.success)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing for logging
    tracing_subscriber::fmt::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
