//! kibitz: command-line front end for the advice broker
//!
//! Runs prompts through a local broker instance (cache tiers, rate limit and
//! retry included) against the configured OpenAI-compatible endpoint.

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use futures_util::future::join_all;
use serde::Deserialize;

use kibitz::cli::{Config, Secrets};
use kibitz::{Broker, Completion, Kibitz, OpenAiClient, SubmitOptions};

/// Kibitz CLI
#[derive(Parser)]
#[command(name = "kibitz")]
#[command(version = kibitz::PKG_VERSION)]
#[command(about = "Cached, rate-limited LLM poker advice")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "KIBITZ_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask for advice on a single game state
    Ask {
        /// Prompt text (or omit to read from stdin)
        prompt: Option<String>,
        /// Dispatch priority, higher first
        #[arg(short, long, default_value_t = kibitz::DEFAULT_PRIORITY)]
        priority: u32,
        /// Skip the cache tiers for this request
        #[arg(long)]
        bypass_cache: bool,
        /// Model override
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Submit a JSON array of prompts and print the results in completion order
    Batch {
        /// File holding `[{"prompt": "...", "priority": 1, "bypass_cache": false}, ...]`
        file: PathBuf,
        /// Print cache and rate-limit statistics afterwards
        #[arg(long)]
        stats: bool,
    },

    /// Print the effective broker configuration
    Config,
}

#[derive(Deserialize)]
struct BatchItem {
    prompt: String,
    #[serde(default = "default_priority")]
    priority: u32,
    #[serde(default)]
    bypass_cache: bool,
}

fn default_priority() -> u32 {
    kibitz::DEFAULT_PRIORITY
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    if let Command::Config = args.command {
        println!("{:#?}", config.broker_config());
        return Ok(());
    }

    let broker = connect(&config)?;

    match args.command {
        Command::Ask {
            prompt,
            priority,
            bypass_cache,
            model,
        } => {
            let prompt = resolve_text(prompt, "ask")?;
            let mut options = SubmitOptions::new()
                .priority(priority)
                .bypass_cache(bypass_cache);
            if let Some(model) = model {
                options = options.model(model);
            }
            let completion = broker.ask(prompt, options).await?;
            print_completion(&completion);
        }

        Command::Batch { file, stats } => {
            let raw = std::fs::read_to_string(&file)?;
            let items: Vec<BatchItem> = serde_json::from_str(&raw)?;

            let pending = items.into_iter().enumerate().map(|(i, item)| {
                let options = SubmitOptions::new()
                    .priority(item.priority)
                    .bypass_cache(item.bypass_cache);
                let handle = broker.submit(item.prompt, options);
                async move { (i, handle.await) }
            });

            for (i, result) in join_all(pending).await {
                match result {
                    Ok(completion) => {
                        print!("#{i} ");
                        print_completion(&completion);
                    }
                    Err(e) => println!("#{i} error: {e}"),
                }
            }

            if stats {
                println!(
                    "cache: {}",
                    serde_json::to_string_pretty(&broker.cache_stats())?
                );
                println!(
                    "rate limit: {}",
                    serde_json::to_string_pretty(&broker.rate_limit_stats())?
                );
            }
        }

        Command::Config => unreachable!("handled above"),
    }

    Ok(())
}

fn connect(config: &Config) -> Result<Broker, Box<dyn std::error::Error>> {
    let api_key = Secrets::load()?
        .api_key()
        .ok_or("no API key: set OPENAI_API_KEY or add [openai] api_key to ~/.kibitz/secrets.toml")?;
    let client = OpenAiClient::with_options(
        api_key,
        config.openai.base_url.clone(),
        Duration::from_secs(config.openai.timeout_secs),
    )?;
    Ok(Kibitz::builder()
        .config(config.broker_config())
        .client(client)
        .build()?)
}

fn print_completion(completion: &Completion) {
    println!("[{}] {}", completion.source.as_str(), completion.content);
}

/// Resolve text input from an optional CLI argument and/or stdin.
///
/// - arg only → arg
/// - stdin only → stdin
/// - both → `"{arg}\n\n{stdin}"`
/// - neither → error
fn resolve_text(arg: Option<String>, command: &str) -> Result<String, Box<dyn std::error::Error>> {
    let stdin_is_pipe = !io::stdin().is_terminal();
    let stdin_text = if stdin_is_pipe {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        let trimmed = buf.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    } else {
        None
    };

    match (arg, stdin_text) {
        (Some(a), Some(s)) => Ok(format!("{a}\n\n{s}")),
        (Some(a), None) => Ok(a),
        (None, Some(s)) => Ok(s),
        (None, None) => {
            Err(format!("{command}: no input provided (pass a prompt as argument or via stdin)").into())
        }
    }
}
