//! natter - streaming chat in the terminal

mod config;

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use futures::StreamExt;
use natter_agent::ChatSession;
use natter_ai::{HttpTransport, ProviderRegistry, StreamEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use config::Config;

/// natter - chat with an OpenAI-style completion endpoint
#[derive(Parser, Debug)]
#[command(name = "natter")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Provider (openai, deepseek, doubao)
    #[arg(short, long)]
    provider: Option<String>,

    /// Model to use (default: the provider's first model)
    #[arg(short, long)]
    model: Option<String>,

    /// Wait for the whole reply instead of streaming it
    #[arg(long)]
    no_stream: bool,

    /// System prompt for this conversation
    #[arg(short, long)]
    system: Option<String>,

    /// Override the provider's endpoint URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// List providers and models, then exit
    #[arg(long)]
    list_models: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the conversation.
    if args.verbose || std::env::var_os("RUST_LOG").is_some() {
        let filter = if args.verbose {
            EnvFilter::new("natter=debug")
        } else {
            EnvFilter::from_default_env()
        };
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }

    if args.init_config {
        let path = Config::init().context("creating config file")?;
        println!("Config file at: {}", path.display());
        println!("\nExample config:\n{}", config::example_config());
        return Ok(());
    }

    let registry = Arc::new(ProviderRegistry::builtin());

    if args.list_models {
        print!("{}", list_models(&registry));
        return Ok(());
    }

    let cfg = Config::load();
    let session = build_session(&args, &cfg, Arc::clone(&registry))?;

    // Ctrl-C cancels the running reply; when idle it exits.
    let handle = session.handle();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if handle.is_running() {
                handle.cancel();
            } else {
                std::process::exit(130);
            }
        }
    });

    run_interactive(&session, &cfg).await
}

fn build_session(args: &Args, cfg: &Config, registry: Arc<ProviderRegistry>) -> anyhow::Result<ChatSession> {
    let provider_id = args
        .provider
        .as_deref()
        .or(cfg.provider.as_deref())
        .unwrap_or(config::DEFAULT_PROVIDER);
    let provider = registry.resolve(provider_id)?;

    let model_id = match args.model.as_deref().or(cfg.model.as_deref()) {
        Some(id) => id.to_string(),
        None => provider
            .models
            .first()
            .map(|m| m.id.clone())
            .with_context(|| format!("provider '{}' has no models", provider.id))?,
    };

    let streaming = !args.no_stream && cfg.stream.unwrap_or(true);
    let request = cfg.request_config(provider, &model_id, streaming, args.endpoint.as_deref());
    if request.api_key_override.is_none() && provider.default_api_key.is_empty() {
        let hint = provider.api_key_env.as_deref().unwrap_or("<provider key>");
        anyhow::bail!(
            "No API key for {}. Set {} or add it to the config file (natter --init-config).",
            provider.id,
            hint
        );
    }

    let system_prompt = args
        .system
        .as_deref()
        .or(cfg.system_prompt.as_deref())
        .unwrap_or(config::DEFAULT_SYSTEM_PROMPT);

    let transport = Arc::new(HttpTransport::new());
    Ok(ChatSession::new(registry, transport, system_prompt, request)?)
}

fn list_models(registry: &ProviderRegistry) -> String {
    let mut out = String::new();
    for provider in registry.providers() {
        out.push_str(&format!("{} ({})\n", provider.id, provider.display_name));
        for model in &provider.models {
            out.push_str(&format!("  {:<28} {}\n", model.id, model.display_name));
        }
    }
    out
}

/// A line typed at the prompt
#[derive(Debug, PartialEq)]
enum Input<'a> {
    Empty,
    Quit,
    History,
    Model { provider: &'a str, model: &'a str },
    Help,
    Unknown(&'a str),
    Prompt(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Input::Prompt(line);
    };

    let mut parts = command.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("quit" | "exit"), None, None) => Input::Quit,
        (Some("history"), None, None) => Input::History,
        (Some("help"), None, None) => Input::Help,
        (Some("model"), Some(provider), Some(model)) => Input::Model { provider, model },
        _ => Input::Unknown(command),
    }
}

const HELP: &str = "\
/model <provider> <model>  switch provider and model
/history                   show the conversation so far
/quit                      exit (also Ctrl-D)
Ctrl-C cancels a reply in progress.";

async fn run_interactive(session: &ChatSession, cfg: &Config) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    if std::io::IsTerminal::is_terminal(&std::io::stderr()) {
        let current = session.config();
        eprintln!("natter ({} / {})  /help for commands", current.provider_id, current.model_id);
        eprintln!();
    }

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_input(&line) {
            Input::Empty => continue,
            Input::Quit => break,
            Input::Help => println!("{}", HELP),
            Input::History => {
                let conversation = session.conversation();
                println!("[system] {}", conversation.system_prompt());
                for message in &conversation.messages()[1..] {
                    println!("[{}] {}", message.role.as_str(), message.content);
                }
            }
            Input::Model { provider, model } => {
                // --endpoint only applies to the provider chosen at startup
                let result = session.registry().resolve(provider).map(|descriptor| {
                    cfg.request_config(descriptor, model, session.config().streaming, None)
                });
                match result.map_err(natter_agent::Error::from).and_then(|rc| session.configure(rc)) {
                    Ok(()) => println!("Switched to: {} / {}", provider, model),
                    Err(e) => println!("Could not switch: {}", e),
                }
            }
            Input::Unknown(command) => {
                println!("Unknown command: /{}", command);
                println!("Type /help for available commands.");
            }
            Input::Prompt(text) => {
                println!();
                print_reply(session, text).await?;
                println!();
            }
        }
    }

    Ok(())
}

async fn print_reply(session: &ChatSession, text: &str) -> anyhow::Result<()> {
    let mut events = session.send(text);
    let mut streamed = false;

    while let Some(event) = events.next().await {
        match event {
            StreamEvent::Started => {}
            StreamEvent::Delta { fragment, .. } => {
                streamed = true;
                print!("{}", fragment);
                std::io::stdout().flush()?;
            }
            StreamEvent::Completed { text } => {
                if streamed {
                    println!();
                } else {
                    println!("{}", text);
                }
            }
            StreamEvent::Failed { error } => {
                if streamed {
                    println!();
                }
                eprintln!("Error: {}", error);
            }
            StreamEvent::Cancelled => {
                if streamed {
                    println!();
                }
                eprintln!("[cancelled]");
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(parse_input("   "), Input::Empty);
        assert_eq!(parse_input(" hello there "), Input::Prompt("hello there"));
        assert_eq!(parse_input("/quit"), Input::Quit);
        assert_eq!(parse_input("/exit"), Input::Quit);
        assert_eq!(parse_input("/history"), Input::History);
        assert_eq!(
            parse_input("/model deepseek deepseek-chat"),
            Input::Model {
                provider: "deepseek",
                model: "deepseek-chat"
            }
        );
        assert_eq!(parse_input("/model deepseek"), Input::Unknown("model deepseek"));
        assert_eq!(parse_input("/frobnicate"), Input::Unknown("frobnicate"));
    }

    #[test]
    fn test_args() {
        let args = Args::try_parse_from([
            "natter",
            "--provider",
            "deepseek",
            "--no-stream",
            "-s",
            "Be brief.",
        ])
        .unwrap();
        assert_eq!(args.provider.as_deref(), Some("deepseek"));
        assert!(args.no_stream);
        assert_eq!(args.system.as_deref(), Some("Be brief."));
        assert!(!args.list_models);
    }

    #[test]
    fn test_list_models() {
        let out = list_models(&ProviderRegistry::builtin());
        assert!(out.starts_with("openai (OpenAI)\n"));
        assert!(out.contains("  gpt-4o-mini"));
        assert!(out.contains("deepseek (DeepSeek)"));
        assert!(out.contains("ep-20250205141518-nvl9p"));
    }

    #[test]
    fn test_build_session_defaults() {
        let args = Args::try_parse_from(["natter"]).unwrap();
        let mut cfg = Config::default();
        cfg.api_keys.insert("openai".into(), "sk-test".into());

        let session = build_session(&args, &cfg, Arc::new(ProviderRegistry::builtin())).unwrap();
        let rc = session.config();
        assert_eq!(rc.provider_id, "openai");
        assert_eq!(rc.model_id, "gpt-4o-mini");
        assert!(rc.streaming);
        assert_eq!(session.messages()[0].content, config::DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn test_build_session_rejects_unknown_model() {
        let args = Args::try_parse_from(["natter", "-p", "deepseek", "-m", "gpt-4o"]).unwrap();
        let mut cfg = Config::default();
        cfg.api_keys.insert("deepseek".into(), "sk-test".into());
        assert!(build_session(&args, &cfg, Arc::new(ProviderRegistry::builtin())).is_err());
    }
}
