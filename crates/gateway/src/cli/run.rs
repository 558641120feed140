//! `graphweaver run`: one-shot execution command.
//!
//! Sends a single message, prints run events as they arrive and exits.
//! With `--json` the run is executed in batch mode and the summary plus
//! execution log is printed instead.

use std::io::Write;
use std::sync::Arc;

use gw_domain::config::Config;
use gw_domain::stream::TurnEvent;

use crate::api::chat::{run_input, ChatRequest};
use crate::bootstrap;
use crate::runtime::run_streaming;

pub struct RunArgs {
    pub message: String,
    pub model: Option<String>,
    pub profile: Option<String>,
    pub caller: Option<String>,
    pub json: bool,
}

pub async fn run(config: Arc<Config>, args: RunArgs) -> anyhow::Result<()> {
    let state = bootstrap::build_app_state(config).await?;

    let input = run_input(
        &state,
        ChatRequest {
            message: Some(args.message),
            messages: None,
            model: args.model,
            profile: args.profile,
            caller: args.caller,
        },
    )
    .map_err(|e| anyhow::anyhow!(e))?;

    if args.json {
        let (outcome, log) = state.engine.run_batch(input).await;
        let json = serde_json::to_string_pretty(&serde_json::json!({
            "outcome": outcome,
            "log": log.entries(),
        }))
        .map_err(|e| anyhow::anyhow!("serializing run summary: {e}"))?;
        println!("{json}");
        if !outcome.success {
            std::process::exit(1);
        }
        return Ok(());
    }

    let (_run_id, mut rx) = run_streaming(state.engine.clone(), input);
    let mut exit_code = 0;

    while let Some(event) = rx.recv().await {
        match &event {
            TurnEvent::Thinking { turn } => {
                eprintln!("\x1b[2m[turn {turn}]\x1b[0m");
            }
            TurnEvent::ToolCall { tool, .. } => {
                eprintln!("\x1b[2m[tool: {tool}]\x1b[0m");
            }
            TurnEvent::ToolProgress { tool, message } => {
                eprintln!("\x1b[2m[{tool}] {message}\x1b[0m");
            }
            TurnEvent::ToolResult { tool, success, error, .. } => {
                if *success {
                    eprintln!("\x1b[2m[{tool}: ok]\x1b[0m");
                } else {
                    eprintln!("\x1b[2m[{tool}: {}]\x1b[0m", error.as_deref().unwrap_or("failed"));
                }
            }
            TurnEvent::Text { content } => {
                print!("{content}");
                std::io::stdout().flush().ok();
            }
            TurnEvent::Suggestions { suggestions } => {
                println!();
                for s in suggestions {
                    eprintln!("\x1b[2m→ {s}\x1b[0m");
                }
            }
            TurnEvent::Error { error, .. } => {
                eprintln!("\nerror: {error}");
                exit_code = 1;
            }
            TurnEvent::Done { turns, max_reached } => {
                println!();
                if *max_reached {
                    eprintln!("turn budget exhausted after {turns} turn(s)");
                }
            }
        }
    }

    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
