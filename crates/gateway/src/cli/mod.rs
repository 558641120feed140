pub mod config;
pub mod run;
pub mod tools;

use clap::{Parser, Subcommand};

/// GraphWeaver: builds knowledge graphs through a tool-using model.
#[derive(Debug, Parser)]
#[command(name = "graphweaver", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the HTTP server (default when no subcommand is given).
    Serve,
    /// Run a single request and print the events as they happen.
    Run {
        /// The message to send.
        message: String,
        /// Model override.
        #[arg(long)]
        model: Option<String>,
        /// Profile from `[profiles]` in the config file.
        #[arg(long)]
        profile: Option<String>,
        /// Identity forwarded to the storage service.
        #[arg(long)]
        caller: Option<String>,
        /// Run in batch mode and print the summary and log as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Tool catalog utilities.
    #[command(subcommand)]
    Tools(ToolsCommand),
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ToolsCommand {
    /// Build the catalog and list every tool offered to the model.
    List {
        /// Print full definitions as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `GW_CONFIG` (or `config.toml`
/// by default). A missing file yields the defaults. Returns the parsed
/// [`Config`](gw_domain::config::Config) and the path that was used.
pub fn load_config() -> anyhow::Result<(gw_domain::config::Config, String)> {
    let config_path = std::env::var("GW_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = load_config_from(&config_path)?;
    Ok((config, config_path))
}

pub fn load_config_from(config_path: &str) -> anyhow::Result<gw_domain::config::Config> {
    if !std::path::Path::new(config_path).exists() {
        return Ok(gw_domain::config::Config::default());
    }
    let raw = std::fs::read_to_string(config_path).map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_flags_parse() {
        let cli = Cli::parse_from(["graphweaver", "run", "hello", "--profile", "terse", "--json"]);
        match cli.command {
            Some(Command::Run { message, profile, json, model, .. }) => {
                assert_eq!(message, "hello");
                assert_eq!(profile.as_deref(), Some("terse"));
                assert!(json);
                assert!(model.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn missing_file_means_defaults() {
        let cfg = load_config_from("/definitely/not/here/config.toml").unwrap();
        assert_eq!(cfg.engine.max_turns, 12);
    }

    #[test]
    fn file_is_parsed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[engine]\nmax_turns = 4\n\n[catalog]\nprefix = \"g_\"").unwrap();
        let cfg = load_config_from(file.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.engine.max_turns, 4);
        assert_eq!(cfg.catalog.prefix, "g_");
    }

    #[test]
    fn parse_errors_name_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[engine\nmax_turns = ").unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains(&path));
    }
}
