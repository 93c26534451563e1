//! CLI command definitions for the `persona-chat` binary.
//!
//! Uses clap derive macros for argument parsing. Global flags override the
//! TOML config file and environment variables.

pub mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use persona_types::config::ChatConfig;

/// Persona chat backend.
#[derive(Parser)]
#[command(name = "persona-chat", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Optional TOML config file.
    #[arg(long, global = true, env = "PERSONA_CHAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite connection URL (e.g. sqlite://chatbot.db?mode=rwc).
    #[arg(long, global = true, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Path of the persona text file.
    #[arg(long, global = true, env = "PERSONA_FILE_PATH")]
    pub persona_file: Option<String>,

    /// Emit logs as newline-delimited JSON.
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API server.
    Serve {
        /// Address to bind.
        #[arg(long, env = "HOST", default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on.
        #[arg(short, long, env = "PORT", default_value_t = 8000)]
        port: u16,
    },

    /// Print the health report and system status as JSON, then exit.
    Status,
}

impl Cli {
    /// Apply flag values on top of the file and environment config.
    pub fn apply_overrides(&self, config: &mut ChatConfig) {
        if let Some(url) = &self.database_url {
            config.database_url = url.clone();
        }
        if let Some(path) = &self.persona_file {
            config.persona_file = path.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::try_parse_from(["persona-chat", "serve"]).unwrap();
        match cli.command {
            Commands::Serve { host, port } => {
                // HOST/PORT may be set in the environment running the tests.
                if std::env::var("HOST").is_err() {
                    assert_eq!(host, "0.0.0.0");
                }
                if std::env::var("PORT").is_err() {
                    assert_eq!(port, 8000);
                }
            }
            Commands::Status => panic!("expected serve"),
        }
    }

    #[test]
    fn test_global_flags_override_config() {
        let cli = Cli::try_parse_from([
            "persona-chat",
            "status",
            "--database-url",
            "sqlite://flag.db?mode=rwc",
            "--persona-file",
            "/srv/luna.txt",
            "-vv",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Status));
        assert_eq!(cli.verbose, 2);

        let mut config = ChatConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.database_url, "sqlite://flag.db?mode=rwc");
        assert_eq!(config.persona_file, "/srv/luna.txt");
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
