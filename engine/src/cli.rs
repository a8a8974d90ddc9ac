//! CLI interface for Yojana Sahayak
//!
//! This module provides the command-line interface using clap's derive API.
//! It defines the commands and global flags for talking to the scheme
//! discovery agent.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Yojana Sahayak — government scheme discovery agent
///
/// A dialogue agent that helps a citizen find welfare schemes they are
/// eligible for, by asking for the details that matter and matching them
/// against the scheme catalog.
#[derive(Parser, Debug)]
#[command(name = "yojana")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log: Option<String>,

    /// Specify alternate configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Specify alternate scheme catalog file
    #[arg(long, global = true, value_name = "PATH")]
    pub catalog: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start an interactive chat session
    Chat {
        /// User identifier; resumes and persists the profile
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Ask a single question and print the reply
    Ask {
        /// The question to ask
        #[arg(required_unless_present = "voice")]
        text: Option<String>,

        /// User identifier; resumes and persists the profile
        #[arg(short, long)]
        user: Option<String>,

        /// Transcribe this WAV file and use it as the question
        #[arg(long, value_name = "PATH")]
        voice: Option<PathBuf>,
    },

    /// List the schemes in the loaded catalog
    Schemes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_chat() {
        let cli = Cli::try_parse_from(["yojana", "chat", "--user", "ravi"]).unwrap();
        match cli.command {
            Command::Chat { user } => assert_eq!(user.as_deref(), Some("ravi")),
            _ => panic!("expected chat command"),
        }
    }

    #[test]
    fn test_cli_parses_ask_with_catalog_override() {
        let cli = Cli::try_parse_from([
            "yojana",
            "--catalog",
            "/tmp/schemes.json",
            "ask",
            "which schemes can I get?",
        ])
        .unwrap();

        assert!(cli.catalog.is_some());
        match cli.command {
            Command::Ask { text, user, voice } => {
                assert_eq!(text.as_deref(), Some("which schemes can I get?"));
                assert!(user.is_none());
                assert!(voice.is_none());
            }
            _ => panic!("expected ask command"),
        }
    }

    #[test]
    fn test_cli_ask_accepts_voice_instead_of_text() {
        let cli =
            Cli::try_parse_from(["yojana", "ask", "--voice", "/tmp/question.wav"]).unwrap();
        match cli.command {
            Command::Ask { text, voice, .. } => {
                assert!(text.is_none());
                assert!(voice.is_some());
            }
            _ => panic!("expected ask command"),
        }

        // Neither text nor voice is an error
        assert!(Cli::try_parse_from(["yojana", "ask"]).is_err());
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["yojana"]).is_err());
    }
}
