//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod chat;
pub mod history;
pub mod model_list;
pub mod settings;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::chat::{run_chat, ChatArgs};
use crate::cli::history::{run_clear, run_export};
use crate::cli::model_list::{list_models, ModelFilter};
use crate::cli::settings::{run_set, run_unset, show_config};
use crate::core::export::ExportFormat;
use crate::utils::logging::{init_tracing, TranscriptLog};

#[derive(Parser)]
#[command(name = "routechat")]
#[command(about = "A streaming chat client for OpenRouter")]
#[command(
    long_about = "routechat sends conversations to models available through OpenRouter and \
streams the answers to your terminal. Free models are listed first; premium models are \
filtered to well-known families and balanced across providers.\n\n\
Authentication:\n\
  Use 'routechat set api-key <KEY>' to store your OpenRouter key (starts with sk-or-v1-).\n\n\
Environment Variables:\n\
  OPENROUTER_API_KEY    API key used when none is stored\n\
  OPENROUTER_BASE_URL   Custom API base URL (optional, defaults to https://openrouter.ai/api/v1)\n\
  ROUTECHAT_LOG         Log filter for diagnostics on stderr (e.g. debug)"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Append each exchange to a transcript file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Print debug diagnostics on stderr
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a message and stream the answer
    Chat {
        /// Message text (can be multiple words)
        prompt: Vec<String>,
        /// Attach an image (png, jpg, gif or webp, up to 10MB)
        #[arg(short = 'i', long, value_name = "PATH")]
        image: Option<PathBuf>,
        /// Model to use for this message
        #[arg(short = 'm', long, value_name = "MODEL")]
        model: Option<String>,
        /// Wait for the full answer instead of streaming it
        #[arg(long)]
        no_stream: bool,
        /// Do not prepend the system prompt
        #[arg(long)]
        no_system_prompt: bool,
    },
    /// List the model catalog
    Models {
        /// Only show free models
        #[arg(long, conflicts_with = "premium")]
        free: bool,
        /// Only show premium models
        #[arg(long)]
        premium: bool,
        /// Refresh the catalog and report counts without listing
        #[arg(long)]
        refresh_only: bool,
    },
    /// Export the conversation history
    Export {
        /// Output format: markdown or json
        #[arg(short = 'f', long, default_value = "markdown")]
        format: ExportFormat,
        /// Output file (defaults to chat-export-<timestamp>.<ext>)
        #[arg(short = 'o', long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Delete the local conversation history
    Clear,
    /// Set a preference
    Set {
        /// Preference key (api-key, model, temperature, top-p, data-collection,
        /// training-data, output-publishing)
        key: String,
        /// Value to set for the key
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Reset a preference to its default
    Unset {
        /// Preference key to reset
        key: String,
    },
    /// Show preferences and configuration
    Config,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command {
        Commands::Chat {
            prompt,
            image,
            model,
            no_stream,
            no_system_prompt,
        } => {
            let transcript = match args.log {
                Some(path) => Some(TranscriptLog::new(path)?),
                None => None,
            };
            run_chat(
                ChatArgs {
                    prompt,
                    image,
                    model,
                    no_stream,
                    no_system_prompt,
                },
                transcript,
            )
            .await
        }
        Commands::Models {
            free,
            premium,
            refresh_only,
        } => {
            let filter = match (free, premium) {
                (true, _) => ModelFilter::Free,
                (_, true) => ModelFilter::Premium,
                _ => ModelFilter::All,
            };
            list_models(filter, refresh_only).await
        }
        Commands::Export { format, output } => run_export(format, output),
        Commands::Clear => run_clear(),
        Commands::Set { key, value } => run_set(&key, &value),
        Commands::Unset { key } => run_unset(&key),
        Commands::Config => show_config(),
    }
}
