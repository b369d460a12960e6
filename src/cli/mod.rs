//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod chats;
pub mod context;
pub mod login;
pub mod settings;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::context::Context;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_DESCRIBE"),
    ", built ",
    env!("VERGEN_BUILD_DATE"),
    ")"
);

#[derive(Parser)]
#[command(name = "rapport")]
#[command(version = VERSION)]
#[command(about = "A terminal client for your companion chat backend")]
#[command(
    long_about = "Rapport signs you in with Google, lists and manages your chat sessions, \
sends messages, and shows the memories your companion associates with them.\n\n\
Running `rapport` with no command starts an interactive session.\n\n\
Environment Variables:\n\
  RAPPORT_BACKEND_URL   Backend base URL (defaults to http://localhost:8000)\n\
  RAPPORT_TOKEN         Bearer token to use instead of the stored one\n\
  RAPPORT_LOG           Diagnostic log filter, e.g. `debug` or `rapport=trace`\n\n\
Interactive commands:\n\
  /help                 List every command\n\
  /new [message]        Start a chat\n\
  /open <n|id>          Open a chat\n\
  /log <filename>       Log the conversation to a file"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Backend base URL (beats RAPPORT_BACKEND_URL and the config file)
    #[arg(long, global = true, value_name = "URL")]
    pub backend_url: Option<String>,

    /// Keep tokens in memory only; pair with RAPPORT_TOKEN
    #[arg(long, global = true)]
    pub no_keyring: bool,

    /// Log the conversation to the specified file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Sign in with Google
    Login {
        /// Authorization code to exchange instead of running the browser flow
        #[arg(long)]
        code: Option<String>,
        /// Print the sign-in URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },
    /// Sign out and forget the stored token
    Logout,
    /// Show the signed-in profile
    Whoami,
    /// List your chats
    Chats,
    /// Start a new chat, optionally with an opening message
    New {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        message: Vec<String>,
    },
    /// Send a message to a chat
    Send {
        /// Chat number (from `rapport chats`) or id
        chat: String,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        message: Vec<String>,
    },
    /// Print a conversation
    Show {
        /// Chat number (from `rapport chats`) or id
        chat: String,
        /// Also list related memories under each of your messages
        #[arg(long)]
        memories: bool,
    },
    /// Delete a chat
    Delete {
        /// Chat number (from `rapport chats`) or id
        chat: String,
    },
    /// Look up memories related to some text
    Memories {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        query: Vec<String>,
    },
    /// Show or change the relationship stage
    Stage {
        /// acquaintance, friend or girlfriend
        stage: Option<String>,
    },
    /// Start the interactive session (default)
    Chat,
    /// Set a configuration value
    Set {
        /// Configuration key to set
        key: String,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset a configuration value
    Unset {
        /// Configuration key to unset
        key: String,
    },
    /// Print the current configuration
    Config,
}

pub fn main() {
    let args = Args::parse();
    crate::logging::init_tracing();

    let result = tokio::runtime::Runtime::new()
        .map_err(|err| -> Box<dyn Error> { Box::new(err) })
        .and_then(|runtime| runtime.block_on(async_main(args)));
    if let Err(err) = result {
        eprintln!("❌ {err}");
        std::process::exit(1);
    }
}

async fn async_main(mut args: Args) -> Result<(), Box<dyn Error>> {
    // Config edits work even when the configured backend URL is broken.
    match args.command.take().unwrap_or(Commands::Chat) {
        Commands::Set { key, value } => settings::set(&key, &value),
        Commands::Unset { key } => settings::unset(&key),
        Commands::Config => settings::show(args.backend_url.as_deref()),
        command => run_with_backend(command, &args).await,
    }
}

async fn run_with_backend(command: Commands, args: &Args) -> Result<(), Box<dyn Error>> {
    let ctx = Context::load(args)?;
    match command {
        Commands::Login { code, no_browser } => login::login(&ctx, code, no_browser).await,
        Commands::Logout => login::logout(&ctx),
        Commands::Whoami => chats::whoami(&ctx),
        Commands::Chats => chats::list(&ctx).await,
        Commands::New { message } => chats::new_chat(&ctx, &message.join(" ")).await,
        Commands::Send { chat, message } => chats::send(&ctx, &chat, &message.join(" ")).await,
        Commands::Show { chat, memories } => chats::show(&ctx, &chat, memories).await,
        Commands::Delete { chat } => chats::delete(&ctx, &chat).await,
        Commands::Memories { query } => chats::memories(&ctx, &query.join(" ")).await,
        Commands::Stage { stage } => chats::stage(&ctx, stage.as_deref()).await,
        Commands::Chat => chats::interactive(&ctx, args.log.clone()).await,
        // Handled in async_main.
        Commands::Set { .. } | Commands::Unset { .. } | Commands::Config => Ok(()),
    }
}
