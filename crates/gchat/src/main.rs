//! Google Chat MCP launcher
//!
//! - `serve`: run the MCP server over stdio
//! - `tools`: print the tool catalog
//! - `check-auth`: fetch one access token and report the result

use clap::{Parser, Subcommand};
use gchat_logging::{gchat_home, init_logging, LogConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

mod cli;

#[derive(Parser, Debug)]
#[command(name = "gchat", version, about = "Google Chat as MCP tools")]
struct Cli {
    /// Enable verbose logging (debug to stderr and the log file)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(flatten)]
    credentials: CredentialArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Credential settings, read from the environment (or `.env`) by default
#[derive(clap::Args, Debug, Clone)]
pub struct CredentialArgs {
    /// Service account key file
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS", global = true)]
    pub credentials: Option<PathBuf>,

    /// OAuth2 client id
    #[arg(long, env = "GOOGLE_CLIENT_ID", global = true, hide_env_values = true)]
    pub client_id: Option<String>,

    /// OAuth2 client secret
    #[arg(long, env = "GOOGLE_CLIENT_SECRET", global = true, hide_env_values = true)]
    pub client_secret: Option<String>,

    /// OAuth2 refresh token
    #[arg(long, env = "GOOGLE_REFRESH_TOKEN", global = true, hide_env_values = true)]
    pub refresh_token: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the MCP server over stdio
    Serve {
        /// Space used when a tool call names none (e.g., spaces/AAAA1234567)
        #[arg(long, env = "GOOGLE_CHAT_DEFAULT_SPACE")]
        default_space: Option<String>,

        /// Per-call deadline in seconds
        #[arg(long, default_value = "120")]
        timeout_secs: u64,

        /// Maximum tool output size in bytes
        #[arg(long, default_value = "1048576")]
        max_response_bytes: usize,

        /// Write an NDJSON audit log of tool calls to ~/.gchat_mcp/mcp_audit.ndjson
        #[arg(long)]
        audit: bool,
    },

    /// Print the tool catalog
    Tools {
        /// Output as JSON (names, descriptions, input schemas)
        #[arg(long)]
        json: bool,
    },

    /// Verify the configured credentials by fetching an access token
    CheckAuth,
}

fn run_command(cli: Cli) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match cli.command {
        Commands::Serve {
            default_space,
            timeout_secs,
            max_response_bytes,
            audit,
        } => runtime.block_on(cli::mcp::serve(cli::mcp::ServeArgs {
            credentials: cli.credentials,
            default_space,
            timeout_secs,
            max_response_bytes,
            audit_log_path: audit.then(|| gchat_home().join("mcp_audit.ndjson")),
        })),
        Commands::Tools { json } => runtime.block_on(cli::mcp::list_tools(json)),
        Commands::CheckAuth => runtime.block_on(cli::mcp::check_auth(cli.credentials)),
    }
}

fn main() -> ExitCode {
    // .env must be loaded before clap reads env-backed arguments
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let _log_guard = match init_logging(LogConfig {
        app_name: "gchat",
        verbose: cli.verbose,
    }) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: failed to initialize logging: {:#}", e);
            None
        }
    };

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
