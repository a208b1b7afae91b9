use std::path::PathBuf;
use std::time::Duration;

use assubot_cli::cli::{run_command, CliCommand, CliConfig};
use assubot_core::models::ListContractsArgs;
use assubot_core::services::ContractScope;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "assubot-cli")]
#[command(about = "Command-line client for AssuBot")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    /// Path to JSON config file (apiBaseUrl, realtime, credentials)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Override the REST base URL
    #[arg(long)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session token in the OS keyring
    Login {
        email: String,
        #[arg(long)]
        password: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// List contracts
    Contracts {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        limit: u32,
        /// Filter by contract status
        #[arg(long)]
        status: Option<String>,
        #[arg(long, short = 's')]
        search: Option<String>,
        /// Admin templates instead of your own contracts
        #[arg(long)]
        templates: bool,
    },

    /// Show one contract
    Show {
        id: String,
        #[arg(long)]
        templates: bool,
    },

    /// Dashboard statistics
    Stats,

    /// Request an AI summary of a contract
    Summarize {
        id: String,
        #[arg(long)]
        templates: bool,
        /// Wait for the realtime completion event
        #[arg(long, short = 'w')]
        wait: bool,
        /// Seconds to wait with --wait
        #[arg(long, default_value_t = 120)]
        timeout: u64,
    },

    /// Print realtime events as JSON lines until interrupted
    Watch,
}

fn scope(templates: bool) -> ContractScope {
    if templates {
        ContractScope::Template
    } else {
        ContractScope::User
    }
}

#[tokio::main]
async fn main() {
    assubot_core::tracing_setup::init_tracing_with_filter("warn");

    let cli = Cli::parse();

    let mut config = match CliConfig::resolve(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    if let Some(url) = cli.api_url {
        config.core.api_base_url = url;
    }

    let command = match cli.command {
        Some(Commands::Login { email, password }) => CliCommand::Login { email, password },
        Some(Commands::Logout) => CliCommand::Logout,
        Some(Commands::Whoami) => CliCommand::Whoami,
        Some(Commands::Contracts {
            page,
            limit,
            status,
            search,
            templates,
        }) => CliCommand::ListContracts {
            scope: scope(templates),
            args: ListContractsArgs {
                page,
                limit,
                status,
                search,
            },
        },
        Some(Commands::Show { id, templates }) => CliCommand::ShowContract {
            scope: scope(templates),
            id,
        },
        Some(Commands::Stats) => CliCommand::Stats,
        Some(Commands::Summarize {
            id,
            templates,
            wait,
            timeout,
        }) => CliCommand::Summarize {
            scope: scope(templates),
            id,
            wait: wait.then(|| Duration::from_secs(timeout)),
        },
        Some(Commands::Watch) => CliCommand::Watch,
        None => {
            eprintln!("No command specified. Use --help for usage.");
            std::process::exit(1);
        }
    };

    if let Err(e) = run_command(command, config, cli.pretty).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
