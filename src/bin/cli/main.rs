//! CLI tool for browsing nested archive content.

mod commands;
mod exit_codes;
mod output;

use clap::{ArgAction, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};

use exit_codes::ExitCode;

/// Scan and read content nested inside archives and compressed files
#[derive(Parser)]
#[command(name = "burrow")]
#[command(author, version, about = "Scan and read content nested inside archives", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, short = 'f', value_enum, default_value = "human", global = true)]
    format: OutputFormat,

    /// Number of scan threads (0 = auto)
    #[arg(long, short = 't', default_value = "0", global = true)]
    threads: usize,

    /// User agent for HTTP requests
    #[arg(long, env = "BURROW_USER_AGENT", global = true)]
    user_agent: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long, default_value = "600", global = true)]
    timeout: u64,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List every terminal entry reachable from the addresses (alias: s)
    #[command(alias = "s")]
    Scan {
        /// Addresses or local paths to scan
        #[arg(required = true)]
        addresses: Vec<String>,
    },

    /// Write one entry's content to stdout (alias: c)
    #[command(alias = "c")]
    Cat {
        /// Address of the entry, e.g. `bundle.tgz!inner.zip!data.csv`
        address: String,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Human,
    Json,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = commands::Settings {
        format: cli.format,
        threads: cli.threads,
        user_agent: cli.user_agent,
        timeout: std::time::Duration::from_secs(cli.timeout),
    };

    let exit_code = match cli.command {
        Commands::Scan { addresses } => commands::scan(&settings, &addresses),

        Commands::Cat { address } => commands::cat(&settings, &address),

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut std::io::stdout());
            ExitCode::Success
        }
    };

    std::process::exit(exit_code.code());
}
