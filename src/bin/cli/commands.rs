//! Command implementations for the CLI tool.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use burrow::{
    CancellationToken, Config, Entry, Result, ScanOptions, Scanner, ShutdownPolicy, Stream,
    Threads,
};

use crate::OutputFormat;
use crate::exit_codes::{self, ExitCode, error_to_exit_code};
use crate::output::{EntryLine, OutputFormatter, create_formatter};

/// Options shared by every command.
pub struct Settings {
    pub format: OutputFormat,
    pub threads: usize,
    pub user_agent: Option<String>,
    pub timeout: Duration,
}

impl Settings {
    fn config(&self) -> Config {
        let config = Config::new().http_timeout(self.timeout);
        match &self.user_agent {
            Some(user_agent) => config.user_agent(user_agent.clone()),
            None => config,
        }
    }
}

/// Scan command implementation
pub fn scan(settings: &Settings, addresses: &[String]) -> ExitCode {
    let formatter: Arc<dyn OutputFormatter> = Arc::from(create_formatter(settings.format));
    let config = settings.config();

    let token = CancellationToken::new();
    let interrupt = token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        if interrupt.cancel_with("interrupted") {
            eprintln!("\nInterrupted, stopping scan");
        }
    }) {
        log::warn!("cannot install Ctrl+C handler: {e}");
    }

    let options = ScanOptions::new()
        .threads(Threads::count_or_single(settings.threads))
        .shutdown(ShutdownPolicy::Cancel)
        .config(config.clone())
        .token(token);
    let lines = Arc::clone(&formatter);
    let scanner = match Scanner::with_options(
        move |entry: &Entry| -> Result<()> { print_entry(lines.as_ref(), entry) },
        options,
    ) {
        Ok(scanner) => scanner,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FatalError;
        }
    };

    let mut worst = ExitCode::Success;
    for address in addresses {
        let code = scan_one(&scanner, formatter.as_ref(), address, &config);
        worst = worst.max(code);
        if code == ExitCode::UserInterrupt {
            break;
        }
    }
    scanner.close();
    worst
}

fn scan_one(
    scanner: &Scanner,
    formatter: &dyn OutputFormatter,
    address: &str,
    config: &Config,
) -> ExitCode {
    let result = Entry::resolve_with(address, config.clone()).and_then(|root| scanner.scan(&root));
    match result {
        Ok(summary) => {
            eprintln!("{}", formatter.format_summary(address, &summary));
            if summary.is_complete() {
                ExitCode::Success
            } else {
                ExitCode::Partial
            }
        }
        Err(e) => {
            eprintln!("Error: {}: {}", address, e);
            error_to_exit_code(&e)
        }
    }
}

fn print_entry(formatter: &dyn OutputFormatter, entry: &Entry) -> Result<()> {
    let mut size = 0u64;
    entry.for_each_chunk(|chunk| {
        size += chunk.len() as u64;
        Ok(())
    })?;
    let line = formatter.format_entry(&EntryLine {
        address: entry.address(),
        size,
        modified: entry.modified(),
    });
    writeln!(io::stdout().lock(), "{}", line)?;
    Ok(())
}

/// Cat command implementation
pub fn cat(settings: &Settings, address: &str) -> ExitCode {
    if let Err(e) = ctrlc::set_handler(|| {
        eprintln!("\nInterrupted");
        std::process::exit(exit_codes::USER_INTERRUPT);
    }) {
        log::warn!("cannot install Ctrl+C handler: {e}");
    }

    match copy_to_stdout(settings, address) {
        Ok(bytes) => {
            log::debug!("{address}: wrote {bytes} bytes");
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("Error: {}: {}", address, e);
            error_to_exit_code(&e)
        }
    }
}

fn copy_to_stdout(settings: &Settings, address: &str) -> Result<u64> {
    let entry = Entry::resolve_with(address, settings.config())?;
    let mut stream = entry.open()?;
    let copied = io::copy(&mut stream, &mut io::stdout().lock());
    let closed = stream.close();
    let copied = copied?;
    closed?;
    Ok(copied)
}
