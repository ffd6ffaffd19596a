//! CLI entry point for `inbox-otp`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use inbox_otp::{Config, ExtractedCode, InboundMessage, Mailbox, MemoryStore, parse_body};

#[derive(Parser)]
#[command(name = "inbox-otp", version, about = "Decode inbound mail and detect verification codes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(short, long, global = true, env = "INBOX_OTP_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest .eml files into an in-memory store and print the records
    Ingest {
        files: Vec<PathBuf>,

        /// Override the recipient taken from the To header
        #[arg(long)]
        to: Option<String>,

        /// Print the recipient inbox index after ingesting
        #[arg(long)]
        show_inbox: bool,
    },
    /// Decode one .eml file and print its parts and detected code
    Extract { file: PathBuf },
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(path: Option<&Path>) -> inbox_otp::Result<Config> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.with_env_overrides()
}

async fn read_message(path: &Path, to: Option<&str>) -> inbox_otp::Result<InboundMessage> {
    let raw = tokio::fs::read(path).await?;
    let mut message = InboundMessage::from_bytes(&raw);
    if let Some(to) = to {
        message.to = to.to_string();
    }
    Ok(message)
}

async fn run_ingest(
    config: &Config,
    files: &[PathBuf],
    to: Option<&str>,
    show_inbox: bool,
) -> inbox_otp::Result<()> {
    let store = MemoryStore::new();
    let mut recipients = Vec::new();

    for path in files {
        let message = match read_message(path, to).await {
            Ok(message) => message,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Skipping unreadable message");
                continue;
            }
        };

        match inbox_otp::ingest(&store, config, &message).await {
            Ok(record) => {
                println!("{}", serde_json::to_string(&record)?);
                if !recipients.contains(&record.to) {
                    recipients.push(record.to);
                }
            }
            Err(e) => error!(path = %path.display(), error = %e, "Mail processing failed"),
        }
    }

    if show_inbox {
        let mailbox = Mailbox::new(&store, config);
        for recipient in &recipients {
            let inbox = mailbox.inbox(recipient).await?;
            println!("{}", serde_json::to_string_pretty(&inbox)?);
        }
    }

    info!(files = files.len(), keys = store.len(), "Ingest finished");
    Ok(())
}

async fn run_extract(config: &Config, file: &Path) -> inbox_otp::Result<()> {
    let message = read_message(file, None).await?;
    let raw = message.raw_text(config.fallback);
    let parts = parse_body(&raw, config.fallback);
    let code = ExtractedCode::extract(&parts.text, &parts.html);

    let report = serde_json::json!({
        "subject": message.subject(),
        "from": message.from,
        "to": message.to,
        "text": parts.text,
        "html": parts.html,
        "verificationCode": code,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match &cli.command {
        Commands::Ingest {
            files,
            to,
            show_inbox,
        } => run_ingest(&config, files, to.as_deref(), *show_inbox).await,
        Commands::Extract { file } => run_extract(&config, file).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
