//! `mailsift` - Batch MIME message ingestion
//!
//! Parses `.eml` files with `mailsift-mime` and writes one JSON record per
//! message.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod config;
mod ingest;
mod sink;

use anyhow::Context;
use clap::{Parser as _, Subcommand};
use mailsift_mime::Parser;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;
use sink::{EmailRecord, JsonLinesSink};

#[derive(clap::Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (defaults to `<config dir>/mailsift/config.json`)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Maximum multipart nesting depth
    #[arg(long, global = true)]
    max_depth: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse one message and print its record
    Parse {
        /// Message file
        file: PathBuf,
    },
    /// Parse every file in a directory
    Load {
        /// Directory of message files
        dir: PathBuf,

        /// Number of messages parsed concurrently
        #[arg(short, long)]
        jobs: Option<usize>,

        /// JSON-lines output file (stdout when unset)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailsift=info,mailsift_mime=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref())?;
    if let Some(max_depth) = args.max_depth {
        config.max_depth = max_depth;
    }
    let parser = Parser::new(config.parse_options());

    match args.command {
        Command::Parse { file } => {
            let raw = tokio::fs::read(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            let message = parser
                .parse(&raw)
                .with_context(|| format!("parsing {}", file.display()))?;

            let record = EmailRecord::new(
                &ingest::source_name(&file),
                &message,
                chrono::Utc::now(),
            );
            let mut stdout = std::io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, &record)?;
            writeln!(stdout)?;
        }
        Command::Load { dir, jobs, output } => {
            if let Some(jobs) = jobs.filter(|&jobs| jobs > 0) {
                config.jobs = jobs;
            }
            if output.is_some() {
                config.output = output;
            }

            let writer: Box<dyn Write> = match &config.output {
                Some(path) => Box::new(
                    std::fs::File::create(path)
                        .with_context(|| format!("creating {}", path.display()))?,
                ),
                None => Box::new(std::io::stdout()),
            };
            let mut sink = JsonLinesSink::new(BufWriter::new(writer));

            info!("Starting mailsift");
            let summary =
                ingest::ingest_directory(&dir, Arc::new(parser), config.jobs, &mut sink).await?;

            info!(
                total = summary.total,
                stored = summary.stored,
                failed = summary.failed,
                "Ingestion complete"
            );
            eprintln!(
                "{} messages: {} stored, {} failed",
                summary.total, summary.stored, summary.failed
            );
        }
    }

    Ok(())
}
