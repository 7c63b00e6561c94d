//! inbox-trust: rank mailbox senders by a trust score.
//!
//! Usage:
//!   inbox-trust score --max-results 25
//!   inbox-trust score --input inbox.jsonl --format table
//!   inbox-trust explain "Thanks, I really appreciate the help"
//!   inbox-trust config

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inbox_trust::config::{ClassifierProvider, Config, RunOverrides, SourceProvider};
use inbox_trust::report::{ReportFormat, ReportSink, WriterSink, render_breakdown};
use inbox_trust::{Message, ModelCache, TrustPipeline, run_trust_scoring};
use std::io::Read;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "inbox-trust")]
#[command(about = "Score mailbox senders by sentiment and keyword trust signals", long_about = None)]
struct Cli {
    /// TOML config file (default: $TRUST_CONFIG or inbox_trust.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch messages, score them and print per-sender trust
    Score {
        #[arg(long)]
        max_results: Option<usize>,
        /// gmail or file
        #[arg(long)]
        source: Option<SourceProvider>,
        /// Read messages from a JSON / JSON Lines file (implies --source file)
        #[arg(long)]
        input: Option<PathBuf>,
        /// local, remote or lexicon
        #[arg(long)]
        classifier: Option<ClassifierProvider>,
        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,
        /// Fail the run on the first message that cannot be scored
        #[arg(long)]
        abort_on_error: bool,
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Score one text (argument or stdin) and show each component
    Explain {
        text: Option<String>,
        #[arg(long)]
        classifier: Option<ClassifierProvider>,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs on stderr so JSON reports on stdout stay parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("inbox_trust=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Validated once, after the command's own flags are layered on
    let mut config =
        Config::load_unvalidated(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Score {
            max_results,
            source,
            input,
            classifier,
            format,
            abort_on_error,
            concurrency,
        } => {
            RunOverrides {
                max_results,
                source,
                input,
                classifier,
                abort_on_error,
                concurrency,
            }
            .apply(&mut config);
            config.validate()?;
            score(&config, format).await
        }
        Commands::Explain { text, classifier } => {
            if let Some(c) = classifier {
                config.classifier.provider = c;
            }
            config.validate()?;
            let text = match text {
                Some(t) => t,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read text from stdin")?;
                    buf
                }
            };
            explain(&config, text).await
        }
        Commands::Config => {
            config.validate()?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

async fn score(config: &Config, format: ReportFormat) -> Result<()> {
    let cache = ModelCache::new();
    let report = run_trust_scoring(config, &cache).await?;
    info!(run_id = %report.run_id, "Run complete");
    let mut sink = WriterSink::new(std::io::stdout().lock(), format);
    sink.emit(&report)?;
    Ok(())
}

async fn explain(config: &Config, text: String) -> Result<()> {
    let cache = ModelCache::new();
    let models = cache.get_or_load(config).await?;
    let pipeline = TrustPipeline::new(models, config)?;
    let scored = pipeline
        .score_message(&Message::new("stdin", None, text))
        .await?;
    render_breakdown(&mut std::io::stdout().lock(), &scored)?;
    Ok(())
}
