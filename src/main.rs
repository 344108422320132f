use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use billsift::completion::CompletionService;
use billsift::completion::azure::AzureChatClient;
use billsift::completion::retry::RetryPolicy;
use billsift::config::{Config, DEFAULT_CONFIG_PATH};
use billsift::document::Document;
use billsift::evaluate::DocumentEvaluator;
use billsift::extract::azure::AzureLayoutClient;
use billsift::extract::saved::SavedAnalysis;
use billsift::extract::ExtractionService;
use billsift::pipeline::DocumentProcessor;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "billsift", version, about = "Sectioned summaries of legislative bills")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the full pipeline on one document
    Process {
        /// Bill PDF to analyze
        #[arg(long, value_name = "FILE", required_unless_present = "analysis", conflicts_with = "analysis")]
        pdf: Option<PathBuf>,

        /// Saved layout analysis to use instead of calling the service
        #[arg(long, value_name = "JSON")]
        analysis: Option<PathBuf>,

        /// Reference document supplying exemplars
        #[arg(long, value_name = "JSON")]
        reference: Option<PathBuf>,

        /// Write the generated document here
        #[arg(long, value_name = "JSON")]
        output: Option<PathBuf>,

        /// Score the generated document against the reference
        #[arg(long, requires = "reference")]
        evaluate: bool,
    },

    /// Save the parsed layout analysis of a PDF
    Analyze {
        #[arg(long, value_name = "FILE")]
        pdf: PathBuf,

        #[arg(long, value_name = "JSON")]
        output: PathBuf,
    },

    /// Score a saved generated document against a reference
    Evaluate {
        #[arg(long, value_name = "JSON")]
        generated: PathBuf,

        #[arg(long, value_name = "JSON")]
        reference: PathBuf,
    },

    /// Write a configuration template
    InitConfig {
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Command::InitConfig { path } = &cli.command {
        Config::default().save(path)?;
        println!("Wrote {path}");
        return Ok(());
    }

    let config = Config::load(&cli.config)?;
    config.validate().context("invalid configuration")?;

    match cli.command {
        Command::Process {
            pdf,
            analysis,
            reference,
            output,
            evaluate,
        } => {
            let reference = reference
                .as_deref()
                .map(Document::load)
                .transpose()
                .context("failed to load reference document")?;

            let completion = completion_client(&config)?;
            let processed = match (pdf, analysis) {
                (Some(pdf), _) => {
                    let extractor: Arc<dyn ExtractionService> = Arc::new(
                        AzureLayoutClient::from_config(&config.extraction)
                            .context("failed to configure layout service")?,
                    );
                    DocumentProcessor::new(extractor, completion.clone(), config.pipeline.clone())
                        .process_pdf(&pdf, reference.as_ref())
                        .await
                        .with_context(|| format!("failed to process {}", pdf.display()))?
                }
                (None, Some(path)) => {
                    let extractor: Arc<dyn ExtractionService> = Arc::new(SavedAnalysis::new(&path));
                    DocumentProcessor::new(extractor, completion.clone(), config.pipeline.clone())
                        .process_bytes(&[], reference.as_ref())
                        .await
                        .with_context(|| format!("failed to process {}", path.display()))?
                }
                (None, None) => anyhow::bail!("either --pdf or --analysis is required"),
            };

            print!("{}", processed.document);
            for (label, reason) in &processed.failures {
                eprintln!("[WARN] {label} section not generated: {reason}");
            }
            info!(
                "{} chunks, {} unclassified, {} filed under Other, {} dropped",
                processed.stats.chunks,
                processed.stats.unclassified,
                processed.stats.aggregation.fallback,
                processed.stats.aggregation.dropped
            );

            if let Some(path) = output {
                processed.document.save(&path)?;
                info!("Saved generated document to {}", path.display());
            }

            if let (true, Some(reference)) = (evaluate, &reference) {
                let report = evaluator(&config, completion)
                    .compare(&processed.document, reference)
                    .await;
                print!("\n{report}");
            }
        }
        Command::Analyze { pdf, output } => {
            let client = AzureLayoutClient::from_config(&config.extraction)
                .context("failed to configure layout service")?;
            let bytes = tokio::fs::read(&pdf)
                .await
                .with_context(|| format!("failed to read {}", pdf.display()))?;
            let result = client.analyze(&bytes).await.context("layout analysis failed")?;
            let json = serde_json::to_string_pretty(&result)?;
            std::fs::write(&output, json)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!(
                "Saved analysis of {} ({} paragraphs, {} tables) to {}",
                pdf.display(),
                result.paragraphs.len(),
                result.tables.len(),
                output.display()
            );
        }
        Command::Evaluate {
            generated,
            reference,
        } => {
            let generated = Document::load(&generated).context("failed to load generated document")?;
            let reference = Document::load(&reference).context("failed to load reference document")?;
            let report = evaluator(&config, completion_client(&config)?)
                .compare(&generated, &reference)
                .await;
            print!("{report}");
        }
        Command::InitConfig { .. } => unreachable!("handled above"),
    }

    Ok(())
}

fn completion_client(config: &Config) -> Result<Arc<dyn CompletionService>> {
    let client = AzureChatClient::from_config(&config.completion)
        .context("failed to configure completion service")?;
    Ok(Arc::new(client))
}

fn evaluator(config: &Config, completion: Arc<dyn CompletionService>) -> DocumentEvaluator {
    DocumentEvaluator::new(
        completion,
        config.pipeline.concurrency,
        RetryPolicy::from(&config.pipeline.retry),
    )
}
