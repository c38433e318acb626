//! Command-line entrypoint for analysing Terms & Conditions PDFs.
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tc_analyzer::{
    config, logging,
    jobs::AnalysisJob,
    oracle::OllamaClauseOracle,
    parsing::{ChapterDetector, load_layout},
    processing::{AnalyzerService, ClauseAnalyzer},
    rate_limit::build_rate_limiter,
    storage::{JsonlAnalysisSink, TracingStatusReporter},
};
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "tc-analyzer",
    about = "Flag consumer-unfriendly clauses in Terms & Conditions PDFs"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyse a PDF and append the results to the JSON-lines output.
    Analyze {
        /// PDF document to analyse.
        pdf: PathBuf,
        /// Free-text context about the user's situation.
        #[arg(long, default_value = "")]
        context: String,
        /// Identifier stored with every result; a random one is generated when omitted.
        #[arg(long)]
        document_id: Option<String>,
        /// Output file overriding `ANALYSIS_OUTPUT_PATH`.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the chapters detected in a PDF as JSON without calling the oracle.
    Chapters {
        /// PDF document to segment.
        pdf: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    config::init_config().context("failed to load configuration")?;
    let config = config::get_config();
    logging::init_tracing(config.log_file.as_deref());
    tracing::debug!(
        ollama_url = %config.ollama_url,
        model = %config.llm_model_name,
        requests_per_minute = config.llm_requests_per_minute,
        max_concurrent = config.llm_max_concurrent,
        shared_rate_limit = config.redis_url.is_some(),
        "Loaded configuration"
    );

    match cli.command {
        Command::Analyze {
            pdf,
            context,
            document_id,
            output,
        } => {
            let oracle = OllamaClauseOracle::from_config(config)
                .context("failed to build oracle client")?;
            let rate_limiter =
                build_rate_limiter(config.redis_url.as_deref(), config.llm_requests_per_minute)
                    .await
                    .context("failed to initialise rate limiter")?;
            let analyzer =
                ClauseAnalyzer::new(Arc::new(oracle), rate_limiter, config.analyzer_settings());
            let service = AnalyzerService::new(
                ChapterDetector::new(config.parser_settings()),
                analyzer,
            );
            let output = output.unwrap_or_else(|| PathBuf::from(&config.analysis_output_path));
            let job = AnalysisJob::new(
                Arc::new(service),
                Arc::new(JsonlAnalysisSink::new(output)),
                Arc::new(TracingStatusReporter),
            );

            let document_id = document_id.unwrap_or_else(|| Uuid::new_v4().to_string());
            let summary = job
                .run(&document_id, &pdf, &context)
                .await
                .with_context(|| format!("failed to analyse {}", pdf.display()))?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Chapters { pdf } => {
            let layout = tokio::task::spawn_blocking(move || load_layout(&pdf))
                .await
                .context("layout extraction task panicked")??;
            let detector = ChapterDetector::new(config.parser_settings());
            let chapters: Vec<_> = detector.parse_using_re(&layout).collect();
            tracing::info!(
                chapters = chapters.len(),
                headings = detector.has_identifiable_chapters(&layout),
                "Document segmented"
            );
            println!("{}", serde_json::to_string_pretty(&chapters)?);
        }
    }

    Ok(())
}
