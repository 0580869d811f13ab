//! masterygate CLI: record attempts, inspect progress, and gate level changes.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "masterygate",
    version,
    about = "Evidence-based mastery tracking and progression gating"
)]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter config and concept catalog
    Init,

    /// Validate the configuration and concept catalog
    Validate {
        /// Catalog to validate instead of the configured one
        #[arg(long)]
        catalog: Option<PathBuf>,
    },

    /// Score a written justification without recording anything
    Analyze {
        /// The justification text
        #[arg(long)]
        text: String,

        /// Terms the justification is expected to mention (comma-separated)
        #[arg(long)]
        expect: Option<String>,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Record one attempt
    Submit {
        #[arg(long)]
        learner: String,

        #[arg(long)]
        concept: String,

        /// The answer was correct
        #[arg(long)]
        correct: bool,

        /// The learner's justification
        #[arg(long)]
        reasoning: String,

        /// Tries used before answering
        #[arg(long, default_value = "1")]
        attempts_used: u32,

        /// Time spent on the attempt in milliseconds
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        time_ms: i64,

        /// practice, assessment, or review
        #[arg(long, default_value = "practice")]
        context: String,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Ask whether a learner may move to a level
    Evaluate {
        #[arg(long)]
        learner: String,

        /// Target level
        #[arg(long)]
        level: u32,

        /// Exit code 1 if the decision is BLOCK
        #[arg(long)]
        fail_on_block: bool,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// List concepts due for review
    Due {
        #[arg(long)]
        learner: String,

        /// Output format: text, json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Summarize a learner's progress
    Report {
        #[arg(long)]
        learner: String,

        /// Output format: markdown, json
        #[arg(long, default_value = "markdown")]
        format: String,

        /// Write the report to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Ingest a JSON-lines file of recorded attempts
    Replay {
        /// Attempts file, one JSON submission per line
        #[arg(long)]
        input: PathBuf,

        /// Learners replayed concurrently
        #[arg(long, default_value = "4")]
        parallelism: usize,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("masterygate=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Init => commands::init::execute(),
        Commands::Validate { catalog } => commands::validate::execute(config, catalog),
        Commands::Analyze {
            text,
            expect,
            format,
        } => commands::analyze::execute(config, text, expect, format),
        Commands::Submit {
            learner,
            concept,
            correct,
            reasoning,
            attempts_used,
            time_ms,
            context,
            format,
        } => commands::submit::execute(
            config,
            commands::submit::SubmitArgs {
                learner,
                concept,
                correct,
                reasoning,
                attempts_used,
                time_ms,
                context,
            },
            format,
        ),
        Commands::Evaluate {
            learner,
            level,
            fail_on_block,
            format,
        } => commands::evaluate::execute(config, learner, level, fail_on_block, format),
        Commands::Due { learner, format } => commands::due::execute(config, learner, format),
        Commands::Report {
            learner,
            format,
            output,
        } => commands::report::execute(config, learner, format, output),
        Commands::Replay { input, parallelism } => {
            commands::replay::execute(config, input, parallelism).await
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
