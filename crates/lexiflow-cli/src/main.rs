//! lexiflow CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use lexiflow_core::CefrLevel;

mod commands;

#[derive(Parser)]
#[command(name = "lexiflow", version, about = "Vocabulary study and assessment sessions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an interactive study and test session
    Study {
        /// CEFR level (A1..C2)
        #[arg(long)]
        level: Option<CefrLevel>,

        /// Topic for the session; omit to let the service choose
        #[arg(long)]
        topic: Option<String>,

        /// Comma-separated target words; skips word selection
        #[arg(long)]
        words: Option<String>,

        /// Content provider name from the config (e.g. "gemini", "offline")
        #[arg(long)]
        provider: Option<String>,

        /// Seed for question and option shuffling
        #[arg(long)]
        seed: Option<u64>,

        /// Spaced-repetition data file
        #[arg(long)]
        srs_file: Option<PathBuf>,

        /// Do not record answers for spaced repetition
        #[arg(long)]
        no_srs: bool,

        /// Save a JSON report each time results are shown
        #[arg(long)]
        save_report: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// List words due for review
    Due {
        /// Spaced-repetition data file
        #[arg(long)]
        srs_file: Option<PathBuf>,

        /// Show every tracked word, not only due ones
        #[arg(long)]
        all: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Normalize and validate a JSON question set
    Check {
        /// Path to a JSON array of question records
        #[arg(long)]
        test: PathBuf,
    },

    /// Create a starter config
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lexiflow=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Study {
            level,
            topic,
            words,
            provider,
            seed,
            srs_file,
            no_srs,
            save_report,
            config,
        } => {
            commands::study::execute(commands::study::StudyOptions {
                level,
                topic,
                words,
                provider,
                seed,
                srs_file,
                no_srs,
                save_report,
                config,
            })
            .await
        }
        Commands::Due {
            srs_file,
            all,
            config,
        } => commands::due::execute(srs_file, all, config),
        Commands::Check { test } => commands::check::execute(test),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
