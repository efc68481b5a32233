use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_sra_meta::app::{App, RunSummary};
use kira_sra_meta::config::{ConfigLoader, Overrides};
use kira_sra_meta::error::SraMetaError;
use kira_sra_meta::ncbi::EutilsHttpClient;
use kira_sra_meta::output::{JsonOutput, OutputMode, default_output_path};
use kira_sra_meta::progress::TerminalProgress;

#[derive(Parser)]
#[command(name = "kira-sra-meta")]
#[command(about = "Harvest SRA run metadata for a search term into a TSV")]
#[command(version, author)]
struct Cli {
    #[arg(long, help = "Search term (default: sars-cov-2 wastewater)")]
    term: Option<String>,

    #[arg(long, help = "Start publication date, YYYY/MM/DD")]
    start: Option<String>,

    #[arg(long, help = "End publication date, YYYY/MM/DD")]
    end: Option<String>,

    #[arg(
        long,
        help = "NCBI API key; raises the request rate limit (falls back to NCBI_API_KEY)"
    )]
    api_key: Option<String>,

    #[arg(long, help = "Identifiers per fetch request")]
    batch_size: Option<usize>,

    #[arg(long, help = "Maximum concurrent fetch workers")]
    workers: Option<usize>,

    #[arg(long, help = "Attempts per batch before it is dropped")]
    max_attempts: Option<u32>,

    #[arg(long, short, help = "Output TSV path")]
    output: Option<String>,

    #[arg(long, help = "JSON config file (default: kira-sra-meta.json if present)")]
    config: Option<String>,

    #[arg(long)]
    non_interactive: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<SraMetaError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &SraMetaError) -> u8 {
    match error {
        SraMetaError::InvalidConfig(_)
        | SraMetaError::InvalidDate(_)
        | SraMetaError::ConfigRead(_)
        | SraMetaError::ConfigParse(_) => 2,
        SraMetaError::Listing(_)
        | SraMetaError::EutilsHttp(_)
        | SraMetaError::EutilsStatus { .. }
        | SraMetaError::Decode(_) => 3,
        SraMetaError::Output { .. } => 4,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let overrides = Overrides {
        term: cli.term,
        start: cli.start,
        end: cli.end,
        api_key: cli.api_key,
        batch_size: cli.batch_size,
        workers: cli.workers,
        max_attempts: cli.max_attempts,
        output: cli.output,
    };
    let resolved = ConfigLoader::resolve(cli.config.as_deref(), overrides)?;
    let output = resolved
        .output
        .map(Utf8PathBuf::from)
        .unwrap_or_else(|| default_output_path(chrono::Local::now()));

    let client = EutilsHttpClient::new(resolved.query.api_key.clone())?;
    let app = App::new(client, resolved.fetch);

    match output_mode {
        OutputMode::NonInteractive => {
            let summary = app.run(&resolved.query, &output, &JsonOutput)?;
            JsonOutput::print_summary(&summary).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let progress = TerminalProgress::new("Fetching batches");
            let summary = app.run(&resolved.query, &output, &progress)?;
            print_summary(&summary);
        }
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}KIRA-SRA-META summary{reset}");
    println!(
        "{green}Identifiers: {}  batches: {}/{} fetched{reset}",
        summary.identifiers, summary.fetched_batches, summary.batches
    );
    if summary.dropped_batches > 0 {
        println!(
            "{yellow}Dropped batches: {}{reset}",
            summary.dropped_batches
        );
    }
    println!(
        "{green}Packages: {}  rows: {}{reset}",
        summary.packages, summary.rows
    );
    println!("{cyan}Output: {}{reset}", summary.output);
}
