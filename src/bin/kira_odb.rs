use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_omics_db::app::{App, Invocation, LoadPlan, ProgressSink};
use kira_omics_db::config::ConfigLoader;
use kira_omics_db::error::KiraError;
use kira_omics_db::output::{JsonOutput, OutputMode, TextOutput};
use kira_omics_db::store::Store;

#[derive(Parser)]
#[command(name = "kira-odb")]
#[command(about = "Build and query a SQLite store of subject, sample and multi-omics abundance data")]
#[command(version, author)]
struct Cli {
    /// Path to the SQLite database file
    database: String,

    #[arg(long, help = "Create the database schema")]
    createdb: bool,

    #[arg(long, help = "Load data into the database from the given files")]
    loaddb: bool,

    #[arg(long, value_name = "N", allow_negative_numbers = true, help = "Run query N (1-9)")]
    querydb: Option<i64>,

    #[arg(long, value_name = "FILE", help = "Subjects CSV file")]
    subjects: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Samples TSV file")]
    samples: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Transcript abundance TSV file")]
    transcripts: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Protein abundance TSV file")]
    proteome: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Metabolite abundance TSV file")]
    metabolome: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Metabolite annotation CSV file")]
    annotations: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Query config (default: ./kira-odb.json if present)")]
    config: Option<String>,

    #[arg(long, help = "Print results as JSON")]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error {
        KiraError::InputRead { .. }
        | KiraError::MissingColumn { .. }
        | KiraError::MalformedRow { .. }
        | KiraError::ConfigRead(_)
        | KiraError::ConfigParse(_) => 2,
        KiraError::DuplicateKey { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Text => &TextOutput,
        OutputMode::Json => &JsonOutput,
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let app = App::new(Store::new(cli.database.as_str()), config);

    let invocation = Invocation {
        create_schema: cli.createdb,
        load: cli.loaddb.then(|| LoadPlan {
            subjects: cli.subjects,
            samples: cli.samples,
            transcripts: cli.transcripts,
            proteome: cli.proteome,
            metabolome: cli.metabolome,
            annotations: cli.annotations,
        }),
        query: cli.querydb,
    };
    let outcome = app.run(&invocation, sink)?;

    match output_mode {
        OutputMode::Text => {
            if let Some(output) = &outcome.query {
                TextOutput::print_query(output, app.config()).into_diagnostic()?;
            }
        }
        OutputMode::Json => JsonOutput::print_run(&outcome).into_diagnostic()?,
    }
    Ok(())
}
