use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use geobio::app::{App, LogSink, NormalizeOptions, OutputState};
use geobio::catalog::CatalogHttpClient;
use geobio::config::{ConfigLoader, Settings};
use geobio::domain::BasisOfRecord;
use geobio::download::{DownloadHttpClient, SubmissionStatus};
use geobio::error::GeobioError;
use geobio::output::JsonOutput;
use geobio::pipeline::{CoordinateMode, GridColumn};
use geobio::species::SpeciesHttpClient;

#[derive(Parser)]
#[command(name = "geobio")]
#[command(about = "Request filtered GBIF occurrence downloads and normalize occurrence tables")]
#[command(version, author)]
struct Cli {
    /// Path to a geobio.json config file
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Crawl the dataset catalog and submit a filtered download request")]
    Download(DownloadArgs),
    #[command(about = "Normalize an occurrence table to species, lat, lon")]
    Normalize(NormalizeArgs),
    #[command(about = "Look up IUCN red-list categories for species names")]
    Status(StatusArgs),
    #[command(about = "List backbone synonyms of a species")]
    Synonyms(SynonymArgs),
    #[command(about = "Print the resolved configuration")]
    Config,
}

#[derive(Args)]
struct DownloadArgs {
    /// Basis of record to request (repeatable), e.g. PRESERVED_SPECIMEN
    #[arg(long = "basis")]
    basis: Vec<BasisOfRecord>,
}

#[derive(Args)]
struct NormalizeArgs {
    input: PathBuf,

    /// Input already has latitude/longitude columns
    #[arg(long)]
    geographic: bool,

    /// MGRS column, by header name or zero-based index
    #[arg(long, default_value = "1")]
    grid_column: GridColumn,

    #[arg(long)]
    delimiter: Option<char>,

    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct StatusArgs {
    #[arg(required = true)]
    names: Vec<String>,
}

#[derive(Args)]
struct SynonymArgs {
    name: String,

    #[arg(long, default_value_t = 110)]
    limit: u32,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(error) = report.downcast_ref::<GeobioError>() {
                return ExitCode::from(map_exit_code(error));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &GeobioError) -> u8 {
    match error {
        GeobioError::ConfigRead(_)
        | GeobioError::ConfigParse(_)
        | GeobioError::InvalidBasis(_)
        | GeobioError::InvalidGridColumn(_)
        | GeobioError::GridColumnNotFound(_)
        | GeobioError::MissingColumns(_)
        | GeobioError::Read(_) => 2,
        GeobioError::CatalogHttp(_)
        | GeobioError::CatalogStatus { .. }
        | GeobioError::DownloadHttp(_)
        | GeobioError::SpeciesHttp(_)
        | GeobioError::SpeciesStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = ConfigLoader::resolve(cli.config.as_deref())?;
    settings.apply_env(|name| std::env::var(name).ok());

    match cli.command {
        Commands::Download(args) => run_download(args, settings),
        Commands::Normalize(args) => run_normalize(args, settings),
        Commands::Status(args) => {
            let app = build_app(settings)?;
            let statuses = app.conservation_status(&args.names, &LogSink)?;
            JsonOutput::print_status(&statuses).into_diagnostic()?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Synonyms(args) => {
            let app = build_app(settings)?;
            let synonyms = app.synonyms(&args.name, args.limit, &LogSink)?;
            JsonOutput::print_synonyms(&args.name, &synonyms).into_diagnostic()?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config => {
            JsonOutput::print_settings(&settings).into_diagnostic()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_app(
    settings: Settings,
) -> Result<App<CatalogHttpClient, DownloadHttpClient, SpeciesHttpClient>, GeobioError> {
    let catalog = CatalogHttpClient::new(&settings.catalog.endpoint)?;
    let download = DownloadHttpClient::new(&settings.download.endpoint)?;
    let species = SpeciesHttpClient::new(&settings.species_endpoint)?;
    Ok(App::new(settings, catalog, download, species))
}

fn run_download(args: DownloadArgs, settings: Settings) -> miette::Result<ExitCode> {
    let app = build_app(settings)?;
    let report = app.request_download(&args.basis, &LogSink)?;
    JsonOutput::print_download(&report).into_diagnostic()?;
    let code = match report.status {
        SubmissionStatus::Accepted | SubmissionStatus::Redirected => ExitCode::SUCCESS,
        _ => ExitCode::from(3),
    };
    Ok(code)
}

fn run_normalize(args: NormalizeArgs, settings: Settings) -> miette::Result<ExitCode> {
    let delimiter = match args.delimiter {
        Some(ch) if ch.is_ascii() => Some(ch as u8),
        Some(ch) => {
            return Err(miette::Report::msg(format!(
                "delimiter must be a single ASCII character, got {ch:?}"
            )));
        }
        None => None,
    };
    let options = NormalizeOptions {
        mode: if args.geographic {
            CoordinateMode::Geographic
        } else {
            CoordinateMode::Grid
        },
        grid_column: args.grid_column,
        delimiter,
        output: args.output,
    };

    let app = build_app(settings)?;
    let result = app.normalize(&args.input, &options, &LogSink)?;
    JsonOutput::print_normalize(&result.report).into_diagnostic()?;
    let code = match result.report.output {
        OutputState::Failed { .. } => ExitCode::from(1),
        _ => ExitCode::SUCCESS,
    };
    Ok(code)
}
