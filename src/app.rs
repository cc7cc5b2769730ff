use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;

use crate::catalog::{self, CatalogClient, CatalogTermination};
use crate::config::Settings;
use crate::dataset_filter::DatasetFilter;
use crate::domain::BasisOfRecord;
use crate::download::{self, DownloadClient, DownloadQuery, SubmissionStatus};
use crate::error::GeobioError;
use crate::pipeline::{self, CoordinateMode, GridColumn, NormalizationReport};
use crate::predicate::PredicateBuilder;
use crate::species::{self, SpeciesClient};
use crate::table::{self, TabularDataset};

#[derive(Debug, Clone, Serialize)]
pub struct DownloadReport {
    pub datasets_fetched: usize,
    pub catalog_pages: usize,
    pub reported_count: Option<u64>,
    pub catalog_termination: CatalogTermination,
    pub datasets_kept: usize,
    pub predicate_children: usize,
    pub authenticated: bool,
    pub status_code: u16,
    pub status: SubmissionStatus,
    pub submitted_at: String,
}

#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub mode: CoordinateMode,
    pub grid_column: GridColumn,
    pub delimiter: Option<u8>,
    pub output: Option<PathBuf>,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            mode: CoordinateMode::Grid,
            grid_column: GridColumn::default(),
            delimiter: None,
            output: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OutputState {
    NotRequested,
    Written { path: String },
    Failed { path: String, message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct NormalizeReport {
    pub input: String,
    #[serde(flatten)]
    pub normalization: NormalizationReport,
    pub output: OutputState,
}

#[derive(Debug, Clone)]
pub struct NormalizeResult {
    pub dataset: TabularDataset,
    pub report: NormalizeReport,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Sink that forwards progress messages to the tracing subscriber.
pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => tracing::info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => tracing::info!("{}", event.message),
        }
    }
}

#[derive(Clone)]
pub struct App<C: CatalogClient, D: DownloadClient, S: SpeciesClient> {
    settings: Settings,
    catalog: C,
    download: D,
    species: S,
}

impl<C: CatalogClient, D: DownloadClient, S: SpeciesClient> App<C, D, S> {
    pub fn new(settings: Settings, catalog: C, download: D, species: S) -> Self {
        Self {
            settings,
            catalog,
            download,
            species,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Crawls the catalog, drops genetic datasets, and submits one filtered
    /// download request.
    ///
    /// An interrupted catalog crawl does not abort the request; the keys
    /// gathered so far are used and the interruption shows up in the report.
    pub fn request_download(
        &self,
        basis: &[BasisOfRecord],
        sink: &dyn ProgressSink,
    ) -> Result<DownloadReport, GeobioError> {
        let started = Instant::now();
        sink.event(ProgressEvent {
            message: "phase=Catalog; fetching datasets".to_string(),
            elapsed: None,
        });
        let fetch = catalog::fetch_all(&self.catalog, &self.settings.catalog, sink);

        sink.event(ProgressEvent {
            message: "phase=Filter; applying description keywords".to_string(),
            elapsed: Some(started.elapsed()),
        });
        let filter = DatasetFilter::new(&self.settings.dataset_keywords);
        let keys = filter.keys(&fetch.descriptors);
        tracing::info!(
            fetched = fetch.descriptors.len(),
            kept = keys.len(),
            "dataset keyword filter applied"
        );

        let builder = PredicateBuilder::new(
            &self.settings.download.filters,
            self.settings.download.basis_grouping,
        );
        let predicate = builder.build(&keys, basis);
        let predicate_children = predicate.children().len();
        let query = DownloadQuery {
            creator: self.settings.creator(),
            notification_addresses: self.settings.notification_addresses(),
            send_notification: self.settings.download.send_notification,
            format: self.settings.download.format.clone(),
            predicate,
        };

        sink.event(ProgressEvent {
            message: format!("phase=Submit; {} predicates", predicate_children),
            elapsed: Some(started.elapsed()),
        });
        let credentials = self.settings.credentials();
        let submission = download::submit_query(&self.download, &query, credentials.as_ref())?;

        Ok(DownloadReport {
            datasets_fetched: fetch.descriptors.len(),
            catalog_pages: fetch.pages,
            reported_count: fetch.reported_count,
            catalog_termination: fetch.termination,
            datasets_kept: keys.len(),
            predicate_children,
            authenticated: credentials.is_some(),
            status_code: submission.status_code,
            status: submission.status,
            submitted_at: Utc::now().to_rfc3339(),
        })
    }

    pub fn normalize(
        &self,
        input: &Path,
        options: &NormalizeOptions,
        sink: &dyn ProgressSink,
    ) -> Result<NormalizeResult, GeobioError> {
        let started = Instant::now();
        sink.event(ProgressEvent {
            message: format!("phase=Normalize; reading {}", input.display()),
            elapsed: None,
        });
        let (dataset, normalization) =
            pipeline::normalize_file(input, options.delimiter, options.mode, &options.grid_column)?;

        let output = match &options.output {
            None => OutputState::NotRequested,
            Some(path) => {
                sink.event(ProgressEvent {
                    message: format!("phase=Write; {}", path.display()),
                    elapsed: Some(started.elapsed()),
                });
                match table::write_csv_path(&dataset, path) {
                    Ok(()) => OutputState::Written {
                        path: path.display().to_string(),
                    },
                    Err(err) => {
                        tracing::error!(path = %path.display(), error = %err, "output not written");
                        OutputState::Failed {
                            path: path.display().to_string(),
                            message: err.to_string(),
                        }
                    }
                }
            }
        };

        Ok(NormalizeResult {
            dataset,
            report: NormalizeReport {
                input: input.display().to_string(),
                normalization,
                output,
            },
        })
    }

    pub fn conservation_status(
        &self,
        checklist: &[String],
        sink: &dyn ProgressSink,
    ) -> Result<BTreeMap<String, Option<String>>, GeobioError> {
        sink.event(ProgressEvent {
            message: format!("phase=Species; {} names", checklist.len()),
            elapsed: None,
        });
        species::conservation_status(&self.species, checklist)
    }

    pub fn synonyms(
        &self,
        name: &str,
        limit: u32,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<String>, GeobioError> {
        sink.event(ProgressEvent {
            message: format!("phase=Species; synonyms of {name}"),
            elapsed: None,
        });
        species::synonyms_for(&self.species, name, limit)
    }
}
