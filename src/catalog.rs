use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};

use crate::app::{ProgressEvent, ProgressSink};
use crate::config::CatalogSettings;
use crate::domain::DatasetDescriptor;
use crate::error::GeobioError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogPage {
    #[serde(default)]
    pub results: Vec<DatasetDescriptor>,
    #[serde(default)]
    pub count: Option<u64>,
}

pub trait CatalogClient: Send + Sync {
    fn fetch_page(&self, offset: u64, limit: u64) -> Result<CatalogPage, GeobioError>;
}

#[derive(Clone)]
pub struct CatalogHttpClient {
    client: Client,
    endpoint: String,
}

impl CatalogHttpClient {
    pub fn new(endpoint: &str) -> Result<Self, GeobioError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("geobio/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GeobioError::CatalogHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| GeobioError::CatalogHttp(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

impl CatalogClient for CatalogHttpClient {
    fn fetch_page(&self, offset: u64, limit: u64) -> Result<CatalogPage, GeobioError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("type", "OCCURRENCE".to_string()),
                ("offset", offset.to_string()),
                ("limit", limit.to_string()),
            ])
            .send()
            .map_err(|err| GeobioError::CatalogHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "dataset search failed".to_string());
            return Err(GeobioError::CatalogStatus { status, message });
        }
        response
            .json::<CatalogPage>()
            .map_err(|err| GeobioError::CatalogHttp(err.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CatalogTermination {
    /// The next offset would pass the configured ceiling.
    CeilingReached,
    /// The server-reported total has been covered.
    CountReached,
    /// A page came back empty.
    Exhausted,
    /// A page failed; earlier pages are kept.
    Interrupted {
        status: Option<u16>,
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct CatalogFetch {
    pub descriptors: Vec<DatasetDescriptor>,
    pub pages: usize,
    pub reported_count: Option<u64>,
    pub termination: CatalogTermination,
}

impl CatalogFetch {
    pub fn is_complete(&self) -> bool {
        !matches!(self.termination, CatalogTermination::Interrupted { .. })
    }

    pub fn failed_status(&self) -> Option<u16> {
        match &self.termination {
            CatalogTermination::Interrupted { status, .. } => *status,
            _ => None,
        }
    }
}

/// Walks the catalog page by page until a termination condition holds.
///
/// No request is issued for an offset above `settings.offset_ceiling`. A
/// failed page stops the walk without retrying.
pub fn fetch_all<C: CatalogClient + ?Sized>(
    client: &C,
    settings: &CatalogSettings,
    sink: &dyn ProgressSink,
) -> CatalogFetch {
    let started = Instant::now();
    let limit = settings.page_size.max(1);
    let mut offset = 0u64;
    let mut descriptors = Vec::new();
    let mut pages = 0usize;
    let mut reported_count = None;

    let termination = loop {
        if offset > settings.offset_ceiling {
            break CatalogTermination::CeilingReached;
        }
        match client.fetch_page(offset, limit) {
            Ok(page) => {
                let received = page.results.len();
                reported_count = page.count.or(reported_count);
                descriptors.extend(page.results);
                pages += 1;
                offset += limit;
                tracing::debug!(offset, received, total = descriptors.len(), "catalog page fetched");
                sink.event(ProgressEvent {
                    message: format!("phase=Catalog; {} datasets fetched", descriptors.len()),
                    elapsed: Some(started.elapsed()),
                });

                if received == 0 {
                    break CatalogTermination::Exhausted;
                }
                if reported_count.is_some_and(|count| offset >= count) {
                    break CatalogTermination::CountReached;
                }
            }
            Err(err) => {
                tracing::warn!(
                    offset,
                    fetched = descriptors.len(),
                    error = %err,
                    "catalog fetch interrupted"
                );
                break CatalogTermination::Interrupted {
                    status: err.status(),
                    message: err.to_string(),
                };
            }
        }
    };

    tracing::info!(
        datasets = descriptors.len(),
        pages,
        termination = ?termination,
        "dataset retrieval concluded"
    );
    CatalogFetch {
        descriptors,
        pages,
        reported_count,
        termination,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert_matches::assert_matches;

    use super::*;

    struct NoopSink;

    impl ProgressSink for NoopSink {
        fn event(&self, _event: ProgressEvent) {}
    }

    /// Serves `total` synthetic datasets; optionally fails at one offset.
    struct PagedCatalog {
        total: u64,
        report_count: bool,
        fail_at: Option<u64>,
        requested: Mutex<Vec<u64>>,
    }

    impl PagedCatalog {
        fn new(total: u64) -> Self {
            Self {
                total,
                report_count: false,
                fail_at: None,
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<u64> {
            self.requested.lock().unwrap().clone()
        }
    }

    impl CatalogClient for PagedCatalog {
        fn fetch_page(&self, offset: u64, limit: u64) -> Result<CatalogPage, GeobioError> {
            self.requested.lock().unwrap().push(offset);
            if self.fail_at == Some(offset) {
                return Err(GeobioError::CatalogStatus {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            let end = (offset + limit).min(self.total);
            let results = (offset..end)
                .map(|i| DatasetDescriptor::new(format!("ds-{i}"), Some("plants")))
                .collect();
            Ok(CatalogPage {
                results,
                count: self.report_count.then_some(self.total),
            })
        }
    }

    fn settings(page_size: u64, offset_ceiling: u64) -> CatalogSettings {
        CatalogSettings {
            page_size,
            offset_ceiling,
            ..CatalogSettings::default()
        }
    }

    #[test]
    fn stops_after_page_reaching_ceiling() {
        let catalog = PagedCatalog::new(1_000);
        let fetch = fetch_all(&catalog, &settings(10, 45), &NoopSink);
        assert_eq!(catalog.requested(), vec![0, 10, 20, 30, 40]);
        assert_eq!(fetch.descriptors.len(), 50);
        assert_eq!(fetch.termination, CatalogTermination::CeilingReached);
        assert_eq!(fetch.descriptors[49].key.as_str(), "ds-49");
    }

    #[test]
    fn ceiling_on_page_boundary_includes_that_page() {
        let catalog = PagedCatalog::new(1_000);
        let fetch = fetch_all(&catalog, &settings(10, 40), &NoopSink);
        assert_eq!(catalog.requested(), vec![0, 10, 20, 30, 40]);
        assert_eq!(fetch.pages, 5);
    }

    #[test]
    fn reported_count_ends_early() {
        let mut catalog = PagedCatalog::new(25);
        catalog.report_count = true;
        let fetch = fetch_all(&catalog, &settings(10, 52_000), &NoopSink);
        assert_eq!(catalog.requested(), vec![0, 10, 20]);
        assert_eq!(fetch.descriptors.len(), 25);
        assert_eq!(fetch.reported_count, Some(25));
        assert_eq!(fetch.termination, CatalogTermination::CountReached);
    }

    #[test]
    fn empty_page_ends_without_count() {
        let catalog = PagedCatalog::new(15);
        let fetch = fetch_all(&catalog, &settings(10, 52_000), &NoopSink);
        assert_eq!(catalog.requested(), vec![0, 10, 20]);
        assert_eq!(fetch.descriptors.len(), 15);
        assert_eq!(fetch.termination, CatalogTermination::Exhausted);
    }

    #[test]
    fn failed_page_keeps_partial_results() {
        let mut catalog = PagedCatalog::new(1_000);
        catalog.fail_at = Some(20);
        let fetch = fetch_all(&catalog, &settings(10, 52_000), &NoopSink);
        assert_eq!(catalog.requested(), vec![0, 10, 20]);
        assert_eq!(fetch.descriptors.len(), 20);
        assert!(!fetch.is_complete());
        assert_eq!(fetch.failed_status(), Some(503));
        assert_matches!(
            fetch.termination,
            CatalogTermination::Interrupted { status: Some(503), .. }
        );
    }

    #[test]
    fn parse_search_response() {
        let raw = r#"{"offset":0,"limit":2,"endOfRecords":false,"count":53012,
            "results":[{"key":"a1","title":"Herbarium","description":"Vascular plants"},
                       {"key":"b2","title":"Barcodes"}]}"#;
        let page: CatalogPage = serde_json::from_str(raw).unwrap();
        assert_eq!(page.count, Some(53_012));
        assert_eq!(page.results.len(), 2);
        assert!(page.results[1].description.is_none());
    }
}
