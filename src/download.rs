use std::fmt;
use std::time::Duration;

use reqwest::blocking::{Client, Request};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;

use crate::error::GeobioError;
use crate::predicate::Predicate;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    /// Both parts must be present and non-blank.
    pub fn from_parts(user: Option<&str>, password: Option<&str>) -> Option<Self> {
        match (user, password) {
            (Some(user), Some(password)) if !user.trim().is_empty() && !password.is_empty() => {
                Some(Self {
                    user: user.trim().to_string(),
                    password: password.to_string(),
                })
            }
            _ => None,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadQuery {
    pub creator: String,
    pub notification_addresses: Vec<String>,
    pub send_notification: bool,
    pub format: String,
    pub predicate: Predicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Accepted,
    Redirected,
    BadRequest,
    Gone,
    Unrecognized(u16),
}

impl SubmissionStatus {
    pub fn from_code(code: u16) -> Self {
        match code {
            201 => SubmissionStatus::Accepted,
            302 => SubmissionStatus::Redirected,
            400 => SubmissionStatus::BadRequest,
            410 => SubmissionStatus::Gone,
            other => SubmissionStatus::Unrecognized(other),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            SubmissionStatus::Accepted => "HTTP 201: download request accepted".to_string(),
            SubmissionStatus::Redirected => "HTTP 302: found, redirecting".to_string(),
            SubmissionStatus::BadRequest => "HTTP 400: bad request".to_string(),
            SubmissionStatus::Gone => "HTTP 410: gone, no longer available".to_string(),
            SubmissionStatus::Unrecognized(code) => format!("HTTP {code}: unrecognized response"),
        }
    }
}

pub trait DownloadClient: Send + Sync {
    /// Sends the query once and returns the raw response status.
    fn submit(
        &self,
        query: &DownloadQuery,
        credentials: Option<&Credentials>,
    ) -> Result<u16, GeobioError>;
}

#[derive(Clone)]
pub struct DownloadHttpClient {
    client: Client,
    endpoint: String,
}

impl DownloadHttpClient {
    pub fn new(endpoint: &str) -> Result<Self, GeobioError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("geobio/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| GeobioError::DownloadHttp(err.to_string()))?,
        );
        // the caller classifies 302 itself
        let client = Client::builder()
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| GeobioError::DownloadHttp(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn build_request(
        &self,
        query: &DownloadQuery,
        credentials: Option<&Credentials>,
    ) -> Result<Request, GeobioError> {
        let body =
            serde_json::to_vec(query).map_err(|err| GeobioError::DownloadHttp(err.to_string()))?;
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(credentials) = credentials {
            builder = builder.basic_auth(&credentials.user, Some(&credentials.password));
        }
        builder
            .build()
            .map_err(|err| GeobioError::DownloadHttp(err.to_string()))
    }
}

impl DownloadClient for DownloadHttpClient {
    fn submit(
        &self,
        query: &DownloadQuery,
        credentials: Option<&Credentials>,
    ) -> Result<u16, GeobioError> {
        let request = self.build_request(query, credentials)?;
        let response = self
            .client
            .execute(request)
            .map_err(|err| GeobioError::DownloadHttp(err.to_string()))?;
        Ok(response.status().as_u16())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DownloadSubmission {
    pub status_code: u16,
    pub status: SubmissionStatus,
}

pub fn submit_query<D: DownloadClient + ?Sized>(
    client: &D,
    query: &DownloadQuery,
    credentials: Option<&Credentials>,
) -> Result<DownloadSubmission, GeobioError> {
    if credentials.is_none() {
        tracing::warn!("no download credentials configured; submitting unauthenticated");
    }
    let status_code = client.submit(query, credentials)?;
    let status = SubmissionStatus::from_code(status_code);
    match status {
        SubmissionStatus::Accepted | SubmissionStatus::Redirected => {
            tracing::info!(status_code, "{}", status.describe())
        }
        _ => tracing::warn!(status_code, "{}", status.describe()),
    }
    Ok(DownloadSubmission {
        status_code,
        status,
    })
}
