use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum GeobioError {
    #[error("invalid MGRS coordinate {input:?}: {reason}")]
    Conversion { input: String, reason: String },

    #[error("invalid basis of record: {0}")]
    InvalidBasis(String),

    #[error("invalid grid column: {0}")]
    InvalidGridColumn(String),

    #[error("grid coordinate column not found: {0}")]
    GridColumnNotFound(String),

    #[error("canonical columns missing after normalization: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("failed to read occurrence table: {0}")]
    Read(String),

    #[error("failed to write occurrence table: {0}")]
    Write(String),

    #[error("dataset catalog request failed: {0}")]
    CatalogHttp(String),

    #[error("dataset catalog returned status {status}: {message}")]
    CatalogStatus { status: u16, message: String },

    #[error("download request failed: {0}")]
    DownloadHttp(String),

    #[error("species request failed: {0}")]
    SpeciesHttp(String),

    #[error("species service returned status {status}: {message}")]
    SpeciesStatus { status: u16, message: String },
}

impl GeobioError {
    pub fn conversion(input: &str, reason: impl Into<String>) -> Self {
        GeobioError::Conversion {
            input: input.to_string(),
            reason: reason.into(),
        }
    }

    /// Status code carried by a failed remote call, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            GeobioError::CatalogStatus { status, .. } | GeobioError::SpeciesStatus { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}
