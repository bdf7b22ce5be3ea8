use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Rejected query input. Surfaced to the caller, never a crash.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("rank must be a positive integer, got {0}")]
    NonPositiveRank(i64),

    #[error("rank {0} is larger than any published rank")]
    RankTooLarge(i64),

    #[error("rank must be a whole number, got '{0}'")]
    InvalidRank(String),

    #[error("rank is missing")]
    MissingRank,

    #[error("category is missing")]
    MissingCategory,

    #[error("unknown category '{0}' (expected one of OPEN, EWS, SEBC, SC, ST)")]
    UnknownCategory(String),

    #[error("unknown stream '{0}' (expected science or commerce)")]
    UnknownStream(String),
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Malformed or unreachable reference data. Fatal at load time.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {origin}: {message}")]
    Parse { origin: String, message: String },

    #[error("unsupported data file {0} (expected .json or .csv)")]
    UnsupportedFormat(PathBuf),

    #[error("{origin}: company '{company}' in year {year} has negative offers ({offers})")]
    NegativeOffers {
        origin: String,
        year: String,
        company: String,
        offers: i64,
    },

    #[error("{origin}: empty company name in year {year}")]
    EmptyCompany { origin: String, year: String },

    #[error("{origin}: empty year label")]
    EmptyYear { origin: String },

    #[error("year {year} appears more than once")]
    DuplicateYear { year: String },

    #[error("{origin}: cutoff for {institution} / {program} must be positive, got {cutoff}")]
    NonPositiveCutoff {
        origin: String,
        institution: String,
        program: String,
        cutoff: i64,
    },

    #[error("{origin}: cutoff record is missing its institution or program name")]
    UnnamedOffering { origin: String },

    #[error("duplicate cutoff for {institution} / {program} / {category} / {year}")]
    DuplicateCutoff {
        institution: String,
        program: String,
        category: String,
        year: u16,
    },

    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("no {0} data source configured")]
    NoSource(&'static str),

    #[error("invalid setting {name}: {message}")]
    InvalidSetting { name: &'static str, message: String },
}

pub type DataResult<T> = Result<T, DataError>;
