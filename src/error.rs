use derive_more::From;
use k8s_openapi::serde_json;
use serde::ser::{Serialize, SerializeSeq, Serializer};
use tracing::warn;

use crate::dataselect::QueryParseError;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, From)]
pub enum Error {
    #[from]
    Json(serde_json::Error),

    #[from]
    Kube(kube::Error),

    #[from]
    Infer(kube::config::InferConfigError),

    #[from]
    HttpHeader(hyper::http::Error),

    #[from]
    Io(std::io::Error),

    #[from]
    Join(tokio::task::JoinError),

    #[from]
    InvalidQuery(QueryParseError),

    /// Named object does not exist
    NotFound { kind: String, name: String },

    /// Metric source could not produce metrics for the request
    MetricSource(String),

    /// Custom error message
    Custom(String),
}

impl Error {
    /// HTTP-like status the outer layer should surface for this error
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Kube(kube::Error::Api(response)) => response.code,
            Self::NotFound { .. } => 404,
            Self::InvalidQuery(_) => 400,
            _ => 500,
        }
    }

    /// True for 401/403 responses from the cluster api
    #[must_use]
    pub const fn is_authorization_failure(&self) -> bool {
        matches!(self.status_code(), 401 | 403)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, fmt: &mut core::fmt::Formatter) -> core::result::Result<(), core::fmt::Error> {
        match self {
            Self::Json(e) => write!(fmt, "json: {e}"),
            Self::Kube(e) => write!(fmt, "kube: {e}"),
            Self::Infer(e) => write!(fmt, "kubeconfig: {e}"),
            Self::HttpHeader(e) => write!(fmt, "http header: {e}"),
            Self::Io(e) => write!(fmt, "io: {e}"),
            Self::Join(e) => write!(fmt, "task: {e}"),
            Self::InvalidQuery(e) => write!(fmt, "invalid query: {e}"),
            Self::NotFound { kind, name } => write!(fmt, "{kind} \"{name}\" not found"),
            Self::MetricSource(msg) => write!(fmt, "metrics: {msg}"),
            Self::Custom(msg) => write!(fmt, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}

/// Failures that degrade part of a response without aborting it.
///
/// Threaded explicitly through every call that touches a secondary collection
/// (events, metrics, related resources) and attached to the final view.
#[derive(Debug, Default)]
pub struct NonCriticalErrors {
    errors: Vec<Error>,
}

impl NonCriticalErrors {
    #[must_use]
    pub const fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Record `error`, skipping it when an error with the same message is already present
    pub fn push(&mut self, error: Error) {
        let message = error.to_string();
        if self.errors.iter().any(|e| e.to_string() == message) {
            return;
        }
        warn!("Non-critical error during resource retrieval: {}", message);
        self.errors.push(error);
    }

    /// Downgrade any failure to a recorded error and continue with the zero value
    pub fn absorb<T: Default>(&mut self, result: Result<T>) -> T {
        match result {
            Ok(value) => value,
            Err(e) => {
                self.push(e);
                T::default()
            }
        }
    }

    /// Downgrade authorization failures, escalate everything else
    ///
    /// # Errors
    ///
    /// Returns the original error when it is not a 401/403 from the cluster api
    pub fn append<T>(&mut self, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_authorization_failure() => {
                self.push(e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn extend(&mut self, other: Self) {
        for error in other.errors {
            self.push(error);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Error> {
        self.errors.iter()
    }
}

impl Serialize for NonCriticalErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.errors.len()))?;
        for error in &self.errors {
            seq.serialize_element(&error.to_string())?;
        }
        seq.end()
    }
}
