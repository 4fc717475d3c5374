pub mod corrector_client;
pub mod response;

use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::analysis::AnalysisOutcome;

pub use corrector_client::{CorrectorClient, CorrectorConfig};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("correction endpoint is not configured")]
    MissingEndpoint,
    #[error("invalid correction endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("failed to build http client: {0}")]
    ClientBuild(String),
    #[error("correction request timed out")]
    Timeout,
    #[error("failed to connect to correction service: {0}")]
    Connect(String),
    #[error("correction request failed: {0}")]
    Request(String),
    #[error("correction service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to read correction response: {0}")]
    Body(String),
}

/// Anything that can turn a text snapshot into an analysis.
///
/// The monitor awaits one call at a time, so implementations do not need to
/// guard against concurrent use from the same pipeline.
pub trait Corrector: Send + Sync {
    fn analyze<'a>(
        &'a self,
        text: &'a str,
    ) -> BoxFuture<'a, Result<AnalysisOutcome, AnalysisError>>;
}
