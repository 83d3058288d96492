//! External collaborators: query, verification and export services.
//!
//! The console engine only talks to these through the traits below, so the
//! same orchestration runs against the HTTP backend, the demo fleet, or a
//! test double.

mod cache;
mod http;
pub mod mock;

pub use cache::{CacheEntryInfo, CacheStats, CachedQueryService, DEFAULT_CACHE_TTL};
pub use http::HttpBackend;
pub use mock::MockBackend;

use async_trait::async_trait;

use crate::export::{ExportArtifact, ExportRequest};
use crate::models::{Candidate, Category, ClusterTarget, DataRow, QueryParameters};

/// Failure reported by an external service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// The service answered with a failure; the message is shown verbatim.
    #[error("{0}")]
    Failed(String),
    /// The service could not be reached.
    #[error("connection failed: {0}")]
    Unreachable(String),
    /// The service answered with something we could not decode.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// One query, as issued by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    /// Orchestrator generation this request belongs to.
    pub generation: u64,
    pub target: ClusterTarget,
    pub category: Category,
    pub parameters: QueryParameters,
    /// Forces the service to bypass any cache it maintains.
    pub ignore_cache: bool,
}

/// Successful verification result.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Verification {
    /// Cluster name reported by the endpoint, if it reported one.
    pub cluster_name: Option<String>,
}

#[async_trait]
pub trait QueryService: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<DataRow>, ServiceError>;
}

#[async_trait]
pub trait VerificationService: Send + Sync {
    async fn verify(&self, candidate: &Candidate) -> Result<Verification, ServiceError>;
}

#[async_trait]
pub trait ExportSink: Send + Sync {
    async fn export(&self, request: &ExportRequest) -> Result<ExportArtifact, ServiceError>;
}
