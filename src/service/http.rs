//! HTTP client for the console backend.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ExportSink, FetchRequest, QueryService, ServiceError, Verification, VerificationService};
use crate::export::{ExportArtifact, ExportRequest};
use crate::models::{
    ApiVersion, Candidate, Category, ClusterTarget, DataRow, QueryParameters, TargetKind,
};

const EXPORT_EXTENSION: &str = "xlsx";

/// Cluster description in the shape the backend expects.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireCluster<'a> {
    id: &'a str,
    name: &'a str,
    ip: &'a str,
    username: &'a str,
    password: &'a str,
    is_verified: bool,
    #[serde(rename = "type")]
    kind: TargetKind,
    api_version: ApiVersion,
}

impl<'a> WireCluster<'a> {
    fn from_target(target: &'a ClusterTarget) -> Self {
        Self {
            id: &target.id,
            name: &target.display_name,
            ip: &target.address,
            username: &target.credentials.username,
            password: &target.credentials.password,
            is_verified: target.verified,
            kind: target.kind,
            api_version: target.api_version,
        }
    }

    fn from_candidate(candidate: &'a Candidate) -> Self {
        Self {
            id: "",
            name: candidate.label(),
            ip: &candidate.address,
            username: &candidate.credentials.username,
            password: &candidate.credentials.password,
            is_verified: false,
            kind: candidate.kind,
            api_version: candidate.api_version,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponse {
    #[serde(default)]
    cluster_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// Query, verification and export services backed by the console backend's
/// REST API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Failed(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Asks the backend to drop its cached responses for `cluster_id`.
    pub async fn clear_remote_cache(&self, cluster_id: &str) -> Result<(), ServiceError> {
        let response = self
            .client
            .post(self.url("/api/clear-cache"))
            .query(&[("cluster_id", cluster_id)])
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await.map(drop)
    }
}

fn transport_error(e: reqwest::Error) -> ServiceError {
    ServiceError::Unreachable(e.to_string())
}

/// Passes successful responses through and turns everything else into
/// [`ServiceError::Failed`] carrying the backend's `detail` message.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Failed(error_detail(status, &body)))
}

fn error_detail(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(s),
        }) => s,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) if body.trim().is_empty() => format!("request failed with status {}", status),
        Err(_) => format!("request failed with status {}: {}", status, body.trim()),
    }
}

/// Query-string parameters for a fetch.
fn fetch_query(category: Category, parameters: &QueryParameters) -> Vec<(&'static str, String)> {
    let mut query = vec![("category", category.wire_name().to_string())];
    match parameters {
        QueryParameters::None => {}
        QueryParameters::Performance(p) => {
            if let Some(start) = p.start_time {
                query.push(("startTime", start.to_rfc3339()));
            }
            if let Some(end) = p.end_time {
                query.push(("endTime", end.to_rfc3339()));
            }
            if let Some(interval) = p.interval_seconds {
                query.push(("interval", interval.to_string()));
            }
            if let Some(aggregation) = p.aggregation {
                query.push(("aggregationType", aggregation.as_str().to_string()));
            }
        }
        QueryParameters::Capacity(c) => {
            if let Some(ratio) = c.cpu_ratio {
                query.push(("ratio", ratio.to_string()));
            }
            if let Some(rf) = c.replication_factor {
                query.push(("rf", rf.to_string()));
            }
            if let Some(vcores) = c.reserved_vcores {
                query.push(("reservedVCores", vcores.to_string()));
            }
            if let Some(memory) = c.reserved_memory_gib {
                query.push(("reservedMemoryGiB", memory.to_string()));
            }
        }
    }
    query
}

fn decode_rows(category: Category, body: serde_json::Value) -> Result<Vec<DataRow>, ServiceError> {
    let serde_json::Value::Array(items) = body else {
        return Err(ServiceError::Malformed("expected a JSON array of rows".into()));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            serde_json::Value::Object(object) => DataRow::from_wire(category, object)
                .map_err(|e| ServiceError::Malformed(format!("row {}: {}", i, e))),
            _ => Err(ServiceError::Malformed(format!("row {} is not an object", i))),
        })
        .collect()
}

#[async_trait]
impl QueryService for HttpBackend {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<DataRow>, ServiceError> {
        if request.ignore_cache {
            self.clear_remote_cache(&request.target.id).await?;
        }
        debug!(
            target = %request.target.address,
            category = %request.category,
            "fetching from backend"
        );
        let response = self
            .client
            .post(self.url("/api/fetch-data"))
            .query(&fetch_query(request.category, &request.parameters))
            .json(&WireCluster::from_target(&request.target))
            .send()
            .await
            .map_err(transport_error)?;
        let body: serde_json::Value = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Malformed(e.to_string()))?;
        decode_rows(request.category, body)
    }
}

#[async_trait]
impl VerificationService for HttpBackend {
    async fn verify(&self, candidate: &Candidate) -> Result<Verification, ServiceError> {
        let response = self
            .client
            .post(self.url("/api/verify-cluster"))
            .json(&WireCluster::from_candidate(candidate))
            .send()
            .await
            .map_err(transport_error)?;
        let body: VerifyResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Malformed(e.to_string()))?;
        info!(address = %candidate.address, cluster = ?body.cluster_name, "cluster verified");
        Ok(Verification {
            cluster_name: body.cluster_name,
        })
    }
}

#[async_trait]
impl ExportSink for HttpBackend {
    async fn export(&self, request: &ExportRequest) -> Result<ExportArtifact, ServiceError> {
        let response = self
            .client
            .post(self.url("/api/export-xlsx"))
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;
        let bytes = check_status(response)
            .await?
            .bytes()
            .await
            .map_err(|e| ServiceError::Malformed(e.to_string()))?;
        Ok(ExportArtifact {
            filename: format!("{}.{}", request.filename(), EXPORT_EXTENSION),
            bytes: bytes.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Aggregation, CapacityParams, Credentials, PerformanceParams};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_fetch_query_performance() {
        let start = Utc.with_ymd_and_hms(2026, 1, 2, 3, 0, 0).unwrap();
        let params = QueryParameters::Performance(PerformanceParams {
            start_time: Some(start),
            end_time: Some(start + chrono::Duration::hours(1)),
            interval_seconds: Some(60),
            aggregation: Some(Aggregation::Max),
        });
        let query = fetch_query(Category::Performance, &params);
        assert_eq!(query[0], ("category", "Performance".to_string()));
        assert!(query.contains(&("startTime", "2026-01-02T03:00:00+00:00".to_string())));
        assert!(query.contains(&("interval", "60".to_string())));
        assert!(query.contains(&("aggregationType", "max".to_string())));
    }

    #[test]
    fn test_fetch_query_capacity_uses_resources_category() {
        let query = fetch_query(
            Category::Capacity,
            &QueryParameters::Capacity(CapacityParams::default()),
        );
        assert_eq!(query[0], ("category", "Resources".to_string()));
        assert!(query.contains(&("ratio", "3".to_string())));
        assert!(query.contains(&("rf", "2".to_string())));
    }

    #[test]
    fn test_wire_cluster_shape() {
        let mut candidate = Candidate::new("10.1.1.1", Credentials::new("admin", "pw"));
        candidate.kind = TargetKind::Central;
        let value = serde_json::to_value(WireCluster::from_candidate(&candidate)).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "",
                "name": "10.1.1.1",
                "ip": "10.1.1.1",
                "username": "admin",
                "password": "pw",
                "isVerified": false,
                "type": "PC",
                "apiVersion": "v2.0"
            })
        );
    }

    #[test]
    fn test_error_detail_extraction() {
        let status = reqwest::StatusCode::BAD_REQUEST;
        assert_eq!(
            error_detail(status, r#"{"detail": "Timeout: Server at 10.0.0.1 did not respond"}"#),
            "Timeout: Server at 10.0.0.1 did not respond"
        );
        assert_eq!(
            error_detail(status, ""),
            "request failed with status 400 Bad Request"
        );
        assert!(error_detail(status, "oops").ends_with(": oops"));
    }

    #[test]
    fn test_decode_rows() {
        let rows = decode_rows(
            Category::Capacity,
            json!([{"table": "CPU", "hostName": "h1"}, {"table": "Memory", "hostName": "h1"}]),
        )
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(decode_rows(Category::Inventory, json!({"rows": []})).is_err());
        assert!(decode_rows(Category::Inventory, json!([1])).is_err());
    }
}
