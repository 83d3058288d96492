//! Deterministic demo fleet.
//!
//! `MockBackend` answers every service trait from an in-memory cluster of
//! three hosts, so the console can be exercised without a backend.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use super::{ExportSink, FetchRequest, QueryService, ServiceError, Verification, VerificationService};
use crate::analysis::{self, HostInventory, VmInventory};
use crate::export::{ExportArtifact, ExportRequest};
use crate::models::{
    Aggregation, CapacityParams, Candidate, Category, DataRow, Hierarchy, PerformanceParams,
    QueryParameters,
};

const GIB: u64 = 1024;
/// Upper bound on synthesized samples per series.
const MAX_SAMPLES: i64 = 240;

pub struct MockBackend {
    cluster_name: String,
    hosts: Vec<HostInventory>,
    vms: Vec<VmInventory>,
    unreachable: HashSet<String>,
    query_failure: Option<String>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::demo()
    }
}

impl MockBackend {
    /// Cluster "demo-cluster": three hosts, eight VMs, one of them off.
    pub fn demo() -> Self {
        let hosts = vec![
            host(1, "demo-node-a", 32, 512),
            host(2, "demo-node-b", 32, 512),
            host(3, "demo-node-c", 16, 256),
        ];
        let vms = vec![
            vm("web-01", 1, true, 4, 8 * GIB),
            vm("web-02", 2, true, 4, 8 * GIB),
            vm("db-primary", 1, true, 20, 192 * GIB),
            vm("db-replica", 2, true, 16, 128 * GIB),
            vm("cache-01", 3, true, 8, 64 * GIB),
            vm("batch-01", 3, false, 12, 32 * GIB),
            vm("monitor", 2, true, 2, 4 * GIB),
            vm("bastion", 1, true, 1, 2 * GIB),
        ];
        Self {
            cluster_name: "demo-cluster".to_string(),
            hosts,
            vms,
            unreachable: HashSet::new(),
            query_failure: None,
        }
    }

    /// Verification of `address` fails as if the host could not be reached.
    pub fn with_unreachable(mut self, address: impl Into<String>) -> Self {
        self.unreachable.insert(address.into());
        self
    }

    /// Every query fails with `message`.
    pub fn with_query_failure(mut self, message: impl Into<String>) -> Self {
        self.query_failure = Some(message.into());
        self
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn hosts(&self) -> &[HostInventory] {
        &self.hosts
    }

    pub fn vms(&self) -> &[VmInventory] {
        &self.vms
    }

    fn inventory_rows(&self) -> Vec<DataRow> {
        self.vms
            .iter()
            .enumerate()
            .map(|(i, vm)| {
                let power = if vm.powered_on { "on" } else { "off" };
                let ip = if vm.powered_on {
                    format!("10.20.0.{}", 10 + i)
                } else {
                    String::new()
                };
                DataRow::empty(Category::Inventory)
                    .with("clusterName", self.cluster_name.as_str())
                    .with("name", vm.name.as_str())
                    .with("uuid", Uuid::from_u128(0x1000 + i as u128).to_string())
                    .with("powerState", power)
                    .with("macAddress", format!("50:6b:8d:00:00:{:02x}", i + 1))
                    .with("ipAddresses", ip)
                    .with("vDisk", format!("scsi.0 ({} GiB)", 40 + 20 * i))
                    .with("numVcpus", vm.num_vcpus)
                    .with("memoryMb", vm.memory_mb as i64)
            })
            .collect()
    }

    fn hardware_rows(&self) -> Vec<DataRow> {
        self.hosts
            .iter()
            .enumerate()
            .map(|(i, h)| {
                DataRow::empty(Category::Hardware)
                    .with("hostName", h.name.as_str())
                    .with("serial", format!("SN-DEMO-{:04}", i + 1))
                    .with("model", "NX-3170-G8")
                    .with("cpuModel", "Intel(R) Xeon(R) Gold 6338")
                    .with("numCores", h.num_cores)
                    .with("memoryCapacity", h.memory_capacity_gib as i64)
                    .with("blockSerial", "BLK-DEMO-01")
                    .with("disk", 6i64)
                    .with("diskModel", "SAMSUNG MZ7L33T8")
            })
            .collect()
    }

    fn performance_rows(&self, params: &PerformanceParams) -> Vec<DataRow> {
        let samples = match (params.start_time, params.end_time, params.interval_seconds) {
            (Some(start), Some(end), Some(interval)) if interval > 0 => {
                ((end - start).num_seconds() / i64::from(interval)).clamp(1, MAX_SAMPLES)
            }
            _ => 1,
        };
        let aggregation = params.aggregation.unwrap_or(Aggregation::Average);

        let mut rows = Vec::with_capacity(self.hosts.len() + 1);
        let mut cluster_totals = [0.0f64; 5];
        let mut host_rows = Vec::with_capacity(self.hosts.len());
        for (i, h) in self.hosts.iter().enumerate() {
            let metrics = [
                series(samples, 1200.0 + 400.0 * i as f64, 300.0, aggregation),
                series(samples, 1.2 + 0.3 * i as f64, 0.5, aggregation),
                series(samples, 80.0 + 25.0 * i as f64, 20.0, aggregation),
                series(samples, 35.0 + 10.0 * i as f64, 15.0, aggregation),
                series(samples, 55.0 + 5.0 * i as f64, 10.0, aggregation),
            ];
            for (total, m) in cluster_totals.iter_mut().zip(metrics) {
                *total += m;
            }
            host_rows.push(metric_row(
                Hierarchy::host(h.name.as_str(), self.cluster_name.as_str()),
                metrics,
            ));
        }

        let hosts = self.hosts.len().max(1) as f64;
        // IOPS and bandwidth add up across hosts; the rest is averaged.
        let cluster = [
            cluster_totals[0],
            cluster_totals[1] / hosts,
            cluster_totals[2],
            cluster_totals[3] / hosts,
            cluster_totals[4] / hosts,
        ];
        rows.push(metric_row(
            Hierarchy::cluster(self.cluster_name.as_str()),
            cluster,
        ));
        rows.extend(host_rows);
        rows
    }

    fn capacity_rows(&self, params: &CapacityParams) -> Vec<DataRow> {
        analysis::capacity_rows(&self.hosts, &self.vms, params)
    }
}

fn host(n: u128, name: &str, cores: u32, memory_gib: u64) -> HostInventory {
    HostInventory {
        uuid: Uuid::from_u128(n).to_string(),
        name: name.to_string(),
        num_cores: cores,
        memory_capacity_gib: memory_gib,
    }
}

fn vm(name: &str, host: u128, on: bool, vcpus: u32, memory_mb: u64) -> VmInventory {
    VmInventory {
        name: name.to_string(),
        host_uuid: Some(Uuid::from_u128(host).to_string()),
        powered_on: on,
        num_vcpus: vcpus,
        memory_mb,
    }
}

/// Deterministic saw-tooth series around `base`, reduced by `aggregation`.
fn series(samples: i64, base: f64, spread: f64, aggregation: Aggregation) -> f64 {
    let values: Vec<f64> = (0..samples)
        .map(|i| base + spread * ((i * 7 % 13) as f64 / 12.0 - 0.5))
        .collect();
    let value = analysis::aggregate(&values, aggregation);
    (value * 100.0).round() / 100.0
}

fn metric_row(hierarchy: Hierarchy, metrics: [f64; 5]) -> DataRow {
    let name = hierarchy.name.clone();
    DataRow::performance(hierarchy)
        .with("entityName", name)
        .with("iops", metrics[0].round())
        .with("latency", metrics[1])
        .with("bandwidth", format!("{:.1} MB/s", metrics[2]))
        .with("cpuUsage", metrics[3])
        .with("memoryUsage", metrics[4])
}

#[async_trait]
impl QueryService for MockBackend {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<DataRow>, ServiceError> {
        if let Some(message) = &self.query_failure {
            return Err(ServiceError::Failed(message.clone()));
        }
        debug!(category = %request.category, "serving demo rows");
        let rows = match (&request.category, &request.parameters) {
            (Category::Inventory, _) => self.inventory_rows(),
            (Category::Hardware, _) => self.hardware_rows(),
            (Category::Performance, QueryParameters::Performance(p)) => self.performance_rows(p),
            (Category::Capacity, QueryParameters::Capacity(c)) => self.capacity_rows(c),
            (category, parameters) => {
                return Err(ServiceError::Failed(format!(
                    "{:?} parameters do not apply to {}",
                    parameters, category
                )));
            }
        };
        Ok(rows)
    }
}

#[async_trait]
impl VerificationService for MockBackend {
    async fn verify(&self, candidate: &Candidate) -> Result<Verification, ServiceError> {
        if self.unreachable.contains(&candidate.address) {
            return Err(ServiceError::Unreachable(format!(
                "Cannot connect to {}",
                candidate.address
            )));
        }
        Ok(Verification {
            cluster_name: Some(self.cluster_name.clone()),
        })
    }
}

#[async_trait]
impl ExportSink for MockBackend {
    async fn export(&self, request: &ExportRequest) -> Result<ExportArtifact, ServiceError> {
        let bytes = serde_json::to_vec_pretty(request)
            .map_err(|e| ServiceError::Failed(format!("failed to encode export: {}", e)))?;
        Ok(ExportArtifact {
            filename: format!("{}.json", request.filename()),
            bytes,
        })
    }
}
