//! Capacity ratio analysis and metric aggregation.
//!
//! Turns a host/VM inventory into the two capacity tables (CPU and Memory)
//! with a trailing `Total` row each.

use crate::models::{
    Aggregation, CapacityParams, CapacityTable, DEFAULT_CPU_RATIO, DEFAULT_REPLICATION_FACTOR, DataRow,
};

pub const TOTAL_ROW_NAME: &str = "Total";

const PASS: &str = "PASS";
const FAIL: &str = "FAIL";

/// Physical host as seen by the capacity analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct HostInventory {
    pub uuid: String,
    pub name: String,
    pub num_cores: u32,
    pub memory_capacity_gib: u64,
}

/// Virtual machine placement and sizing.
#[derive(Debug, Clone, PartialEq)]
pub struct VmInventory {
    pub name: String,
    pub host_uuid: Option<String>,
    pub powered_on: bool,
    pub num_vcpus: u32,
    pub memory_mb: u64,
}

#[derive(Debug, Default)]
struct HostUsage {
    vm_count: i64,
    cpu_numa_over: i64,
    used_vcores: i64,
    memory_numa_over: i64,
    used_memory_gib: i64,
}

fn host_usage(host: &HostInventory, vms: &[VmInventory], params: &CapacityParams) -> HostUsage {
    let mut usage = HostUsage::default();
    let mut used_memory_gib = params.reserved_memory_gib.unwrap_or(0.0);
    usage.used_vcores = i64::from(params.reserved_vcores.unwrap_or(0));

    let half_cores = f64::from(host.num_cores) / 2.0;
    let half_memory = host.memory_capacity_gib as f64 / 2.0;

    for vm in vms
        .iter()
        .filter(|vm| vm.host_uuid.as_deref() == Some(host.uuid.as_str()))
    {
        usage.vm_count += 1;
        if !vm.powered_on {
            continue;
        }
        usage.used_vcores += i64::from(vm.num_vcpus);
        if f64::from(vm.num_vcpus) > half_cores {
            usage.cpu_numa_over += 1;
        }
        let vm_memory_gib = vm.memory_mb as f64 / 1024.0;
        used_memory_gib += vm_memory_gib;
        if vm_memory_gib > half_memory {
            usage.memory_numa_over += 1;
        }
    }
    usage.used_memory_gib = used_memory_gib as i64;
    usage
}

/// Memory usable cluster-wide once the replication factor's failure
/// headroom is set aside: RF2 excludes the largest host, RF3 the two
/// largest.
fn recommended_memory(capacities: &[u64], replication_factor: u8) -> u64 {
    let total: u64 = capacities.iter().sum();
    let mut sorted = capacities.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    if replication_factor == 2 {
        total - sorted.first().copied().unwrap_or(0)
    } else if sorted.len() >= 2 {
        total - sorted[0] - sorted[1]
    } else {
        0
    }
}

fn vcore_ratio(used: i64, cores: i64) -> f64 {
    if cores > 0 {
        used as f64 / cores as f64
    } else {
        0.0
    }
}

/// Builds the CPU rows followed by the Memory rows.
pub fn capacity_rows(
    hosts: &[HostInventory],
    vms: &[VmInventory],
    params: &CapacityParams,
) -> Vec<DataRow> {
    let ratio = params.cpu_ratio.unwrap_or(DEFAULT_CPU_RATIO);
    let replication_factor = params.replication_factor.unwrap_or(DEFAULT_REPLICATION_FACTOR);
    let recommend_ratio = format!("1:{}", ratio);

    let usages: Vec<HostUsage> = hosts.iter().map(|h| host_usage(h, vms, params)).collect();

    let mut cpu_rows = Vec::with_capacity(hosts.len() + 1);
    for (host, usage) in hosts.iter().zip(&usages) {
        let current = vcore_ratio(usage.used_vcores, i64::from(host.num_cores));
        cpu_rows.push(
            DataRow::capacity(CapacityTable::Cpu)
                .with("hostName", host.name.as_str())
                .with("vmCount", usage.vm_count)
                .with("numaOver", usage.cpu_numa_over)
                .with("pCore", host.num_cores)
                .with("useVCore", usage.used_vcores)
                .with("recommendVcoreRatio", recommend_ratio.as_str())
                .with("currentVcoreRatio", format!("1:{:.1}", current))
                .with("result", verdict(current <= f64::from(ratio))),
        );
    }

    let total_vms: i64 = usages.iter().map(|u| u.vm_count).sum();
    let total_cores: i64 = hosts.iter().map(|h| i64::from(h.num_cores)).sum();
    let total_vcores: i64 = usages.iter().map(|u| u.used_vcores).sum();
    let total_ratio = vcore_ratio(total_vcores, total_cores);
    cpu_rows.push(
        DataRow::capacity(CapacityTable::Cpu)
            .with("hostName", TOTAL_ROW_NAME)
            .with("vmCount", total_vms)
            .with("numaOver", usages.iter().map(|u| u.cpu_numa_over).sum::<i64>())
            .with("pCore", total_cores)
            .with("useVCore", total_vcores)
            .with("recommendVcoreRatio", recommend_ratio.as_str())
            .with("currentVcoreRatio", format!("1:{:.2}", total_ratio))
            .with("result", verdict(total_ratio <= f64::from(ratio))),
    );

    let capacities: Vec<u64> = hosts.iter().map(|h| h.memory_capacity_gib).collect();
    let total_memory: u64 = capacities.iter().sum();
    let total_recommended = recommended_memory(&capacities, replication_factor);

    let mut memory_rows = Vec::with_capacity(hosts.len() + 1);
    for (host, usage) in hosts.iter().zip(&usages) {
        // Each host gets the cluster-wide recommended share of its own memory.
        let recommended = if total_memory > 0 {
            (host.memory_capacity_gib * total_recommended / total_memory) as i64
        } else {
            0
        };
        let available = recommended - usage.used_memory_gib;
        memory_rows.push(
            DataRow::capacity(CapacityTable::Memory)
                .with("hostName", host.name.as_str())
                .with("vmCount", usage.vm_count)
                .with("numaOver", usage.memory_numa_over)
                .with("memoryGiB", host.memory_capacity_gib as i64)
                .with("useMemoryGiB", usage.used_memory_gib)
                .with("recommendUse", recommended)
                .with("availableMemory", available)
                .with("result", verdict(available > 0)),
        );
    }

    let total_used_memory: i64 = usages.iter().map(|u| u.used_memory_gib).sum();
    let available_percent = if total_memory > 0 {
        total_recommended * 100 / total_memory
    } else {
        0
    };
    memory_rows.push(
        DataRow::capacity(CapacityTable::Memory)
            .with("hostName", TOTAL_ROW_NAME)
            .with("vmCount", total_vms)
            .with("numaOver", usages.iter().map(|u| u.memory_numa_over).sum::<i64>())
            .with("memoryGiB", total_memory as i64)
            .with("useMemoryGiB", total_used_memory)
            .with("recommendUse", total_recommended as i64)
            .with("availableMemory", format!("{}%", available_percent))
            .with("result", verdict(total_used_memory < total_recommended as i64)),
    );

    cpu_rows.extend(memory_rows);
    cpu_rows
}

fn verdict(pass: bool) -> &'static str {
    if pass { PASS } else { FAIL }
}

/// Reduces a sample series to one value. An empty series yields 0.
pub fn aggregate(samples: &[f64], aggregation: Aggregation) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    match aggregation {
        Aggregation::Max => samples.iter().copied().fold(f64::MIN, f64::max),
        Aggregation::Average => samples.iter().sum::<f64>() / samples.len() as f64,
    }
}
