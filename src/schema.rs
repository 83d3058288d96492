//! Column catalogue for each category.
//!
//! Definitions are static and process-wide; lookups never fail.

use serde::Serialize;

use crate::models::{CapacityTable, Category};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnDefinition {
    /// Field name in the row object.
    pub key: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CategoryDefinition {
    pub category: Category,
    /// Canonical column order.
    pub columns: &'static [ColumnDefinition],
    /// Columns selected when the category is entered.
    pub default_columns: &'static [&'static str],
}

impl CategoryDefinition {
    pub fn column(&self, key: &str) -> Option<&'static ColumnDefinition> {
        self.columns.iter().find(|c| c.key == key)
    }

    pub fn has_column(&self, key: &str) -> bool {
        self.column(key).is_some()
    }

    /// Label for `key`, or the key itself if the schema has none.
    pub fn label_for<'a>(&self, key: &'a str) -> &'a str {
        match self.column(key) {
            Some(c) => c.label,
            None => key,
        }
    }
}

const fn col(key: &'static str, label: &'static str) -> ColumnDefinition {
    ColumnDefinition { key, label }
}

// ============================================================
// Inventory (virtual machines)
// ============================================================

const INVENTORY_COLUMNS: &[ColumnDefinition] = &[
    col("clusterName", "Cluster"),
    col("name", "VM Name"),
    col("uuid", "UUID"),
    col("powerState", "Power State"),
    col("macAddress", "MAC Address"),
    col("ipAddresses", "IP Addresses"),
    col("vDisk", "vDisk"),
    col("numVcpus", "vCPU"),
    col("memoryMb", "Memory (MB)"),
];

const INVENTORY_DEFAULTS: &[&str] = &[
    "clusterName",
    "name",
    "powerState",
    "ipAddresses",
    "numVcpus",
    "memoryMb",
];

// ============================================================
// Hardware (hosts and disks)
// ============================================================

const HARDWARE_COLUMNS: &[ColumnDefinition] = &[
    col("hostName", "Host"),
    col("serial", "Serial"),
    col("model", "Model"),
    col("cpuModel", "CPU Model"),
    col("numCores", "Cores"),
    col("memoryCapacity", "Memory (GiB)"),
    col("blockSerial", "Block Serial"),
    col("disk", "Disks"),
    col("diskModel", "Disk Model"),
];

const HARDWARE_DEFAULTS: &[&str] = &[
    "hostName",
    "serial",
    "model",
    "cpuModel",
    "numCores",
    "memoryCapacity",
    "disk",
];

// ============================================================
// Performance (cluster/host time series)
// ============================================================

const PERFORMANCE_COLUMNS: &[ColumnDefinition] = &[
    col("entityName", "Entity"),
    col("iops", "IOPS"),
    col("latency", "Latency (ms)"),
    col("bandwidth", "Bandwidth"),
    col("cpuUsage", "CPU Usage (%)"),
    col("memoryUsage", "Memory Usage (%)"),
];

const PERFORMANCE_DEFAULTS: &[&str] = &[
    "entityName",
    "iops",
    "latency",
    "bandwidth",
    "cpuUsage",
    "memoryUsage",
];

// ============================================================
// Capacity (CPU / memory ratio analysis)
// ============================================================

const CAPACITY_CPU_COLUMNS: &[ColumnDefinition] = &[
    col("hostName", "Host"),
    col("vmCount", "VM Count"),
    col("numaOver", "NUMA Over"),
    col("pCore", "pCore"),
    col("useVCore", "Used vCore"),
    col("recommendVcoreRatio", "Recommended Ratio"),
    col("currentVcoreRatio", "Current Ratio"),
    col("result", "Result"),
];

const CAPACITY_MEMORY_COLUMNS: &[ColumnDefinition] = &[
    col("hostName", "Host"),
    col("vmCount", "VM Count"),
    col("numaOver", "NUMA Over"),
    col("memoryGiB", "Memory (GiB)"),
    col("useMemoryGiB", "Used Memory (GiB)"),
    col("recommendUse", "Recommended Use (GiB)"),
    col("availableMemory", "Available (GiB)"),
    col("result", "Result"),
];

/// Union of both capacity tables. Only backs `toggle_column` bookkeeping;
/// output always goes through [`capacity_columns`].
const CAPACITY_COLUMNS: &[ColumnDefinition] = &[
    col("hostName", "Host"),
    col("vmCount", "VM Count"),
    col("numaOver", "NUMA Over"),
    col("pCore", "pCore"),
    col("useVCore", "Used vCore"),
    col("recommendVcoreRatio", "Recommended Ratio"),
    col("currentVcoreRatio", "Current Ratio"),
    col("memoryGiB", "Memory (GiB)"),
    col("useMemoryGiB", "Used Memory (GiB)"),
    col("recommendUse", "Recommended Use (GiB)"),
    col("availableMemory", "Available (GiB)"),
    col("result", "Result"),
];

/// Selection bookkeeping only, see [`CAPACITY_COLUMNS`].
const CAPACITY_DEFAULTS: &[&str] = &[
    "hostName",
    "vmCount",
    "numaOver",
    "pCore",
    "useVCore",
    "recommendVcoreRatio",
    "currentVcoreRatio",
    "memoryGiB",
    "useMemoryGiB",
    "recommendUse",
    "availableMemory",
    "result",
];

static INVENTORY: CategoryDefinition = CategoryDefinition {
    category: Category::Inventory,
    columns: INVENTORY_COLUMNS,
    default_columns: INVENTORY_DEFAULTS,
};

static HARDWARE: CategoryDefinition = CategoryDefinition {
    category: Category::Hardware,
    columns: HARDWARE_COLUMNS,
    default_columns: HARDWARE_DEFAULTS,
};

static PERFORMANCE: CategoryDefinition = CategoryDefinition {
    category: Category::Performance,
    columns: PERFORMANCE_COLUMNS,
    default_columns: PERFORMANCE_DEFAULTS,
};

static CAPACITY: CategoryDefinition = CategoryDefinition {
    category: Category::Capacity,
    columns: CAPACITY_COLUMNS,
    default_columns: CAPACITY_DEFAULTS,
};

/// Schema for `category`.
pub fn definition_for(category: Category) -> &'static CategoryDefinition {
    match category {
        Category::Inventory => &INVENTORY,
        Category::Hardware => &HARDWARE,
        Category::Performance => &PERFORMANCE,
        Category::Capacity => &CAPACITY,
    }
}

/// Fixed column list of one capacity table, independent of user selection.
pub fn capacity_columns(table: CapacityTable) -> &'static [ColumnDefinition] {
    match table {
        CapacityTable::Cpu => CAPACITY_CPU_COLUMNS,
        CapacityTable::Memory => CAPACITY_MEMORY_COLUMNS,
    }
}
