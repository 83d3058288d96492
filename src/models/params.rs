//! Per-category query parameters and their validation rules.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::Category;
use crate::error::ConsoleError;

/// Default sampling interval for performance queries.
pub const DEFAULT_INTERVAL_SECS: u32 = 30;
/// Default vCPU:pCPU ratio threshold for capacity analysis.
pub const DEFAULT_CPU_RATIO: u32 = 3;
/// Default replication factor for capacity analysis.
pub const DEFAULT_REPLICATION_FACTOR: u8 = 2;

const CPU_RATIO_MIN: u32 = 1;
const CPU_RATIO_MAX: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Max,
    Average,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::Max => "max",
            Aggregation::Average => "average",
        }
    }
}

impl std::str::FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "max" => Ok(Aggregation::Max),
            "average" | "avg" => Ok(Aggregation::Average),
            other => Err(format!("unknown aggregation '{}' (expected max or average)", other)),
        }
    }
}

/// Time-series window for the Performance category.
///
/// Fields are optional because the operator edits them one at a time;
/// a fetch is only valid once every field is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceParams {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub interval_seconds: Option<u32>,
    pub aggregation: Option<Aggregation>,
}

impl PerformanceParams {
    /// The most recent hour ending at `now`, 30 s interval, averaged.
    pub fn last_hour(now: DateTime<Utc>) -> Self {
        Self {
            start_time: Some(now - Duration::hours(1)),
            end_time: Some(now),
            interval_seconds: Some(DEFAULT_INTERVAL_SECS),
            aggregation: Some(Aggregation::Average),
        }
    }

    pub fn validate(&self) -> Result<(), ConsoleError> {
        let start = self
            .start_time
            .ok_or_else(|| ConsoleError::validation("start time is required"))?;
        let end = self
            .end_time
            .ok_or_else(|| ConsoleError::validation("end time is required"))?;
        if start >= end {
            return Err(ConsoleError::validation("start time must precede end time"));
        }
        match self.interval_seconds {
            None => return Err(ConsoleError::validation("interval is required")),
            Some(0) => return Err(ConsoleError::validation("interval must be at least 1 second")),
            Some(_) => {}
        }
        if self.aggregation.is_none() {
            return Err(ConsoleError::validation("aggregation is required"));
        }
        Ok(())
    }
}

/// Inputs for the Capacity (ratio analysis) category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityParams {
    pub cpu_ratio: Option<u32>,
    pub replication_factor: Option<u8>,
    pub reserved_vcores: Option<u32>,
    pub reserved_memory_gib: Option<f64>,
}

impl Default for CapacityParams {
    fn default() -> Self {
        Self {
            cpu_ratio: Some(DEFAULT_CPU_RATIO),
            replication_factor: Some(DEFAULT_REPLICATION_FACTOR),
            reserved_vcores: Some(0),
            reserved_memory_gib: Some(0.0),
        }
    }
}

impl CapacityParams {
    pub fn validate(&self) -> Result<(), ConsoleError> {
        match self.cpu_ratio {
            None => return Err(ConsoleError::validation("CPU ratio is required")),
            Some(r) if !(CPU_RATIO_MIN..=CPU_RATIO_MAX).contains(&r) => {
                return Err(ConsoleError::validation(format!(
                    "CPU ratio must be between {} and {}",
                    CPU_RATIO_MIN, CPU_RATIO_MAX
                )));
            }
            Some(_) => {}
        }
        match self.replication_factor {
            Some(2) | Some(3) => {}
            Some(rf) => {
                return Err(ConsoleError::validation(format!(
                    "replication factor must be 2 or 3, got {}",
                    rf
                )));
            }
            None => return Err(ConsoleError::validation("replication factor is required")),
        }
        if self.reserved_vcores.is_none() {
            return Err(ConsoleError::validation("reserved vCores is required"));
        }
        match self.reserved_memory_gib {
            Some(m) if m.is_finite() && m >= 0.0 => {}
            Some(_) => {
                return Err(ConsoleError::validation(
                    "reserved memory must be a non-negative number",
                ));
            }
            None => return Err(ConsoleError::validation("reserved memory is required")),
        }
        Ok(())
    }
}

/// Parameters for the active category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum QueryParameters {
    None,
    Performance(PerformanceParams),
    Capacity(CapacityParams),
}

impl QueryParameters {
    /// Seeds the parameter variant for `category`.
    pub fn defaults_for(category: Category, now: DateTime<Utc>) -> Self {
        match category {
            Category::Inventory | Category::Hardware => QueryParameters::None,
            Category::Performance => QueryParameters::Performance(PerformanceParams::last_hour(now)),
            Category::Capacity => QueryParameters::Capacity(CapacityParams::default()),
        }
    }

    /// Returns `true` if this variant belongs to `category`.
    pub fn matches(&self, category: Category) -> bool {
        matches!(
            (self, category),
            (QueryParameters::None, Category::Inventory | Category::Hardware)
                | (QueryParameters::Performance(_), Category::Performance)
                | (QueryParameters::Capacity(_), Category::Capacity)
        )
    }

    pub fn validate(&self) -> Result<(), ConsoleError> {
        match self {
            QueryParameters::None => Ok(()),
            QueryParameters::Performance(p) => p.validate(),
            QueryParameters::Capacity(c) => c.validate(),
        }
    }

    /// Stable textual fingerprint of the parameters, used in cache keys.
    pub fn fingerprint(&self) -> String {
        match self {
            QueryParameters::None => String::new(),
            QueryParameters::Performance(p) => format!(
                "{}|{}|{}|{}",
                p.start_time.map(|t| t.to_rfc3339()).unwrap_or_default(),
                p.end_time.map(|t| t.to_rfc3339()).unwrap_or_default(),
                p.interval_seconds.map(|i| i.to_string()).unwrap_or_default(),
                p.aggregation.map(|a| a.as_str()).unwrap_or_default(),
            ),
            QueryParameters::Capacity(c) => format!(
                "{}|{}|{}|{}",
                c.cpu_ratio.map(|r| r.to_string()).unwrap_or_default(),
                c.replication_factor.map(|r| r.to_string()).unwrap_or_default(),
                c.reserved_vcores.map(|r| r.to_string()).unwrap_or_default(),
                c.reserved_memory_gib.map(|r| r.to_string()).unwrap_or_default(),
            ),
        }
    }
}
