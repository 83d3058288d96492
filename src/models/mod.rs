//! Shared data models: categories, targets, parameters and rows.

mod params;
mod row;
mod target;

pub use params::{
    Aggregation, CapacityParams, DEFAULT_CPU_RATIO, DEFAULT_INTERVAL_SECS,
    DEFAULT_REPLICATION_FACTOR, PerformanceParams, QueryParameters,
};
pub use row::{CapacityTable, DataRow, EntityKind, Fields, Hierarchy, Value};
pub use target::{ApiVersion, Candidate, ClusterTarget, Credentials, TargetKind};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Data category selectable in the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Inventory,
    Hardware,
    Performance,
    Capacity,
}

impl Category {
    pub fn all() -> &'static [Category] {
        &[
            Category::Inventory,
            Category::Hardware,
            Category::Performance,
            Category::Capacity,
        ]
    }

    /// Display name, also used in export filenames.
    pub fn name(&self) -> &'static str {
        match self {
            Category::Inventory => "Inventory",
            Category::Hardware => "Hardware",
            Category::Performance => "Performance",
            Category::Capacity => "Capacity",
        }
    }

    /// Category identifier understood by the console backend.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Category::Inventory => "VM",
            Category::Hardware => "Hardware",
            Category::Performance => "Performance",
            Category::Capacity => "Resources",
        }
    }

    /// Categories whose fetch needs user-confirmed parameters first.
    pub fn requires_parameters(&self) -> bool {
        matches!(self, Category::Performance | Category::Capacity)
    }

    /// Categories that fetch as soon as a target is selected or the
    /// category is entered.
    pub fn auto_fetches(&self) -> bool {
        !self.requires_parameters()
    }

    pub fn is_hierarchical(&self) -> bool {
        matches!(self, Category::Performance)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inventory" | "vm" => Ok(Category::Inventory),
            "hardware" => Ok(Category::Hardware),
            "performance" => Ok(Category::Performance),
            "capacity" | "resources" => Ok(Category::Capacity),
            other => Err(format!(
                "unknown category '{}' (expected inventory, hardware, performance or capacity)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parse_accepts_wire_names() {
        assert_eq!("VM".parse::<Category>().unwrap(), Category::Inventory);
        assert_eq!("resources".parse::<Category>().unwrap(), Category::Capacity);
        assert_eq!(" Performance ".parse::<Category>().unwrap(), Category::Performance);
        assert!("disks".parse::<Category>().is_err());
    }

    #[test]
    fn test_only_flat_categories_auto_fetch() {
        assert!(Category::Inventory.auto_fetches());
        assert!(Category::Hardware.auto_fetches());
        assert!(!Category::Performance.auto_fetches());
        assert!(!Category::Capacity.auto_fetches());
    }
}
