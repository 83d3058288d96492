//! Typed result rows.
//!
//! A row is an open mapping from column key to scalar. The category decides
//! which extra metadata a row may carry: performance rows may belong to a
//! cluster/host hierarchy, capacity rows always name the table they belong
//! to. Other combinations are unrepresentable.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::Category;

/// Scalar cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric interpretation: numbers, and text holding a plain or
    /// thousands-grouped number ("1,234", " 12.5 ").
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) if n.is_finite() => Some(*n),
            Value::Text(s) => {
                let cleaned: String = s.trim().chars().filter(|&c| c != ',').collect();
                if cleaned.is_empty() {
                    return None;
                }
                cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::Text(s),
            other => Value::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

pub type Fields = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Cluster,
    Host,
    None,
}

/// Position of a performance row in the cluster/host tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hierarchy {
    pub kind: EntityKind,
    pub name: String,
    pub parent: Option<String>,
}

impl Hierarchy {
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Cluster,
            name: name.into(),
            parent: None,
        }
    }

    pub fn host(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            kind: EntityKind::Host,
            name: name.into(),
            parent: Some(parent.into()),
        }
    }
}

/// Table a capacity row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapacityTable {
    #[serde(rename = "CPU")]
    Cpu,
    Memory,
}

impl CapacityTable {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapacityTable::Cpu => "CPU",
            CapacityTable::Memory => "Memory",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataRow {
    Inventory(Fields),
    Hardware(Fields),
    Performance {
        hierarchy: Option<Hierarchy>,
        fields: Fields,
    },
    Capacity {
        table: CapacityTable,
        fields: Fields,
    },
}

impl AsRef<DataRow> for DataRow {
    fn as_ref(&self) -> &DataRow {
        self
    }
}

const WIRE_ENTITY_TYPE: &str = "entityType";
const WIRE_ENTITY_NAME: &str = "entityName";
const WIRE_PARENT: &str = "parentCluster";
const WIRE_TABLE: &str = "table";

impl DataRow {
    /// Creates an empty row for `category`. Capacity rows start in the CPU table.
    pub fn empty(category: Category) -> Self {
        match category {
            Category::Inventory => DataRow::Inventory(Fields::new()),
            Category::Hardware => DataRow::Hardware(Fields::new()),
            Category::Performance => DataRow::Performance {
                hierarchy: None,
                fields: Fields::new(),
            },
            Category::Capacity => DataRow::Capacity {
                table: CapacityTable::Cpu,
                fields: Fields::new(),
            },
        }
    }

    pub fn capacity(table: CapacityTable) -> Self {
        DataRow::Capacity {
            table,
            fields: Fields::new(),
        }
    }

    pub fn performance(hierarchy: Hierarchy) -> Self {
        DataRow::Performance {
            hierarchy: Some(hierarchy),
            fields: Fields::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields_mut().insert(key.to_string(), value.into());
        self
    }

    pub fn category(&self) -> Category {
        match self {
            DataRow::Inventory(_) => Category::Inventory,
            DataRow::Hardware(_) => Category::Hardware,
            DataRow::Performance { .. } => Category::Performance,
            DataRow::Capacity { .. } => Category::Capacity,
        }
    }

    pub fn fields(&self) -> &Fields {
        match self {
            DataRow::Inventory(f) | DataRow::Hardware(f) => f,
            DataRow::Performance { fields, .. } | DataRow::Capacity { fields, .. } => fields,
        }
    }

    pub fn fields_mut(&mut self) -> &mut Fields {
        match self {
            DataRow::Inventory(f) | DataRow::Hardware(f) => f,
            DataRow::Performance { fields, .. } | DataRow::Capacity { fields, .. } => fields,
        }
    }

    /// Present, non-null value for `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields().get(key).filter(|v| !v.is_null())
    }

    pub fn hierarchy(&self) -> Option<&Hierarchy> {
        match self {
            DataRow::Performance { hierarchy, .. } => hierarchy.as_ref(),
            _ => None,
        }
    }

    pub fn table(&self) -> Option<CapacityTable> {
        match self {
            DataRow::Capacity { table, .. } => Some(*table),
            _ => None,
        }
    }

    /// Decodes a row object returned by the query service.
    ///
    /// Performance rows take their hierarchy from `entityType`,
    /// `entityName` and `parentCluster`; capacity rows require `table`.
    pub fn from_wire(
        category: Category,
        object: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, String> {
        let mut fields: Fields = object
            .into_iter()
            .map(|(k, v)| (k, Value::from_json(v)))
            .collect();

        match category {
            Category::Inventory => Ok(DataRow::Inventory(fields)),
            Category::Hardware => Ok(DataRow::Hardware(fields)),
            Category::Performance => {
                let kind = match fields.remove(WIRE_ENTITY_TYPE) {
                    Some(Value::Text(t)) => match t.as_str() {
                        "cluster" => EntityKind::Cluster,
                        "host" => EntityKind::Host,
                        _ => EntityKind::None,
                    },
                    _ => EntityKind::None,
                };
                let parent = match fields.remove(WIRE_PARENT) {
                    Some(Value::Text(p)) if !p.is_empty() => Some(p),
                    _ => None,
                };
                let name = fields
                    .get(WIRE_ENTITY_NAME)
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let hierarchy = match (kind, name) {
                    (EntityKind::None, _) | (_, None) => None,
                    (kind, Some(name)) => Some(Hierarchy { kind, name, parent }),
                };
                Ok(DataRow::Performance { hierarchy, fields })
            }
            Category::Capacity => {
                let table = match fields.remove(WIRE_TABLE) {
                    Some(Value::Text(t)) if t == "CPU" => CapacityTable::Cpu,
                    Some(Value::Text(t)) if t == "Memory" => CapacityTable::Memory,
                    Some(other) => return Err(format!("unknown capacity table '{}'", other)),
                    None => return Err("capacity row without 'table' field".to_string()),
                };
                Ok(DataRow::Capacity { table, fields })
            }
        }
    }
}
