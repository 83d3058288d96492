//! Export payloads for the export sink.
//!
//! Flat categories export the selected columns as one table. Capacity
//! exports its CPU and Memory tables side by side with their fixed column
//! lists.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use tracing::{debug, info, warn};

use crate::models::{CapacityTable, Category, ClusterTarget, DataRow, Fields, Value};
use crate::notice::Notice;
use crate::orchestrator::QueryOrchestrator;
use crate::schema::{self, ColumnDefinition};
use crate::service::ExportSink;

const CLUSTER_NAME_FIELD: &str = "clusterName";
const FALLBACK_FILENAME: &str = "export";

/// One exported table: projected rows, column keys and their labels.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExportTable {
    pub data: Vec<Fields>,
    pub fields: Vec<String>,
    pub field_labels: BTreeMap<String, String>,
}

impl ExportTable {
    fn build<'a>(
        rows: impl IntoIterator<Item = &'a DataRow>,
        columns: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let mut fields = Vec::new();
        let mut field_labels = BTreeMap::new();
        for (key, label) in columns {
            fields.push(key.to_string());
            field_labels.insert(key.to_string(), label.to_string());
        }
        let data = rows
            .into_iter()
            .map(|row| {
                fields
                    .iter()
                    .filter_map(|key| row.get(key).map(|v| (key.clone(), v.clone())))
                    .collect()
            })
            .collect();
        Self {
            data,
            fields,
            field_labels,
        }
    }

    fn from_definitions<'a>(
        rows: impl IntoIterator<Item = &'a DataRow>,
        columns: &'static [ColumnDefinition],
    ) -> Self {
        Self::build(rows, columns.iter().map(|c| (c.key, c.label)))
    }
}

/// What the export sink receives.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportRequest {
    Single {
        filename: String,
        table: ExportTable,
    },
    /// Capacity export: CPU and Memory tables in one artifact.
    Dual {
        filename: String,
        cpu: ExportTable,
        memory: ExportTable,
    },
}

impl ExportRequest {
    /// Base filename without extension.
    pub fn filename(&self) -> &str {
        match self {
            ExportRequest::Single { filename, .. } | ExportRequest::Dual { filename, .. } => {
                filename
            }
        }
    }

    pub fn is_dual(&self) -> bool {
        matches!(self, ExportRequest::Dual { .. })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireExport<'a> {
    filename: &'a str,
    is_resources: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a [Fields]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    field_labels: Option<&'a BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cpu_data: Option<&'a [Fields]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory_data: Option<&'a [Fields]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cpu_fields: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory_fields: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cpu_field_labels: Option<&'a BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    memory_field_labels: Option<&'a BTreeMap<String, String>>,
}

impl Serialize for ExportRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            ExportRequest::Single { filename, table } => WireExport {
                filename,
                is_resources: false,
                data: Some(&table.data),
                fields: Some(&table.fields),
                field_labels: Some(&table.field_labels),
                cpu_data: None,
                memory_data: None,
                cpu_fields: None,
                memory_fields: None,
                cpu_field_labels: None,
                memory_field_labels: None,
            },
            ExportRequest::Dual {
                filename,
                cpu,
                memory,
            } => WireExport {
                filename,
                is_resources: true,
                data: None,
                fields: None,
                field_labels: None,
                cpu_data: Some(&cpu.data),
                memory_data: Some(&memory.data),
                cpu_fields: Some(&cpu.fields),
                memory_fields: Some(&memory.fields),
                cpu_field_labels: Some(&cpu.field_labels),
                memory_field_labels: Some(&memory.field_labels),
            },
        };
        wire.serialize(serializer)
    }
}

/// Binary artifact produced by the export sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// `{cluster}_{category}_{date}`, where the cluster is the name resolved in
/// the first row, else the target's display name, else its address.
pub fn export_filename(
    category: Category,
    rows: &[DataRow],
    target: Option<&ClusterTarget>,
    today: NaiveDate,
) -> String {
    let resolved = rows
        .first()
        .and_then(|row| row.get(CLUSTER_NAME_FIELD))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty());
    let cluster = resolved
        .or_else(|| {
            target
                .map(|t| t.display_name.trim())
                .filter(|name| !name.is_empty())
        })
        .or_else(|| target.map(|t| t.address.as_str()))
        .unwrap_or(FALLBACK_FILENAME);
    format!("{}_{}_{}", cluster, category.name(), today.format("%Y-%m-%d"))
}

/// Builds the export request for `rows`. `None` when there is nothing to
/// export.
pub fn build_request(
    category: Category,
    rows: &[DataRow],
    selected_columns: &[&str],
    target: Option<&ClusterTarget>,
    today: NaiveDate,
) -> Option<ExportRequest> {
    if rows.is_empty() {
        return None;
    }
    let filename = export_filename(category, rows, target, today);

    if category == Category::Capacity {
        let in_table = |t: CapacityTable| rows.iter().filter(move |r| r.table() == Some(t));
        return Some(ExportRequest::Dual {
            filename,
            cpu: ExportTable::from_definitions(
                in_table(CapacityTable::Cpu),
                schema::capacity_columns(CapacityTable::Cpu),
            ),
            memory: ExportTable::from_definitions(
                in_table(CapacityTable::Memory),
                schema::capacity_columns(CapacityTable::Memory),
            ),
        });
    }

    let definition = schema::definition_for(category);
    let columns = selected_columns
        .iter()
        .map(|&key| (key, definition.label_for(key)));
    Some(ExportRequest::Single {
        filename,
        table: ExportTable::build(rows, columns),
    })
}

/// Exports the orchestrator's current result set through `sink`.
///
/// Rows are exported in presentation sort order, including host rows of
/// collapsed clusters. Sink failures are reported as notices on the
/// orchestrator.
pub async fn export_results(
    orchestrator: &mut QueryOrchestrator,
    sink: &dyn ExportSink,
    today: NaiveDate,
) -> Option<ExportArtifact> {
    if !orchestrator.can_export() {
        debug!("export unavailable: no settled results");
        return None;
    }

    let mut rows: Vec<DataRow> = orchestrator.result_set().to_vec();
    if let Some(sort) = orchestrator.sort() {
        sort.apply(&mut rows);
    }
    let keys: Vec<&str> = orchestrator
        .selected_columns()
        .iter()
        .map(|c| c.key)
        .collect();
    let request = build_request(
        orchestrator.category(),
        &rows,
        &keys,
        orchestrator.target(),
        today,
    )?;

    match sink.export(&request).await {
        Ok(artifact) => {
            info!(filename = %artifact.filename, bytes = artifact.bytes.len(), "export complete");
            orchestrator.push_notice(Notice::info(format!("Exported {}", artifact.filename)));
            Some(artifact)
        }
        Err(e) => {
            warn!(filename = request.filename(), error = %e, "export failed");
            orchestrator.push_notice(Notice::error(format!("Export failed: {}", e)));
            None
        }
    }
}
