use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use tracing::{debug, error, info, warn};

use clusterdeck::ConsoleError;
use clusterdeck::config::ConsoleConfig;
use clusterdeck::connection::{BatchConnectionManager, ConnectionSet, PresetDraft, PresetStore};
use clusterdeck::export;
use clusterdeck::models::{
    Aggregation, ApiVersion, CapacityTable, Category, Credentials, DataRow, EntityKind, TargetKind,
};
use clusterdeck::notice::{Notice, NoticeLevel};
use clusterdeck::orchestrator::{FetchOutcome, QueryOrchestrator};
use clusterdeck::schema::{self, ColumnDefinition};
use clusterdeck::service::{
    CachedQueryService, ExportSink, HttpBackend, MockBackend, QueryService, VerificationService,
};

// ============================================================
// CLI
// ============================================================

#[derive(Parser)]
#[command(name = "clusterdeck", about = "Cluster operator console", version = clusterdeck::VERSION)]
struct Args {
    #[command(flatten)]
    config: ConsoleConfig,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the column catalogue of a category (all categories if omitted).
    Schema { category: Option<Category> },
    /// Manage saved connection presets.
    Presets {
        #[command(subcommand)]
        action: PresetAction,
    },
    /// Verify presets and add them to the connection set.
    Connect {
        /// Preset ids to connect.
        preset_ids: Vec<String>,
        /// Connect every saved preset.
        #[arg(long, conflicts_with = "preset_ids")]
        all: bool,
    },
    /// Manage verified connections.
    Connections {
        #[command(subcommand)]
        action: ConnectionAction,
    },
    /// Query a connection and print the result table.
    Fetch {
        #[command(flatten)]
        query: QueryArgs,
        /// Expand a cluster row to show its hosts (repeatable).
        #[arg(long, value_name = "CLUSTER")]
        expand: Vec<String>,
    },
    /// Query a connection and write the result through the export service.
    Export {
        #[command(flatten)]
        query: QueryArgs,
        /// Output file, or directory to place the exported file in.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum PresetAction {
    List,
    Add {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        address: String,
        #[arg(long)]
        username: String,
        #[arg(long, env = "CLUSTERDECK_PASSWORD", hide_env_values = true)]
        password: String,
        /// PE or PC.
        #[arg(long, default_value = "PE")]
        kind: TargetKind,
        #[arg(long)]
        api_version: Option<ApiVersion>,
    },
    /// Append presets from a JSON array file.
    Import { file: PathBuf },
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    Clear,
}

#[derive(Subcommand)]
enum ConnectionAction {
    List,
    Remove { id: String },
    Clear,
}

#[derive(clap::Args)]
struct QueryArgs {
    /// Connection id (see `connections list`).
    connection: String,

    #[arg(long, default_value = "inventory")]
    category: Category,

    /// Performance window start (RFC 3339).
    #[arg(long)]
    start: Option<DateTime<Utc>>,
    /// Performance window end (RFC 3339).
    #[arg(long)]
    end: Option<DateTime<Utc>>,
    /// Performance sampling interval in seconds.
    #[arg(long)]
    interval: Option<u32>,
    /// max or average.
    #[arg(long)]
    aggregation: Option<Aggregation>,

    /// Capacity vCPU:pCPU ratio threshold.
    #[arg(long)]
    cpu_ratio: Option<u32>,
    /// Capacity replication factor (2 or 3).
    #[arg(long)]
    rf: Option<u8>,
    /// vCores reserved per host.
    #[arg(long)]
    reserved_vcores: Option<u32>,
    /// GiB of memory reserved per host.
    #[arg(long)]
    reserved_memory: Option<f64>,

    /// Sort by a column; repeating a column flips its direction.
    #[arg(long, value_name = "COLUMN")]
    sort: Vec<String>,
    /// Toggle a column on or off (comma separated).
    #[arg(long, value_name = "COLUMNS", value_delimiter = ',')]
    columns: Vec<String>,
    /// Bypass caches.
    #[arg(long)]
    refresh: bool,
}

// ============================================================
// Main
// ============================================================

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("clusterdeck=info")),
        )
        .init();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            process::exit(1);
        }
    };

    match runtime.block_on(async_main(args)) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("clusterdeck: {}", e);
            process::exit(1);
        }
    }
}

/// Runs one command. `Ok(false)` when the command reported its own errors.
async fn async_main(args: Args) -> Result<bool, ConsoleError> {
    let Args { config, command } = args;
    match command {
        Command::Schema { category } => {
            print_schema(category);
            Ok(true)
        }
        Command::Presets { action } => presets(&config, action),
        Command::Connections { action } => connections(&config, action),
        Command::Connect { preset_ids, all } => {
            let backend = Backend::open(&config)?;
            connect(&config, &backend, &preset_ids, all).await
        }
        Command::Fetch { query, expand } => {
            let backend = Backend::open(&config)?;
            let Some(mut orchestrator) = load(&config, &backend, &query).await? else {
                return Ok(false);
            };
            for name in &expand {
                orchestrator.toggle_expansion(name);
            }
            print_results(&orchestrator);
            Ok(report(orchestrator.take_notices()))
        }
        Command::Export { query, out } => {
            let backend = Backend::open(&config)?;
            let Some(mut orchestrator) = load(&config, &backend, &query).await? else {
                return Ok(false);
            };
            let today = Local::now().date_naive();
            let artifact = export::export_results(&mut orchestrator, backend.sink(), today).await;
            let ok = report(orchestrator.take_notices());
            let Some(artifact) = artifact else {
                if orchestrator.result_set().is_empty() {
                    warn!("nothing to export");
                }
                return Ok(false);
            };
            let path = output_path(&out, &artifact.filename);
            fs::write(&path, &artifact.bytes)?;
            println!("{}", path.display());
            Ok(ok)
        }
    }
}

// ============================================================
// Backends
// ============================================================

enum Backend {
    Demo(MockBackend),
    Http(CachedQueryService<HttpBackend>),
}

impl Backend {
    fn open(config: &ConsoleConfig) -> Result<Self, ConsoleError> {
        if config.demo {
            info!(version = clusterdeck::VERSION, "using demo fleet");
            return Ok(Backend::Demo(MockBackend::demo()));
        }
        info!(version = clusterdeck::VERSION, url = %config.backend_url, "using backend");
        let http = HttpBackend::new(&config.backend_url, config.timeout())?;
        Ok(Backend::Http(CachedQueryService::with_ttl(
            http,
            config.cache_ttl(),
        )))
    }

    fn query(&self) -> &dyn QueryService {
        match self {
            Backend::Demo(mock) => mock,
            Backend::Http(cached) => cached,
        }
    }

    fn verifier(&self) -> &dyn VerificationService {
        match self {
            Backend::Demo(mock) => mock,
            Backend::Http(cached) => cached.inner(),
        }
    }

    fn sink(&self) -> &dyn ExportSink {
        match self {
            Backend::Demo(mock) => mock,
            Backend::Http(cached) => cached.inner(),
        }
    }
}

// ============================================================
// Commands
// ============================================================

fn presets(config: &ConsoleConfig, action: PresetAction) -> Result<bool, ConsoleError> {
    let mut store = PresetStore::open(config.open_store()?)?;
    match action {
        PresetAction::List => {
            for p in store.list() {
                println!(
                    "{}  {:<20} {:<16} {}  {}  {}",
                    p.id,
                    p.name.as_deref().unwrap_or("-"),
                    p.address,
                    p.kind.as_str(),
                    p.api_version.unwrap_or_default().as_str(),
                    p.credentials.username,
                );
            }
        }
        PresetAction::Add {
            name,
            address,
            username,
            password,
            kind,
            api_version,
        } => {
            let preset = store.save(PresetDraft {
                name,
                kind,
                address,
                credentials: Credentials::new(username, password),
                api_version,
            })?;
            println!("{}", preset.id);
        }
        PresetAction::Import { file } => {
            let json = fs::read_to_string(&file)?;
            let report = store.import_json(&json)?;
            println!(
                "imported {} preset(s), skipped {}",
                report.imported, report.skipped
            );
        }
        PresetAction::Delete { ids } => {
            let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
            let removed = store.bulk_delete(&ids)?;
            println!("deleted {} preset(s)", removed);
            return Ok(removed == ids.len());
        }
        PresetAction::Clear => store.clear()?,
    }
    Ok(true)
}

fn connections(config: &ConsoleConfig, action: ConnectionAction) -> Result<bool, ConsoleError> {
    let mut set = ConnectionSet::open(config.open_store()?)?;
    match action {
        ConnectionAction::List => {
            for t in set.list() {
                println!(
                    "{}  {:<24} {:<16} {}  {}",
                    t.id,
                    t.display_name,
                    t.address,
                    t.kind.as_str(),
                    t.api_version.as_str(),
                );
            }
            Ok(true)
        }
        ConnectionAction::Remove { id } => {
            let removed = set.remove(&id)?;
            if !removed {
                eprintln!("no connection with id {}", id);
            }
            Ok(removed)
        }
        ConnectionAction::Clear => {
            set.clear()?;
            Ok(true)
        }
    }
}

async fn connect(
    config: &ConsoleConfig,
    backend: &Backend,
    preset_ids: &[String],
    all: bool,
) -> Result<bool, ConsoleError> {
    let store = config.open_store()?;
    let presets = PresetStore::open(store.clone())?;
    let mut manager = BatchConnectionManager::new(ConnectionSet::open(store)?);

    if all {
        manager.select_all(presets.list().iter().map(|p| p.id.as_str()));
    } else {
        for id in preset_ids {
            if presets.get(id).is_none() {
                warn!(id = %id, "unknown preset id");
                continue;
            }
            manager.toggle_selection(id);
        }
    }

    let outcome = manager
        .connect_selection(backend.verifier(), &presets)
        .await;
    if let Some(batch) = &outcome {
        for o in batch.successes() {
            println!(
                "{}  {}",
                o.connection_id.as_deref().unwrap_or("-"),
                o.resolved_name.as_deref().unwrap_or(o.candidate.label()),
            );
        }
    }
    let ok = report(manager.take_notices());
    Ok(ok && outcome.is_some_and(|r| r.all_succeeded()))
}

/// Runs the query described by `args` against its connection.
///
/// `None` when the query could not be issued or failed; the reason has
/// already been reported.
async fn load(
    config: &ConsoleConfig,
    backend: &Backend,
    args: &QueryArgs,
) -> Result<Option<QueryOrchestrator>, ConsoleError> {
    let set = ConnectionSet::open(config.open_store()?)?;
    let Some(target) = set.get(&args.connection).cloned() else {
        return Err(ConsoleError::validation(format!(
            "no connection with id {}",
            args.connection
        )));
    };

    let mut orchestrator = QueryOrchestrator::new(args.category);
    apply_parameters(&mut orchestrator, args);
    for key in &args.columns {
        if !orchestrator.toggle_column(key) {
            warn!(column = %key, category = %args.category, "unknown column");
        }
    }
    for field in &args.sort {
        orchestrator.sort_by(field);
    }

    let request = match orchestrator.select_target(target) {
        Some(request) if !args.refresh => Some(request),
        _ => orchestrator.begin_fetch(args.refresh),
    };
    let Some(request) = request else {
        if orchestrator.target().is_some() {
            orchestrator.parameters().validate()?;
        }
        report(orchestrator.take_notices());
        return Ok(None);
    };

    debug!(generation = request.generation, "running query");
    match orchestrator.run_fetch(backend.query(), request).await {
        FetchOutcome::Applied { .. } => Ok(Some(orchestrator)),
        FetchOutcome::Stale | FetchOutcome::Failed => {
            report(orchestrator.take_notices());
            Ok(None)
        }
    }
}

fn apply_parameters(orchestrator: &mut QueryOrchestrator, args: &QueryArgs) {
    if let Some(p) = orchestrator.performance_params_mut() {
        p.start_time = args.start.or(p.start_time);
        p.end_time = args.end.or(p.end_time);
        p.interval_seconds = args.interval.or(p.interval_seconds);
        p.aggregation = args.aggregation.or(p.aggregation);
    }
    if let Some(c) = orchestrator.capacity_params_mut() {
        c.cpu_ratio = args.cpu_ratio.or(c.cpu_ratio);
        c.replication_factor = args.rf.or(c.replication_factor);
        c.reserved_vcores = args.reserved_vcores.or(c.reserved_vcores);
        c.reserved_memory_gib = args.reserved_memory.or(c.reserved_memory_gib);
    }
}

fn output_path(out: &Path, filename: &str) -> PathBuf {
    if out.is_dir() {
        out.join(filename)
    } else {
        out.to_path_buf()
    }
}

// ============================================================
// Output
// ============================================================

/// Prints notices to stderr. Returns false if any was an error.
fn report(notices: Vec<Notice>) -> bool {
    let mut ok = true;
    for notice in notices {
        ok &= notice.level != NoticeLevel::Error;
        eprintln!("{}", notice);
    }
    ok
}

fn print_schema(category: Option<Category>) {
    let categories = match category {
        Some(c) => vec![c],
        None => Category::all().to_vec(),
    };
    for category in categories {
        let def = schema::definition_for(category);
        println!("{} ({})", category.name(), category.wire_name());
        for column in def.columns {
            let marker = if def.default_columns.contains(&column.key) {
                "*"
            } else {
                " "
            };
            println!("  {} {:<24} {}", marker, column.key, column.label);
        }
    }
}

fn print_results(orchestrator: &QueryOrchestrator) {
    let rows = orchestrator.presented_rows();
    if orchestrator.category() == Category::Capacity {
        for table in [CapacityTable::Cpu, CapacityTable::Memory] {
            let in_table: Vec<&DataRow> = rows
                .iter()
                .copied()
                .filter(|r| r.table() == Some(table))
                .collect();
            println!("{}", table.as_str());
            print_table(schema::capacity_columns(table), &in_table, orchestrator);
            println!();
        }
        return;
    }
    let columns: Vec<ColumnDefinition> = orchestrator
        .selected_columns()
        .into_iter()
        .copied()
        .collect();
    print_table(&columns, &rows, orchestrator);
}

fn print_table(columns: &[ColumnDefinition], rows: &[&DataRow], orchestrator: &QueryOrchestrator) {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    let text = row.get(c.key).map(|v| v.to_string()).unwrap_or_default();
                    if i == 0 {
                        format!("{}{}", tree_prefix(row, orchestrator), text)
                    } else {
                        text
                    }
                })
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(c.label.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!("{:<w$}", c.label, w = *w))
        .collect();
    println!("{}", header.join("  ").trim_end());
    for row in cells {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<w$}", cell, w = *w))
            .collect();
        println!("{}", line.join("  ").trim_end());
    }
}

fn tree_prefix(row: &DataRow, orchestrator: &QueryOrchestrator) -> &'static str {
    match row.hierarchy().map(|h| (h.kind, h.name.as_str())) {
        Some((EntityKind::Cluster, name)) if orchestrator.hierarchy().is_expanded(name) => "- ",
        Some((EntityKind::Cluster, _)) => "+ ",
        Some((EntityKind::Host, _)) => "    ",
        _ => "",
    }
}
