//! Query orchestration: active category, parameters, fetches and results.
//!
//! The orchestrator is a plain state object. Every user action is a
//! synchronous transition; actions that need data return a [`FetchRequest`]
//! ticket. The front end hands the ticket to a [`QueryService`] and feeds the
//! outcome back through [`QueryOrchestrator::apply_response`], which drops
//! responses whose generation has been superseded. [`QueryOrchestrator::trigger_fetch`]
//! bundles both halves for callers that await inline.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::error::ConsoleError;
use crate::hierarchy::HierarchicalRowModel;
use crate::models::{
    CapacityParams, Category, ClusterTarget, DataRow, PerformanceParams, QueryParameters,
};
use crate::notice::{Notice, Notices};
use crate::schema::{self, ColumnDefinition};
use crate::service::{FetchRequest, QueryService, ServiceError};
use crate::table::SortState;

/// What happened to a fetch response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Result set replaced.
    Applied { rows: usize },
    /// A newer fetch (or a category/target change) superseded this one.
    Stale,
    /// The service failed; result set left unchanged.
    Failed,
}

#[derive(Debug)]
pub struct QueryOrchestrator {
    category: Category,
    selected_columns: BTreeSet<&'static str>,
    parameters: QueryParameters,
    result_set: Vec<DataRow>,
    loading: bool,
    generation: u64,
    target: Option<ClusterTarget>,
    sort: Option<SortState>,
    hierarchy: HierarchicalRowModel,
    notices: Notices,
}

impl Default for QueryOrchestrator {
    fn default() -> Self {
        Self::new(Category::Inventory)
    }
}

impl QueryOrchestrator {
    pub fn new(category: Category) -> Self {
        let mut orchestrator = Self {
            category,
            selected_columns: BTreeSet::new(),
            parameters: QueryParameters::None,
            result_set: Vec::new(),
            loading: false,
            generation: 0,
            target: None,
            sort: None,
            hierarchy: HierarchicalRowModel::new(),
            notices: Notices::default(),
        };
        orchestrator.set_category(category);
        orchestrator
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn parameters(&self) -> &QueryParameters {
        &self.parameters
    }

    pub fn result_set(&self) -> &[DataRow] {
        &self.result_set
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn target(&self) -> Option<&ClusterTarget> {
        self.target.as_ref()
    }

    pub fn sort(&self) -> Option<&SortState> {
        self.sort.as_ref()
    }

    pub fn hierarchy(&self) -> &HierarchicalRowModel {
        &self.hierarchy
    }

    /// Selected columns in the category's canonical order.
    pub fn selected_columns(&self) -> Vec<&'static ColumnDefinition> {
        schema::definition_for(self.category)
            .columns
            .iter()
            .filter(|c| self.selected_columns.contains(c.key))
            .collect()
    }

    pub fn notices(&self) -> &[Notice] {
        self.notices.peek()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }

    pub(crate) fn push_notice(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    /// Export is only offered for a settled, non-empty result set.
    pub fn can_export(&self) -> bool {
        !self.loading && !self.result_set.is_empty()
    }

    // ------------------------------------------------------------------
    // Category, target, parameters
    // ------------------------------------------------------------------

    /// Switches category, resetting columns, results and parameters.
    /// Never issues a fetch; see [`Self::change_category`].
    pub fn set_category(&mut self, category: Category) {
        self.set_category_at(category, Utc::now());
    }

    /// [`Self::set_category`] with an explicit clock for the default
    /// performance window.
    pub fn set_category_at(&mut self, category: Category, now: DateTime<Utc>) {
        self.category = category;
        self.selected_columns = schema::definition_for(category)
            .default_columns
            .iter()
            .copied()
            .collect();
        self.parameters = QueryParameters::defaults_for(category, now);
        self.sort = None;
        self.hierarchy.collapse_all();
        self.invalidate();
        debug!(category = %category, "category selected");
    }

    /// User-driven category switch, auto-fetching for flat categories.
    pub fn change_category(&mut self, category: Category) -> Option<FetchRequest> {
        self.set_category(category);
        self.auto_fetch()
    }

    /// Selects a target. Only verified targets are accepted; flat
    /// categories fetch immediately.
    pub fn select_target(&mut self, target: ClusterTarget) -> Option<FetchRequest> {
        if !target.verified {
            warn!(target = %target.address, "refusing to select unverified target");
            self.notices.push(Notice::warning(format!(
                "{} has not been verified",
                target.display_name
            )));
            return None;
        }
        self.target = Some(target);
        self.hierarchy.collapse_all();
        self.invalidate();
        self.auto_fetch()
    }

    pub fn clear_target(&mut self) {
        self.target = None;
        self.invalidate();
    }

    /// Replaces the parameters. The variant must match the active category.
    pub fn set_parameters(&mut self, parameters: QueryParameters) -> Result<(), ConsoleError> {
        if !parameters.matches(self.category) {
            return Err(ConsoleError::validation(format!(
                "parameters do not apply to the {} category",
                self.category
            )));
        }
        self.parameters = parameters;
        Ok(())
    }

    pub fn performance_params_mut(&mut self) -> Option<&mut PerformanceParams> {
        match &mut self.parameters {
            QueryParameters::Performance(p) => Some(p),
            _ => None,
        }
    }

    pub fn capacity_params_mut(&mut self) -> Option<&mut CapacityParams> {
        match &mut self.parameters {
            QueryParameters::Capacity(c) => Some(c),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Presentation
    // ------------------------------------------------------------------

    /// Adds or removes a column. Keys outside the schema are ignored.
    pub fn toggle_column(&mut self, key: &str) -> bool {
        let Some(column) = schema::definition_for(self.category).column(key) else {
            return false;
        };
        if !self.selected_columns.remove(column.key) {
            self.selected_columns.insert(column.key);
        }
        true
    }

    /// Header click on `field`.
    pub fn sort_by(&mut self, field: &str) {
        self.sort = Some(SortState::click(self.sort.take(), field));
    }

    pub fn toggle_expansion(&mut self, entity_name: &str) -> bool {
        self.hierarchy.toggle_expansion(entity_name)
    }

    /// Rows in display order: the full result set sorted, then filtered by
    /// hierarchy expansion for hierarchical categories.
    pub fn presented_rows(&self) -> Vec<&DataRow> {
        let mut rows: Vec<&DataRow> = self.result_set.iter().collect();
        if let Some(sort) = &self.sort {
            sort.apply(&mut rows);
        }
        if self.category.is_hierarchical() {
            self.hierarchy.visible_rows(rows)
        } else {
            rows
        }
    }

    // ------------------------------------------------------------------
    // Fetching
    // ------------------------------------------------------------------

    /// Starts a fetch for the current state.
    ///
    /// Returns `None` without side effects when there is no target or the
    /// category's parameters are incomplete or out of range.
    pub fn begin_fetch(&mut self, ignore_cache: bool) -> Option<FetchRequest> {
        let Some(target) = self.target.clone() else {
            debug!("fetch skipped: no target selected");
            return None;
        };
        if self.category.requires_parameters()
            && let Err(e) = self.parameters.validate()
        {
            debug!(category = %self.category, error = %e, "fetch skipped: invalid parameters");
            return None;
        }

        self.generation += 1;
        self.loading = true;
        debug!(
            generation = self.generation,
            category = %self.category,
            target = %target.display_name,
            ignore_cache,
            "fetch started"
        );
        Some(FetchRequest {
            generation: self.generation,
            target,
            category: self.category,
            parameters: self.parameters.clone(),
            ignore_cache,
        })
    }

    /// Explicit confirmation of the current parameters.
    pub fn confirm(&mut self) -> Option<FetchRequest> {
        self.begin_fetch(false)
    }

    /// Re-fetch bypassing caches.
    pub fn refresh(&mut self) -> Option<FetchRequest> {
        self.begin_fetch(true)
    }

    /// Applies the response of the fetch started with `generation`.
    pub fn apply_response(
        &mut self,
        generation: u64,
        response: Result<Vec<DataRow>, ServiceError>,
    ) -> FetchOutcome {
        if generation != self.generation {
            debug!(
                generation,
                current = self.generation,
                "dropping stale fetch response"
            );
            return FetchOutcome::Stale;
        }

        let response = response.and_then(|rows| {
            match rows.iter().find(|r| r.category() != self.category) {
                Some(row) => Err(ServiceError::Malformed(format!(
                    "{} row in {} result",
                    row.category(),
                    self.category
                ))),
                None => Ok(rows),
            }
        });

        self.loading = false;
        match response {
            Ok(rows) => {
                let count = rows.len();
                info!(category = %self.category, rows = count, "result set replaced");
                self.result_set = rows;
                FetchOutcome::Applied { rows: count }
            }
            Err(e) => {
                warn!(category = %self.category, error = %e, "fetch failed");
                self.notices.push(Notice::error(format!(
                    "Failed to load {} data: {}",
                    self.category, e
                )));
                FetchOutcome::Failed
            }
        }
    }

    /// Runs an already-started fetch to completion against `service`.
    pub async fn run_fetch(
        &mut self,
        service: &dyn QueryService,
        request: FetchRequest,
    ) -> FetchOutcome {
        let response = service.fetch(&request).await;
        self.apply_response(request.generation, response)
    }

    /// Starts and awaits a fetch. `None` when the fetch was not issued.
    pub async fn trigger_fetch(
        &mut self,
        service: &dyn QueryService,
        ignore_cache: bool,
    ) -> Option<FetchOutcome> {
        let request = self.begin_fetch(ignore_cache)?;
        Some(self.run_fetch(service, request).await)
    }

    fn auto_fetch(&mut self) -> Option<FetchRequest> {
        if self.category.auto_fetches() {
            self.begin_fetch(false)
        } else {
            None
        }
    }

    /// Clears results and supersedes any in-flight fetch.
    fn invalidate(&mut self) {
        self.result_set.clear();
        self.loading = false;
        self.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Aggregation, ApiVersion, Credentials, Hierarchy, TargetKind};
    use crate::table::SortDirection;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;

    fn target() -> ClusterTarget {
        ClusterTarget {
            id: "t-1".into(),
            display_name: "prod-cluster".into(),
            address: "10.0.0.1".into(),
            credentials: Credentials::new("admin", "pw"),
            kind: TargetKind::Element,
            api_version: ApiVersion::V2,
            verified: true,
        }
    }

    fn vm(name: &str) -> DataRow {
        DataRow::empty(Category::Inventory).with("name", name)
    }

    fn names(rows: &[&DataRow], key: &str) -> Vec<String> {
        rows.iter()
            .map(|r| r.get(key).map(|v| v.to_string()).unwrap_or_default())
            .collect()
    }

    struct FixedService {
        rows: Vec<DataRow>,
        seen: Mutex<Vec<FetchRequest>>,
    }

    #[async_trait]
    impl QueryService for FixedService {
        async fn fetch(&self, request: &FetchRequest) -> Result<Vec<DataRow>, ServiceError> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.rows.clone())
        }
    }

    #[test]
    fn test_performance_defaults_without_fetch() {
        let mut o = QueryOrchestrator::default();
        o.select_target(target());
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).unwrap();
        o.set_category_at(Category::Performance, now);

        match o.parameters() {
            QueryParameters::Performance(p) => {
                assert_eq!(p.interval_seconds, Some(30));
                assert_eq!(p.aggregation, Some(Aggregation::Average));
                assert_eq!(p.end_time, Some(now));
            }
            other => panic!("unexpected parameters {:?}", other),
        }
        assert!(!o.is_loading());

        assert!(o.change_category(Category::Performance).is_none());
        assert!(!o.is_loading());
        assert!(o.confirm().is_some());
    }

    #[test]
    fn test_capacity_defaults() {
        let mut o = QueryOrchestrator::new(Category::Capacity);
        let c = o.capacity_params_mut().unwrap();
        assert_eq!(c.cpu_ratio, Some(3));
        assert_eq!(c.replication_factor, Some(2));
        assert_eq!(c.reserved_vcores, Some(0));
        assert_eq!(c.reserved_memory_gib, Some(0.0));
    }

    #[test]
    fn test_flat_categories_auto_fetch() {
        let mut o = QueryOrchestrator::new(Category::Performance);
        let req = o.select_target(target());
        assert!(req.is_none());

        let req = o.change_category(Category::Hardware).unwrap();
        assert_eq!(req.category, Category::Hardware);
        assert!(!req.ignore_cache);
        assert!(o.is_loading());
    }

    #[test]
    fn test_select_target_triggers_inventory_fetch() {
        let mut o = QueryOrchestrator::default();
        assert!(o.begin_fetch(false).is_none());
        let req = o.select_target(target()).unwrap();
        assert_eq!(req.category, Category::Inventory);
        assert_eq!(req.parameters, QueryParameters::None);
    }

    #[test]
    fn test_unverified_target_rejected() {
        let mut o = QueryOrchestrator::default();
        let mut t = target();
        t.verified = false;
        assert!(o.select_target(t).is_none());
        assert!(o.target().is_none());
        assert_eq!(o.take_notices().len(), 1);
    }

    #[test]
    fn test_invalid_parameters_block_fetch() {
        let mut o = QueryOrchestrator::new(Category::Capacity);
        o.select_target(target());
        o.capacity_params_mut().unwrap().cpu_ratio = Some(42);
        let before = o.generation();
        assert!(o.confirm().is_none());
        assert_eq!(o.generation(), before);
        assert!(!o.is_loading());
        assert!(o.notices().is_empty());

        o.capacity_params_mut().unwrap().cpu_ratio = Some(4);
        assert!(o.confirm().is_some());
    }

    #[test]
    fn test_stale_response_dropped() {
        let mut o = QueryOrchestrator::default();
        let g1 = o.select_target(target()).unwrap().generation;
        let g2 = o.refresh().unwrap().generation;
        assert!(g2 > g1);

        assert_eq!(o.apply_response(g1, Ok(vec![vm("old")])), FetchOutcome::Stale);
        assert!(o.is_loading());
        assert!(o.result_set().is_empty());

        assert_eq!(
            o.apply_response(g2, Ok(vec![vm("new-1"), vm("new-2")])),
            FetchOutcome::Applied { rows: 2 }
        );
        assert!(!o.is_loading());
        assert_eq!(names(&o.presented_rows(), "name"), vec!["new-1", "new-2"]);
    }

    #[test]
    fn test_stale_response_after_newer_applied() {
        let mut o = QueryOrchestrator::default();
        let g1 = o.select_target(target()).unwrap().generation;
        let g2 = o.refresh().unwrap().generation;
        o.apply_response(g2, Ok(vec![vm("new")]));
        assert_eq!(o.apply_response(g1, Ok(vec![vm("old")])), FetchOutcome::Stale);
        assert_eq!(names(&o.presented_rows(), "name"), vec!["new"]);
    }

    #[test]
    fn test_category_change_supersedes_in_flight_fetch() {
        let mut o = QueryOrchestrator::default();
        let g1 = o.select_target(target()).unwrap().generation;
        o.set_category(Category::Performance);
        assert!(!o.is_loading());
        assert_eq!(o.apply_response(g1, Ok(vec![vm("late")])), FetchOutcome::Stale);
        assert!(o.result_set().is_empty());
    }

    #[test]
    fn test_failure_keeps_results_and_notifies() {
        let mut o = QueryOrchestrator::default();
        let g1 = o.select_target(target()).unwrap().generation;
        o.apply_response(g1, Ok(vec![vm("keep")]));

        let g2 = o.refresh().unwrap().generation;
        let outcome = o.apply_response(g2, Err(ServiceError::Failed("Timeout".into())));
        assert_eq!(outcome, FetchOutcome::Failed);
        assert!(!o.is_loading());
        assert_eq!(names(&o.presented_rows(), "name"), vec!["keep"]);
        let notices = o.take_notices();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].message.contains("Timeout"));
    }

    #[test]
    fn test_stale_failure_is_silent() {
        let mut o = QueryOrchestrator::default();
        let g1 = o.select_target(target()).unwrap().generation;
        let _g2 = o.refresh().unwrap();
        assert_eq!(
            o.apply_response(g1, Err(ServiceError::Failed("boom".into()))),
            FetchOutcome::Stale
        );
        assert!(o.is_loading());
        assert!(o.notices().is_empty());
    }

    #[test]
    fn test_mismatched_rows_rejected() {
        let mut o = QueryOrchestrator::default();
        let g = o.select_target(target()).unwrap().generation;
        let outcome = o.apply_response(g, Ok(vec![DataRow::empty(Category::Hardware)]));
        assert_eq!(outcome, FetchOutcome::Failed);
        assert!(o.result_set().is_empty());
    }

    #[test]
    fn test_toggle_column_keeps_canonical_order() {
        let mut o = QueryOrchestrator::default();
        assert!(o.toggle_column("clusterName"));
        assert!(o.toggle_column("uuid"));
        assert!(o.toggle_column("clusterName"));
        assert!(!o.toggle_column("bogus"));
        let keys: Vec<_> = o.selected_columns().iter().map(|c| c.key).collect();
        assert_eq!(
            keys,
            vec![
                "clusterName",
                "name",
                "uuid",
                "powerState",
                "ipAddresses",
                "numVcpus",
                "memoryMb"
            ]
        );
        o.toggle_column("uuid");
        assert!(!o.selected_columns().iter().any(|c| c.key == "uuid"));
    }

    #[test]
    fn test_category_change_resets_columns() {
        let mut o = QueryOrchestrator::default();
        o.toggle_column("name");
        o.set_category(Category::Inventory);
        assert!(o.selected_columns().iter().any(|c| c.key == "name"));
    }

    #[test]
    fn test_presented_rows_sorted_before_hierarchy_filter() {
        let mut o = QueryOrchestrator::new(Category::Performance);
        o.select_target(target());
        let g = o.confirm().unwrap().generation;
        let rows = vec![
            DataRow::performance(Hierarchy::cluster("C1"))
                .with("entityName", "C1")
                .with("iops", "500"),
            DataRow::performance(Hierarchy::host("h-a", "C1"))
                .with("entityName", "h-a")
                .with("iops", "100"),
            DataRow::performance(Hierarchy::host("h-b", "C1"))
                .with("entityName", "h-b")
                .with("iops", "1,000"),
        ];
        o.apply_response(g, Ok(rows));

        o.sort_by("iops");
        assert_eq!(names(&o.presented_rows(), "entityName"), vec!["C1"]);

        o.toggle_expansion("C1");
        assert_eq!(
            names(&o.presented_rows(), "entityName"),
            vec!["h-a", "C1", "h-b"]
        );

        o.sort_by("iops");
        assert_eq!(o.sort().unwrap().direction, SortDirection::Descending);
        assert_eq!(
            names(&o.presented_rows(), "entityName"),
            vec!["h-b", "C1", "h-a"]
        );

        o.sort_by("entityName");
        assert_eq!(o.sort().unwrap().direction, SortDirection::Ascending);
    }

    #[test]
    fn test_set_parameters_variant_must_match() {
        let mut o = QueryOrchestrator::default();
        assert!(
            o.set_parameters(QueryParameters::Capacity(CapacityParams::default()))
                .is_err()
        );
        o.set_category(Category::Capacity);
        assert!(
            o.set_parameters(QueryParameters::Capacity(CapacityParams::default()))
                .is_ok()
        );
    }

    #[test]
    fn test_can_export_requires_settled_results() {
        let mut o = QueryOrchestrator::default();
        assert!(!o.can_export());
        let g = o.select_target(target()).unwrap().generation;
        o.apply_response(g, Ok(vec![vm("a")]));
        assert!(o.can_export());
        o.refresh();
        assert!(!o.can_export());
    }

    #[tokio::test]
    async fn test_trigger_fetch_passes_request_to_service() {
        let service = FixedService {
            rows: vec![vm("x")],
            seen: Mutex::new(Vec::new()),
        };
        let mut o = QueryOrchestrator::default();
        let first = o.select_target(target()).unwrap();
        let outcome = o.run_fetch(&service, first).await;
        assert_eq!(outcome, FetchOutcome::Applied { rows: 1 });

        let outcome = o.trigger_fetch(&service, true).await;
        assert_eq!(outcome, Some(FetchOutcome::Applied { rows: 1 }));

        let seen = service.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(!seen[0].ignore_cache);
        assert!(seen[1].ignore_cache);
        assert_eq!(seen[1].target.id, "t-1");
    }
}
