//! Single and batch verification of candidate targets.

use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{ConnectionSet, PresetStore};
use crate::error::ConsoleError;
use crate::models::{Candidate, ClusterTarget};
use crate::notice::{Notice, Notices};
use crate::service::VerificationService;

/// Placeholder some endpoints report when they cannot resolve a name.
pub const UNKNOWN_CLUSTER_NAME: &str = "Unknown";

/// Result of verifying one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionAttemptOutcome {
    pub candidate: Candidate,
    pub success: bool,
    /// Display name of the new connection.
    pub resolved_name: Option<String>,
    /// Id of the new connection.
    pub connection_id: Option<String>,
    pub error_message: Option<String>,
}

impl ConnectionAttemptOutcome {
    fn from_result(candidate: Candidate, result: &Result<ClusterTarget, ConsoleError>) -> Self {
        match result {
            Ok(target) => Self {
                candidate,
                success: true,
                resolved_name: Some(target.display_name.clone()),
                connection_id: Some(target.id.clone()),
                error_message: None,
            },
            Err(e) => Self {
                candidate,
                success: false,
                resolved_name: None,
                connection_id: None,
                error_message: Some(e.to_string()),
            },
        }
    }
}

/// Outcomes of a connection run, one per candidate in input order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BatchReport {
    pub outcomes: Vec<ConnectionAttemptOutcome>,
}

impl BatchReport {
    pub fn successes(&self) -> impl Iterator<Item = &ConnectionAttemptOutcome> {
        self.outcomes.iter().filter(|o| o.success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ConnectionAttemptOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.success)
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} connected",
            self.successes().count(),
            self.outcomes.len()
        )?;
        for failure in self.failures() {
            write!(
                f,
                "\n  {}: {}",
                failure.candidate.label(),
                failure.error_message.as_deref().unwrap_or("failed")
            )?;
        }
        Ok(())
    }
}

/// Drives verification of selected presets into the connection set.
///
/// Candidates are verified one at a time; each success is appended to the
/// (persisted) connection set before the next candidate is tried.
pub struct BatchConnectionManager {
    connections: ConnectionSet,
    selection: BTreeSet<String>,
    form_open: bool,
    notices: Notices,
}

impl BatchConnectionManager {
    pub fn new(connections: ConnectionSet) -> Self {
        Self {
            connections,
            selection: BTreeSet::new(),
            form_open: false,
            notices: Notices::default(),
        }
    }

    pub fn connections(&self) -> &ConnectionSet {
        &self.connections
    }

    pub fn connections_mut(&mut self) -> &mut ConnectionSet {
        &mut self.connections
    }

    // ------------------------------------------------------------------
    // Selection and input form
    // ------------------------------------------------------------------

    /// Selected preset ids.
    pub fn selection(&self) -> &BTreeSet<String> {
        &self.selection
    }

    pub fn toggle_selection(&mut self, preset_id: &str) -> bool {
        if self.selection.remove(preset_id) {
            false
        } else {
            self.selection.insert(preset_id.to_string());
            true
        }
    }

    pub fn select_all<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) {
        self.selection.extend(ids.into_iter().map(str::to_string));
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    pub fn open_form(&mut self) {
        self.form_open = true;
    }

    pub fn close_form(&mut self) {
        self.form_open = false;
    }

    pub fn is_form_open(&self) -> bool {
        self.form_open
    }

    pub fn notices(&self) -> &[Notice] {
        self.notices.peek()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }

    // ------------------------------------------------------------------
    // Verification
    // ------------------------------------------------------------------

    /// Verifies a single candidate and adds it to the connection set.
    pub async fn connect_one(
        &mut self,
        verifier: &dyn VerificationService,
        candidate: &Candidate,
    ) -> Result<ClusterTarget, ConsoleError> {
        let result = self.attempt(verifier, candidate).await;
        match &result {
            Ok(target) => {
                self.notices
                    .push(Notice::info(format!("Connected to {}", target.display_name)));
                self.clear_selection();
                self.close_form();
            }
            Err(ConsoleError::Policy(message)) => {
                self.notices.push(Notice::warning(message.clone()));
            }
            Err(e) => {
                self.notices.push(Notice::error(format!(
                    "Failed to connect to {}: {}",
                    candidate.label(),
                    e
                )));
            }
        }
        result
    }

    /// Verifies every candidate in order. Failures do not stop the run.
    ///
    /// When anything failed the selection is kept for a retry; otherwise it
    /// is cleared and the input form closed.
    pub async fn connect_batch(
        &mut self,
        verifier: &dyn VerificationService,
        candidates: &[Candidate],
    ) -> BatchReport {
        let mut report = BatchReport::default();
        for (i, candidate) in candidates.iter().enumerate() {
            debug!(
                index = i + 1,
                total = candidates.len(),
                address = %candidate.address,
                "verifying candidate"
            );
            let result = self.attempt(verifier, candidate).await;
            report
                .outcomes
                .push(ConnectionAttemptOutcome::from_result(candidate.clone(), &result));
        }

        if report.all_succeeded() {
            info!(connected = report.outcomes.len(), "batch connection complete");
            self.notices.push(Notice::info(report.to_string()));
            self.clear_selection();
            self.close_form();
        } else {
            warn!(
                connected = report.successes().count(),
                failed = report.failures().count(),
                "batch connection finished with failures"
            );
            self.notices.push(Notice::warning(report.to_string()));
        }
        report
    }

    /// Connects the selected presets in preset order: the single-target
    /// path for one selection, the batch path for more. `None` when nothing
    /// usable is selected.
    pub async fn connect_selection(
        &mut self,
        verifier: &dyn VerificationService,
        presets: &PresetStore,
    ) -> Option<BatchReport> {
        let candidates: Vec<Candidate> = presets
            .list()
            .iter()
            .filter(|p| self.selection.contains(&p.id))
            .map(|p| p.to_candidate())
            .collect();

        match candidates.as_slice() {
            [] => {
                self.notices.push(Notice::warning("No presets selected"));
                None
            }
            [candidate] => {
                let result = self.connect_one(verifier, candidate).await;
                Some(BatchReport {
                    outcomes: vec![ConnectionAttemptOutcome::from_result(
                        candidate.clone(),
                        &result,
                    )],
                })
            }
            _ => Some(self.connect_batch(verifier, &candidates).await),
        }
    }

    async fn attempt(
        &mut self,
        verifier: &dyn VerificationService,
        candidate: &Candidate,
    ) -> Result<ClusterTarget, ConsoleError> {
        validate(candidate)?;
        if !candidate.api_version.is_supported() {
            return Err(ConsoleError::policy(format!(
                "API version {} is not yet supported",
                candidate.api_version.as_str()
            )));
        }

        let verification = verifier.verify(candidate).await?;
        let display_name = verification
            .cluster_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty() && n != UNKNOWN_CLUSTER_NAME)
            .unwrap_or_else(|| candidate.label().to_string());

        let target = ClusterTarget {
            id: Uuid::new_v4().to_string(),
            display_name,
            address: candidate.address.trim().to_string(),
            credentials: candidate.credentials.clone(),
            kind: candidate.kind,
            api_version: candidate.api_version,
            verified: true,
        };
        self.connections.add(target.clone())?;
        Ok(target)
    }
}

fn validate(candidate: &Candidate) -> Result<(), ConsoleError> {
    let missing: Vec<&str> = [
        ("address", candidate.address.as_str()),
        ("username", candidate.credentials.username.as_str()),
        ("password", candidate.credentials.password.as_str()),
    ]
    .into_iter()
    .filter(|(_, v)| v.trim().is_empty())
    .map(|(field, _)| field)
    .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ConsoleError::validation(format!(
            "missing {}",
            missing.join(", ")
        )))
    }
}
