//! Server-side name conflict check and the policy applied to its answer

use std::collections::BTreeSet;

use super::selection::{compare_names, SelectionRegistry};
use super::{ConflictReport, UploadError, UploadService};

/// What the session does next after a check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckDecision {
    /// Another upload holds the server session
    SessionBusy,
    /// Some names clash or are rejected; the user decides
    ResolveConflicts {
        existing: BTreeSet<String>,
        invalid: BTreeSet<String>,
    },
    /// Nothing in the way
    Proceed,
}

pub fn decide(report: ConflictReport) -> CheckDecision {
    if report.session_active {
        CheckDecision::SessionBusy
    } else if report.has_conflicts() {
        CheckDecision::ResolveConflicts {
            existing: report.existing_names,
            invalid: report.invalid_names,
        }
    } else {
        CheckDecision::Proceed
    }
}

pub async fn check(
    service: &dyn UploadService,
    names: &[String],
    target_folder: &str,
) -> Result<ConflictReport, UploadError> {
    tracing::info!(
        "Checking {} name(s) against {}",
        names.len(),
        target_folder
    );
    let report = service.check_upload_files(names, target_folder).await?;
    tracing::info!(
        "Check result: {} existing, {} invalid, session active: {}",
        report.existing_names.len(),
        report.invalid_names.len(),
        report.session_active
    );
    Ok(report)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    Existing,
    Invalid,
}

/// One row of the overwrite list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictEntry {
    pub name: String,
    pub kind: ConflictKind,
    pub checked: bool,
}

impl ConflictEntry {
    /// Invalid names are shown but can't be toggled
    pub fn selectable(&self) -> bool {
        self.kind == ConflictKind::Existing
    }
}

/// The conflicting subset, in display order
pub fn conflict_entries(
    existing: &BTreeSet<String>,
    invalid: &BTreeSet<String>,
    selection: &SelectionRegistry,
) -> Vec<ConflictEntry> {
    let mut entries: Vec<ConflictEntry> = existing
        .iter()
        .filter(|name| !invalid.contains(*name))
        .map(|name| ConflictEntry {
            name: name.clone(),
            kind: ConflictKind::Existing,
            checked: selection.is_included(name),
        })
        .chain(invalid.iter().map(|name| ConflictEntry {
            name: name.clone(),
            kind: ConflictKind::Invalid,
            checked: false,
        }))
        .collect();
    entries.sort_by(|a, b| compare_names(&a.name, &b.name));
    entries
}
