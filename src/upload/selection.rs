//! Candidate files and the subset marked for transfer

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use super::FileCandidate;

/// Aggregate of the files currently marked for transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionSummary {
    pub file_count: usize,
    pub total_bytes: u64,
}

/// Result of an [`SelectionRegistry::add_files`] call
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AddReport {
    pub added: usize,
    pub too_large: Vec<String>,
}

/// Render-ready view of one tracked file
#[derive(Debug, Clone, Copy)]
pub struct FileEntry<'a> {
    pub candidate: &'a FileCandidate,
    pub included: bool,
    pub too_large: bool,
    pub invalid: bool,
}

/// Case-insensitive name order, ties broken by the exact name.
///
/// Progress indices reported by the server are resolved against this order,
/// so it must stay total and stable.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

#[derive(Debug, Default)]
pub struct SelectionRegistry {
    all: HashMap<String, FileCandidate>,
    to_transfer: HashSet<String>,
    deselected: HashSet<String>,
    invalid: HashSet<String>,
    size_limit: Option<u64>,
    summary: SelectionSummary,
}

impl SelectionRegistry {
    pub fn new(size_limit: Option<u64>) -> Self {
        Self {
            size_limit,
            ..Self::default()
        }
    }

    pub fn size_limit(&self) -> Option<u64> {
        self.size_limit
    }

    /// A file exactly at the limit is still accepted
    pub fn is_too_large(&self, size: u64) -> bool {
        self.size_limit.is_some_and(|limit| size > limit)
    }

    /// Insert or replace candidates by name
    pub fn add_files(&mut self, candidates: impl IntoIterator<Item = FileCandidate>) -> AddReport {
        let mut report = AddReport::default();

        for candidate in candidates {
            let name = candidate.name.clone();
            let too_large = self.is_too_large(candidate.size);
            if self.all.insert(name.clone(), candidate).is_some() {
                tracing::debug!("Replacing previously selected file {}", name);
            }
            report.added += 1;

            if too_large {
                self.to_transfer.remove(&name);
                report.too_large.push(name);
            } else if self.deselected.contains(&name) || self.invalid.contains(&name) {
                self.to_transfer.remove(&name);
            } else {
                self.to_transfer.insert(name);
            }
        }

        self.refresh_summary();
        report
    }

    /// Include or exclude a tracked file. Returns false when the request was refused.
    pub fn toggle_selection(&mut self, name: &str, included: bool) -> bool {
        let Some(candidate) = self.all.get(name) else {
            return false;
        };

        if included {
            if self.is_too_large(candidate.size) || self.invalid.contains(name) {
                return false;
            }
            self.deselected.remove(name);
            self.to_transfer.insert(name.to_string());
        } else {
            self.deselected.insert(name.to_string());
            self.to_transfer.remove(name);
        }

        self.refresh_summary();
        true
    }

    /// Flag names the server rejected; they can never be included again
    pub fn mark_invalid<'a>(&mut self, names: impl IntoIterator<Item = &'a String>) {
        for name in names {
            self.invalid.insert(name.clone());
            self.to_transfer.remove(name);
        }
        self.refresh_summary();
    }

    pub fn is_included(&self, name: &str) -> bool {
        self.to_transfer.contains(name)
    }

    pub fn get(&self, name: &str) -> Option<&FileCandidate> {
        self.all.get(name)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.all.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    pub fn has_files_to_transfer(&self) -> bool {
        !self.to_transfer.is_empty()
    }

    /// Every tracked name, in display order
    pub fn snapshot_ordered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.all.keys().cloned().collect();
        names.sort_by(|a, b| compare_names(a, b));
        names
    }

    /// Names marked for transfer, in display order
    pub fn ordered_names_to_transfer(&self) -> Vec<String> {
        let mut names: Vec<String> = self.to_transfer.iter().cloned().collect();
        names.sort_by(|a, b| compare_names(a, b));
        names
    }

    /// Candidates marked for transfer, in display order
    pub fn ordered_files_to_transfer(&self) -> Vec<FileCandidate> {
        self.ordered_names_to_transfer()
            .iter()
            .filter_map(|name| self.all.get(name).cloned())
            .collect()
    }

    pub fn entries(&self) -> Vec<FileEntry<'_>> {
        self.snapshot_ordered_names()
            .iter()
            .filter_map(|name| self.entry(name))
            .collect()
    }

    pub fn entry(&self, name: &str) -> Option<FileEntry<'_>> {
        let candidate = self.all.get(name)?;
        Some(FileEntry {
            candidate,
            included: self.to_transfer.contains(name),
            too_large: self.is_too_large(candidate.size),
            invalid: self.invalid.contains(name),
        })
    }

    pub fn summary(&self) -> SelectionSummary {
        self.summary
    }

    fn refresh_summary(&mut self) {
        let total_bytes = self
            .to_transfer
            .iter()
            .filter_map(|name| self.all.get(name))
            .map(|c| c.size)
            .sum();
        self.summary = SelectionSummary {
            file_count: self.to_transfer.len(),
            total_bytes,
        };
        tracing::debug!(
            "Selection: {} file(s), {} bytes",
            self.summary.file_count,
            self.summary.total_bytes
        );
    }
}
