//! Maps server progress snapshots onto the client's file list.
//!
//! The server reports a one-based index of the file it is writing, not its
//! name. The index is resolved against the case-insensitive name order that
//! was fixed when the transfer started, which is also the order the files
//! were written into the request body. If the server processed files in a
//! different order the wrong name would be shown with no error.

use super::ProgressSnapshot;

/// What the dialog shows while uploading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressView {
    pub file_index: usize,
    pub file_name: Option<String>,
    pub file_count: usize,
    pub percent: u8,
    /// Estimate: the baseline excludes multipart framing
    pub bytes_read: u64,
    pub total_bytes: u64,
}

impl ProgressView {
    /// "3 of 7" style position, one-based
    pub fn position(&self) -> usize {
        if self.file_count == 0 {
            0
        } else {
            self.file_index + 1
        }
    }
}

#[derive(Debug)]
pub struct ProgressMonitor {
    ordered_names: Vec<String>,
    baseline: u64,
}

impl ProgressMonitor {
    /// `selected_bytes` seeds the baseline; zero leaves it open for the
    /// first snapshot that reports a content length.
    pub fn new(ordered_names: Vec<String>, selected_bytes: u64) -> Self {
        Self {
            ordered_names,
            baseline: selected_bytes,
        }
    }

    #[cfg(test)]
    pub fn baseline(&self) -> u64 {
        self.baseline
    }

    pub fn ordered_names(&self) -> &[String] {
        &self.ordered_names
    }

    pub fn file_index(&self, current_file: u32) -> usize {
        let index = (current_file as usize).saturating_sub(1);
        index.min(self.ordered_names.len().saturating_sub(1))
    }

    /// Baseline only moves from unset to set, never down
    fn establish_baseline(&mut self, content_length: u64) {
        if self.baseline == 0 && content_length > 0 {
            tracing::debug!("Adopting content length {} as progress baseline", content_length);
            self.baseline = content_length;
        }
    }

    pub fn bytes_read(&self, percent: u8) -> u64 {
        if percent == 0 {
            return 0;
        }
        let percent = percent.min(100) as u128;
        (self.baseline as u128 * percent / 100) as u64
    }

    pub fn apply(&mut self, snapshot: &ProgressSnapshot) -> ProgressView {
        self.establish_baseline(snapshot.content_length);
        let file_index = self.file_index(snapshot.current_file);
        let percent = snapshot.percent.min(100);

        ProgressView {
            file_index,
            file_name: self.ordered_names.get(file_index).cloned(),
            file_count: self.ordered_names.len(),
            percent,
            bytes_read: self.bytes_read(percent),
            total_bytes: self.baseline,
        }
    }

    pub fn initial(&self) -> ProgressView {
        ProgressView {
            file_index: 0,
            file_name: self.ordered_names.first().cloned(),
            file_count: self.ordered_names.len(),
            percent: 0,
            bytes_read: 0,
            total_bytes: self.baseline,
        }
    }

    /// Final view; `request_size` stands in when no baseline was ever known
    pub fn finished(&mut self, request_size: u64) -> ProgressView {
        self.establish_baseline(request_size);
        let file_index = self.ordered_names.len().saturating_sub(1);
        ProgressView {
            file_index,
            file_name: self.ordered_names.get(file_index).cloned(),
            file_count: self.ordered_names.len(),
            percent: 100,
            bytes_read: self.baseline,
            total_bytes: self.baseline,
        }
    }
}
