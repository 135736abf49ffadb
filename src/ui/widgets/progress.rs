//! Progress formatting utilities

use crate::upload::progress::ProgressView;

pub fn format_bytes(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

/// "file 2 of 5: report.pdf"
pub fn format_position(view: &ProgressView) -> String {
    match &view.file_name {
        Some(name) => format!("file {} of {}: {}", view.position(), view.file_count, name),
        None => format!("file {} of {}", view.position(), view.file_count),
    }
}

/// "1.5 MiB of 3 MiB (50%)", the byte figures are estimates
pub fn format_amount(view: &ProgressView) -> String {
    format!(
        "{} of {} ({}%)",
        format_bytes(view.bytes_read),
        format_bytes(view.total_bytes),
        view.percent
    )
}

/// Gauge ratio in 0.0..=1.0
pub fn ratio(view: &ProgressView) -> f64 {
    f64::from(view.percent.min(100)) / 100.0
}
