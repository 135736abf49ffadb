//! File row display widget

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};

use crate::app::{ListRow, RowNote};
use crate::theme::ThemeColors;

use super::progress::format_bytes;

/// Resource type of a file, guessed from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Image,
    Document,
    Archive,
    Code,
    Media,
    Binary,
}

impl ResourceKind {
    pub fn icon(&self) -> &'static str {
        match self {
            ResourceKind::Image => "▣",
            ResourceKind::Document => "≡",
            ResourceKind::Archive => "▤",
            ResourceKind::Code => "‹›",
            ResourceKind::Media => "♪",
            ResourceKind::Binary => "□",
        }
    }
}

pub fn kind_for(name: &str) -> ResourceKind {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" | "jpg" | "jpeg" | "gif" | "bmp" | "svg" | "webp" | "ico" | "tif" | "tiff" => {
            ResourceKind::Image
        }
        "txt" | "md" | "pdf" | "doc" | "docx" | "odt" | "rtf" | "csv" | "xls" | "xlsx" | "ppt"
        | "pptx" => ResourceKind::Document,
        "zip" | "jar" | "tar" | "gz" | "tgz" | "bz2" | "xz" | "7z" | "rar" => ResourceKind::Archive,
        "html" | "htm" | "xml" | "jsp" | "js" | "css" | "json" | "java" | "rs" | "xsd" | "properties" => {
            ResourceKind::Code
        }
        "mp3" | "wav" | "ogg" | "flac" | "mp4" | "mkv" | "avi" | "mov" | "webm" => ResourceKind::Media,
        _ => ResourceKind::Binary,
    }
}

/// Icon shown next to a file name
pub fn icon_for(name: &str) -> &'static str {
    kind_for(name).icon()
}

/// Renders one file row: cursor, checkbox, icon, name, size, note
pub struct FileItem<'a> {
    row: &'a ListRow,
    theme: &'a ThemeColors,
    selected: bool,
}

impl<'a> FileItem<'a> {
    pub fn new(row: &'a ListRow, theme: &'a ThemeColors) -> Self {
        Self {
            row,
            theme,
            selected: false,
        }
    }

    pub fn selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }
}

impl Widget for FileItem<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 {
            return;
        }

        let row = self.row;
        let theme = self.theme;

        let marker = if self.selected { "> " } else { "  " };
        let checkbox = match (row.checked, row.selectable) {
            (true, _) => "[x]",
            (false, true) => "[ ]",
            (false, false) => "[-]",
        };
        let name_style = if self.selected {
            theme.selected()
        } else if row.selectable || row.checked {
            theme.text()
        } else {
            theme.text_dimmed()
        };

        let size = format_bytes(row.size);
        let note = row.note.map(|note| match note {
            RowNote::Exists => (" already exists, overwrite?", theme.warning()),
            RowNote::InvalidName => (" invalid name", theme.error()),
            RowNote::TooLarge => (" too large", theme.error()),
        });

        let name_width = (area.width as usize).saturating_sub(24 + note.map_or(0, |(n, _)| n.len()));
        let mut spans = vec![
            Span::styled(marker, name_style),
            Span::styled(format!("{} ", checkbox), theme.key()),
            Span::styled(format!("{} ", icon_for(&row.name)), theme.info()),
            Span::styled(truncate(&row.name, name_width.max(8)), name_style),
            Span::styled(format!(" {:>10}", size), theme.text_muted()),
        ];
        if let Some((text, style)) = note {
            spans.push(Span::styled(text, style));
        }

        Paragraph::new(Line::from(spans)).render(Rect { height: 1, ..area }, buf);
    }
}

/// Pad or cut to `max` characters
fn truncate(s: &str, max: usize) -> String {
    let count = s.chars().count();
    if count <= max {
        format!("{:<width$}", s, width = max)
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}
