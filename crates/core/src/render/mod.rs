mod terminal;

use crate::api::TimelineEntry;
use crate::chart::{ChartHandle, ChartKind};
use url::Url;

pub use terminal::TerminalView;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Warn,
    Success,
    Error,
}

impl StatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Info => "info",
            StatusKind::Warn => "warn",
            StatusKind::Success => "success",
            StatusKind::Error => "error",
        }
    }
}

/// One results-table row, cell text exactly as the server sent it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableRow {
    pub time: String,
    pub emotion: String,
    pub confidence: String,
}

impl From<&TimelineEntry> for TableRow {
    fn from(entry: &TimelineEntry) -> Self {
        Self {
            time: entry.time.to_string(),
            emotion: entry.emotion.clone(),
            confidence: entry.confidence.to_string(),
        }
    }
}

/// The display regions the controller drives. Implementations treat every
/// string they receive as data and must neutralize it for their medium.
pub trait View: Send + Sync {
    fn set_status(&self, message: &str, kind: StatusKind);

    fn clear_table(&self);

    fn append_row(&self, row: &TableRow);

    fn set_raw_json(&self, json: &str);

    fn set_download_link(&self, url: Option<&Url>);

    /// Shows or removes the chart of `kind`. `None` means its handle was
    /// just released.
    fn set_chart(&self, kind: ChartKind, chart: Option<&ChartHandle>);
}

/// Strips control characters so server text cannot drive the terminal.
/// Line breaks become spaces.
pub fn sanitize_line(input: &str) -> String {
    input
        .chars()
        .filter_map(|c| match c {
            '\n' | '\r' | '\t' => Some(' '),
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

/// Like [`sanitize_line`] but keeps newlines and tabs, for multi-line blocks.
pub fn sanitize_block(input: &str) -> String {
    input
        .chars()
        .filter(|c| matches!(c, '\n' | '\t') || !c.is_control())
        .collect()
}
