use crate::chart::{ChartHandle, ChartKind};
use crate::render::{sanitize_block, sanitize_line, StatusKind, TableRow, View};
use std::io::Write;
use std::sync::{Mutex, MutexGuard};
use url::Url;

const TIME_WIDTH: usize = 10;
const EMOTION_WIDTH: usize = 14;

struct TerminalState<W> {
    out: W,
    header_printed: bool,
}

/// Renders every region as plain text on one writer.
pub struct TerminalView<W: Write + Send> {
    state: Mutex<TerminalState<W>>,
}

impl<W: Write + Send> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self {
            state: Mutex::new(TerminalState {
                out,
                header_printed: false,
            }),
        }
    }

    pub fn into_inner(self) -> W {
        self.state
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .out
    }

    fn lock(&self) -> MutexGuard<'_, TerminalState<W>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> View for TerminalView<W> {
    fn set_status(&self, message: &str, kind: StatusKind) {
        let mut state = self.lock();
        let _ = writeln!(state.out, "[{}] {}", kind.as_str(), sanitize_line(message));
        let _ = state.out.flush();
    }

    fn clear_table(&self) {
        self.lock().header_printed = false;
    }

    fn append_row(&self, row: &TableRow) {
        let mut state = self.lock();
        if !state.header_printed {
            let _ = writeln!(
                state.out,
                "{:<TIME_WIDTH$} {:<EMOTION_WIDTH$} {}",
                "time", "emotion", "confidence"
            );
            state.header_printed = true;
        }
        let _ = writeln!(
            state.out,
            "{:<TIME_WIDTH$} {:<EMOTION_WIDTH$} {}",
            sanitize_line(&row.time),
            sanitize_line(&row.emotion),
            sanitize_line(&row.confidence)
        );
    }

    fn set_raw_json(&self, json: &str) {
        if json.is_empty() {
            return;
        }
        let mut state = self.lock();
        let _ = writeln!(state.out, "{}", sanitize_block(json));
    }

    fn set_download_link(&self, url: Option<&Url>) {
        if let Some(url) = url {
            let mut state = self.lock();
            let _ = writeln!(state.out, "download: {url}");
        }
    }

    fn set_chart(&self, kind: ChartKind, chart: Option<&ChartHandle>) {
        if let Some(chart) = chart {
            let mut state = self.lock();
            let _ = writeln!(
                state.out,
                "{} chart: {}",
                kind.as_str(),
                chart.location.display()
            );
        }
    }
}
