use crate::chart::{ChartBackend, ChartError, ChartHandle, ChartSpec};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt::Write as _;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const LOG_TARGET: &str = "chart::svg";

const WIDTH: f64 = 800.0;
const HEIGHT: f64 = 400.0;
const MARGIN_LEFT: f64 = 110.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 50.0;
const LINE_COLOR: &str = "#2563eb";
const FILL_COLOR: &str = "rgba(37,99,235,0.15)";
const POINT_RADIUS: f64 = 6.0;

/// Writes each chart to `<kind>-<id>.svg` in the output directory. The file
/// lives exactly as long as its handle.
#[derive(Clone)]
pub struct SvgChartBackend {
    dir: PathBuf,
    next_id: Arc<AtomicU64>,
}

impl SvgChartBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl ChartBackend for SvgChartBackend {
    fn create(&self, spec: ChartSpec) -> BoxFuture<'_, Result<ChartHandle, ChartError>> {
        async move {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let kind = spec.kind;
            let location = self.dir.join(format!("{}-{id}.svg", kind.as_str()));
            tokio::fs::create_dir_all(&self.dir).await?;
            tokio::fs::write(&location, render_svg(&spec)).await?;
            tracing::debug!(
                target: LOG_TARGET,
                id,
                kind = kind.as_str(),
                path = %location.display(),
                "chart created"
            );
            Ok(ChartHandle { id, kind, location })
        }
        .boxed()
    }

    fn destroy(&self, handle: ChartHandle) -> BoxFuture<'_, Result<(), ChartError>> {
        async move {
            match tokio::fs::remove_file(&handle.location).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::debug!(target: LOG_TARGET, id = handle.id, "chart file already gone");
                }
                Err(e) => return Err(e.into()),
            }
            tracing::debug!(target: LOG_TARGET, id = handle.id, "chart destroyed");
            Ok(())
        }
        .boxed()
    }
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

pub(crate) fn render_svg(spec: &ChartSpec) -> String {
    let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let x_step = plot_w / (spec.labels.len().max(2) - 1) as f64;
    let x_at = |i: usize| MARGIN_LEFT + i as f64 * x_step;
    let y_at = |fraction: f64| MARGIN_TOP + plot_h - fraction * plot_h;

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        "<svg xmlns='http://www.w3.org/2000/svg' width='{WIDTH:.0}' height='{HEIGHT:.0}' viewBox='0 0 {WIDTH:.0} {HEIGHT:.0}' role='img'>"
    );
    let _ = writeln!(
        svg,
        "  <rect width='{WIDTH:.0}' height='{HEIGHT:.0}' fill='#ffffff'/>"
    );
    let _ = writeln!(
        svg,
        "  <text x='{MARGIN_LEFT:.0}' y='24' font-family='sans-serif' font-size='16'>{}</text>",
        escape_xml(&spec.title)
    );

    for (fraction, label) in spec.y_ticks() {
        let y = y_at(fraction);
        let _ = writeln!(
            svg,
            "  <line x1='{MARGIN_LEFT:.1}' y1='{y:.1}' x2='{:.1}' y2='{y:.1}' stroke='#e5e7eb'/>",
            WIDTH - MARGIN_RIGHT
        );
        let _ = writeln!(
            svg,
            "  <text x='{:.1}' y='{:.1}' text-anchor='end' font-family='sans-serif' font-size='12'>{}</text>",
            MARGIN_LEFT - 8.0,
            y + 4.0,
            escape_xml(&label)
        );
    }

    for (i, label) in spec.labels.iter().enumerate() {
        let _ = writeln!(
            svg,
            "  <text x='{:.1}' y='{:.1}' text-anchor='middle' font-family='sans-serif' font-size='12'>{}</text>",
            x_at(i),
            HEIGHT - MARGIN_BOTTOM + 20.0,
            escape_xml(label)
        );
    }

    let points: Vec<(f64, f64)> = spec
        .points()
        .into_iter()
        .map(|(x, y)| (x_at(x), y_at(y)))
        .collect();
    if !points.is_empty() {
        let coords = points
            .iter()
            .map(|(x, y)| format!("{x:.1},{y:.1}"))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(
            svg,
            "  <polyline points='{coords}' fill='none' stroke='{LINE_COLOR}' stroke-width='2'/>"
        );
        for (x, y) in &points {
            let _ = writeln!(
                svg,
                "  <circle cx='{x:.1}' cy='{y:.1}' r='{POINT_RADIUS:.0}' fill='{FILL_COLOR}' stroke='{LINE_COLOR}'/>"
            );
        }
    }

    svg.push_str("</svg>\n");
    svg
}
