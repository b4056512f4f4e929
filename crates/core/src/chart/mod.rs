mod svg;

use crate::api::TimelineEntry;
use futures::future::BoxFuture;
use std::path::PathBuf;

pub use svg::SvgChartBackend;

pub const EMOTION_CHART_TITLE: &str = "Emotion";
pub const CONFIDENCE_CHART_TITLE: &str = "Confidence";

/// The two charts drawn from one timeline. Both share its X axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChartKind {
    Emotion,
    Confidence,
}

impl ChartKind {
    pub const ALL: [ChartKind; 2] = [ChartKind::Emotion, ChartKind::Confidence];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Emotion => "emotion",
            ChartKind::Confidence => "confidence",
        }
    }
}

/// Y-axis data of a chart.
#[derive(Clone, Debug, PartialEq)]
pub enum Series {
    /// One label per point, plotted against the distinct labels in order of
    /// first appearance.
    Categorical {
        values: Vec<String>,
        categories: Vec<String>,
    },
    /// Plotted on a linear axis from 0 to `max(1, largest value)`.
    Numeric(Vec<f64>),
}

/// Line chart over the timeline: `labels` on the X axis, one point per
/// entry.
#[derive(Clone, Debug, PartialEq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub title: String,
    pub labels: Vec<String>,
    pub series: Series,
}

const NUMERIC_TICKS: usize = 4;

impl ChartSpec {
    pub fn from_timeline(kind: ChartKind, timeline: &[TimelineEntry]) -> Self {
        match kind {
            ChartKind::Emotion => Self::emotion(timeline),
            ChartKind::Confidence => Self::confidence(timeline),
        }
    }

    pub fn emotion(timeline: &[TimelineEntry]) -> Self {
        let values: Vec<String> = timeline.iter().map(|e| e.emotion.clone()).collect();
        let categories = distinct_in_order(&values);
        Self {
            kind: ChartKind::Emotion,
            title: EMOTION_CHART_TITLE.to_owned(),
            labels: time_labels(timeline),
            series: Series::Categorical { values, categories },
        }
    }

    pub fn confidence(timeline: &[TimelineEntry]) -> Self {
        let values = timeline
            .iter()
            .map(|e| e.confidence.as_f64().unwrap_or(f64::NAN))
            .collect();
        Self {
            kind: ChartKind::Confidence,
            title: CONFIDENCE_CHART_TITLE.to_owned(),
            labels: time_labels(timeline),
            series: Series::Numeric(values),
        }
    }

    /// (x index, height as a fraction of the plot) for each drawable point.
    /// Categorical values outside the category list and non-finite numbers
    /// are skipped.
    pub fn points(&self) -> Vec<(usize, f64)> {
        match &self.series {
            Series::Categorical { values, categories } => {
                let step = category_step(categories.len());
                values
                    .iter()
                    .enumerate()
                    .filter_map(|(x, v)| {
                        categories
                            .iter()
                            .position(|c| c == v)
                            .map(|y| (x, y as f64 * step))
                    })
                    .collect()
            }
            Series::Numeric(values) => {
                let top = numeric_top(values);
                values
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| v.is_finite())
                    .map(|(x, v)| (x, (v / top).clamp(0.0, 1.0)))
                    .collect()
            }
        }
    }

    /// Y-axis gridlines as (height fraction, label), bottom first.
    pub fn y_ticks(&self) -> Vec<(f64, String)> {
        match &self.series {
            Series::Categorical { categories, .. } => {
                let step = category_step(categories.len());
                categories
                    .iter()
                    .enumerate()
                    .map(|(i, c)| (i as f64 * step, c.clone()))
                    .collect()
            }
            Series::Numeric(values) => {
                let top = numeric_top(values);
                (0..=NUMERIC_TICKS)
                    .map(|i| {
                        let fraction = i as f64 / NUMERIC_TICKS as f64;
                        (fraction, format!("{:.2}", fraction * top))
                    })
                    .collect()
            }
        }
    }
}

fn time_labels(timeline: &[TimelineEntry]) -> Vec<String> {
    timeline.iter().map(|e| e.time.to_string()).collect()
}

// category 0 sits on the bottom axis
fn category_step(count: usize) -> f64 {
    1.0 / (count.max(2) - 1) as f64
}

fn numeric_top(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(1.0, f64::max)
}

/// Distinct values in order of first appearance.
pub fn distinct_in_order(values: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .iter()
        .filter(|v| seen.insert(v.as_str()))
        .cloned()
        .collect()
}

/// A live rendered chart. Must be handed back to `ChartBackend::destroy`.
#[derive(Debug, PartialEq, Eq)]
pub struct ChartHandle {
    pub id: u64,
    pub kind: ChartKind,
    pub location: PathBuf,
}

#[derive(thiserror::Error, Debug)]
pub enum ChartError {
    #[error("chart io error: {0}")]
    Io(#[from] std::io::Error),
}

pub trait ChartBackend: Send + Sync {
    fn create(&self, spec: ChartSpec) -> BoxFuture<'_, Result<ChartHandle, ChartError>>;

    fn destroy(&self, handle: ChartHandle) -> BoxFuture<'_, Result<(), ChartError>>;
}
