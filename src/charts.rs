//! Bar charts of the summary metrics, rendered to SVG.

use std::path::{Path, PathBuf};

use anyhow::Context;
use plotters::coord::ranged1d::SegmentValue;
use plotters::prelude::*;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::export::write_atomic;
use crate::models::{SummaryRow, SummaryTable};
use crate::summary::Metric;

/// Colours assigned to terms in summary order.
const TERM_PALETTE: [RGBColor; 8] = [
    RGBColor(102, 194, 165),
    RGBColor(252, 141, 98),
    RGBColor(141, 160, 203),
    RGBColor(231, 138, 195),
    RGBColor(166, 216, 84),
    RGBColor(255, 217, 47),
    RGBColor(229, 196, 148),
    RGBColor(179, 179, 179),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartScope {
    /// Every subject, coloured by term, with the mean line.
    Global,
    /// Subjects of one term, highest value first.
    Term(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartSpec {
    pub scope: ChartScope,
    pub metric: Metric,
}

impl ChartSpec {
    pub fn title(&self) -> String {
        match &self.scope {
            ChartScope::Global => format!("Global: {}", self.metric.title()),
            ChartScope::Term(term) => format!("Curso {term}: {}", self.metric.title()),
        }
    }

    pub fn file_name(&self) -> String {
        match &self.scope {
            ChartScope::Global => format!("global_{}.svg", self.metric.slug()),
            ChartScope::Term(term) => {
                format!("term_{}_{}.svg", file_safe(term), self.metric.slug())
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderedChart {
    pub title: String,
    pub path: PathBuf,
}

fn file_safe(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "sin_curso".to_string()
    } else {
        cleaned
    }
}

/// Global charts first, then one group per term, each in metric order.
pub fn plan_charts(summary: &SummaryTable) -> Vec<ChartSpec> {
    if summary.is_empty() {
        return Vec::new();
    }
    let metrics: Vec<Metric> = Metric::ALL
        .into_iter()
        .filter(|m| m.is_available(summary))
        .collect();

    let mut specs: Vec<ChartSpec> = metrics
        .iter()
        .map(|&metric| ChartSpec {
            scope: ChartScope::Global,
            metric,
        })
        .collect();
    for term in summary.terms() {
        specs.extend(metrics.iter().map(|&metric| ChartSpec {
            scope: ChartScope::Term(term.clone()),
            metric,
        }));
    }
    specs
}

fn term_color(terms: &[String], term: &str) -> RGBColor {
    let position = terms.iter().position(|t| t == term).unwrap_or(0);
    TERM_PALETTE[position % TERM_PALETTE.len()]
}

fn bar(index: usize, value: f64, color: RGBColor) -> Rectangle<(SegmentValue<usize>, f64)> {
    let mut rect = Rectangle::new(
        [(SegmentValue::Exact(index), 0.0), (SegmentValue::Exact(index + 1), value)],
        color.filled(),
    );
    rect.set_margin(0, 0, 4, 4);
    rect
}

/// Rows drawn by `spec`, left to right. Rows without a value for the metric
/// are skipped; per-term charts put the highest value first.
pub fn chart_rows<'a>(summary: &'a SummaryTable, spec: &ChartSpec) -> Vec<&'a SummaryRow> {
    let mut rows: Vec<&SummaryRow> = match &spec.scope {
        ChartScope::Global => summary.rows.iter().collect(),
        ChartScope::Term(term) => summary.rows.iter().filter(|r| &r.term_label == term).collect(),
    };
    rows.retain(|r| spec.metric.value(r).is_some());
    if let ChartScope::Term(_) = spec.scope {
        rows.sort_by(|a, b| {
            let a = spec.metric.value(a).unwrap_or(0.0);
            let b = spec.metric.value(b).unwrap_or(0.0);
            b.total_cmp(&a)
        });
    }
    rows
}

/// Render one chart into memory, then write it through a temporary file.
pub fn render_chart(summary: &SummaryTable, spec: &ChartSpec, out_dir: &Path) -> anyhow::Result<RenderedChart> {
    let terms = summary.terms();
    let rows = chart_rows(summary, spec);

    let path = out_dir.join(spec.file_name());
    let title = spec.title();
    let labels: Vec<String> = rows.iter().map(|r| r.subject_name.clone()).collect();
    let (y_min, y_max) = spec.metric.y_range();
    let width = 360 + 60 * rows.len().max(1) as u32;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width.min(2400), 720)).into_drawing_area();
        root.fill(&WHITE)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title.to_uppercase(), ("sans-serif", 26))
            .margin(16)
            .x_label_area_size(140)
            .y_label_area_size(60)
            .build_cartesian_2d((0..rows.len().max(1)).into_segmented(), y_min..y_max)?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(rows.len().max(1))
            .x_label_style(("sans-serif", 12).into_font().transform(FontTransform::Rotate90))
            .x_label_formatter(&|value| match value {
                SegmentValue::CenterOf(i) => labels.get(*i).cloned().unwrap_or_default(),
                _ => String::new(),
            })
            .x_desc("Asignatura")
            .y_desc(spec.metric.axis_label())
            .draw()?;

        match &spec.scope {
            ChartScope::Global => {
                for term in &terms {
                    let color = term_color(&terms, term);
                    chart
                        .draw_series(
                            rows.iter()
                                .enumerate()
                                .filter(|(_, r)| &r.term_label == term)
                                .filter_map(|(i, r)| spec.metric.value(r).map(|v| bar(i, v, color))),
                        )?
                        .label(format!("Curso {term}"))
                        .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
                }

                if let Some(mean) = spec.metric.mean(rows.iter().copied()) {
                    chart
                        .draw_series(DashedLineSeries::new(
                            vec![
                                (SegmentValue::Exact(0), mean),
                                (SegmentValue::Exact(rows.len()), mean),
                            ],
                            10,
                            6,
                            RED.stroke_width(2),
                        ))?
                        .label(format!("Media: {mean:.2}"))
                        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(2)));
                }

                chart
                    .configure_series_labels()
                    .position(SeriesLabelPosition::UpperRight)
                    .background_style(WHITE.mix(0.85))
                    .border_style(BLACK)
                    .draw()?;
            }
            ChartScope::Term(term) => {
                let color = term_color(&terms, term);
                chart.draw_series(
                    rows.iter()
                        .enumerate()
                        .filter_map(|(i, r)| spec.metric.value(r).map(|v| bar(i, v, color))),
                )?;
            }
        }

        root.present()
            .with_context(|| format!("failed to render {title}"))?;
    }
    write_atomic(&path, svg.as_bytes())?;

    debug!(chart = %title, path = %path.display(), "rendered chart");
    Ok(RenderedChart { title, path })
}

/// Render every planned chart in parallel. Each chart succeeds or fails on
/// its own; results keep the plan order.
pub fn render_all(summary: &SummaryTable, out_dir: &Path) -> Vec<(ChartSpec, anyhow::Result<RenderedChart>)> {
    plan_charts(summary)
        .into_par_iter()
        .map(|spec| {
            let result = render_chart(summary, &spec, out_dir);
            if let Err(err) = &result {
                warn!(chart = %spec.title(), error = %err, "chart rendering failed");
            }
            (spec, result)
        })
        .collect()
}
