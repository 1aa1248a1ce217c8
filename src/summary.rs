use std::cmp::Ordering;

use tracing::info;

use crate::error::{ReportError, Result};
use crate::extract::{ENROLLMENT_COUNT, PASS_COUNT};
use crate::layout::HeaderMarkers;
use crate::models::{Cell, SatisfactionColumns, SubgroupTable, SummaryRow, SummaryTable};

/// Rank given to term/semester labels that are not recognised.
pub const UNKNOWN_RANK: u8 = 99;

/// Positions of the summary inputs within a subgroup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnMap {
    pub subject: usize,
    pub term: usize,
    pub semester: usize,
    pub pass: usize,
    pub enrollment: usize,
    pub satisfaction_results: Option<usize>,
    pub satisfaction_group: Option<usize>,
}

/// Locate the summary columns by header text.
pub fn resolve_columns(headers: &[String], markers: &HeaderMarkers) -> Result<ColumnMap> {
    let find = |pred: &dyn Fn(&str) -> bool| headers.iter().position(|h| pred(h));

    let subject = find(&|h| h.trim().starts_with(markers.subject_prefix));
    let term = find(&|h| h.contains(markers.term));
    let semester = find(&|h| h.contains(markers.semester));
    let pass = find(&|h| h == PASS_COUNT);
    let enrollment = find(&|h| h == ENROLLMENT_COUNT);
    let satisfaction_results = find(&|h| {
        h.contains(markers.satisfaction) && h.contains(markers.satisfaction_results)
    });
    let satisfaction_group =
        find(&|h| h.contains(markers.satisfaction) && h.contains(markers.satisfaction_group));

    match (subject, term, semester, pass, enrollment) {
        (Some(subject), Some(term), Some(semester), Some(pass), Some(enrollment)) => Ok(ColumnMap {
            subject,
            term,
            semester,
            pass,
            enrollment,
            satisfaction_results,
            satisfaction_group,
        }),
        _ => {
            let missing = [
                ("subject", subject),
                ("term", term),
                ("semester", semester),
                (PASS_COUNT, pass),
                (ENROLLMENT_COUNT, enrollment),
            ]
            .into_iter()
            .filter(|(_, found)| found.is_none())
            .map(|(name, _)| name.to_string())
            .collect();
            Err(ReportError::MissingStructuralColumns { missing })
        }
    }
}

/// Map an ordinal label ("Segundo", "2", "2º") to 1..=5.
pub fn ordinal_rank(label: &str) -> u8 {
    let label = label.trim();
    let bare = label.trim_end_matches(['º', 'ª', '°']).trim_end_matches('.');
    match bare {
        "Primero" | "1" => 1,
        "Segundo" | "2" => 2,
        "Tercero" | "3" => 3,
        "Cuarto" | "4" => 4,
        "Quinto" | "5" => 5,
        _ => UNKNOWN_RANK,
    }
}

/// Percentage with two decimals, ties rounded to even.
pub fn pass_rate(pass: f64, enrolled: f64) -> f64 {
    if enrolled > 0.0 {
        (100.0 * pass / enrolled * 100.0).round_ties_even() / 100.0
    } else {
        0.0
    }
}

fn count(cell: Option<&Cell>) -> f64 {
    cell.and_then(Cell::as_number).unwrap_or(0.0)
}

fn label(cell: Option<&Cell>) -> String {
    cell.map(|c| c.to_text().trim().to_string()).unwrap_or_default()
}

pub fn summary_order(a: &SummaryRow, b: &SummaryRow) -> Ordering {
    a.term_rank
        .cmp(&b.term_rank)
        .then(a.semester_rank.cmp(&b.semester_rank))
        .then_with(|| a.subject_name.cmp(&b.subject_name))
}

/// Build the per-subject summary, sorted by term, semester and subject.
pub fn summarize(subgroup: &SubgroupTable, markers: &HeaderMarkers) -> Result<SummaryTable> {
    let map = resolve_columns(&subgroup.headers(), markers)?;

    let mut rows: Vec<SummaryRow> = subgroup
        .rows
        .iter()
        .enumerate()
        .map(|(source_row, row)| {
            let pass_count = count(row.get(map.pass));
            let enrollment_count = count(row.get(map.enrollment));
            let term_label = label(row.get(map.term));
            let semester_label = label(row.get(map.semester));
            SummaryRow {
                subject_name: label(row.get(map.subject)),
                term_rank: ordinal_rank(&term_label),
                semester_rank: ordinal_rank(&semester_label),
                term_label,
                semester_label,
                pass_count,
                enrollment_count,
                pass_rate_pct: pass_rate(pass_count, enrollment_count),
                satisfaction_results: map
                    .satisfaction_results
                    .and_then(|i| row.get(i))
                    .and_then(Cell::as_number),
                satisfaction_group: map
                    .satisfaction_group
                    .and_then(|i| row.get(i))
                    .and_then(Cell::as_number),
                source_row,
            }
        })
        .collect();

    rows.sort_by(summary_order);

    info!(
        program = %subgroup.program_code,
        rows = rows.len(),
        "built summary table"
    );
    Ok(SummaryTable {
        rows,
        satisfaction: SatisfactionColumns {
            results: map.satisfaction_results.is_some(),
            group: map.satisfaction_group.is_some(),
        },
    })
}

/// Chartable summary columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    PassRate,
    SatisfactionResults,
    SatisfactionGroup,
}

impl Metric {
    pub const ALL: [Metric; 3] = [
        Metric::PassRate,
        Metric::SatisfactionResults,
        Metric::SatisfactionGroup,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Metric::PassRate => "Porcentaje de Aprobados",
            Metric::SatisfactionResults => "Valoración Resultados",
            Metric::SatisfactionGroup => "Valoración Grupo",
        }
    }

    pub fn axis_label(self) -> &'static str {
        match self {
            Metric::PassRate => "% Aprobados",
            _ => "Puntuación (0-5)",
        }
    }

    pub fn y_range(self) -> (f64, f64) {
        match self {
            Metric::PassRate => (0.0, 100.0),
            _ => (0.0, 5.0),
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Metric::PassRate => "pass_rate_pct",
            Metric::SatisfactionResults => "satisfaction_results",
            Metric::SatisfactionGroup => "satisfaction_group",
        }
    }

    pub fn value(self, row: &SummaryRow) -> Option<f64> {
        match self {
            Metric::PassRate => Some(row.pass_rate_pct),
            Metric::SatisfactionResults => row.satisfaction_results,
            Metric::SatisfactionGroup => row.satisfaction_group,
        }
    }

    pub fn is_available(self, summary: &SummaryTable) -> bool {
        match self {
            Metric::PassRate => true,
            Metric::SatisfactionResults => summary.satisfaction.results,
            Metric::SatisfactionGroup => summary.satisfaction.group,
        }
    }

    /// Mean over rows that have a value.
    pub fn mean<'a>(self, rows: impl IntoIterator<Item = &'a SummaryRow>) -> Option<f64> {
        let (sum, n) = rows
            .into_iter()
            .filter_map(|row| self.value(row))
            .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
        (n > 0).then(|| sum / n as f64)
    }
}
