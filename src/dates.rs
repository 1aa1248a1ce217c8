use chrono::{Datelike, NaiveDate, NaiveDateTime};
use tracing::{info, warn};

use crate::error::{ReportError, Result};
use crate::layout::SchemaLayout;
use crate::models::{Cell, RawSurveyTable};

const DATE_FORMATS: &[&str] = &["%d-%m-%Y", "%d/%m/%Y", "%d.%m.%Y", "%d-%m-%y", "%d/%m/%y", "%Y-%m-%d"];

const DATETIME_FORMATS: &[&str] = &[
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d-%m-%Y %H:%M:%S",
    "%d-%m-%Y %H:%M",
    "%d/%m/%y %H:%M:%S",
    "%d/%m/%y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// `%Y` also accepts one to three digits, so `25-01-24` would otherwise parse
/// as year 24 before any `%y` format is tried.
fn full_year(date: NaiveDate) -> Option<NaiveDate> {
    (date.year() >= 1000).then_some(date)
}

/// Parse a day-first date such as `25-01-2024` or `25/01/24`.
pub fn parse_day_first(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok().and_then(full_year))
        .or_else(|| {
            DATETIME_FORMATS.iter().find_map(|fmt| {
                NaiveDateTime::parse_from_str(value, fmt)
                    .ok()
                    .and_then(|dt| full_year(dt.date()))
            })
        })
}

/// Submission date of a cell; anything unparseable is missing.
pub fn cell_date(cell: &Cell) -> Option<NaiveDate> {
    match cell {
        Cell::DateTime(dt) => Some(dt.date()),
        Cell::Text(s) => parse_day_first(s),
        Cell::Empty | Cell::Number(_) => None,
    }
}

fn parse_bound(value: &str) -> Result<NaiveDate> {
    parse_day_first(value).ok_or_else(|| ReportError::InvalidDateRange {
        value: value.to_string(),
    })
}

/// Keep the rows submitted on or after `start` and, when given, on or before
/// `end`. Both bounds are inclusive whole days: a submission at 17:30 on the
/// end day is kept, not cut off at midnight. Rows without a readable
/// submission date are dropped.
pub fn filter_by_dates(
    table: &RawSurveyTable,
    layout: &SchemaLayout,
    start: &str,
    end: Option<&str>,
) -> Result<RawSurveyTable> {
    let start = parse_bound(start)?;
    let end = end
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_bound)
        .transpose()?;

    if let Some(end) = end {
        if end < start {
            warn!(%start, %end, "date window ends before it starts");
        }
    }

    let column = layout.submission_date;
    let filtered = table.retain_rows(|row| {
        let Some(date) = row.get(column).and_then(cell_date) else {
            return false;
        };
        date >= start && end.map_or(true, |end| date <= end)
    });

    info!(
        %start,
        end = ?end,
        kept = filtered.len(),
        total = table.len(),
        "filtered by submission date"
    );
    Ok(filtered)
}
