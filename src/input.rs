use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use tracing::{debug, info, warn};

use crate::error::{ReportError, Result};
use crate::layout::SchemaLayout;
use crate::models::{Cell, RawSurveyTable};

/// Load the survey export, dispatching on the file extension.
pub fn load_table(path: &Path, layout: &SchemaLayout) -> Result<RawSurveyTable> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let table = match extension.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook(path)?,
        "csv" => read_csv(path)?,
        _ => {
            return Err(ReportError::UnsupportedInput {
                path: path.to_path_buf(),
            })
        }
    };

    check_width(&table, layout)?;
    if table.is_empty() {
        warn!(path = %path.display(), "survey export has a header but no responses");
    }
    info!(
        path = %path.display(),
        rows = table.len(),
        columns = table.width(),
        "loaded survey export"
    );
    Ok(table)
}

pub fn check_width(table: &RawSurveyTable, layout: &SchemaLayout) -> Result<()> {
    if table.width() < layout.column_count {
        return Err(ReportError::SchemaMismatch {
            version: layout.version,
            expected: layout.column_count,
            found: table.width(),
        });
    }
    Ok(())
}

pub fn data_to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(Cell::DateTime)
            .unwrap_or(Cell::Empty),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

fn read_workbook(path: &Path) -> Result<RawSurveyTable> {
    let spreadsheet_err = |source| ReportError::Spreadsheet {
        path: path.to_path_buf(),
        source,
    };

    let mut workbook = open_workbook_auto(path).map_err(spreadsheet_err)?;
    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        return Ok(RawSurveyTable::default());
    };
    let range = workbook.worksheet_range(&sheet).map_err(spreadsheet_err)?;

    // The range starts at the first used cell; pad back to column A so
    // positions stay absolute.
    let column_offset = range.start().map(|(_, col)| col as usize).unwrap_or(0);
    debug!(sheet = %sheet, column_offset, "reading worksheet");

    let mut rows = range.rows().map(|row| {
        let mut cells = vec![Cell::Empty; column_offset];
        cells.extend(row.iter().map(data_to_cell));
        cells
    });

    let headers = match rows.next() {
        Some(header) => header.iter().map(|c| c.to_text().trim().to_string()).collect(),
        None => return Ok(RawSurveyTable::default()),
    };
    Ok(RawSurveyTable::new(headers, rows.collect()))
}

fn read_csv(path: &Path) -> Result<RawSurveyTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)?;

    let headers = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(RawSurveyTable::new(headers, rows))
}
