use chrono::NaiveDateTime;
use serde::Serialize;

/// One spreadsheet cell. `Empty` is the only missing value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    DateTime(NaiveDateTime),
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Text rendering of the cell; integral numbers print without decimals.
    pub fn to_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(f) => {
                if f.fract() == 0.0 && f.is_finite() {
                    format!("{}", *f as i64)
                } else {
                    format!("{f}")
                }
            }
            Cell::DateTime(dt) => dt.format("%d/%m/%Y %H:%M:%S").to_string(),
        }
    }

    /// Numeric value, if the cell holds one or text that parses as one.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(f) => Some(*f),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }
}

/// Survey export as loaded from disk. Rows are padded to the header width,
/// so every position below `width()` is valid for every row.
#[derive(Debug, Clone, Default)]
pub struct RawSurveyTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawSurveyTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Empty);
                row
            })
            .collect();
        Self { headers, rows }
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Same headers, only the rows for which `keep` returns true.
    pub fn retain_rows<F>(&self, mut keep: F) -> RawSurveyTable
    where
        F: FnMut(&[Cell]) -> bool,
    {
        RawSurveyTable {
            headers: self.headers.clone(),
            rows: self.rows.iter().filter(|row| keep(row)).cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubgroupColumn {
    /// Position of the column in the raw export.
    pub source_index: usize,
    pub header: String,
}

/// Rows and columns of the raw export that belong to one program.
#[derive(Debug, Clone)]
pub struct SubgroupTable {
    pub program_code: String,
    pub columns: Vec<SubgroupColumn>,
    pub rows: Vec<Vec<Cell>>,
}

impl SubgroupTable {
    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.header.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn position_of_source(&self, source_index: usize) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.source_index == source_index)
    }

    /// Cell of `row` that came from raw column `source_index`.
    pub fn value(&self, row: usize, source_index: usize) -> Option<&Cell> {
        let position = self.position_of_source(source_index)?;
        self.rows.get(row)?.get(position)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub subject_name: String,
    pub term_label: String,
    pub semester_label: String,
    pub pass_count: f64,
    pub enrollment_count: f64,
    pub pass_rate_pct: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub satisfaction_results: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub satisfaction_group: Option<f64>,
    #[serde(skip)]
    pub term_rank: u8,
    #[serde(skip)]
    pub semester_rank: u8,
    /// Row of the subgroup table this summary row was built from.
    #[serde(skip)]
    pub source_row: usize,
}

/// Which optional satisfaction columns the subgroup table carried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SatisfactionColumns {
    pub results: bool,
    pub group: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTable {
    pub rows: Vec<SummaryRow>,
    pub satisfaction: SatisfactionColumns,
}

impl SummaryTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct term labels in summary order.
    pub fn terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = Vec::new();
        for row in &self.rows {
            if !terms.contains(&row.term_label) {
                terms.push(row.term_label.clone());
            }
        }
        terms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_numbers_render_without_decimals() {
        assert_eq!(Cell::Number(20.0).to_text(), "20");
        assert_eq!(Cell::Number(4.5).to_text(), "4.5");
        assert_eq!(Cell::Empty.to_text(), "");
    }

    #[test]
    fn text_numbers_coerce_and_garbage_does_not() {
        assert_eq!(Cell::Text(" 18 ".to_string()).as_number(), Some(18.0));
        assert_eq!(Cell::Text("n/a".to_string()).as_number(), None);
        assert_eq!(Cell::Empty.as_number(), None);
    }

    #[test]
    fn rows_are_padded_to_header_width() {
        let table = RawSurveyTable::new(
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            vec![vec![Cell::Number(1.0)]],
        );
        assert_eq!(table.rows[0].len(), 3);
        assert!(table.rows[0][2].is_missing());
    }
}
