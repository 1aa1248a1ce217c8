//! Program code → row/column selection rules.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ReportError, Result};
use crate::layout::SchemaLayout;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CampusFilter {
    pub column: usize,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProgramEntry {
    pub code: String,
    pub root_name: String,
    /// Column holding the "Seleccione la asignatura" answer for this program.
    pub subject_column: usize,
    /// `[pass, enrollment]`.
    pub count_columns: [usize; 2],
    #[serde(default)]
    pub campus_filter: Option<CampusFilter>,
}

impl ProgramEntry {
    pub fn pass_column(&self) -> usize {
        self.count_columns[0]
    }

    pub fn enrollment_column(&self) -> usize {
        self.count_columns[1]
    }
}

const GDDV: &str = "Grado en Diseño y Desarrollo de Videojuegos";
const GICIB: &str = "Grado en Ingeniería de la Ciberseguridad";
const GIC: &str = "Grado en Ingeniería de Computadores";
const GII: &str = "Grado en Ingeniería Informática";
const GIS: &str = "Grado en Ingeniería del Software";
const GIA: &str = "Grado en Inteligencia Artificial";
const GMAT: &str = "Grado en Matemáticas";

/// (code, root name, subject, pass, enrollment, campus filter)
type BuiltinEntry = (
    &'static str,
    &'static str,
    usize,
    usize,
    usize,
    Option<(usize, &'static str)>,
);

const BUILTIN: &[BuiltinEntry] = &[
    ("GDDV_QUINTANA", GDDV, 6, 8, 9, Some((7, "Quintana"))),
    ("GDDV_MOSTOLES", GDDV, 6, 10, 11, Some((7, "Móstoles"))),
    ("GDDV_GIC_MOST", GDDV, 6, 12, 13, None),
    ("GICIB", GICIB, 14, 15, 16, None),
    ("GIC", GIC, 17, 18, 19, None),
    ("GIC_GII_MOST", GIC, 17, 20, 21, None),
    ("GIC_GDDV_MOST", GIC, 17, 22, 23, None),
    ("GII_VIC", GII, 24, 26, 27, Some((25, "Vicálvaro"))),
    ("GII_ADE_ON_VIC", GII, 24, 28, 29, None),
    ("GII_ADE_PRE_VIC", GII, 24, 30, 31, None),
    ("GII_CRIM_VIC", GII, 24, 32, 33, None),
    ("GII_MOST", GII, 24, 34, 35, Some((25, "Móstoles"))),
    ("GII_ADE_MOST", GII, 24, 36, 37, None),
    ("GII_GIC", GII, 24, 38, 39, None),
    ("GII_GIS", GII, 24, 40, 41, None),
    ("GII_GMAT", GII, 24, 42, 43, None),
    ("GIS", GIS, 44, 45, 46, None),
    ("GIS_GMAT", GIS, 44, 47, 48, None),
    ("GIS_GII", GIS, 44, 49, 50, None),
    ("GIA", GIA, 51, 52, 53, None),
    ("GMAT", GMAT, 54, 55, 56, None),
    ("GMAT_GIS", GMAT, 54, 57, 58, None),
    ("GMAT_GII", GMAT, 54, 59, 60, None),
    ("GMAT_ECO", GMAT, 54, 61, 62, None),
    ("GMAT_PRIM", GMAT, 54, 63, 64, None),
];

/// Read-only after construction; entries keep their declaration order.
#[derive(Debug, Clone)]
pub struct ProgramRegistry {
    entries: Vec<ProgramEntry>,
    by_code: HashMap<String, usize>,
}

impl ProgramRegistry {
    /// Build a registry, rejecting entries that cannot be extracted safely
    /// against `layout`.
    pub fn new(layout: &SchemaLayout, entries: Vec<ProgramEntry>) -> Result<Self> {
        let mut by_code = HashMap::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            validate_entry(layout, entry)?;
            if by_code.insert(entry.code.clone(), position).is_some() {
                return Err(invalid(entry, "duplicate program code"));
            }
        }
        Ok(Self { entries, by_code })
    }

    pub fn builtin(layout: &SchemaLayout) -> Result<Self> {
        let entries = BUILTIN
            .iter()
            .map(|&(code, root, subject, pass, enrollment, campus)| ProgramEntry {
                code: code.to_string(),
                root_name: root.to_string(),
                subject_column: subject,
                count_columns: [pass, enrollment],
                campus_filter: campus.map(|(column, value)| CampusFilter {
                    column,
                    value: value.to_string(),
                }),
            })
            .collect();
        Self::new(layout, entries)
    }

    /// Load a JSON array of entries that replaces the built-in table.
    pub fn from_json_file(layout: &SchemaLayout, path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let entries: Vec<ProgramEntry> = serde_json::from_str(&raw)?;
        Self::new(layout, entries)
    }

    /// Case-insensitive lookup.
    pub fn lookup(&self, code: &str) -> Result<&ProgramEntry> {
        let code = code.trim().to_uppercase();
        self.by_code
            .get(&code)
            .map(|&position| &self.entries[position])
            .ok_or(ReportError::UnknownProgram { code })
    }

    pub fn entries(&self) -> &[ProgramEntry] {
        &self.entries
    }
}

fn invalid(entry: &ProgramEntry, reason: impl Into<String>) -> ReportError {
    ReportError::InvalidRegistry {
        code: entry.code.clone(),
        reason: reason.into(),
    }
}

fn validate_entry(layout: &SchemaLayout, entry: &ProgramEntry) -> Result<()> {
    if entry.code.is_empty() || entry.code != entry.code.to_uppercase() {
        return Err(invalid(entry, "code must be non-empty and upper-case"));
    }
    if entry.root_name.trim().is_empty() {
        return Err(invalid(entry, "root name is empty"));
    }

    let data_columns = [
        entry.subject_column,
        entry.pass_column(),
        entry.enrollment_column(),
    ];
    let campus_column = entry.campus_filter.as_ref().map(|f| f.column);
    for index in data_columns.iter().copied().chain(campus_column) {
        if index >= layout.column_count {
            return Err(invalid(
                entry,
                format!("column {index} is outside the {}-column schema", layout.column_count),
            ));
        }
    }

    if data_columns[0] == data_columns[1]
        || data_columns[0] == data_columns[2]
        || data_columns[1] == data_columns[2]
    {
        return Err(invalid(entry, "subject, pass and enrollment columns must differ"));
    }

    if let Some(column) = campus_column {
        if data_columns.contains(&column) {
            return Err(invalid(
                entry,
                format!("campus column {column} is also a data column"),
            ));
        }
    }

    Ok(())
}
