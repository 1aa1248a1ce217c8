use tracing::{debug, info, warn};

use crate::error::Result;
use crate::input::check_width;
use crate::layout::SchemaLayout;
use crate::models::{Cell, RawSurveyTable, SubgroupColumn, SubgroupTable};
use crate::registry::ProgramRegistry;

pub const PASS_COUNT: &str = "pass_count";
pub const ENROLLMENT_COUNT: &str = "enrollment_count";

fn trimmed(cell: &Cell) -> String {
    cell.to_text().trim().to_string()
}

/// Select the rows and columns of `table` that belong to `program_code`.
///
/// Returns `Ok(None)` when nothing matches; that is a normal outcome, not a
/// failure. Rows keep their original relative order and columns are emitted
/// in raw index order.
pub fn extract_subgroup(
    table: &RawSurveyTable,
    registry: &ProgramRegistry,
    layout: &SchemaLayout,
    program_code: &str,
) -> Result<Option<SubgroupTable>> {
    let entry = registry.lookup(program_code)?;
    check_width(table, layout)?;
    let pass_column = entry.pass_column();
    let enrollment_column = entry.enrollment_column();

    let matches = |row: &[Cell]| {
        if trimmed(&row[layout.root_name]) != entry.root_name {
            return false;
        }
        if let Some(filter) = &entry.campus_filter {
            if trimmed(&row[filter.column]) != filter.value {
                return false;
            }
        }
        !row[pass_column].is_missing()
    };

    let selected_rows: Vec<&Vec<Cell>> = table.rows.iter().filter(|row| matches(row)).collect();
    if selected_rows.is_empty() {
        warn!(program = %entry.code, "no records for this selection");
        return Ok(None);
    }

    let mut indices: Vec<usize> = layout
        .common_columns()
        .chain([entry.subject_column, pass_column, enrollment_column])
        .collect();
    if let Some(filter) = &entry.campus_filter {
        if layout.is_common(filter.column) {
            debug!(program = %entry.code, column = filter.column, "campus column overlaps the common block");
        }
        indices.retain(|&index| index != filter.column);
    }
    indices.sort_unstable();
    indices.dedup();
    debug!(program = %entry.code, columns = ?indices, "selected columns");

    let columns = indices
        .iter()
        .map(|&index| {
            let header = if index == pass_column {
                PASS_COUNT.to_string()
            } else if index == enrollment_column {
                ENROLLMENT_COUNT.to_string()
            } else {
                table.headers[index].clone()
            };
            SubgroupColumn {
                source_index: index,
                header,
            }
        })
        .collect();

    let rows = selected_rows
        .into_iter()
        .map(|row| {
            indices
                .iter()
                .map(|&index| {
                    if index == layout.root_name {
                        Cell::Text(trimmed(&row[index]))
                    } else {
                        row[index].clone()
                    }
                })
                .collect()
        })
        .collect::<Vec<Vec<Cell>>>();

    info!(program = %entry.code, rows = rows.len(), "extracted subgroup");
    Ok(Some(SubgroupTable {
        program_code: entry.code.clone(),
        columns,
        rows,
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ReportError;
    use crate::registry::{CampusFilter, ProgramEntry};

    pub(crate) const WIDTH: usize = 94;

    /// Header row shaped like the real export: subject columns start with
    /// "Seleccione", the term/semester columns sit at 65/66.
    pub(crate) fn headers() -> Vec<String> {
        (0..WIDTH)
            .map(|i| match i {
                1 => "Hora de inicio".to_string(),
                4 => "Nombre".to_string(),
                5 => "Titulación".to_string(),
                6 | 14 | 17 | 24 | 44 | 51 | 54 => format!("Seleccione la asignatura ({i})"),
                7 | 25 => "Campus".to_string(),
                65 => "Curso:".to_string(),
                66 => "Cuatrimestre:".to_string(),
                68 => "Grado de satisfacción con los resultados".to_string(),
                80 => "Grado de satisfacción con el grupo".to_string(),
                _ => format!("Pregunta {i}"),
            })
            .collect()
    }

    pub(crate) fn row(values: &[(usize, Cell)]) -> Vec<Cell> {
        let mut row = vec![Cell::Empty; WIDTH];
        row[1] = Cell::Text("15/03/2024 10:00:00".to_string());
        for (index, value) in values {
            row[*index] = value.clone();
        }
        row
    }

    pub(crate) fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    pub(crate) fn num(v: f64) -> Cell {
        Cell::Number(v)
    }

    pub(crate) fn gmat_row(subject: &str, term: &str, semester: &str, pass: f64, enrolled: f64) -> Vec<Cell> {
        row(&[
            (5, text("Grado en Matemáticas")),
            (54, text(subject)),
            (55, num(pass)),
            (56, num(enrolled)),
            (65, text(term)),
            (66, text(semester)),
        ])
    }

    pub(crate) fn table(rows: Vec<Vec<Cell>>) -> RawSurveyTable {
        RawSurveyTable::new(headers(), rows)
    }

    fn registry() -> ProgramRegistry {
        ProgramRegistry::builtin(&SchemaLayout::V2024).unwrap()
    }

    #[test]
    fn selects_matching_rows_and_renames_counts() {
        let raw = table(vec![
            gmat_row("Álgebra", "Primero", "1", 18.0, 20.0),
            row(&[(5, text("Grado en Ingeniería del Software")), (45, num(3.0))]),
            gmat_row("Topología", "Segundo", "2", 10.0, 12.0),
        ]);

        let sub = extract_subgroup(&raw, &registry(), &SchemaLayout::V2024, "gmat")
            .unwrap()
            .unwrap();
        assert_eq!(sub.program_code, "GMAT");
        assert_eq!(sub.len(), 2);

        let sources: Vec<usize> = sub.columns.iter().map(|c| c.source_index).collect();
        let mut sorted = sources.clone();
        sorted.sort();
        assert_eq!(sources, sorted);
        assert_eq!(sources.len(), 6 + 3 + 29);

        let headers = sub.headers();
        assert!(headers.contains(&PASS_COUNT.to_string()));
        assert!(headers.contains(&ENROLLMENT_COUNT.to_string()));
        assert_eq!(sub.value(0, 55), Some(&num(18.0)));
        assert_eq!(sub.value(1, 54), Some(&text("Topología")));
    }

    #[test]
    fn root_name_is_trimmed_and_case_sensitive() {
        let mut padded = gmat_row("Álgebra", "Primero", "1", 1.0, 2.0);
        padded[5] = text("  Grado en Matemáticas ");
        let mut lower = gmat_row("Análisis", "Primero", "1", 1.0, 2.0);
        lower[5] = text("grado en matemáticas");

        let sub = extract_subgroup(&table(vec![padded, lower]), &registry(), &SchemaLayout::V2024, "GMAT")
            .unwrap()
            .unwrap();
        assert_eq!(sub.len(), 1);
        assert_eq!(sub.value(0, 5), Some(&text("Grado en Matemáticas")));
    }

    #[test]
    fn rows_without_pass_count_are_excluded() {
        let mut no_count = gmat_row("Álgebra", "Primero", "1", 0.0, 20.0);
        no_count[55] = Cell::Empty;
        let raw = table(vec![no_count]);
        let result = extract_subgroup(&raw, &registry(), &SchemaLayout::V2024, "GMAT").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn campus_filter_narrows_and_drops_campus_column() {
        let quintana = row(&[
            (5, text("Grado en Diseño y Desarrollo de Videojuegos")),
            (6, text("Animación")),
            (7, text(" Quintana ")),
            (8, num(15.0)),
            (9, num(30.0)),
        ]);
        let mostoles = row(&[
            (5, text("Grado en Diseño y Desarrollo de Videojuegos")),
            (6, text("Animación")),
            (7, text("Móstoles")),
            (8, num(99.0)),
            (9, num(99.0)),
        ]);
        let sub = extract_subgroup(
            &table(vec![quintana, mostoles]),
            &registry(),
            &SchemaLayout::V2024,
            "GDDV_QUINTANA",
        )
        .unwrap()
        .unwrap();

        assert_eq!(sub.len(), 1);
        assert!(sub.position_of_source(7).is_none());
        assert_eq!(sub.value(0, 8), Some(&num(15.0)));
    }

    #[test]
    fn campus_mismatch_is_an_empty_result() {
        let bilbao = row(&[
            (5, text("Grado en Ingeniería Informática")),
            (24, text("Redes")),
            (25, text("Bilbao")),
            (26, num(5.0)),
            (27, num(10.0)),
        ]);
        let result = extract_subgroup(&table(vec![bilbao]), &registry(), &SchemaLayout::V2024, "GII_VIC").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn campus_column_overlapping_common_block_is_removed() {
        let layout = SchemaLayout::V2024;
        let registry = ProgramRegistry::new(
            &layout,
            vec![ProgramEntry {
                code: "GMAT_SEDE".to_string(),
                root_name: "Grado en Matemáticas".to_string(),
                subject_column: 54,
                count_columns: [55, 56],
                campus_filter: Some(CampusFilter {
                    column: 3,
                    value: "Sede".to_string(),
                }),
            }],
        )
        .unwrap();
        let mut r = gmat_row("Álgebra", "Primero", "1", 4.0, 5.0);
        r[3] = text("Sede");

        let sub = extract_subgroup(&table(vec![r]), &registry, &layout, "GMAT_SEDE")
            .unwrap()
            .unwrap();
        assert!(sub.position_of_source(3).is_none());
        assert!(sub.position_of_source(2).is_some());
    }

    #[test]
    fn unknown_program_propagates() {
        let err = extract_subgroup(&table(vec![]), &registry(), &SchemaLayout::V2024, "XYZ").unwrap_err();
        assert!(matches!(err, ReportError::UnknownProgram { .. }));
    }

    #[test]
    fn count_columns_never_carry_campus_data_for_any_program() {
        let layout = SchemaLayout::V2024;
        let registry = registry();
        for entry in registry.entries() {
            let mut values = vec![
                (5, text(&entry.root_name)),
                (entry.subject_column, text("Asignatura")),
                (entry.pass_column(), num(7.0)),
                (entry.enrollment_column(), num(9.0)),
            ];
            if let Some(filter) = &entry.campus_filter {
                values.push((filter.column, text(&filter.value)));
            }
            let sub = extract_subgroup(&table(vec![row(&values)]), &registry, &layout, &entry.code)
                .unwrap()
                .unwrap();
            let pass = sub.position_of_source(entry.pass_column()).unwrap();
            let enrolled = sub.position_of_source(entry.enrollment_column()).unwrap();
            assert_eq!(sub.rows[0][pass], num(7.0), "{}", entry.code);
            assert_eq!(sub.rows[0][enrolled], num(9.0), "{}", entry.code);
            if let Some(filter) = &entry.campus_filter {
                assert!(sub.position_of_source(filter.column).is_none(), "{}", entry.code);
            }
        }
    }
}
