use std::fmt::Write;

use crate::extract::{ENROLLMENT_COUNT, PASS_COUNT};
use crate::layout::SchemaLayout;
use crate::models::{Cell, SubgroupTable, SummaryRow, SummaryTable};

const NOT_ANSWERED: &str = "No indicado / No aplica";
const NO_COMMENT: &str = "Sin comentarios / No aplica.";

/// Answer text for one subgroup cell.
fn answer(subgroup: &SubgroupTable, row: usize, source_index: usize) -> String {
    match subgroup.value(row, source_index) {
        None => "N/A".to_string(),
        Some(cell) => {
            let text = cell.to_text();
            let text = text.trim();
            if text.is_empty() || text.eq_ignore_ascii_case("nan") {
                NOT_ANSWERED.to_string()
            } else {
                text.to_string()
            }
        }
    }
}

fn header_value(subgroup: &SubgroupTable, row: usize, header: &str) -> Option<Cell> {
    let position = subgroup.columns.iter().position(|c| c.header == header)?;
    subgroup.rows.get(row)?.get(position).cloned()
}

fn count_text(cell: &Option<Cell>) -> String {
    match cell {
        Some(cell) if !cell.is_missing() => cell.to_text().trim().to_string(),
        _ => NOT_ANSWERED.to_string(),
    }
}

fn success_rate(pass: &Option<Cell>, enrolled: &Option<Cell>) -> String {
    let pass = pass.as_ref().and_then(Cell::as_number);
    let enrolled = enrolled.as_ref().and_then(Cell::as_number);
    match (pass, enrolled) {
        (Some(pass), Some(enrolled)) if enrolled > 0.0 => {
            format!("{:.1}%", pass / enrolled * 100.0)
        }
        _ => "N/A".to_string(),
    }
}

/// Everything the report and the minutes print for one subject.
struct SubjectSheet {
    subject: String,
    professor: String,
    programme: String,
    term: String,
    semester: String,
    enrolled: String,
    passed: String,
    success_rate: String,
    rating: String,
    justification: String,
    prior_deficiencies: String,
    prior_deficiencies_detail: String,
    syllabus_completed: String,
    syllabus_cause: String,
    incidents: String,
    problems: String,
    extra_detail: String,
    group_characteristics: String,
    group_satisfaction: String,
    coordination: String,
    other_incidents: String,
    suggestions: String,
}

impl SubjectSheet {
    fn new(subgroup: &SubgroupTable, layout: &SchemaLayout, summary_row: &SummaryRow) -> Self {
        let row = summary_row.source_row;
        let q = &layout.questions;
        let get = |index| answer(subgroup, row, index);
        let pass = header_value(subgroup, row, PASS_COUNT);
        let enrolled = header_value(subgroup, row, ENROLLMENT_COUNT);
        let or_not_answered = |s: &str| {
            if s.is_empty() {
                NOT_ANSWERED.to_string()
            } else {
                s.to_string()
            }
        };

        SubjectSheet {
            subject: or_not_answered(&summary_row.subject_name),
            professor: get(layout.professor),
            programme: get(layout.root_name),
            term: or_not_answered(&summary_row.term_label),
            semester: or_not_answered(&summary_row.semester_label),
            enrolled: count_text(&enrolled),
            passed: count_text(&pass),
            success_rate: success_rate(&pass, &enrolled),
            rating: get(q.rating),
            justification: get(q.justification),
            prior_deficiencies: get(q.prior_deficiencies),
            prior_deficiencies_detail: get(q.prior_deficiencies_detail),
            syllabus_completed: get(q.syllabus_completed),
            syllabus_cause: get(q.syllabus_cause),
            incidents: get(q.incidents),
            problems: get(q.problems),
            extra_detail: get(q.extra_detail),
            group_characteristics: get(q.group_characteristics),
            group_satisfaction: get(q.group_satisfaction),
            coordination: get(q.coordination),
            other_incidents: get(q.other_incidents),
            suggestions: get(q.suggestions),
        }
    }

    fn reports_prior_deficiencies(&self) -> bool {
        self.prior_deficiencies.to_lowercase().contains("sí")
    }

    fn syllabus_incomplete(&self) -> bool {
        self.syllabus_completed.to_lowercase().contains("no")
    }
}

fn sheets(subgroup: &SubgroupTable, summary: &SummaryTable, layout: &SchemaLayout) -> Vec<SubjectSheet> {
    summary
        .rows
        .iter()
        .map(|row| SubjectSheet::new(subgroup, layout, row))
        .collect()
}

fn qa_block(output: &mut String, question: &str, response: &str) {
    let _ = writeln!(output, "**{question}**");
    let _ = writeln!(output);
    if response.is_empty() || response == NOT_ANSWERED {
        let _ = writeln!(output, "> _{NO_COMMENT}_");
    } else {
        for line in response.lines() {
            let _ = writeln!(output, "> {line}");
        }
    }
    let _ = writeln!(output);
}

/// Markdown quality report, one section per subject in summary order.
pub fn build_report(subgroup: &SubgroupTable, summary: &SummaryTable, layout: &SchemaLayout) -> String {
    let sheets = sheets(subgroup, summary, layout);
    let mut output = String::new();

    let _ = writeln!(output, "# INFORME DE CALIDAD DOCENTE");
    let _ = writeln!(output);
    let _ = writeln!(output, "Programa: {}", subgroup.program_code);
    let _ = writeln!(output);
    let _ = writeln!(output, "Total de asignaturas procesadas: {}", subgroup.len());

    for sheet in &sheets {
        let _ = writeln!(output);
        let _ = writeln!(output, "---");
        let _ = writeln!(output);
        let _ = writeln!(output, "## {}", sheet.subject);
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "**Curso: {} | Cuatrimestre: {}**  ",
            sheet.term, sheet.semester
        );
        let _ = writeln!(output, "Profesor/a: {}  ", sheet.professor);
        let _ = writeln!(output, "Titulación: {}", sheet.programme);
        let _ = writeln!(output);

        let _ = writeln!(output, "### 1. Datos Cuantitativos");
        let _ = writeln!(output);
        let _ = writeln!(output, "| Matriculados | Aprobados | Tasa Éxito |");
        let _ = writeln!(output, "|---|---|---|");
        let _ = writeln!(
            output,
            "| **{}** | **{}** | **{}** |",
            sheet.enrolled, sheet.passed, sheet.success_rate
        );
        let _ = writeln!(output);

        let _ = writeln!(output, "### 2. Análisis de Resultados");
        let _ = writeln!(output);
        qa_block(&mut output, "Valoración (1-5):", &sheet.rating);
        qa_block(&mut output, "Justificación / Acciones:", &sheet.justification);
        if sheet.reports_prior_deficiencies() {
            qa_block(&mut output, "Deficiencias previas:", &sheet.prior_deficiencies_detail);
        }

        let _ = writeln!(output, "### 3. Docencia e Incidencias");
        let _ = writeln!(output);
        qa_block(&mut output, "¿Temario completo?:", &sheet.syllabus_completed);
        if sheet.syllabus_incomplete() {
            qa_block(&mut output, "Causa:", &sheet.syllabus_cause);
        }
        qa_block(
            &mut output,
            "Incidencias / Problemas:",
            &format!("{}\n{}", sheet.incidents, sheet.problems),
        );
        if sheet.extra_detail != NOT_ANSWERED {
            qa_block(&mut output, "Detalles adicionales:", &sheet.extra_detail);
        }

        let _ = writeln!(output, "### 4. Grupo y Coordinación");
        let _ = writeln!(output);
        qa_block(&mut output, "Características Grupo:", &sheet.group_characteristics);
        qa_block(&mut output, "Satisfacción Grupo:", &sheet.group_satisfaction);
        qa_block(&mut output, "Coordinación:", &sheet.coordination);

        let _ = writeln!(output, "### 5. Cierre");
        let _ = writeln!(output);
        qa_block(&mut output, "Otras incidencias:", &sheet.other_incidents);
        qa_block(&mut output, "Sugerencias:", &sheet.suggestions);
    }

    output
}

/// Plain-text digest of the same content, one block per subject.
pub fn build_minutes(subgroup: &SubgroupTable, summary: &SummaryTable, layout: &SchemaLayout) -> String {
    let sheets = sheets(subgroup, summary, layout);
    let mut output = String::new();

    let _ = writeln!(output, "INFORME DE DATOS DE LA TITULACIÓN");
    let _ = writeln!(output, "Total de asignaturas procesadas: {}", subgroup.len());
    let _ = writeln!(output, "{}", "=".repeat(60));

    for sheet in &sheets {
        let _ = writeln!(output);
        let _ = writeln!(output, "### ASIGNATURA: {}", sheet.subject);
        let _ = writeln!(output, "- Profesor/a: {}", sheet.professor);
        let _ = writeln!(output, "- Curso: {} | Semestre: {}", sheet.term, sheet.semester);
        let _ = writeln!(output, "- Titulación: {}", sheet.programme);
        let _ = writeln!(output);
        let _ = writeln!(output, "1. DATOS CUANTITATIVOS:");
        let _ = writeln!(output, "   - Matriculados: {}", sheet.enrolled);
        let _ = writeln!(output, "   - Aprobados: {}", sheet.passed);
        let _ = writeln!(output, "   - Tasa de Éxito: {}", sheet.success_rate);
        let _ = writeln!(output);
        let _ = writeln!(output, "2. ANÁLISIS DE RESULTADOS:");
        let _ = writeln!(output, "   - Valoración Docente (1-5): {}", sheet.rating);
        let _ = writeln!(output, "   - Justificación / Acciones de mejora: {}", sheet.justification);
        let _ = writeln!(
            output,
            "   - ¿Existen deficiencias de formación previas?: {}",
            sheet.prior_deficiencies
        );
        let _ = writeln!(
            output,
            "   - Detalles de deficiencias: {}",
            sheet.prior_deficiencies_detail
        );
        let _ = writeln!(output);
        let _ = writeln!(output, "3. DOCENCIA E INCIDENCIAS:");
        let _ = writeln!(output, "   - ¿Temario completo?: {}", sheet.syllabus_completed);
        let _ = writeln!(output, "   - Causa si no se completó: {}", sheet.syllabus_cause);
        let _ = writeln!(output, "   - Incidencias generales: {}", sheet.incidents);
        let _ = writeln!(output, "   - Problemas detectados: {}", sheet.problems);
        let _ = writeln!(output, "   - Detalles adicionales: {}", sheet.extra_detail);
        let _ = writeln!(output);
        let _ = writeln!(output, "4. GRUPO Y COORDINACIÓN:");
        let _ = writeln!(
            output,
            "   - Características del grupo: {}",
            sheet.group_characteristics
        );
        let _ = writeln!(output, "   - Satisfacción con el grupo: {}", sheet.group_satisfaction);
        let _ = writeln!(
            output,
            "   - Coordinación con otras asignaturas: {}",
            sheet.coordination
        );
        let _ = writeln!(output);
        let _ = writeln!(output, "5. CIERRE:");
        let _ = writeln!(output, "   - Otras incidencias: {}", sheet.other_incidents);
        let _ = writeln!(output, "   - Sugerencias: {}", sheet.suggestions);
        let _ = writeln!(output);
        let _ = writeln!(output, "{}", "-".repeat(60));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_subgroup;
    use crate::extract::tests::{gmat_row, table, text};
    use crate::registry::ProgramRegistry;
    use crate::summary::summarize;

    fn build(rows: Vec<Vec<Cell>>) -> (SubgroupTable, SummaryTable) {
        let layout = SchemaLayout::V2024;
        let registry = ProgramRegistry::builtin(&layout).unwrap();
        let subgroup = extract_subgroup(&table(rows), &registry, &layout, "GMAT")
            .unwrap()
            .unwrap();
        let summary = summarize(&subgroup, &layout.markers).unwrap();
        (subgroup, summary)
    }

    #[test]
    fn report_sections_follow_summary_order() {
        let (subgroup, summary) = build(vec![
            gmat_row("Topología", "Segundo", "1", 9.0, 10.0),
            gmat_row("Álgebra", "Primero", "1", 18.0, 20.0),
        ]);
        let report = build_report(&subgroup, &summary, &SchemaLayout::V2024);

        assert!(report.starts_with("# INFORME DE CALIDAD DOCENTE"));
        assert!(report.contains("Total de asignaturas procesadas: 2"));
        let algebra = report.find("## Álgebra").unwrap();
        let topology = report.find("## Topología").unwrap();
        assert!(algebra < topology);
        assert!(report.contains("| **20** | **18** | **90.0%** |"));
    }

    #[test]
    fn conditional_blocks_depend_on_answers() {
        let mut r = gmat_row("Álgebra", "Primero", "1", 18.0, 20.0);
        r[4] = text("Ada Lovelace");
        r[70] = text("Sí");
        r[71] = text("Base de cálculo débil");
        r[74] = text("No");
        r[75] = text("Huelga");
        let plain = gmat_row("Análisis", "Primero", "2", 1.0, 0.0);

        let (subgroup, summary) = build(vec![r, plain]);
        let report = build_report(&subgroup, &summary, &SchemaLayout::V2024);

        assert_eq!(report.matches("**Deficiencias previas:**").count(), 1);
        assert!(report.contains("> Base de cálculo débil"));
        assert_eq!(report.matches("**Causa:**").count(), 1);
        assert!(report.contains("Profesor/a: Ada Lovelace"));
        assert!(report.contains(NO_COMMENT));
        assert!(!report.contains("**Detalles adicionales:**"));
        assert!(report.contains("| **0** | **1** | **N/A** |"));
    }

    #[test]
    fn minutes_flatten_every_subject() {
        let mut r = gmat_row("Álgebra", "Primero", "1", 3.0, 4.0);
        r[90] = text("Más horas de prácticas");
        let (subgroup, summary) = build(vec![r]);
        let minutes = build_minutes(&subgroup, &summary, &SchemaLayout::V2024);

        assert!(minutes.contains("### ASIGNATURA: Álgebra"));
        assert!(minutes.contains("   - Tasa de Éxito: 75.0%"));
        assert!(minutes.contains("   - Sugerencias: Más horas de prácticas"));
        assert!(minutes.contains(&format!("   - Coordinación con otras asignaturas: {NOT_ANSWERED}")));
    }
}
