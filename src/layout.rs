//! Column positions of the shared survey export.
//!
//! Every program sheet is exported into one wide table whose columns are
//! addressed by position. All positions used anywhere in the crate are named
//! here so a change in the export format is fixed in one place.

use std::ops::Range;

/// Positions of the free-text survey answers read by the document report.
#[derive(Debug, Clone)]
pub struct SurveyQuestions {
    pub rating: usize,
    pub justification: usize,
    pub prior_deficiencies: usize,
    pub prior_deficiencies_detail: usize,
    pub syllabus_completed: usize,
    pub syllabus_cause: usize,
    pub incidents: usize,
    pub problems: usize,
    pub extra_detail: usize,
    pub group_characteristics: usize,
    pub group_satisfaction: usize,
    pub coordination: usize,
    pub other_incidents: usize,
    pub suggestions: usize,
}

/// Header markers used to locate the summary columns by name.
#[derive(Debug, Clone)]
pub struct HeaderMarkers {
    /// Subject headers start with this text, e.g. "Seleccione la asignatura (...)".
    pub subject_prefix: &'static str,
    pub term: &'static str,
    pub semester: &'static str,
    pub satisfaction: &'static str,
    pub satisfaction_results: &'static str,
    pub satisfaction_group: &'static str,
}

#[derive(Debug, Clone)]
pub struct SchemaLayout {
    pub version: &'static str,
    /// Minimum number of columns every input row must have.
    pub column_count: usize,
    pub submission_date: usize,
    pub professor: usize,
    pub root_name: usize,
    /// Identification and survey columns shared by every program.
    pub common: &'static [Range<usize>],
    pub term: usize,
    pub semester: usize,
    pub questions: SurveyQuestions,
    pub markers: HeaderMarkers,
}

impl SchemaLayout {
    /// Layout of the 2024 coordination survey export.
    pub const V2024: SchemaLayout = SchemaLayout {
        version: "2024",
        column_count: 94,
        submission_date: 1,
        professor: 4,
        root_name: 5,
        common: &[0..6, 65..94],
        term: 65,
        semester: 66,
        questions: SurveyQuestions {
            rating: 68,
            justification: 69,
            prior_deficiencies: 70,
            prior_deficiencies_detail: 71,
            syllabus_completed: 74,
            syllabus_cause: 75,
            incidents: 76,
            problems: 77,
            extra_detail: 78,
            group_characteristics: 79,
            group_satisfaction: 80,
            coordination: 86,
            other_incidents: 89,
            suggestions: 90,
        },
        markers: HeaderMarkers {
            subject_prefix: "Seleccione",
            term: "Curso",
            semester: "Cuatrimestre",
            satisfaction: "satisfacción",
            satisfaction_results: "resultados",
            satisfaction_group: "grupo",
        },
    };

    /// Common column indices in ascending order.
    pub fn common_columns(&self) -> impl Iterator<Item = usize> + '_ {
        self.common.iter().flat_map(|range| range.clone())
    }

    pub fn is_common(&self, index: usize) -> bool {
        self.common.iter().any(|range| range.contains(&index))
    }
}

impl Default for SchemaLayout {
    fn default() -> Self {
        Self::V2024
    }
}
