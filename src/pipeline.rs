use tracing::info;

use crate::dates::filter_by_dates;
use crate::error::Result;
use crate::extract::extract_subgroup;
use crate::layout::SchemaLayout;
use crate::models::{RawSurveyTable, SubgroupTable, SummaryTable};
use crate::registry::ProgramRegistry;
use crate::summary::summarize;

/// Selection for one report run.
#[derive(Debug, Clone)]
pub struct Selection {
    pub program: String,
    pub from: String,
    pub to: Option<String>,
}

#[derive(Debug)]
pub enum Outcome {
    /// The filters matched no rows.
    NoData,
    Ready {
        subgroup: SubgroupTable,
        summary: SummaryTable,
    },
}

/// Date filter, extraction and summary, run to completion before any export.
pub fn run(
    table: &RawSurveyTable,
    registry: &ProgramRegistry,
    layout: &SchemaLayout,
    selection: &Selection,
) -> Result<Outcome> {
    // Resolve the code first so a typo fails before any filtering work.
    registry.lookup(&selection.program)?;

    let filtered = filter_by_dates(table, layout, &selection.from, selection.to.as_deref())?;
    let Some(subgroup) = extract_subgroup(&filtered, registry, layout, &selection.program)? else {
        info!(program = %selection.program, "no data for selection");
        return Ok(Outcome::NoData);
    };
    let summary = summarize(&subgroup, &layout.markers)?;
    Ok(Outcome::Ready { subgroup, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReportError;
    use crate::extract::tests::{gmat_row, table, text};

    fn selection(program: &str, from: &str, to: Option<&str>) -> Selection {
        Selection {
            program: program.to_string(),
            from: from.to_string(),
            to: to.map(str::to_string),
        }
    }

    fn registry() -> ProgramRegistry {
        ProgramRegistry::builtin(&SchemaLayout::V2024).unwrap()
    }

    #[test]
    fn runs_every_stage_in_order() {
        let mut late = gmat_row("Topología", "Segundo", "1", 18.0, 20.0);
        late[1] = text("02/07/2024 12:00:00");
        let mut early = gmat_row("Álgebra", "Primero", "1", 5.0, 10.0);
        early[1] = text("02/01/2024 12:00:00");

        let outcome = run(
            &table(vec![early, late]),
            &registry(),
            &SchemaLayout::V2024,
            &selection("gmat", "01-06-2024", None),
        )
        .unwrap();

        match outcome {
            Outcome::Ready { subgroup, summary } => {
                assert_eq!(subgroup.len(), 1);
                assert_eq!(summary.rows[0].subject_name, "Topología");
                assert_eq!(summary.rows[0].pass_rate_pct, 90.0);
            }
            Outcome::NoData => panic!("expected data"),
        }
    }

    #[test]
    fn empty_window_is_no_data() {
        let outcome = run(
            &table(vec![gmat_row("Álgebra", "Primero", "1", 5.0, 10.0)]),
            &registry(),
            &SchemaLayout::V2024,
            &selection("GMAT", "01-01-2030", None),
        )
        .unwrap();
        assert!(matches!(outcome, Outcome::NoData));
    }

    #[test]
    fn unknown_program_fails_before_filtering() {
        let err = run(
            &table(vec![]),
            &registry(),
            &SchemaLayout::V2024,
            &selection("GXX", "not a date", None),
        )
        .unwrap_err();
        assert!(matches!(err, ReportError::UnknownProgram { .. }));
    }
}
