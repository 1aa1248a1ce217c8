use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tempfile::NamedTempFile;
use tracing::{error, info};

use crate::charts::{self, RenderedChart};
use crate::deck::{self, Deck};
use crate::layout::SchemaLayout;
use crate::models::{SubgroupTable, SummaryTable};
use crate::report;

pub const SUMMARY_FILE: &str = "summary.csv";
pub const REPORT_FILE: &str = "report.md";
pub const MINUTES_FILE: &str = "minutes.txt";
pub const DECK_FILE: &str = "deck.md";
pub const CHARTS_DIR: &str = "charts";

/// Write `contents` next to `path` in a temporary file and move it into place
/// only once it is complete. The temporary file is removed on every error path.
pub fn write_atomic(path: &Path, contents: &[u8]) -> anyhow::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create a temporary file in {}", dir.display()))?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    // Dropping the returned handle on error removes the temporary file.
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Summary as CSV with canonical column names; absent satisfaction columns
/// are left out.
pub fn summary_csv(summary: &SummaryTable) -> anyhow::Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec![
        "subject_name",
        "term_label",
        "semester_label",
        "pass_count",
        "enrollment_count",
        "pass_rate_pct",
    ];
    if summary.satisfaction.results {
        header.push("satisfaction_results");
    }
    if summary.satisfaction.group {
        header.push("satisfaction_group");
    }
    writer.write_record(&header)?;

    for row in &summary.rows {
        let mut record = vec![
            row.subject_name.clone(),
            row.term_label.clone(),
            row.semester_label.clone(),
            format_number(row.pass_count),
            format_number(row.enrollment_count),
            format!("{:.2}", row.pass_rate_pct),
        ];
        if summary.satisfaction.results {
            record.push(row.satisfaction_results.map(format_number).unwrap_or_default());
        }
        if summary.satisfaction.group {
            record.push(row.satisfaction_group.map(format_number).unwrap_or_default());
        }
        writer.write_record(&record)?;
    }

    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("failed to flush csv: {}", e.error()))
}

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub out_dir: PathBuf,
    pub template: Option<PathBuf>,
    pub payload: Option<PathBuf>,
}

/// What the export stage produced. Failures are per export; one failing does
/// not stop the others.
#[derive(Debug, Default)]
pub struct ExportReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<(String, anyhow::Error)>,
}

impl ExportReport {
    fn record(&mut self, name: &str, result: anyhow::Result<PathBuf>) {
        match result {
            Ok(path) => {
                info!(export = name, path = %path.display(), "export written");
                self.written.push(path);
            }
            Err(err) => {
                error!(export = name, error = %format!("{err:#}"), "export failed");
                self.failures.push((name.to_string(), err));
            }
        }
    }
}

fn write_named(path: PathBuf, contents: &[u8]) -> anyhow::Result<PathBuf> {
    write_atomic(&path, contents)?;
    Ok(path)
}

pub fn export_all(
    subgroup: &SubgroupTable,
    summary: &SummaryTable,
    layout: &SchemaLayout,
    options: &ExportOptions,
) -> anyhow::Result<ExportReport> {
    let out_dir = &options.out_dir;
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    let mut exports = ExportReport::default();

    exports.record(
        "summary",
        summary_csv(summary).and_then(|bytes| write_named(out_dir.join(SUMMARY_FILE), &bytes)),
    );

    let chart_dir = out_dir.join(CHARTS_DIR);
    let mut rendered: Vec<RenderedChart> = Vec::new();
    match std::fs::create_dir_all(&chart_dir) {
        Ok(()) => {
            for (spec, result) in charts::render_all(summary, &chart_dir) {
                let name = format!("chart {}", spec.file_name());
                match result {
                    Ok(chart) => {
                        exports.record(&name, Ok(chart.path.clone()));
                        rendered.push(chart);
                    }
                    Err(err) => exports.record(&name, Err(err)),
                }
            }
        }
        Err(err) => exports.record(
            "charts",
            Err(anyhow::Error::new(err).context(format!("failed to create {}", chart_dir.display()))),
        ),
    }

    let document = report::build_report(subgroup, summary, layout);
    exports.record("report", write_named(out_dir.join(REPORT_FILE), document.as_bytes()));

    let minutes = report::build_minutes(subgroup, summary, layout);
    exports.record("minutes", write_named(out_dir.join(MINUTES_FILE), minutes.as_bytes()));

    let payload = options.payload.as_deref().and_then(deck::load_payload);
    let slides = deck::build_deck(
        Deck::load_template(options.template.as_deref()),
        payload.as_ref(),
        summary,
        &rendered,
        out_dir,
    );
    exports.record("deck", write_named(out_dir.join(DECK_FILE), slides.render().as_bytes()));

    Ok(exports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::extract_subgroup;
    use crate::extract::tests::{gmat_row, num, table};
    use crate::registry::ProgramRegistry;
    use crate::summary::summarize;

    fn pipeline_output() -> (SubgroupTable, SummaryTable) {
        let layout = SchemaLayout::V2024;
        let registry = ProgramRegistry::builtin(&layout).unwrap();
        let mut second = gmat_row("Topología", "Segundo", "1", 18.0, 20.0);
        second[68] = num(4.5);
        let subgroup = extract_subgroup(
            &table(vec![gmat_row("Álgebra", "Primero", "2", 7.0, 9.0), second]),
            &registry,
            &layout,
            "GMAT",
        )
        .unwrap()
        .unwrap();
        let summary = summarize(&subgroup, &layout.markers).unwrap();
        (subgroup, summary)
    }

    #[test]
    fn atomic_write_leaves_no_temporaries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        write_atomic(&path, b"hola").unwrap();
        write_atomic(&path, b"adios").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "adios");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn failed_write_cleans_up_temporary_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("occupied");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), "x").unwrap();

        assert!(write_atomic(&target, b"data").is_err());
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("occupied")]);
    }

    #[test]
    fn summary_csv_uses_canonical_columns() {
        let (_, summary) = pipeline_output();
        let csv = String::from_utf8(summary_csv(&summary).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "subject_name,term_label,semester_label,pass_count,enrollment_count,pass_rate_pct,satisfaction_results,satisfaction_group"
        );
        assert_eq!(lines[1], "Álgebra,Primero,2,7,9,77.78,,");
        assert_eq!(lines[2], "Topología,Segundo,1,18,20,90.00,4.5,");
    }

    #[test]
    fn exports_every_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("template.md");
        std::fs::write(&template, "# Reunión {{PROGRAMA}}\n").unwrap();
        let payload = dir.path().join("payload.json");
        std::fs::write(&payload, r#"{"{{PROGRAMA}}": "GMAT"}"#).unwrap();

        let (subgroup, summary) = pipeline_output();
        let options = ExportOptions {
            out_dir: dir.path().join("out"),
            template: Some(template),
            payload: Some(payload),
        };
        let report = export_all(&subgroup, &summary, &SchemaLayout::V2024, &options).unwrap();

        assert!(report.failures.is_empty(), "{:?}", report.failures);
        for name in [SUMMARY_FILE, REPORT_FILE, MINUTES_FILE, DECK_FILE] {
            assert!(options.out_dir.join(name).is_file(), "{name}");
        }
        let deck = std::fs::read_to_string(options.out_dir.join(DECK_FILE)).unwrap();
        assert!(deck.starts_with("# Reunión GMAT"));
        assert!(deck.contains("](charts/global_pass_rate_pct.svg)"));
        assert!(options.out_dir.join(CHARTS_DIR).join("global_pass_rate_pct.svg").is_file());
    }
}
