//! Markdown slide deck: slides are separated by a line holding `---`.

use std::fmt::Write;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::warn;

use crate::charts::RenderedChart;
use crate::models::SummaryTable;

/// Rows of the summary shown on the table slide.
const TABLE_SLIDE_ROWS: usize = 12;

const ASSISTANT_SLIDES: [(&str, &str); 3] = [
    ("Informe Docentes (IA)", "AQUÍ SE GENERARÁ EL RESUMEN IA DE DOCENTES"),
    ("Informe Delegados (IA)", "AQUÍ SE GENERARÁ EL RESUMEN IA DE DELEGADOS"),
    ("Coordinación (IA)", "AQUÍ IRÁ LA INFO DE COORDINACIÓN"),
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Deck {
    pub slides: Vec<String>,
}

impl Deck {
    pub fn parse(text: &str) -> Self {
        let mut slides = Vec::new();
        let mut current = String::new();
        for line in text.lines() {
            if line.trim() == "---" {
                slides.push(std::mem::take(&mut current));
            } else {
                current.push_str(line);
                current.push('\n');
            }
        }
        slides.push(current);
        slides.retain(|s| !s.trim().is_empty());
        Self { slides }
    }

    /// Template deck, or an empty one when the template cannot be read.
    pub fn load_template(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot read deck template, starting empty");
                Self::default()
            }
        }
    }

    /// Replace every payload key found in the deck text with its value.
    /// Tables are plain text in this format, so they are covered too.
    pub fn substitute(&mut self, payload: &Map<String, Value>) {
        for slide in self.slides.iter_mut() {
            for (token, value) in payload {
                if token.is_empty() || !slide.contains(token.as_str()) {
                    continue;
                }
                let replacement = match value {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                *slide = slide.replace(token.as_str(), &replacement);
            }
        }
    }

    pub fn push_slide(&mut self, title: &str, body: &str) {
        let mut slide = String::new();
        let _ = writeln!(slide, "# {title}");
        let _ = writeln!(slide);
        slide.push_str(body);
        if !slide.ends_with('\n') {
            slide.push('\n');
        }
        self.slides.push(slide);
    }

    pub fn render(&self) -> String {
        self.slides
            .iter()
            .map(|s| s.trim_end().to_string())
            .collect::<Vec<_>>()
            .join("\n\n---\n\n")
            + "\n"
    }
}

/// Read a placeholder payload: a JSON object of token → value.
pub fn load_payload(path: &Path) -> Option<Map<String, Value>> {
    let parsed = std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|raw| serde_json::from_str::<Value>(&raw).map_err(|e| e.to_string()));
    match parsed {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => {
            warn!(path = %path.display(), "payload is not a JSON object, skipping substitution");
            None
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "cannot read payload, skipping substitution");
            None
        }
    }
}

fn cell(value: f64) -> String {
    format!("{value:.2}")
}

fn optional(value: Option<f64>) -> String {
    value.map(cell).unwrap_or_else(|| "N/A".to_string())
}

pub fn summary_table_markdown(summary: &SummaryTable, limit: usize) -> String {
    let mut header = vec!["Asignatura", "Curso", "Cuatrimestre", "Aprobados", "Matriculados", "% Aprobados"];
    if summary.satisfaction.results {
        header.push("Valoración Resultados");
    }
    if summary.satisfaction.group {
        header.push("Valoración Grupo");
    }

    let mut out = String::new();
    let _ = writeln!(out, "| {} |", header.join(" | "));
    let _ = writeln!(out, "|{}", "---|".repeat(header.len()));
    for row in summary.rows.iter().take(limit) {
        let mut cells = vec![
            row.subject_name.replace('|', "/"),
            row.term_label.clone(),
            row.semester_label.clone(),
            cell(row.pass_count),
            cell(row.enrollment_count),
            cell(row.pass_rate_pct),
        ];
        if summary.satisfaction.results {
            cells.push(optional(row.satisfaction_results));
        }
        if summary.satisfaction.group {
            cells.push(optional(row.satisfaction_group));
        }
        let _ = writeln!(out, "| {} |", cells.join(" | "));
    }
    out
}

/// Template first (with placeholders substituted), then the generated slides.
/// Chart paths are written relative to `deck_dir` when possible.
pub fn build_deck(
    template: Deck,
    payload: Option<&Map<String, Value>>,
    summary: &SummaryTable,
    charts: &[RenderedChart],
    deck_dir: &Path,
) -> Deck {
    let mut deck = template;
    if let Some(payload) = payload {
        deck.substitute(payload);
    }

    deck.push_slide(
        "Resumen de Datos (Tabla)",
        &summary_table_markdown(summary, TABLE_SLIDE_ROWS),
    );
    for (title, marker) in ASSISTANT_SLIDES {
        deck.push_slide(title, &format!("*[{marker}]*"));
    }
    for chart in charts {
        let link = chart
            .path
            .strip_prefix(deck_dir)
            .unwrap_or(&chart.path)
            .display()
            .to_string()
            .replace('\\', "/");
        deck.push_slide(&chart.title, &format!("![{}]({link})", chart.title));
    }
    deck
}
