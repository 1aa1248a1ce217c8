use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};

mod charts;
mod dates;
mod deck;
mod error;
mod export;
mod extract;
mod input;
mod layout;
mod logging;
mod models;
mod pipeline;
mod registry;
mod report;
mod summary;

use crate::layout::SchemaLayout;
use crate::models::SummaryTable;
use crate::pipeline::{Outcome, Selection};
use crate::registry::ProgramRegistry;
use crate::summary::Metric;

/// Registry override used when `--registry` is not given.
const REGISTRY_ENV: &str = "SURVEY_REPORT_REGISTRY";

#[derive(Parser)]
#[command(name = "survey-report")]
#[command(about = "Teaching-quality survey reports per academic program", long_about = None)]
struct Cli {
    /// JSON file replacing the built-in program registry
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SelectionArgs {
    /// Survey export (.xlsx, .xls, .ods or .csv)
    #[arg(long)]
    input: PathBuf,
    /// Program code, e.g. GII_VIC (case-insensitive)
    #[arg(long)]
    program: String,
    /// First submission day to keep, dd-mm-yyyy
    #[arg(long)]
    from: String,
    /// Last submission day to keep, dd-mm-yyyy
    #[arg(long)]
    to: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Table,
    Csv,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List the program codes
    Programs,
    /// Print the per-subject summary
    Summary {
        #[command(flatten)]
        selection: SelectionArgs,
        #[arg(long, value_enum, default_value_t = Format::Table)]
        format: Format,
    },
    /// Write summary, charts, report, minutes and slide deck
    Report {
        #[command(flatten)]
        selection: SelectionArgs,
        #[arg(long, default_value = "report")]
        out_dir: PathBuf,
        /// Markdown deck whose placeholders are filled from --payload
        #[arg(long)]
        template: Option<PathBuf>,
        /// JSON object of placeholder token → value
        #[arg(long)]
        payload: Option<PathBuf>,
    },
}

fn load_registry(layout: &SchemaLayout, path: Option<PathBuf>) -> anyhow::Result<ProgramRegistry> {
    let path = path.or_else(|| std::env::var_os(REGISTRY_ENV).map(PathBuf::from));
    match path {
        Some(path) => ProgramRegistry::from_json_file(layout, &path)
            .with_context(|| format!("failed to load registry {}", path.display())),
        None => Ok(ProgramRegistry::builtin(layout)?),
    }
}

fn run_selection(
    layout: &SchemaLayout,
    registry: &ProgramRegistry,
    args: SelectionArgs,
) -> anyhow::Result<Outcome> {
    let table = input::load_table(&args.input, layout)?;
    let selection = Selection {
        program: args.program,
        from: args.from,
        to: args.to,
    };
    Ok(pipeline::run(&table, registry, layout, &selection)?)
}

fn print_no_data(program: &str) {
    println!("No data found for '{program}'.");
    println!("Check that the program has responses in the selected date range.");
}

fn print_table(summary: &SummaryTable) {
    println!(
        "{:<40} {:<10} {:<12} {:>9} {:>12} {:>11}",
        "Asignatura", "Curso", "Cuatrimestre", "Aprobados", "Matriculados", "% Aprobados"
    );
    for row in &summary.rows {
        println!(
            "{:<40} {:<10} {:<12} {:>9} {:>12} {:>11.2}",
            row.subject_name,
            row.term_label,
            row.semester_label,
            row.pass_count,
            row.enrollment_count,
            row.pass_rate_pct
        );
    }
    let mean = Metric::PassRate.mean(&summary.rows).unwrap_or(0.0);
    println!();
    println!("Subjects: {}  Mean pass rate: {mean:.2}%", summary.rows.len());
}

fn main() -> anyhow::Result<()> {
    logging::init_tracing();
    let cli = Cli::parse();
    let layout = SchemaLayout::default();
    let registry = load_registry(&layout, cli.registry)?;

    match cli.command {
        Commands::Programs => {
            for entry in registry.entries() {
                match &entry.campus_filter {
                    Some(filter) => println!("{:<16} {} ({})", entry.code, entry.root_name, filter.value),
                    None => println!("{:<16} {}", entry.code, entry.root_name),
                }
            }
        }
        Commands::Summary { selection, format } => {
            let program = selection.program.clone();
            let summary = match run_selection(&layout, &registry, selection)? {
                Outcome::NoData => {
                    print_no_data(&program);
                    return Ok(());
                }
                Outcome::Ready { summary, .. } => summary,
            };

            match format {
                Format::Table => print_table(&summary),
                Format::Csv => {
                    let bytes = export::summary_csv(&summary)?;
                    print!("{}", String::from_utf8_lossy(&bytes));
                }
                Format::Json => println!("{}", serde_json::to_string_pretty(&summary.rows)?),
            }
        }
        Commands::Report {
            selection,
            out_dir,
            template,
            payload,
        } => {
            let program = selection.program.clone();
            let (subgroup, summary) = match run_selection(&layout, &registry, selection)? {
                Outcome::NoData => {
                    print_no_data(&program);
                    return Ok(());
                }
                Outcome::Ready { subgroup, summary } => (subgroup, summary),
            };

            let options = export::ExportOptions {
                out_dir,
                template,
                payload,
            };
            let exports = export::export_all(&subgroup, &summary, &layout, &options)?;
            for path in &exports.written {
                println!("Written {}", display_relative(path, &options.out_dir));
            }
            if !exports.failures.is_empty() {
                for (name, err) in &exports.failures {
                    eprintln!("Export '{name}' failed: {err:#}");
                }
                anyhow::bail!("{} export(s) failed", exports.failures.len());
            }
            println!(
                "Report for {} written to {}.",
                subgroup.program_code,
                options.out_dir.display()
            );
        }
    }

    Ok(())
}

fn display_relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}
