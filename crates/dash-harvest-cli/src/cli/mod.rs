//! CLI subcommand implementations.

pub mod export_cmd;
pub mod replay_cmd;

/// Widget titles exported when none are given on the command line.
pub const DEFAULT_TITLES: &[&str] = &[
    "Все звонки",
    "Итоговый балл, все звонки",
    "Итоговый балл, среднее значение с группировкой по дате",
];

/// Print a one-line summary of a finished export.
pub(crate) fn print_summary(label: &str, summary: &dash_harvest::ExportSummary) {
    let target = match &summary.location {
        dash_harvest::ExportLocation::File(path) => path.display().to_string(),
        dash_harvest::ExportLocation::Memory(name) => name.clone(),
    };
    println!(
        "{label}: {} rows from {} pages -> {target}{}",
        summary.rows,
        summary.pages_visited,
        if summary.partial {
            " (partial: page limit reached)"
        } else {
            ""
        }
    );
}
