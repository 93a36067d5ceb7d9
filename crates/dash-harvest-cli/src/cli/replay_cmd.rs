//! `dash-harvest replay` — run the export over saved HTML snapshots.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use dash_harvest::html::find_widgets_by_title;
use dash_harvest::{export_widget, BusyFlag, ExportSummary, FileSink, HarvestConfig, ReplayWidget};

use crate::cli::print_summary;
use crate::config::resolve_out_dir;

/// Load one snapshot per file. With a title, each file is a whole page and
/// the first widget with that title is cut out of it.
pub fn load_pages(files: &[PathBuf], title: Option<&str>) -> Result<Vec<String>> {
    files
        .iter()
        .map(|path| {
            let html = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            match title {
                None => Ok(html),
                Some(title) => find_widgets_by_title(&html, title)
                    .into_iter()
                    .next()
                    .with_context(|| {
                        format!("no widget titled \"{title}\" in {}", path.display())
                    }),
            }
        })
        .collect()
}

pub async fn replay(
    files: &[PathBuf],
    title: Option<&str>,
    out_dir: Option<&Path>,
    config: &HarvestConfig,
) -> Result<ExportSummary> {
    if files.is_empty() {
        bail!("no snapshot files given");
    }
    let pages = load_pages(files, title)?;
    let widget = ReplayWidget::new(pages, config);
    let sink = FileSink::new(resolve_out_dir(out_dir));
    let summary = export_widget(&widget, &sink, config, &BusyFlag::new()).await?;
    Ok(summary)
}

pub async fn run(
    files: &[PathBuf],
    title: Option<&str>,
    out_dir: Option<&Path>,
    config: &HarvestConfig,
) -> Result<()> {
    let summary = replay(files, title, out_dir, config).await?;
    print_summary(title.unwrap_or("replay"), &summary);
    Ok(())
}
