//! `dash-harvest export` — open a dashboard and export every matching widget.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dash_harvest::{export_widget, FileSink, HarvestConfig};

use crate::cli::{print_summary, DEFAULT_TITLES};
use crate::config::{numbered_filename, resolve_out_dir};
use crate::dashboard::wait_for_widgets;
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::{RenderContext, Renderer};

/// Options for one `export` invocation.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub url: String,
    pub titles: Vec<String>,
    pub out_dir: Option<PathBuf>,
    pub filename: Option<String>,
    pub timeout_ms: Option<u64>,
    pub max_pages: Option<usize>,
    pub navigation_timeout_ms: u64,
    pub settle_ms: u64,
    pub headed: bool,
    pub user_data_dir: Option<PathBuf>,
}

/// Apply command-line overrides on top of the environment configuration.
pub fn effective_config(
    filename: Option<&str>,
    timeout_ms: Option<u64>,
    max_pages: Option<usize>,
) -> HarvestConfig {
    let mut config = HarvestConfig::from_env();
    if let Some(name) = filename {
        config.export_filename = name.to_string();
    }
    if let Some(ms) = timeout_ms {
        config.page_timeout = Duration::from_millis(ms);
    }
    if let Some(n) = max_pages {
        config.max_pages = n.max(1);
    }
    config
}

pub async fn run(opts: ExportOptions) -> Result<()> {
    let config = effective_config(opts.filename.as_deref(), opts.timeout_ms, opts.max_pages);
    let titles: Vec<String> = if opts.titles.is_empty() {
        DEFAULT_TITLES.iter().map(|t| t.to_string()).collect()
    } else {
        opts.titles.clone()
    };
    let sink = FileSink::new(resolve_out_dir(opts.out_dir.as_deref()));

    let renderer = ChromiumRenderer::new(!opts.headed, opts.user_data_dir.clone()).await?;
    let ctx: Arc<dyn RenderContext> = Arc::from(renderer.new_context().await?);

    let nav = ctx
        .navigate(&opts.url, opts.navigation_timeout_ms)
        .await
        .with_context(|| format!("failed to open {}", opts.url))?;
    tracing::info!("Opened {} in {}ms", nav.final_url, nav.load_time_ms);

    let widgets = wait_for_widgets(
        &ctx,
        &titles,
        &config,
        Duration::from_millis(opts.settle_ms),
    )
    .await?;
    if widgets.is_empty() {
        let _ = ctx.close().await;
        renderer.shutdown().await?;
        bail!("no widget titled {} found on {}", titles.join(" | "), nav.final_url);
    }
    tracing::info!("Found {} widget(s)", widgets.len());

    // One run per widget, each with its own file; the widget's busy flag guards overlap.
    let runs = widgets.iter().enumerate().map(|(i, widget)| {
        let mut widget_config = config.clone();
        widget_config.export_filename = numbered_filename(&config.export_filename, i);
        let sink = &sink;
        async move {
            let result = export_widget(widget, sink, &widget_config, widget.busy()).await;
            (widget.title().to_string(), result)
        }
    });
    let results = futures::future::join_all(runs).await;

    let _ = ctx.close().await;
    renderer.shutdown().await?;

    let mut failures = Vec::new();
    for (title, result) in results {
        match result {
            Ok(summary) => print_summary(&title, &summary),
            Err(e) => {
                tracing::error!("Export of \"{title}\" failed: {e}");
                failures.push(format!("{title}: {e}"));
            }
        }
    }

    if !failures.is_empty() {
        bail!("{} export(s) failed: {}", failures.len(), failures.join("; "));
    }
    Ok(())
}
