//! Export action: harvest a widget, then hand the flattened text to a sink.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::HarvestConfig;
use crate::driver::PaginationDriver;
use crate::types::{HarvestError, HarvestResult, StopReason};
use crate::widget::Widget;

/// Where an export ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportLocation {
    File(PathBuf),
    Memory(String),
}

/// Destination for finished exports. One call per run, no append semantics.
pub trait ExportSink: Send + Sync {
    fn export(&self, content: &str, filename: &str) -> HarvestResult<ExportLocation>;
}

/// Writes each export as a UTF-8 file inside a directory.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ExportSink for FileSink {
    fn export(&self, content: &str, filename: &str) -> HarvestResult<ExportLocation> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(filename);
        let tmp = self.dir.join(format!(".{filename}.tmp"));
        std::fs::write(&tmp, content.as_bytes())?;
        std::fs::rename(&tmp, &path)?;
        tracing::info!("Wrote {} bytes to {}", content.len(), path.display());
        Ok(ExportLocation::File(path))
    }
}

/// Keeps exports in memory, newest last.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    exports: Arc<Mutex<Vec<(String, String)>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All `(filename, content)` pairs exported so far.
    pub fn exports(&self) -> Vec<(String, String)> {
        self.exports
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl ExportSink for MemorySink {
    fn export(&self, content: &str, filename: &str) -> HarvestResult<ExportLocation> {
        let mut guard = self
            .exports
            .lock()
            .map_err(|_| HarvestError::Widget("memory sink lock poisoned".to_string()))?;
        guard.push((filename.to_string(), content.to_string()));
        Ok(ExportLocation::Memory(filename.to_string()))
    }
}

/// Busy indicator for one widget's export trigger.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag {
    busy: Arc<AtomicBool>,
}

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Mark busy, or fail with [`HarvestError::Busy`] if already marked.
    pub fn acquire(&self) -> HarvestResult<BusyGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| HarvestError::Busy)?;
        Ok(BusyGuard {
            busy: Arc::clone(&self.busy),
        })
    }
}

/// Clears the busy flag when dropped.
#[derive(Debug)]
pub struct BusyGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Result of a successful export action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSummary {
    pub location: ExportLocation,
    pub rows: usize,
    pub pages_visited: usize,
    /// Set when the page ceiling cut the run short.
    pub partial: bool,
}

/// Run one export: harvest every page of `widget` and write the result to `sink`.
///
/// Zero collected rows (or only blank text) is [`HarvestError::EmptyResult`]
/// and nothing is written. Hitting the page ceiling still writes what was
/// collected and marks the summary as partial.
pub async fn export_widget(
    widget: &dyn Widget,
    sink: &dyn ExportSink,
    config: &HarvestConfig,
    busy: &BusyFlag,
) -> HarvestResult<ExportSummary> {
    let _guard = busy.acquire()?;
    tracing::info!("Export started ({})", config.export_filename);

    let driver = PaginationDriver::new(config);
    let report = driver.collect_all(widget).await?;

    let content = report.to_tsv();
    if content.trim().is_empty() {
        return Err(HarvestError::EmptyResult);
    }

    let partial = report.stop == StopReason::PageLimit;
    if partial {
        let warning = HarvestError::PageLimitExceeded {
            pages: report.pages_visited,
            rows: report.rows.len(),
        };
        tracing::warn!("{warning}; exporting partial result");
    }

    let location = sink.export(&content, &config.export_filename)?;
    tracing::info!(
        "Export finished: {} rows from {} pages ({:?})",
        report.rows.len(),
        report.pages_visited,
        report.stop
    );

    Ok(ExportSummary {
        location,
        rows: report.rows.len(),
        pages_visited: report.pages_visited,
        partial,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_sink_replaces_previous_export() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("out"));

        sink.export("old\tcontent\nmore", "all_dialogs.txt").unwrap();
        let location = sink.export("A\t1", "all_dialogs.txt").unwrap();

        let path = dir.path().join("out").join("all_dialogs.txt");
        assert_eq!(location, ExportLocation::File(path.clone()));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "A\t1");
        assert!(!dir.path().join("out").join(".all_dialogs.txt.tmp").exists());
    }

    #[test]
    fn test_memory_sink_records_exports() {
        let sink = MemorySink::new();
        sink.export("x", "a.txt").unwrap();
        sink.export("y", "b.txt").unwrap();
        assert_eq!(
            sink.exports(),
            vec![
                ("a.txt".to_string(), "x".to_string()),
                ("b.txt".to_string(), "y".to_string())
            ]
        );
    }

    #[test]
    fn test_busy_flag_rejects_second_acquire() {
        let flag = BusyFlag::new();
        let guard = flag.acquire().unwrap();
        assert!(flag.is_busy());
        assert!(matches!(flag.acquire(), Err(HarvestError::Busy)));
        drop(guard);
        assert!(!flag.is_busy());
        assert!(flag.acquire().is_ok());
    }
}
