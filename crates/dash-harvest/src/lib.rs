//! dash-harvest — pagination-aware extraction of dashboard tables into flat TSV exports.

pub mod config;
pub mod driver;
pub mod export;
pub mod extract;
pub mod html;
pub mod replay;
pub mod signature;
pub mod types;
pub mod widget;

pub use config::{HarvestConfig, PagerMarkers};
pub use driver::PaginationDriver;
pub use export::{export_widget, BusyFlag, ExportLocation, ExportSink, ExportSummary, FileSink, MemorySink};
pub use extract::{extract_rows, resolve_cell, CellLink, RawCell, RawTable};
pub use replay::ReplayWidget;
pub use signature::{await_signature_change, signature, ChangeOutcome};
pub use types::*;
pub use widget::{PageControl, Widget};
