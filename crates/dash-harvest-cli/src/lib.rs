//! dash-harvest CLI — export every page of dashboard tables through headless Chromium.

pub mod cli;
pub mod config;
pub mod dashboard;
pub mod renderer;

pub use config::{numbered_filename, resolve_out_dir};
pub use dashboard::{locate_widgets, wait_for_widgets, DashboardWidget};
