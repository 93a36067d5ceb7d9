//! Output location resolution.

use std::path::{Path, PathBuf};

/// Resolve the export directory: explicit flag, then `DASH_HARVEST_OUT_DIR`, then the cwd.
pub fn resolve_out_dir(explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }

    if let Ok(env_dir) = std::env::var("DASH_HARVEST_OUT_DIR") {
        let env_dir = env_dir.trim();
        if !env_dir.is_empty() {
            return PathBuf::from(env_dir);
        }
    }

    PathBuf::from(".")
}

/// File name for the `index`-th widget of a run: `all_dialogs.txt`, `all_dialogs_2.txt`, ...
pub fn numbered_filename(base: &str, index: usize) -> String {
    if index == 0 {
        return base.to_string();
    }
    let n = index + 1;
    match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{n}.{ext}"),
        _ => format!("{base}_{n}"),
    }
}
