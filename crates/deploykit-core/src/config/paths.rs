//! Default manifest and report locations.

use std::path::{Path, PathBuf};

pub const MANIFEST_FILE_NAME: &str = "deploy.toml";

pub fn default_manifest_path(project_root: &Path) -> PathBuf {
    project_root.join(MANIFEST_FILE_NAME)
}

/// `<data_local_dir>/deploykit/reports`, falling back to `<home>/.local/share`.
pub fn default_report_dir() -> anyhow::Result<PathBuf> {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(base.join("deploykit").join("reports"))
}
