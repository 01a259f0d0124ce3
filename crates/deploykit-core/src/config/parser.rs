//! TOML parser with helpful error messages

use std::path::Path;

use anyhow::{Context, Result};

use super::schema::DeploymentManifest;

/// Parse a manifest file with detailed error messages
pub fn parse_manifest(path: &Path) -> Result<DeploymentManifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;

    parse_manifest_str(&content)
        .with_context(|| format!("Failed to parse manifest: {}", path.display()))
}

/// Parse manifest content from string
pub fn parse_manifest_str(content: &str) -> Result<DeploymentManifest> {
    let manifest: DeploymentManifest =
        toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;

    manifest.validate()?;

    Ok(manifest)
}

/// Attach the offending lines to a TOML error when a span is available
fn enhance_toml_error(error: toml::de::Error, content: &str) -> anyhow::Error {
    let message = error.message().to_string();
    let Some(span) = error.span() else {
        return anyhow::anyhow!("TOML parsing error: {}", message);
    };

    let line_num = content[..span.start.min(content.len())].matches('\n').count() + 1;
    anyhow::anyhow!(
        "TOML parsing error at line {}:\n{}\n\nError: {}",
        line_num,
        get_line_context(content, line_num),
        message
    )
}

/// Get context lines around an error
fn get_line_context(content: &str, line_num: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_num.saturating_sub(2);
    let end = (line_num + 2).min(lines.len());

    lines[start..end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let num = start + i + 1;
            let marker = if num == line_num { ">>>" } else { "   " };
            format!("{} {:4} | {}", marker, num, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Serialize a manifest to TOML string
pub fn to_toml(manifest: &DeploymentManifest) -> Result<String> {
    toml::to_string_pretty(manifest).with_context(|| "Failed to serialize manifest to TOML")
}
