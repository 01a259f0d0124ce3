//! Deployment manifest (`deploy.toml`) schema, parsing and default paths.

pub mod parser;
pub mod paths;
pub mod schema;

pub use parser::{parse_manifest, parse_manifest_str, to_toml};
pub use paths::{default_manifest_path, default_report_dir};
pub use schema::{DeploymentManifest, DeploymentPolicy};
