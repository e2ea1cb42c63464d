//! Node configuration loader.
//!
//! Reads `maestro.toml` from the given directory and deserializes it into
//! [`NodeConfig`]. Falls back to defaults when the file is missing or
//! malformed -- a bad config file never blocks startup.

use std::path::Path;

use maestro_types::config::NodeConfig;

/// Load node configuration from `{dir}/maestro.toml`.
///
/// - Missing file: returns [`NodeConfig::default()`].
/// - Unreadable or unparsable file: logs a warning and returns the default.
/// - Otherwise: returns the parsed config.
pub async fn load_node_config(dir: &Path) -> NodeConfig {
    let config_path = dir.join("maestro.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No maestro.toml found at {}, using defaults", config_path.display());
            return NodeConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return NodeConfig::default();
        }
    };

    match toml::from_str::<NodeConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            NodeConfig::default()
        }
    }
}
