use std::path::Path;

use flowclone_config::load_config_file;
use flowclone_config::shared::CloneConfig;

use crate::error::{CliError, CliResult};

/// Loads and validates the clone configuration stored at `path`.
pub fn load_clone_config(path: &Path) -> CliResult<CloneConfig> {
    let config = load_config_file::<CloneConfig>(path).map_err(CliError::config)?;
    config.validate().map_err(CliError::config)?;

    Ok(config)
}
