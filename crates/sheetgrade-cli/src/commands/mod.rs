pub mod evaluate;
pub mod history;
pub mod init;
pub mod show;
pub mod validate;

use std::path::PathBuf;

use anyhow::Result;

use sheetgrade_strategies::config::{load_config_from, SheetgradeConfig};
use sheetgrade_store::JsonSessionStore;

/// Resolve the session store from the CLI flag or the config file.
pub fn open_store(
    store_flag: Option<PathBuf>,
    config_path: Option<&std::path::Path>,
) -> Result<(JsonSessionStore, SheetgradeConfig)> {
    let config = load_config_from(config_path)?;
    let dir = store_flag.unwrap_or_else(|| config.store_dir.clone());
    Ok((JsonSessionStore::new(dir), config))
}
