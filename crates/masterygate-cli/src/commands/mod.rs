pub mod analyze;
pub mod due;
pub mod evaluate;
pub mod init;
pub mod replay;
pub mod report;
pub mod submit;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use masterygate_core::catalog::{load_catalog, ConceptCatalog, StaticCatalog};
use masterygate_core::config::{load_config_from, EngineConfig};
use masterygate_core::engine::MasteryEngine;
use masterygate_store::FileStore;

/// Load the configured catalog, or an open one that accepts any concept.
pub fn catalog_for(config: &EngineConfig) -> Result<Arc<dyn ConceptCatalog>> {
    match &config.catalog_path {
        Some(path) => Ok(Arc::new(load_catalog(path)?)),
        None => {
            tracing::debug!("no catalog configured; accepting any concept id");
            Ok(Arc::new(StaticCatalog::open()))
        }
    }
}

/// Build an engine over the file store in the configured data directory.
pub fn open_engine(config_path: Option<&Path>) -> Result<MasteryEngine> {
    let config = load_config_from(config_path)?;
    let catalog = catalog_for(&config)?;
    let store = FileStore::open(&config.data_dir)
        .with_context(|| format!("failed to open data dir {}", config.data_dir.display()))?;
    Ok(MasteryEngine::new(config, Arc::new(store), catalog))
}

pub fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
