// src/config/validate.rs

use tracing::debug;

use crate::config::model::{CatalogFile, RawCatalogFile};
use crate::dag::derive_tasks;
use crate::errors::{FieldflowError, Result};

impl TryFrom<RawCatalogFile> for CatalogFile {
    type Error = crate::errors::FieldflowError;

    fn try_from(raw: RawCatalogFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_catalog(&raw)?;
        let file = CatalogFile::new_unchecked(raw);
        validate_catalog_file(&file)?;
        Ok(file)
    }
}

fn validate_raw_catalog(cfg: &RawCatalogFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_tasks(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawCatalogFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(FieldflowError::ConfigError(
            "catalog must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_tasks(cfg: &RawCatalogFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        let def = task.to_def(name)?;
        task.runnable(name)?;

        if def.outputs.is_empty() {
            return Err(FieldflowError::ConfigError(format!(
                "task '{name}' declares no output fields"
            )));
        }

        if let Some(values) = &task.emit {
            for field in values.keys() {
                if !def.writes(field) {
                    return Err(FieldflowError::ConfigError(format!(
                        "task '{name}' emits field '{field}', which is not among its outputs"
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Semantic checks that need a populated catalog.
///
/// Registers the file into a scratch catalog (surfacing duplicate writers),
/// rejects task-graph cycles, and derives every scene so unknown fields are
/// reported at load time rather than at the first run.
pub fn validate_catalog_file(file: &CatalogFile) -> Result<()> {
    let catalog = file.to_catalog()?;
    catalog.validate()?;

    for scene in file.scenes.keys() {
        let nodes = derive_tasks(&catalog, scene)?;
        debug!(scene = %scene, tasks = nodes.len(), "scene derives cleanly");
    }

    Ok(())
}
