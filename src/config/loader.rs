// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::Catalog;
use crate::config::model::{CatalogFile, RawCatalogFile};
use crate::errors::Result;

/// Load a catalog file from a given path and return the raw `RawCatalogFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawCatalogFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let raw: RawCatalogFile = toml::from_str(&contents)?;

    Ok(raw)
}

/// Load a catalog file from path and validate it.
///
/// Checks for:
/// - tasks with a missing or ambiguous runnable (`cmd` / `emit`),
/// - unknown output roles and undeclared emitted fields,
/// - duplicate field writers,
/// - task-graph cycles,
/// - scenes that reference fields nobody writes.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<CatalogFile> {
    let raw = load_from_path(&path)?;
    let file = CatalogFile::try_from(raw)?;
    Ok(file)
}

/// Load, validate and register a catalog file into a fresh [`Catalog`].
pub fn load_catalog(path: impl AsRef<Path>) -> Result<Catalog> {
    load_and_validate(path)?.to_catalog()
}

/// Default catalog path: `Fieldflow.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Fieldflow.toml")
}
