// src/config/mod.rs

//! Catalog files.
//!
//! A catalog file is a TOML description of inputs, tasks and scenes, used to
//! populate a [`Catalog`](crate::catalog::Catalog) without writing Rust:
//! - `model.rs` defines the TOML-backed data model.
//! - `loader.rs` reads a file from disk.
//! - `validate.rs` turns a raw file into a validated `CatalogFile`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_catalog, load_from_path};
pub use model::{CatalogFile, InputsSection, RawCatalogFile, SceneConfig, TaskConfig};
pub use validate::validate_catalog_file;
