//! Canonical documentation model

mod catalog_model;
mod codes;
mod elements;

pub use catalog_model::{CatalogModel, ALL_KINDS};
pub use codes::*;
pub use elements::*;
