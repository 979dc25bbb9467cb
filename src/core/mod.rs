//! Catalog data model and resolution.

pub mod catalog;
pub mod resolver;
