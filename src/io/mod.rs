//! Artifact I/O: mirrored downloads and archive extraction.

pub mod download;
pub mod extract;
