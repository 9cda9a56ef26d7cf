//! Catalog Janitor - keeps a media catalog in step with the files on disk.
//!
//! Scenes and galleries whose backing files are missing, outside every
//! library root, or matched by an exclusion pattern are removed together
//! with their relationship rows and generated artifacts.

pub mod clean;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod model;
#[cfg(test)]
pub mod test_utils;
