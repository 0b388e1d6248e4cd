//! # Teed Common Library
//!
//! Shared code for Teed services:
//! - Error and result types
//! - Configuration file model and root folder resolution
//! - SQLite pool initialization and schema creation

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
