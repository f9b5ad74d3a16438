//! # SiteIQ Common Library
//!
//! Shared code for the SiteIQ scoring service:
//! - Error taxonomy (`Error`, `Result`)
//! - Service configuration loading
//! - Database initialization and table definitions
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
