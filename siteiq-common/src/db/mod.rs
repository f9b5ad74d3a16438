//! Database initialization shared by SiteIQ services

pub mod init;

pub use init::*;
