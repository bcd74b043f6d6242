//! # Living Library Common Library
//!
//! Shared code for the Living Library service including:
//! - Domain models (fragments, links, verification requests)
//! - Facet aggregation and analytics shaping
//! - Configuration loading
//! - Database initialization
//! - Token hashing and upload signing

pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod facets;
pub mod models;
pub mod time;
pub mod tokens;

pub use error::{Error, ErrorKind, Result};
pub use facets::{FacetCount, FacetSummary};
pub use models::{Fragment, Link, MediaItem, MediaKind, Status, Visibility};
