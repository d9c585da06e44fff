//! # Transpose Common Library
//!
//! Shared code for the Transpose service:
//! - Domain model (providers, element references, metadata, records)
//! - Configuration loading
//! - Common error types

pub mod config;
pub mod error;
pub mod model;

pub use error::{Error, Result};
pub use model::{ElementType, LinkId, ProviderId};
