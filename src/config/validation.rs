//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the served root exists and is a directory
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure apart from the metadata lookup of `dir`

use std::path::PathBuf;

use crate::config::schema::ServerConfig;

/// A semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("host must not be empty")]
    EmptyHost,
    #[error("directory {0:?} does not exist")]
    MissingDir(PathBuf),
    #[error("{0:?} is not a directory")]
    NotADir(PathBuf),
}

/// Check `config`, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }

    match std::fs::metadata(&config.dir) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => errors.push(ValidationError::NotADir(config.dir.clone())),
        Err(_) => errors.push(ValidationError::MissingDir(config.dir.clone())),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
