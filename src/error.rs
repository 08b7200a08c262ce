// src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Conditions the loader reports at its boundaries (startup, per archive, run).
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Directory '{}' not found.", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("No .tar.xz files found in '{}'.", .0.display())]
    NoArchivesFound(PathBuf),

    #[error("No CSV file found in {archive}.")]
    MemberMissing { archive: String },

    #[error("Error processing {archive}: {source:#}")]
    PerFile {
        archive: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Database connection failed: {0:#}")]
    Connection(#[source] anyhow::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl LoadError {
    /// Remediation hint printed next to the error, if there is one.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            LoadError::Connection(_) => {
                Some("Please check your .env file and ensure the database exists.")
            }
            LoadError::Config(_) => Some("Check the DB_* variables in your environment or .env."),
            _ => None,
        }
    }
}
