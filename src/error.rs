//! Error types for the DMARC rollout

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can stop a DMARC rollout
#[derive(Debug, Error)]
pub enum DmarcError {
    /// Neither an API token nor an email + global key pair was configured
    #[error("No valid Cloudflare credentials found")]
    MissingCredentials,

    /// A credential value cannot be sent as an HTTP header
    #[error("Credential value for {0} is not a valid HTTP header")]
    InvalidHeader(&'static str),

    /// The identity verification call was rejected
    #[error("Credential verification failed: {status}")]
    InvalidCredentials { status: u16, body: String },

    /// Transport-level failure talking to the API
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The env file exists but could not be read
    #[error("Failed to read env file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configured DMARC policy is not a valid tag list
    #[error("Invalid DMARC policy: {0}")]
    InvalidPolicy(String),

    /// The confirmation prompt could not be read
    #[error("Failed to read confirmation: {0}")]
    Prompt(String),
}

pub type Result<T> = std::result::Result<T, DmarcError>;
