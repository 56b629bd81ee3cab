//! Error types and handling for Helios
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for Helios operations
pub type Result<T> = std::result::Result<T, HeliosError>;

/// Main error type for Helios
#[derive(Debug, Error)]
pub enum HeliosError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Host state store errors (missing datapoint, rejected write)
    #[error("State store error: {message}")]
    Store { message: String },

    /// HTTP/Web server errors
    #[error("Web server error: {message}")]
    Web { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Network-related errors
    #[error("Network error: {message}")]
    Network { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl HeliosError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new state store error
    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create a new web error
    pub fn web<S: Into<String>>(message: S) -> Self {
        Self::Web {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for HeliosError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for HeliosError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for HeliosError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for HeliosError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}
