//! Error types and handling for `Weathercast`

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Machine-readable classification of a [`WeathercastError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Transport,
    NotFound,
    EmptyResult,
    MalformedResult,
    Timeout,
    Cancelled,
    Provider,
    InvalidResponse,
    MissingCredential,
    Validation,
    Config,
    Io,
}

/// Main error type for the `Weathercast` application
#[derive(Error, Debug)]
pub enum WeathercastError {
    /// The HTTP call failed or returned a non-success status
    #[error("{message}")]
    Transport { message: String },

    /// Geocoding returned zero matches
    #[error("Location \"{query}\" not found.")]
    NotFound { query: String },

    /// The video job finished without producing any video
    #[error("No videos were generated.")]
    EmptyResult,

    /// The video job produced a video without a retrievable location
    #[error("Generated video is missing a URI.")]
    MalformedResult,

    /// The video job did not finish within its polling budget
    #[error("Video generation timed out after {attempts} polls ({elapsed:?})")]
    Timeout { elapsed: Duration, attempts: u32 },

    /// The run was superseded or reset
    #[error("Run cancelled")]
    Cancelled,

    /// A generation API reported an error
    #[error("Provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    /// A response body could not be decoded or is inconsistent
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    /// No API key has been selected
    #[error("No API key selected")]
    MissingCredential,

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl WeathercastError {
    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a new not-found error for a geocoding query
    pub fn not_found<S: Into<String>>(query: S) -> Self {
        Self::NotFound {
            query: query.into(),
        }
    }

    /// Create a new provider error
    pub fn provider<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Provider {
            status,
            message: message.into(),
        }
    }

    /// Create a new invalid-response error
    pub fn invalid_response<S: Into<String>>(message: S) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Transport { .. } => ErrorCode::Transport,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::EmptyResult => ErrorCode::EmptyResult,
            Self::MalformedResult => ErrorCode::MalformedResult,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::Provider { .. } => ErrorCode::Provider,
            Self::InvalidResponse { .. } => ErrorCode::InvalidResponse,
            Self::MissingCredential => ErrorCode::MissingCredential,
            Self::Validation { .. } => ErrorCode::Validation,
            Self::Config { .. } => ErrorCode::Config,
            Self::Io { .. } => ErrorCode::Io,
        }
    }

    /// Get a user-friendly error message
    ///
    /// Falls back to a generic text when the error carries no message.
    #[must_use]
    pub fn user_message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            "An unknown error occurred.".to_string()
        } else {
            message
        }
    }
}

impl From<reqwest::Error> for WeathercastError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::invalid_response(err.to_string())
        } else {
            Self::transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for WeathercastError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_response(err.to_string())
    }
}
