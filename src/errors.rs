// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the re-rendering pipeline
//!
//! Errors fall into two groups. Initialization and resource-creation failures
//! poison the whole rasterization surface, so a run cannot continue past them.
//! Input-validation and render failures are reported per call; the driver skips
//! the offending target setting and carries on with the next one.

use thiserror::Error;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main error type
#[derive(Debug, Clone, Error)]
pub enum AppError {
    /// GPU context/device could not be created
    #[error("Initialization failed: {0}")]
    Initialization(String),
    /// Shader compile/link failure or incomplete framebuffer
    #[error("Resource creation failed: {0}")]
    ResourceCreation(String),
    /// Empty or mismatched inputs, missing uploads
    #[error("Invalid input: {0}")]
    InputValidation(String),
    /// A single render-and-readback attempt failed
    #[error("Render failed: {0}")]
    Render(String),
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
    /// Filesystem and codec errors
    #[error("I/O error: {0}")]
    Io(String),
}

impl AppError {
    /// Whether this error invalidates the whole run rather than one target setting
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            AppError::Initialization(_) | AppError::ResourceCreation(_) | AppError::Config(_)
        )
    }

    pub fn input(msg: impl Into<String>) -> Self {
        AppError::InputValidation(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        AppError::Render(msg.into())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}
