//! Theme engine error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThemeError {
    /// No template with this name is loaded
    #[error("Template not found: {0}")]
    NotFound(String),

    /// Template parsing or rendering error, with its source chain
    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
