//! Template engine errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template parse error: {0}")]
    Parse(String),

    #[error("Template render error: {0}")]
    Render(String),

    #[error("Template is not valid UTF-8: {0}")]
    InvalidEncoding(String),
}
