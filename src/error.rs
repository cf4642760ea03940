//! Error types for asset resolution and scene composition.

use std::sync::Arc;
use thiserror::Error;

/// Result type alias using RenderError.
pub type Result<T> = std::result::Result<T, RenderError>;

/// Main error type for the asset pipeline.
///
/// Absent assets are not errors: loaders return `Ok(None)` once every
/// fallback attempt came back 404.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Non-404 HTTP status or network failure while fetching an asset.
    #[error("Transport error for {url}: {message}")]
    Transport {
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// Failed to read or parse a ZIP archive.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Failed to parse JSON data.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to read or process an image.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid asset key string.
    #[error("Invalid asset key: {0}")]
    InvalidKey(String),

    /// Model parent chain loops back onto itself.
    #[error("Model inheritance cycle: {0}")]
    ModelCycle(String),

    /// Instance-only operation on an object that never opted into instancing.
    #[error("Object {0} is not instanced")]
    NotInstanced(String),

    /// Instance slot does not exist or was released.
    #[error("Object {object} has no live instance slot {slot}")]
    InvalidSlot { object: String, slot: usize },

    /// Instanced object reached its configured slot cap.
    #[error("Object {object} reached its instance capacity of {capacity}")]
    InstanceCapacity { object: String, capacity: usize },

    /// Operation on an object after `dispose()`.
    #[error("Object {0} was disposed")]
    Disposed(String),

    /// Failed to build texture atlas.
    #[error("Atlas building error: {0}")]
    AtlasBuild(String),

    /// Error produced by a single-flight future and observed by several callers.
    #[error(transparent)]
    Shared(Arc<RenderError>),
}

impl RenderError {
    pub(crate) fn transport(url: &str, status: Option<u16>, message: impl Into<String>) -> Self {
        RenderError::Transport {
            url: url.to_string(),
            status,
            message: message.into(),
        }
    }

    /// Whether this error reports a programming-contract violation.
    pub fn is_invariant_violation(&self) -> bool {
        match self {
            RenderError::NotInstanced(_)
            | RenderError::InvalidSlot { .. }
            | RenderError::InstanceCapacity { .. }
            | RenderError::Disposed(_) => true,
            RenderError::Shared(inner) => inner.is_invariant_violation(),
            _ => false,
        }
    }

    /// Whether this error came from the transport layer.
    pub fn is_transport(&self) -> bool {
        match self {
            RenderError::Transport { .. } => true,
            RenderError::Shared(inner) => inner.is_transport(),
            _ => false,
        }
    }
}

impl From<Arc<RenderError>> for RenderError {
    fn from(err: Arc<RenderError>) -> Self {
        RenderError::Shared(err)
    }
}
