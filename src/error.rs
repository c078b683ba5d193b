use thiserror::Error;

use crate::vision::DescribeError;

#[derive(Debug, Error)]
pub enum A11yError {
    #[error("Malformed document: {0}")]
    MalformedDocument(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Image XObject error: {0}")]
    ImageXObjectError(String),

    #[error("Structure tree error: {0}")]
    StructureError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Generates factory methods for [`A11yError`] variants that wrap a `String`.
macro_rules! error_constructors {
    ($(
        $(#[doc = $doc:expr])*
        $method:ident => $variant:ident
    ),* $(,)?) => {
        impl A11yError {
            $(
                $(#[doc = $doc])*
                pub fn $method(msg: impl Into<String>) -> Self {
                    Self::$variant(msg.into())
                }
            )*
        }
    };
}

error_constructors! {
    /// Create a malformed document error.
    malformed => MalformedDocument,
    /// Create a serialization error.
    serialization => SerializationError,
    /// Create an external service error.
    external_service => ExternalServiceError,
    /// Create an image XObject error.
    image_xobject => ImageXObjectError,
    /// Create a structure tree error.
    structure => StructureError,
    /// Create a configuration error.
    config => ConfigError,
    /// Create a storage error.
    storage => StorageError,
    /// Create a not-found error.
    not_found => NotFound,
}

impl From<lopdf::Error> for A11yError {
    fn from(e: lopdf::Error) -> Self {
        Self::MalformedDocument(e.to_string())
    }
}

impl From<serde_json::Error> for A11yError {
    fn from(e: serde_json::Error) -> Self {
        Self::ConfigError(e.to_string())
    }
}

impl From<serde_yml::Error> for A11yError {
    fn from(e: serde_yml::Error) -> Self {
        Self::ConfigError(e.to_string())
    }
}

impl From<DescribeError> for A11yError {
    fn from(e: DescribeError) -> Self {
        Self::ExternalServiceError(e.to_string())
    }
}

impl A11yError {
    /// Fatal errors are surfaced to the caller; everything else is absorbed
    /// into the completeness of the output.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::ExternalServiceError(_) | Self::ImageXObjectError(_) | Self::StructureError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, A11yError>;
