//! Error types for reading and writing MathML

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The markup is well-formed XML but not a formula this reader accepts.
    #[error("malformed MathML at byte {position}: {message}")]
    Malformed { position: usize, message: String },

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML attribute error: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("XML write error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl Error {
    pub(crate) fn malformed(position: usize, message: impl Into<String>) -> Self {
        Error::Malformed {
            position,
            message: message.into(),
        }
    }

    /// Shifts a position reported against a fragment to the enclosing document.
    pub(crate) fn offset_by(self, base: usize) -> Self {
        match self {
            Error::Malformed { position, message } => Error::Malformed {
                position: position + base,
                message,
            },
            other => other,
        }
    }
}
