use std::io;

use quick_xml::events::attributes::AttrError;
use thiserror::Error;

use crate::data::osm::{ElementKind, OsmId};

/// Failure of a parse or of the cache pipeline around it.
///
/// The first four variants describe the document itself. A parse that fails
/// with any of them returns no graph at all.
#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed document at byte {position}: {message}")]
    MalformedDocument { position: usize, message: String },

    #[error("{element} at byte {position} has no usable id attribute")]
    MissingIdentifier { element: ElementKind, position: usize },

    #[error("node {node} at byte {position} has no usable {attribute} attribute")]
    MissingCoordinate {
        node: OsmId,
        attribute: &'static str,
        position: usize,
    },

    #[error("{element} {id} at byte {position} has a child without a usable ref attribute")]
    InvalidReference {
        element: ElementKind,
        id: OsmId,
        position: usize,
    },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("graph cache error: {0}")]
    Cache(String),
}

impl Error {
    pub(crate) fn malformed(position: usize, message: impl Into<String>) -> Self {
        Error::MalformedDocument {
            position,
            message: message.into(),
        }
    }

    /// Whether the error describes the input document rather than the
    /// environment around it.
    pub fn is_document_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedDocument { .. }
                | Error::MissingIdentifier { .. }
                | Error::MissingCoordinate { .. }
                | Error::InvalidReference { .. }
        )
    }
}

// quick-xml errors carry no position of their own; the reader attaches one
// through `Error::malformed` where it knows it.
impl From<quick_xml::Error> for Error {
    fn from(value: quick_xml::Error) -> Self {
        Error::malformed(0, value.to_string())
    }
}

impl From<AttrError> for Error {
    fn from(value: AttrError) -> Self {
        Error::malformed(0, value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
