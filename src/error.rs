use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The declared import format is neither `docx` nor `xlsx`.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The buffer is not a readable OOXML package or a required part is damaged.
    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    /// The package parsed but contained nothing that could be turned into a document.
    #[error("document contains no usable content")]
    NoUsableContent,

    /// Page offsets could not be threaded through the book. Blocks full-book render.
    #[error("pagination inconsistency: {0}")]
    PaginationInconsistency(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::CorruptArchive(e.to_string())
    }
}
