use thiserror::Error;

#[derive(Debug, Error)]
pub enum OleError {
    #[error("invalid header: {0}")]
    InvalidHeader(HeaderErrorType),
    #[error("invalid property stream: {0}")]
    InvalidPropertyStream(String),
    #[error("invalid directory entry field {0}: {1}")]
    InvalidDirectoryEntry(&'static str, String),
    #[error("directory entry not found")]
    DirectoryEntryNotFound,
    #[error("directory entry {0} is not a stream")]
    NotAStream(usize),
    #[error("unexpected end of data: {0}")]
    UnexpectedEof(String),
    #[error("error unpacking structure: {0}")]
    Packing(#[from] packed_struct::PackingError),
    #[error("io error: {0}")]
    StdIo(#[from] std::io::Error),
}

impl OleError {
    /// Structural problems that abort a parse: bad magic or bad reserved bytes.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            OleError::InvalidHeader(HeaderErrorType::WrongMagicBytes(_))
                | OleError::InvalidPropertyStream(_)
        )
    }
}

#[derive(Debug, Error)]
pub enum HeaderErrorType {
    #[error("wrong magic bytes: {0:x?}")]
    WrongMagicBytes(Vec<u8>),
    #[error("not enough bytes, expected {0} but got {1}")]
    NotEnoughBytes(usize, usize),
    #[error("error parsing field {0}: {1}")]
    Parsing(&'static str, String),
}
