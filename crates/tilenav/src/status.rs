//! Status codes for navigation mesh operations

use tilenav_common::Error;

/// Status enum for navigation mesh operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Operation was successful
    Success,
    /// Operation failed due to an unknown reason
    Failure,
    /// Provided parameter was invalid
    InvalidParam,
    /// Operation ran out of tile or polygon capacity
    OutOfMemory,
    /// Output buffer was too small and the result was truncated
    BufferTooSmall,
    /// Value already exists
    AlreadyExists,
    /// Value does not exist or is not found
    NotFound,
    /// Operation partially succeeded
    PartialResult,
    /// Input data is corrupted or invalid
    DataCorrupted,
    /// Data has wrong magic number
    WrongMagic,
    /// Data has wrong version
    WrongVersion,
}

impl Status {
    /// Checks if the status is a failure
    pub fn is_failure(&self) -> bool {
        *self != Status::Success && *self != Status::PartialResult
    }

    /// Checks if the status is a success
    pub fn is_success(&self) -> bool {
        *self == Status::Success || *self == Status::PartialResult
    }

    /// Converts the status into a library error
    ///
    /// Data errors map to `Error::InvalidTileData`, everything else to
    /// `Error::NavMesh`.
    pub fn into_error(self) -> Error {
        match self {
            Status::WrongMagic | Status::WrongVersion | Status::DataCorrupted => {
                Error::InvalidTileData(self.to_string())
            }
            _ => Error::NavMesh(self.to_string()),
        }
    }

    /// Converts the status into a library error with extra context
    pub fn with_context(self, context: impl std::fmt::Display) -> Error {
        match self.into_error() {
            Error::InvalidTileData(msg) => Error::InvalidTileData(format!("{msg}: {context}")),
            Error::NavMesh(msg) => Error::NavMesh(format!("{msg}: {context}")),
            other => other,
        }
    }
}

impl std::error::Error for Status {}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Success => write!(f, "Success"),
            Status::Failure => write!(f, "Failure"),
            Status::InvalidParam => write!(f, "Invalid parameter"),
            Status::OutOfMemory => write!(f, "Out of memory"),
            Status::BufferTooSmall => write!(f, "Buffer too small"),
            Status::AlreadyExists => write!(f, "Value already exists"),
            Status::NotFound => write!(f, "Value not found"),
            Status::PartialResult => write!(f, "Partial result"),
            Status::DataCorrupted => write!(f, "Data corrupted"),
            Status::WrongMagic => write!(f, "Wrong magic number"),
            Status::WrongVersion => write!(f, "Wrong version"),
        }
    }
}

impl From<Status> for Error {
    fn from(status: Status) -> Self {
        status.into_error()
    }
}
