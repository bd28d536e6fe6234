//! Common utilities shared by the tilenav runtime and its tooling

mod geometry;

pub use geometry::*;

/// Represents a 3D position
pub type Vec3 = glam::Vec3;

/// Error types for the library
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid tile data: {0}")]
    InvalidTileData(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("navigation mesh error: {0}")]
    NavMesh(String),

    #[cfg(feature = "std")]
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for tilenav operations
pub type Result<T> = std::result::Result<T, Error>;
