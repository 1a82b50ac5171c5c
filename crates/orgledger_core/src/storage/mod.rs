//! Image storage boundary used by the employee service.
//!
//! The core only needs two things from a store: put bytes under a generated
//! name and hand back a relative reference, and delete by that reference.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod local;

pub use local::LocalImageStore;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug)]
pub enum StorageError {
    /// Upload carried no bytes.
    Empty,
    TooLarge { size: u64, max: u64 },
    UnsupportedExtension(String),
    /// Reference not produced by this store.
    InvalidReference(String),
    Io(std::io::Error),
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "image upload is empty"),
            Self::TooLarge { size, max } => {
                write!(f, "image of {size} bytes exceeds the {max} byte limit")
            }
            Self::UnsupportedExtension(ext) => {
                write!(f, "image extension `{ext}` is not allowed")
            }
            Self::InvalidReference(reference) => {
                write!(f, "invalid image reference `{reference}`")
            }
            Self::Io(err) => write!(f, "image storage io error: {err}"),
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Image bytes supplied alongside an employee create or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    /// Client-side file name; only its extension is used.
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

/// Binary store for profile images.
pub trait ImageStore {
    /// Stores `bytes` under a generated name and returns its relative
    /// reference.
    fn store(&self, original_name: &str, bytes: &[u8]) -> StorageResult<String>;

    /// Removes the file behind `reference`. Missing files are not an error.
    fn delete(&self, reference: &str) -> StorageResult<()>;
}
