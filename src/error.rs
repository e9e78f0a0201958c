use std::fmt::{self, Debug, Display, Formatter};

use thiserror::Error;

/// Errors surfaced by the index façade.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ArtError {
    /// The key is already present with a different value. Use
    /// [`upsert`](crate::HybridArt::upsert) to replace it.
    #[error("key already present with a different value")]
    DuplicateKey,

    /// The allocator could not satisfy a node allocation.
    #[error("allocator is out of memory")]
    Oom,
}

impl From<OOMError> for ArtError {
    fn from(_: OOMError) -> Self {
        ArtError::Oom
    }
}

/// Out of memory error returned by [`Allocator`](crate::Allocator).
pub struct OOMError {}

impl OOMError {
    pub(crate) fn new() -> Self {
        Self {}
    }
}

impl Debug for OOMError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocator is out of memory!").finish()
    }
}

impl Display for OOMError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Allocator is out of memory!")
    }
}

impl std::error::Error for OOMError {}
