//! Renderer errors.
//!
//! Recoverable misuse (missing emit handler, writes to props, readonly
//! writes) is logged with `tracing::warn!` and never reaches here. These
//! variants are programmer errors that leave a render incomplete.

use thiserror::Error;

use crate::renderer::{NodeHandle, VKey};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// Two siblings in one children list share a key.
    #[error("duplicate key {key:?} among sibling nodes")]
    DuplicateKey { key: VKey },

    /// A virtual node that is already live was mounted again.
    #[error("virtual node is already mounted")]
    AlreadyMounted,

    /// The host doesn't know this node.
    #[error("host node {node:?} is not tracked by the host")]
    UnknownNode { node: NodeHandle },

    /// A node that was expected to be live has no realized host node or
    /// component instance.
    #[error("virtual node was patched but never mounted")]
    NotMounted,
}

pub type Result<T> = std::result::Result<T, RenderError>;
