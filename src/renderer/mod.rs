//! Renderer - Virtual trees to host mutations.
//!
//! - [`vnode`] - Virtual node descriptions
//! - [`host`] - The output tree interface
//! - [`patch`] - Mount / patch / unmount
//! - [`children`] - Keyed children reconciliation
//! - [`lis`] - Longest increasing subsequence for minimal moves
//! - [`class`] - `class` value normalization
//! - [`memory`] - Headless in-memory host

pub mod children;
pub mod class;
pub mod host;
pub mod lis;
pub mod memory;
pub mod patch;
pub mod vnode;

pub use class::normalize_class;
pub use host::{Host, NodeHandle};
pub use lis::longest_increasing_subsequence;
pub use memory::{HostOp, MemoryHost};
pub use patch::{Renderer, RendererConfig};
pub use vnode::{Children, Props, ShapeFlags, SlotFn, Slots, VKey, VNode, VNodeKind};
