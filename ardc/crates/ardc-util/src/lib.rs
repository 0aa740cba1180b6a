//! ardc-util - Core Utilities and Foundation Types
//!
//! Foundation types shared by every phase of the ardc pipeline:
//!
//! - [`Span`] / [`FileId`] / [`SourceMap`]: source location tracking
//! - [`Symbol`]: interned string handles with O(1) comparison
//! - [`Idx`] / [`IndexVec`] / [`define_idx!`]: typed index spaces
//! - [`diagnostic`]: error and warning collection
//!
//! These are deliberately small, allocation-light building blocks. The
//! interner is global and thread-safe because fibers run the VM on host
//! threads and both the checker and the runtime intern names.

pub mod diagnostic;
mod index_vec;
mod span;
mod symbol;

pub use diagnostic::{Diagnostic, DiagnosticCode, Handler, Level};
pub use index_vec::{Idx, IndexVec};
pub use span::{FileId, SourceMap, Span};
pub use symbol::Symbol;

// Re-export commonly used hashers
pub use rustc_hash::FxHashMap;
pub use rustc_hash::FxHashSet;
