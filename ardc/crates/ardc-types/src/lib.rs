//! ardc-types - The Ard Type Model and Type Registry
//!
//! Types flow through every phase: the checker resolves them, the emitter
//! interns them into the program image's type table, and the VM consults
//! them for dispatch and `TypeName`. This crate owns the [`Type`] tree and
//! the interning [`TypeRegistry`] that gives each distinct type a stable
//! numeric identity.
//!
//! Identity is structural for compounds and nominal for declared types:
//! two `[Int]`s are the same type, two structs are the same type only if
//! they share a name. The registry interns by canonical description string,
//! so equality on registered types is an id comparison.

pub mod methods;
mod registry;
mod ty;

pub use methods::{
    BoolMethodKind, FloatMethodKind, IntMethodKind, ListMethodKind, MapMethodKind, MaybeMethodKind,
    MethodSig, ResultMethodKind, StrMethodKind,
};
pub use registry::{CanonicalIds, TypeId, TypeRegistry};
pub use ty::{EnumType, FnType, Parameter, StructType, TraitType, Type, UnionType};
