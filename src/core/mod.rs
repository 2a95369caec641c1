//! Core types shared across APM's resolution, discovery, and compilation
//! pipeline: the primitive model (C1), its container, and the error kinds
//! used at public boundaries.

pub mod collection;
pub mod error;
pub mod primitive;

pub use collection::{Conflict, PrimitiveCollection};
pub use error::{ApmError, Severity};
pub use primitive::{Primitive, PrimitiveCommon, PrimitiveType, Source};
