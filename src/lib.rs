//! # alembic-core
//!
//! Storage core for hierarchical, time-sampled scene graphs in the Alembic
//! (.abc) Ogawa format: the binary container, the object model on top of
//! it, time sampling lookups, and layering of several archives into one tree.
//!
//! ## Modules
//!
//! - [`util`] - Basic types (POD, DataType, Dimensions, errors)
//! - [`ogawa`] - Ogawa container and its object-model readers and writers
//! - [`core`] - Reader traits, headers, metadata, time sampling, slab cache
//! - [`layer`] - Layered view over several archives
//! - [`abc`] - High-level API (IArchive, IObject, properties, schemas)
//!
//! ## Example
//!
//! ```ignore
//! use alembic_core::abc::IArchive;
//!
//! let archive = IArchive::open("animation.abc")?;
//! for child in archive.getTop()?.getChildren() {
//!     println!("{}", child?.getName());
//! }
//! ```

pub mod abc;
pub mod core;
pub mod layer;
pub mod ogawa;
pub mod util;

// Re-export commonly used types
pub use util::{DataType, Error, ErrorKind, PlainOldDataType, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::abc::schema::{ErrorPolicy, ISchema, OSchema, SchemaMatching, SchemaTraits};
    pub use crate::abc::{
        IArchive, IArrayProperty, ICompoundProperty, IObject, IScalarProperty, OArchive,
        OArrayProperty, OCompoundProperty, OObject, OScalarProperty, WriteOptions,
    };
    pub use crate::core::{MetaData, SampleSelector, TimeSampling};
    pub use crate::ogawa::ReadOptions;
    pub use crate::util::{DataType, Dimensions, Error, ErrorKind, PlainOldDataType, Result};
}
