//! Backend-independent object model.
//!
//! - [`TimeSampling`] and [`SampleSelector`] map sample indices to time
//! - [`MetaData`], [`ObjectHeader`], [`PropertyHeader`] describe the tree
//! - reader traits ([`ArchiveReader`], [`ObjectReader`], ...) every backend
//!   and the layered view implement
//! - [`SlabCache`] shares decoded array samples between readers

mod cache;
mod header;
mod metadata;
mod sample;
mod time_sampling;
mod traits;

pub(crate) use cache::{split_strings, split_wide_strings};
pub use cache::{compute_digest, ContentKey, SampleDigest, Slab, SlabCache, SlabKey};
pub use header::{ObjectHeader, PropertyHeader, PropertyType};
pub use metadata::MetaData;
pub use sample::{SampleInterp, SampleSelector};
pub use time_sampling::{
    Chrono, TimeSampling, TimeSamplingType, ACYCLIC_TIME_PER_CYCLE, CHRONO_EPSILON, NON_TIME,
};
pub use traits::{
    ArchiveReader, ArrayPropertyReader, CompoundPropertyReader, ObjectReader, PropertyReader,
    SampledPropertyReader, ScalarPropertyReader,
};
