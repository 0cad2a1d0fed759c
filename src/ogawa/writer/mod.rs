//! Ogawa writer.
//!
//! Two levels:
//! - container: [`OArchive`], [`OGroup`] and [`OStream`] write raw groups
//!   and data blobs, children strictly before parents
//! - object model: [`OgawaArchiveWriter`] hands out [`OObject`] and
//!   property handles and lays the tree out on top of the container

mod archive;
mod constants;
mod group;
mod object;
mod property;
mod stream;
mod write_util;

pub use archive::OgawaArchiveWriter;
pub use constants::{
    library_version_string, WriteOptions, ALEMBIC_VERSION_KEY, APPLICATION_KEY, DESCRIPTION_KEY,
};
pub use group::{write_data, FrozenGroup, OArchive, OGroup};
pub use object::OObject;
pub use property::{OArrayProperty, OCompoundProperty, OScalarProperty};
pub use stream::{OStream, DEFAULT_BUFFER_CAPACITY};

#[cfg(test)]
mod tests;
