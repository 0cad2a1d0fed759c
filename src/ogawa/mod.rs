//! Ogawa binary container and its object-model binding.
//!
//! ## File Structure
//!
//! ```text
//! +------------------+
//! | Magic: "Ogawa"   |  5 bytes
//! +------------------+
//! | Frozen flag      |  1 byte (0x00 while writing, 0xFF when done)
//! +------------------+
//! | Version          |  2 bytes (u16 BE, always 1)
//! +------------------+
//! | Root Group Pos   |  8 bytes (u64 LE)
//! +------------------+
//! | ... Data ...     |
//! +------------------+
//! ```
//!
//! Everything after the header is groups and data blobs. A group is a
//! `u64` child count followed by one `u64` reference per child; a data blob
//! is a `u64` length followed by its bytes. [`layout`] describes how the
//! object tree maps onto them.

mod abc_impl;
pub mod format;
pub mod layout;
mod read_util;
mod reader;
pub mod writer;

pub use abc_impl::{
    OgawaArchiveReader, OgawaArrayReader, OgawaCompoundReader, OgawaObjectReader,
    OgawaScalarReader,
};
pub use format::ChildKind;
pub use reader::{IArchive, IData, IGroup, IStreams, ReadMode, ReadOptions};
pub use writer::{
    FrozenGroup, OArchive, OArrayProperty, OCompoundProperty, OGroup, OObject, OScalarProperty,
    OStream, OgawaArchiveWriter, WriteOptions,
};
