//! Basic types shared by every layer.
//!
//! - [`PlainOldDataType`] and [`DataType`] describe sample elements
//! - [`Dimensions`] describes array sample shapes
//! - [`Error`] / [`Result`] for error handling

mod data_type;
mod dimensions;
mod error;
mod pod;

pub use data_type::*;
pub use dimensions::*;
pub use error::*;
pub use pod::*;
