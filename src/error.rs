//! Error types returned by the reader and writer.
//!
//! Every variant corresponds to one of the error kinds from the MVT decoding
//! model: malformed wire bytes, a geometry command stream that violates the
//! spec, an attribute read as the wrong type, an unsupported layer version,
//! or a table index that is out of range.

use std::fmt;

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// A decoding or encoding failure.
///
/// Variants are intentionally distinct rather than sharing a single
/// catch-all payload: callers that need to tell a truncated buffer apart
/// from an out-of-range table index can match on the kind directly.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Malformed protobuf wire bytes: truncated message, varint overflow, or
    /// an unknown field with a non-skippable wire type.
    #[error("{0}")]
    Format(String),

    /// The geometry command stream violates MVT spec section 4.3.
    #[error("{0}")]
    Geometry(String),

    /// An attribute or structured value was read as the wrong scalar kind.
    #[error("value has kind {actual}, expected {expected}")]
    Type {
        expected: &'static str,
        actual: &'static str,
    },

    /// The layer's `version` field is outside the supported range `{1, 2, 3}`.
    #[error("unsupported layer version {0}")]
    Version(u32),

    /// A table index referenced by a feature is out of bounds for that table.
    #[error("index {index} out of range for table of size {size} (layer {layer_num})")]
    OutOfRange {
        index: u64,
        size: usize,
        layer_num: Option<u32>,
    },
}

impl Error {
    pub(crate) fn format(msg: impl fmt::Display) -> Error {
        Error::Format(msg.to_string())
    }

    pub(crate) fn geometry(msg: impl fmt::Display) -> Error {
        Error::Geometry(msg.to_string())
    }

    pub(crate) fn out_of_range(index: u64, size: usize, layer_num: Option<u32>) -> Error {
        Error::OutOfRange {
            index,
            size,
            layer_num,
        }
    }
}
