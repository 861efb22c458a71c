//! Error Types
//!
//! Every fallible operation in this crate returns one of these values; nothing
//! panics or unwinds for control flow.
//!
//! - [`ParcelError`]: a single buffer primitive failed
//! - [`EncodeError`] / [`DecodeError`]: a multi-field encode or decode aborted,
//!   naming the wire field whose primitive failed
//! - [`NotInitialized`]: a handle is missing its session or remote handle
//! - [`StatusError`]: a call into a collaborator (session, producer) failed

use std::fmt;

use thiserror::Error;

// =============================================================================
// Buffer Primitive Errors
// =============================================================================

/// Failure of a single parcel read or write
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParcelError {
    /// Read past the end of the written data
    #[error("not enough data: need {needed} bytes, {available} available")]
    NotEnoughData {
        /// Bytes the read required
        needed: usize,
        /// Bytes left after the read position
        available: usize,
    },

    /// Write would grow the parcel past its configured limit
    #[error("parcel capacity exceeded: {requested} bytes requested (limit: {limit})")]
    CapacityExceeded {
        /// Total data size the write would have produced
        requested: usize,
        /// Configured maximum data size
        limit: usize,
    },

    /// A non-null reference was required but the wire held a null one
    #[error("unexpected null object reference")]
    UnexpectedNull,

    /// Object reference kind word is not one we know
    #[error("unknown object kind {0:#x}")]
    BadObjectKind(u32),

    /// Object reference points past the parcel's object table
    #[error("object index {0} is not in the object table")]
    BadObjectIndex(u32),

    /// Scalar value outside its domain (e.g. a boolean that is neither 0 nor 1)
    #[error("bad value: {0}")]
    BadValue(String),

    /// Reference decoded fine but does not implement the requested interface
    #[error("bad interface type: expected {expected}, found {found}")]
    BadType {
        /// Interface the caller asked for
        expected: String,
        /// Descriptor carried by the reference
        found: String,
    },
}

// =============================================================================
// Protocol Errors
// =============================================================================

/// Fields of the surface control wire format, in wire order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WireField {
    /// Leading presence flag of the nullable form
    Presence,
    /// Session interface reference
    Session,
    /// Remote layer handle
    Handle,
    /// Buffer producer interface reference
    Producer,
    /// Layer id
    LayerId,
    /// Transform hint
    TransformHint,
}

impl fmt::Display for WireField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Presence => "presence flag",
            Self::Session => "session",
            Self::Handle => "handle",
            Self::Producer => "producer",
            Self::LayerId => "layer id",
            Self::TransformHint => "transform hint",
        };
        f.write_str(name)
    }
}

/// Encoding a handle failed; bytes already written are invalid
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("failed to encode {field}: {source}")]
pub struct EncodeError {
    /// Field whose write failed
    pub field: WireField,
    /// Underlying buffer failure
    #[source]
    pub source: ParcelError,
}

impl EncodeError {
    /// Adapter for `map_err` that tags a buffer failure with its field
    pub(crate) fn at(field: WireField) -> impl FnOnce(ParcelError) -> Self {
        move |source| Self { field, source }
    }
}

/// Decoding a handle failed; the parcel's read position is undefined
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("failed to decode {field}: {source}")]
pub struct DecodeError {
    /// Field whose read failed
    pub field: WireField,
    /// Underlying buffer failure
    #[source]
    pub source: ParcelError,
}

impl DecodeError {
    /// Adapter for `map_err` that tags a buffer failure with its field
    pub(crate) fn at(field: WireField) -> impl FnOnce(ParcelError) -> Self {
        move |source| Self { field, source }
    }
}

// =============================================================================
// Status Errors
// =============================================================================

/// Handle is missing its session or its remote handle
#[derive(Clone, Copy, Debug, Default, Error, PartialEq, Eq)]
#[error("surface control is not initialized")]
pub struct NotInitialized;

/// Failure reported by a collaborator call
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StatusError {
    /// Precondition failed before the call was made
    #[error("surface control is not initialized")]
    NotInitialized,

    /// The remote side has gone away
    #[error("remote object is dead")]
    DeadObject,

    /// The remote side rejected an argument
    #[error("bad value: {0}")]
    BadValue(String),

    /// The call could not be delivered or completed
    #[error("transaction failed: {0}")]
    FailedTransaction(String),
}

impl From<NotInitialized> for StatusError {
    fn from(_: NotInitialized) -> Self {
        Self::NotInitialized
    }
}
