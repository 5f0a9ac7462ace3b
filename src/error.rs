// src/error.rs
//! Decode error taxonomy.
//!
//! "Need more data" is deliberately absent: the framing gate reports it as
//! zero bytes consumed, not as an error, so callers can keep accumulating.

use thiserror::Error;

use crate::cursor::ShortRead;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SiError {
    /// Section framed correctly but failed the CRC check. `consumed` is the
    /// full framed length the caller must still discard to stay aligned.
    #[error("section failed CRC check, discard {consumed} bytes")]
    CrcMismatch { consumed: usize },

    /// A fixed field group or nested loop ran past the section body.
    #[error("section body shorter than its declared layout")]
    TruncatedSection,

    /// A descriptor's declared length ran past its enclosing block.
    #[error("descriptor overruns its enclosing block")]
    TruncatedDescriptor,

    /// SDT referenced a transport no NIT has announced.
    #[error("SDT references unknown transport {transport_id} on network {original_network_id}")]
    UnknownTransport {
        original_network_id: u16,
        transport_id: u16,
    },
}

/// A short read while walking a table body means the section lied about
/// its layout. Descriptor-level code maps `ShortRead` explicitly instead.
impl From<ShortRead> for SiError {
    fn from(_: ShortRead) -> Self {
        SiError::TruncatedSection
    }
}
