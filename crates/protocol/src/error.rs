//! Protocol error types

use thiserror::Error;

/// Errors raised while decoding a descriptor stream
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A record declared a length that cannot hold its own header
    #[error("Descriptor record at offset {offset} is too short: length {length}")]
    RecordTooShort { offset: usize, length: usize },

    /// A record declared more bytes than the stream has left
    #[error(
        "Truncated descriptor record at offset {offset}: declared {declared} bytes, {remaining} remaining"
    )]
    Truncated {
        offset: usize,
        declared: usize,
        remaining: usize,
    },

    /// A record is shorter than the fixed layout of its descriptor type
    #[error("{descriptor} descriptor too short: needed {needed} bytes, got {actual}")]
    DescriptorTooShort {
        descriptor: &'static str,
        needed: usize,
        actual: usize,
    },
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;
