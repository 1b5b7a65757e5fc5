//! Common error types

use protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A kernel call failed; the errno is kept in the `io::Error`
    #[error("USB I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Descriptor parse error: {0}")]
    Parse(#[from] ProtocolError),

    #[error("Device is already open")]
    AlreadyOpen,

    #[error("Device is not open")]
    NotOpen,

    #[error("Interface {interface} has no {direction} endpoint")]
    MissingEndpoint {
        interface: u8,
        direction: &'static str,
    },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// The transfer did not complete before its timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::TimedOut)
    }

    /// The raw errno behind an OS failure, if any
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
