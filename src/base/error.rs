use std::io;
use thiserror::Error;

/// Represents errors that can occur during NAV350 operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The TCP connection to the device could not be established.
    #[error("connect failed: {0}")]
    Connect(#[source] io::Error),

    /// The execution of operation is timed out.
    #[error("operation timeout")]
    OperationTimeout,

    /// An I/O error occurred while communicating with the device socket.
    #[error("io error: {0}")]
    IoError(#[from] io::Error),

    /// The peer closed the connection or the receiver thread has terminated.
    #[error("connection closed")]
    ConnectionClosed,

    /// Another request is still waiting for its reply.
    #[error("another exchange is already in progress")]
    ExchangeInProgress,

    /// The driver has no live connection.
    #[error("device is not connected")]
    NotConnected,

    /// The device answered with a CoLa-A error reply (`sFA <code>`).
    #[error("device reported error code {code}")]
    DeviceFault { code: String },

    /// A command argument cannot be sent to the device.
    #[error("invalid argument: {description}")]
    InvalidArgument { description: String },

    /// The received bytes are invalid according to the framing protocol.
    #[error("protocol error: {description}")]
    ProtocolError { description: String },

    /// A reply frame could not be interpreted.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

/// Errors raised while interpreting the tokens of a reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The reply ended before the field at `index` could be read.
    #[error("reply truncated: field {index} requested but only {len} tokens present")]
    Truncated { index: usize, len: usize },

    /// A numeric field was not uppercase hexadecimal or did not fit.
    #[error("invalid hex token {token:?}")]
    InvalidHex { token: String },

    /// A presence flag was neither `0` nor `1`.
    #[error("invalid flag {token:?} at field {index}")]
    InvalidFlag { index: usize, token: String },

    /// A literal token did not have the expected value.
    #[error("expected {expected:?} at field {index}, found {found:?}")]
    UnexpectedToken {
        index: usize,
        expected: String,
        found: String,
    },

    /// The payload is not valid ASCII/UTF-8 text.
    #[error("reply payload is not valid text")]
    InvalidText,

    /// The status field reports that the device refused the command.
    #[error("device rejected the command: status {status:?} at field {index}")]
    DeviceRejected { index: usize, status: String },

    /// The scan block uses a channel layout this driver does not decode.
    #[error("unsupported scan channel layout with {channels} channels")]
    UnsupportedChannelLayout { channels: u32 },
}

/// A specialized `Result` type for NAV350 operations.
pub type Result<T> = std::result::Result<T, Error>;
