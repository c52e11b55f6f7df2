use crate::base::error::Result;
use crate::base::frame::Frame;
use std::io;

/// Defines the behavior for extracting `Frame`s from a byte stream.
pub trait ProtocolDecoder {
    /// Attempts to extract one `Frame` from the front of `buf`.
    ///
    /// Returns a `Result` containing a tuple:
    /// * The number of bytes the caller may drop from the front of `buf`.
    /// * `Some(frame)` if a complete frame was found, `None` if more bytes are needed.
    ///
    /// Bytes belonging to an incomplete frame are never counted as consumed.
    ///
    /// # Arguments
    ///
    /// * `buf` - The byte slice containing the data to decode.
    fn decode(&self, buf: &[u8]) -> Result<(usize, Option<Frame>)>;

    /// Returns the device error code if `frame` is the protocol's error reply.
    fn fault_code(&self, _frame: &Frame) -> Option<String> {
        None
    }
}

/// Defines the behavior for wrapping payloads into wire frames.
pub trait ProtocolEncoder {
    /// Wraps `payload` into a complete wire frame.
    ///
    /// # Arguments
    ///
    /// * `payload` - The command text, e.g. `sRN DeviceIdent`.
    fn encode(&self, payload: &[u8]) -> Result<Vec<u8>>;

    /// Encodes `payload` and writes it to `dest`.
    ///
    /// Returns the number of bytes written.
    fn write_to(&self, payload: &[u8], dest: &mut impl io::Write) -> Result<usize> {
        let bytes = self.encode(payload)?;
        dest.write_all(&bytes)?;
        Ok(bytes.len())
    }
}
