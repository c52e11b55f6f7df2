use crate::base::{Error, Frame, ProtocolDecoder, ProtocolEncoder, Result};
use log::{error, trace, warn};

/// Start-of-text byte opening every CoLa-A frame.
pub const COLA_STX: u8 = 0x02;

/// End-of-text byte closing every CoLa-A frame.
pub const COLA_ETX: u8 = 0x03;

/// Service token of the error reply the device sends for a rejected telegram.
pub const COLA_ERROR_REPLY: &[u8] = b"sFA";

/// Largest frame accepted by default. A full scan with reflectors is a few tens of KiB.
pub const COLA_DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// The implementation of the SICK CoLa-A (ASCII) framing used by the NAV350.
///
/// A frame is `STX payload ETX`; the payload is plain text. The codec keeps no
/// state between calls, so the same instance can encode on one thread and decode
/// on another.
#[derive(Debug, Clone, PartialEq)]
pub struct ColaAsciiProtocol {
    max_frame_len: usize,
}

impl ColaAsciiProtocol {
    /// Creates a new `ColaAsciiProtocol` with the default frame size limit.
    pub fn new() -> ColaAsciiProtocol {
        ColaAsciiProtocol::with_max_frame_len(COLA_DEFAULT_MAX_FRAME_LEN)
    }

    /// Creates a new `ColaAsciiProtocol` rejecting frames longer than `max_frame_len` bytes.
    ///
    /// # Arguments
    ///
    /// * `max_frame_len` - Upper bound of a frame, delimiters included.
    pub fn with_max_frame_len(max_frame_len: usize) -> ColaAsciiProtocol {
        trace!(
            "Creating new ColaAsciiProtocol (max frame length {})",
            max_frame_len
        );
        ColaAsciiProtocol {
            max_frame_len: max_frame_len.max(2),
        }
    }

    /// The configured frame size limit.
    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    fn oversize(&self, len: usize) -> Error {
        error!(
            "Frame of at least {} bytes exceeds limit of {} bytes",
            len, self.max_frame_len
        );
        Error::ProtocolError {
            description: format!(
                "frame exceeds {} bytes without terminator",
                self.max_frame_len
            ),
        }
    }
}

impl Default for ColaAsciiProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolDecoder for ColaAsciiProtocol {
    /// Extracts the first `STX ... ETX` unit from `buf`.
    ///
    /// Bytes in front of the first STX are reported as consumed. A second STX
    /// before the ETX abandons the partial frame in front of it. A complete frame
    /// over the size limit is consumed without being returned; only an
    /// unterminated one over the limit is an error.
    fn decode(&self, buf: &[u8]) -> Result<(usize, Option<Frame>)> {
        trace!("decode called with {} bytes", buf.len());
        let start = match buf.iter().position(|&b| b == COLA_STX) {
            Some(start) => start,
            None => {
                if !buf.is_empty() {
                    warn!("Dropping {} bytes outside of any frame", buf.len());
                }
                return Ok((buf.len(), None));
            }
        };
        if start > 0 {
            warn!("Dropping {} bytes in front of frame start", start);
        }

        let body = &buf[start + 1..];
        match body.iter().position(|&b| b == COLA_ETX || b == COLA_STX) {
            Some(offset) if body[offset] == COLA_STX => {
                let restart = start + 1 + offset;
                warn!(
                    "Frame start at {} interrupted by new frame start at {}, resyncing",
                    start, restart
                );
                Ok((restart, None))
            }
            Some(offset) => {
                let end = start + 1 + offset + 1;
                if end - start > self.max_frame_len {
                    warn!(
                        "Dropping complete frame of {} bytes, limit is {} bytes",
                        end - start,
                        self.max_frame_len
                    );
                    return Ok((end, None));
                }
                let frame = Frame::new(buf[start..end].to_vec(), 1..end - start - 1);
                trace!(
                    "Decoded frame of {} bytes: {:?}",
                    end - start,
                    frame.payload_lossy()
                );
                Ok((end, Some(frame)))
            }
            None => {
                if buf.len() - start > self.max_frame_len {
                    return Err(self.oversize(buf.len() - start));
                }
                trace!(
                    "Incomplete frame ({} bytes buffered), need more data",
                    buf.len() - start
                );
                Ok((start, None))
            }
        }
    }

    /// `sFA <code>` is the only error reply of CoLa-A.
    fn fault_code(&self, frame: &Frame) -> Option<String> {
        if !frame.matches_reply(COLA_ERROR_REPLY) {
            return None;
        }
        let code = frame
            .payload()
            .split(|&b| b == b' ')
            .filter(|token| !token.is_empty())
            .nth(1)
            .map(|token| String::from_utf8_lossy(token).into_owned())
            .unwrap_or_default();
        Some(code)
    }
}

impl ProtocolEncoder for ColaAsciiProtocol {
    /// Wraps a command payload into `STX payload ETX`.
    fn encode(&self, payload: &[u8]) -> Result<Vec<u8>> {
        trace!("Encoding payload: {:?}", String::from_utf8_lossy(payload));
        if payload.iter().any(|&b| b == COLA_STX || b == COLA_ETX) {
            error!("Payload contains framing bytes, refusing to encode");
            return Err(Error::ProtocolError {
                description: "payload contains STX or ETX".to_owned(),
            });
        }
        if payload.len() + 2 > self.max_frame_len {
            return Err(self.oversize(payload.len() + 2));
        }

        let mut bytes = Vec::with_capacity(payload.len() + 2);
        bytes.push(COLA_STX);
        bytes.extend_from_slice(payload);
        bytes.push(COLA_ETX);
        trace!("Total encoded length: {}", bytes.len());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::ReceiveBuffer;

    #[test]
    fn protocol_encode() {
        let protocol = ColaAsciiProtocol::new();

        assert_eq!(
            protocol.encode(b"sRN DeviceIdent").unwrap().as_slice(),
            b"\x02sRN DeviceIdent\x03"
        );
        assert_eq!(protocol.encode(b"").unwrap().as_slice(), [0x02, 0x03]);
        assert!(protocol.encode(b"sRN \x03").is_err());
    }

    #[test]
    fn protocol_decode_complete_frame() {
        let protocol = ColaAsciiProtocol::new();
        let (consumed, frame) = protocol
            .decode(b"\x02sRA DeviceIdent A B C\x03\x02sAN")
            .unwrap();
        assert_eq!(consumed, 23);
        assert_eq!(frame.unwrap().payload(), b"sRA DeviceIdent A B C");
    }

    #[test]
    fn protocol_decode_skips_leading_garbage() {
        let protocol = ColaAsciiProtocol::new();
        let (consumed, frame) = protocol.decode(b"xyz\x02sAN\x03").unwrap();
        assert_eq!(consumed, 8);
        assert_eq!(frame.unwrap().payload(), b"sAN");

        let (consumed, frame) = protocol.decode(b"noise").unwrap();
        assert_eq!(consumed, 5);
        assert!(frame.is_none());
    }

    #[test]
    fn protocol_decode_keeps_partial_frame() {
        let protocol = ColaAsciiProtocol::new();
        let (consumed, frame) = protocol.decode(b"ab\x02sAN mNPOS").unwrap();
        assert_eq!(consumed, 2);
        assert!(frame.is_none());
    }

    #[test]
    fn protocol_decode_resyncs_on_second_start() {
        let protocol = ColaAsciiProtocol::new();
        let buf = b"\x02sAN broken\x02sWA NEVACurrLayer\x03";
        let (consumed, frame) = protocol.decode(buf).unwrap();
        assert_eq!(consumed, 11);
        assert!(frame.is_none());

        let (_, frame) = protocol.decode(&buf[consumed..]).unwrap();
        assert_eq!(frame.unwrap().payload(), b"sWA NEVACurrLayer");
    }

    #[test]
    fn protocol_decode_rejects_oversized_frame() {
        let protocol = ColaAsciiProtocol::with_max_frame_len(8);
        assert!(protocol.decode(b"\x02sAN 123456789").is_err());
        assert_eq!(protocol.decode(b"\x02sAN 123456789\x03").unwrap(), (15, None));
        assert!(protocol.decode(b"\x02sAN 1\x03").is_ok());
    }

    #[test]
    fn protocol_fault_code() {
        let protocol = ColaAsciiProtocol::new();
        assert_eq!(
            protocol.fault_code(&Frame::from_payload(b"sFA 5")),
            Some("5".to_owned())
        );
        assert_eq!(protocol.fault_code(&Frame::from_payload(b"sFA")), Some(String::new()));
        assert_eq!(protocol.fault_code(&Frame::from_payload(b"sFAx 1")), None);
        assert_eq!(protocol.fault_code(&Frame::from_payload(b"sAN x")), None);
    }

    #[test]
    fn protocol_decode_is_independent_of_chunking() {
        let protocol = ColaAsciiProtocol::new();
        let wire = protocol
            .encode(b"sAN mNPOSGetData 1 0 1 4 0 0 1 DIST1 3F800000 00000000 3E8 FA 0 2 5 6")
            .unwrap();
        let (_, whole) = protocol.decode(&wire).unwrap();
        let whole = whole.unwrap();

        for chunk in 1..wire.len() {
            let mut buffer = ReceiveBuffer::new();
            let mut frames = Vec::new();
            for piece in wire.chunks(chunk) {
                buffer.extend_from_slice(piece);
                loop {
                    let (consumed, frame) = protocol.decode(buffer.current_read_slice()).unwrap();
                    buffer.skip_bytes(consumed);
                    match frame {
                        Some(frame) => frames.push(frame),
                        None if consumed == 0 => break,
                        None => {}
                    }
                }
            }
            assert_eq!(frames, vec![whole.clone()], "chunk size {}", chunk);
        }
    }
}
