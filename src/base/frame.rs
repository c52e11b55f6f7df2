use std::ops::Range;

/// One complete protocol unit extracted from the byte stream.
///
/// `raw` holds the bytes exactly as they arrived (including the framing bytes),
/// `payload` is the range of `raw` between the delimiters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    raw: Vec<u8>,
    payload: Range<usize>,
}

impl Frame {
    /// Creates a frame from its raw bytes and the position of the payload inside them.
    ///
    /// # Arguments
    ///
    /// * `raw` - The bytes of the frame including delimiters.
    /// * `payload` - The range of `raw` holding the payload. Clamped to `raw`.
    pub fn new(raw: Vec<u8>, payload: Range<usize>) -> Frame {
        let end = payload.end.min(raw.len());
        let start = payload.start.min(end);
        Frame {
            raw,
            payload: start..end,
        }
    }

    /// Creates a frame whose raw bytes are the payload itself.
    pub fn from_payload(payload: &[u8]) -> Frame {
        Frame::new(payload.to_vec(), 0..payload.len())
    }

    /// The bytes as received, delimiters included.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The payload between the delimiters.
    pub fn payload(&self) -> &[u8] {
        &self.raw[self.payload.clone()]
    }

    /// Payload as text, lossy. Meant for log output.
    pub fn payload_lossy(&self) -> String {
        String::from_utf8_lossy(self.payload()).into_owned()
    }

    /// Returns `true` if the payload begins with `prefix` at a token boundary.
    ///
    /// `sAN mNPOSGetData` matches `sAN mNPOSGetData 1 0 ...` but not
    /// `sAN mNPOSGetDataX ...`. An empty prefix matches every frame.
    pub fn matches_reply(&self, prefix: &[u8]) -> bool {
        let payload = self.payload();
        if prefix.is_empty() {
            return true;
        }
        if !payload.starts_with(prefix) {
            return false;
        }
        match payload.get(prefix.len()) {
            None => true,
            Some(b' ') => true,
            Some(_) => false,
        }
    }

    /// Consumes the frame and returns the raw bytes.
    pub fn into_raw(self) -> Vec<u8> {
        self.raw
    }
}
