use crate::base::error::{Error, Result};
use crate::base::frame::Frame;
use crate::base::receive_buffer::ReceiveBuffer;
use crate::base::traits::ProtocolDecoder;
use log::{debug, error, trace, warn};
use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

/// Accumulates raw bytes and cuts them into frames with a `ProtocolDecoder`.
///
/// Partial frames stay in the buffer until the rest arrives, so the same frames
/// come out however the bytes were chunked.
#[derive(Debug)]
pub struct FrameAssembler<P> {
    protocol: P,
    buffer: ReceiveBuffer,
}

impl<P: ProtocolDecoder> FrameAssembler<P> {
    /// Creates an assembler with an empty buffer.
    pub fn new(protocol: P) -> FrameAssembler<P> {
        FrameAssembler {
            protocol,
            buffer: ReceiveBuffer::new(),
        }
    }

    /// Reads once from `upstream` (at most `chunk` bytes). `Ok(0)` is end of stream.
    pub fn fill_from(&mut self, upstream: &mut impl Read, chunk: usize) -> io::Result<usize> {
        self.buffer.read_from(upstream, chunk)
    }

    /// Appends already received bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet part of an extracted frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Extracts the next complete frame, if any.
    ///
    /// On a protocol error (an unterminated frame over the size limit) the whole
    /// buffer is discarded before the error is returned.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            match self.protocol.decode(self.buffer.current_read_slice()) {
                Ok((consumed, frame)) => {
                    self.buffer.skip_bytes(consumed);
                    if frame.is_some() {
                        return Ok(frame);
                    }
                    if consumed == 0 || self.buffer.is_empty() {
                        return Ok(None);
                    }
                }
                Err(e) => {
                    warn!(
                        "Discarding {} buffered bytes after decode error",
                        self.buffer.len()
                    );
                    self.buffer.clear();
                    return Err(e);
                }
            }
        }
    }
}

/// Background thread that owns the read half of the device connection.
///
/// Every extracted frame is published, in arrival order, to the inbox returned
/// by [`FrameReceiver::spawn`]. When the stream ends or fails, a final
/// `Err(ConnectionClosed)` or `Err(IoError)` is published and the thread exits.
#[derive(Debug)]
pub struct FrameReceiver {
    handle: JoinHandle<()>,
}

impl FrameReceiver {
    /// Starts the receiver thread.
    ///
    /// # Arguments
    ///
    /// * `protocol` - Decoder used to find frame boundaries.
    /// * `stream` - Read half of the connection. The thread owns it from now on.
    /// * `read_chunk_size` - Maximum number of bytes requested per `read` call.
    ///
    /// # Example
    /// ```ignore
    /// let (receiver, inbox) = FrameReceiver::spawn(
    ///     ColaAsciiProtocol::new(),
    ///     stream.try_clone()?,
    ///     4096,
    /// )?;
    /// ```
    pub fn spawn<P, R>(
        protocol: P,
        stream: R,
        read_chunk_size: usize,
    ) -> Result<(FrameReceiver, Receiver<Result<Frame>>)>
    where
        P: ProtocolDecoder + Send + 'static,
        R: Read + Send + 'static,
    {
        let (inbox, outbox) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("nav350-receiver".to_owned())
            .spawn(move || receive_loop(FrameAssembler::new(protocol), stream, read_chunk_size, inbox))?;
        trace!("Frame receiver thread started");
        Ok((FrameReceiver { handle }, outbox))
    }

    /// Returns `true` once the thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the thread to exit. The stream must have been shut down first.
    pub fn join(self) {
        trace!("Joining frame receiver thread");
        if self.handle.join().is_err() {
            error!("Frame receiver thread panicked");
        }
    }
}

fn receive_loop<P: ProtocolDecoder, R: Read>(
    mut assembler: FrameAssembler<P>,
    mut stream: R,
    read_chunk_size: usize,
    inbox: Sender<Result<Frame>>,
) {
    loop {
        match assembler.fill_from(&mut stream, read_chunk_size) {
            Ok(0) => {
                debug!("Peer closed the connection");
                let _ = inbox.send(Err(Error::ConnectionClosed));
                break;
            }
            Ok(read) => trace!(
                "Read {} bytes ({} buffered)",
                read,
                assembler.buffered()
            ),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                continue;
            }
            Err(e) => {
                error!("IO error reading from device: {}", e);
                let _ = inbox.send(Err(Error::IoError(e)));
                break;
            }
        }

        loop {
            match assembler.next_frame() {
                Ok(Some(frame)) => {
                    trace!("Publishing frame: {:?}", frame.payload_lossy());
                    if inbox.send(Ok(frame)).is_err() {
                        debug!("Inbox dropped, stopping receiver");
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Receiver dropped malformed input: {}", e);
                    break;
                }
            }
        }
    }
    debug!("Frame receiver thread exiting");
}
