use crate::base::error::{Error, Result};
use crate::base::frame::Frame;
use crate::base::traits::{ProtocolDecoder, ProtocolEncoder};
use log::{debug, error, trace, warn};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// The request currently waiting for its reply.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingExchange {
    expected_prefix: Vec<u8>,
    deadline: Option<Instant>,
}

/// Frees the pending slot on every exit path of `invoke`.
struct PendingGuard<'a> {
    slot: &'a Mutex<Option<PendingExchange>>,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(self.slot).take();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Channel writes requests to the device and matches them with replies from the receiver inbox.
///
/// Only one exchange may be in flight. Replies are correlated by prefix: a
/// frame belongs to the pending request when its payload starts with the
/// expected reply header. Other frames arriving meanwhile are logged and dropped.
///
/// # Examples
/// ```ignore
/// let (receiver, inbox) = FrameReceiver::spawn(ColaAsciiProtocol::new(), stream.try_clone()?, 4096)?;
/// let channel = Channel::new(ColaAsciiProtocol::new(), stream, inbox);
///
/// let reply = channel.invoke(b"sRN DeviceIdent", b"sRA DeviceIdent", Duration::from_secs(1))?;
/// ```
#[derive(Debug)]
pub struct Channel<P, W> {
    protocol: P,
    writer: Mutex<W>,
    inbox: Mutex<Receiver<Result<Frame>>>,
    pending: Mutex<Option<PendingExchange>>,
    alive: AtomicBool,
}

impl<P, W> Channel<P, W>
where
    P: ProtocolDecoder + ProtocolEncoder,
    W: io::Write,
{
    /// Create a new `Channel`
    ///
    /// # Arguments
    ///
    /// * `protocol` - Encoder for requests, also used to recognize error replies.
    /// * `writer` - Write half of the connection.
    /// * `inbox` - Frames published by the `FrameReceiver` of the same connection.
    pub fn new(protocol: P, writer: W, inbox: Receiver<Result<Frame>>) -> Channel<P, W> {
        trace!("Creating new Channel");
        Channel {
            protocol,
            writer: Mutex::new(writer),
            inbox: Mutex::new(inbox),
            pending: Mutex::new(None),
            alive: AtomicBool::new(true),
        }
    }

    /// Returns `false` once the receiver has reported the end of the connection.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Returns `true` while a request is waiting for its reply.
    pub fn has_pending_exchange(&self) -> bool {
        lock(&self.pending).is_some()
    }

    /// Write one request frame and flush it
    ///
    /// # Example
    /// ```ignore
    /// channel.write(b"sMN mNEVAChangeState 1")?;
    /// ```
    pub fn write(&self, payload: &[u8]) -> Result<usize> {
        let mut writer = lock(&self.writer);
        let written = self.protocol.write_to(payload, &mut *writer)?;
        writer.flush()?;
        trace!("Wrote {} bytes", written);
        Ok(written)
    }

    /// Send a request and wait for the reply starting with `expected_prefix`
    ///
    /// An empty `expected_prefix` accepts the first frame received after the request.
    ///
    /// # Errors
    ///
    /// * `ExchangeInProgress` if another call is still waiting.
    /// * `OperationTimeout` if no matching frame arrived within `timeout`.
    /// * `DeviceFault` if the device answered with an error reply.
    /// * `ConnectionClosed` or `IoError` if the connection ended.
    ///
    /// # Example
    /// ```ignore
    /// let reply = channel.invoke(b"sRN DeviceIdent", b"sRA DeviceIdent", Duration::from_secs(1))?;
    /// ```
    pub fn invoke(&self, request: &[u8], expected_prefix: &[u8], timeout: Duration) -> Result<Frame> {
        trace!(
            "Channel invoke called: request={:?}, expecting {:?}, timeout={:?}",
            String::from_utf8_lossy(request),
            String::from_utf8_lossy(expected_prefix),
            timeout
        );
        let _guard = self.claim(expected_prefix, timeout)?;
        let deadline = Instant::now().checked_add(timeout);

        if !self.is_alive() {
            debug!("Invoke on a closed channel");
            return Err(Error::ConnectionClosed);
        }

        let inbox = lock(&self.inbox);
        self.drain_stale(&inbox)?;

        if let Err(e) = self.write(request) {
            error!("Invoke: failed to write request: {}", e);
            return Err(e);
        }

        loop {
            let received = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        warn!(
                            "Invoke: timed out waiting for {:?}",
                            String::from_utf8_lossy(expected_prefix)
                        );
                        return Err(Error::OperationTimeout);
                    }
                    inbox.recv_timeout(deadline - now)
                }
                None => inbox.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(Ok(frame)) => {
                    if frame.matches_reply(expected_prefix) {
                        trace!("Invoke: received reply {:?}", frame.payload_lossy());
                        return Ok(frame);
                    }
                    if let Some(code) = self.protocol.fault_code(&frame) {
                        error!("Invoke: device answered with error code {}", code);
                        return Err(Error::DeviceFault { code });
                    }
                    debug!(
                        "Invoke: discarding unrelated frame {:?}",
                        frame.payload_lossy()
                    );
                }
                Ok(Err(e)) => {
                    error!("Invoke: receiver failed while waiting: {}", e);
                    self.alive.store(false, Ordering::Release);
                    return Err(e);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    error!("Invoke: receiver is gone");
                    self.alive.store(false, Ordering::Release);
                    return Err(Error::ConnectionClosed);
                }
            }
        }
    }

    fn claim(&self, expected_prefix: &[u8], timeout: Duration) -> Result<PendingGuard<'_>> {
        let mut slot = lock(&self.pending);
        if let Some(pending) = slot.as_ref() {
            warn!(
                "Rejecting request while waiting for {:?} (deadline {:?})",
                String::from_utf8_lossy(&pending.expected_prefix),
                pending.deadline
            );
            return Err(Error::ExchangeInProgress);
        }
        *slot = Some(PendingExchange {
            expected_prefix: expected_prefix.to_vec(),
            deadline: Instant::now().checked_add(timeout),
        });
        Ok(PendingGuard {
            slot: &self.pending,
        })
    }

    fn drain_stale(&self, inbox: &Receiver<Result<Frame>>) -> Result<()> {
        loop {
            match inbox.try_recv() {
                Ok(Ok(frame)) => debug!("Discarding stale frame {:?}", frame.payload_lossy()),
                Ok(Err(e)) => {
                    error!("Receiver failed before request: {}", e);
                    self.alive.store(false, Ordering::Release);
                    return Err(e);
                }
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => {
                    self.alive.store(false, Ordering::Release);
                    return Err(Error::ConnectionClosed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ColaAsciiProtocol;
    use std::sync::mpsc::{self, Sender};
    use std::sync::Arc;
    use std::thread;

    /// Records written bytes and answers the first write with a scripted set of frames.
    struct ScriptedDevice {
        written: Arc<Mutex<Vec<u8>>>,
        replies: Sender<Result<Frame>>,
        script: Vec<Result<Frame>>,
    }

    impl io::Write for ScriptedDevice {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            lock(&self.written).extend_from_slice(buf);
            for reply in self.script.drain(..) {
                let _ = self.replies.send(reply);
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn frame(payload: &str) -> Result<Frame> {
        Ok(Frame::from_payload(payload.as_bytes()))
    }

    fn scripted(
        script: Vec<Result<Frame>>,
    ) -> (
        Channel<ColaAsciiProtocol, ScriptedDevice>,
        Sender<Result<Frame>>,
        Arc<Mutex<Vec<u8>>>,
    ) {
        let (tx, rx) = mpsc::channel();
        let written = Arc::new(Mutex::new(Vec::new()));
        let device = ScriptedDevice {
            written: written.clone(),
            replies: tx.clone(),
            script,
        };
        (Channel::new(ColaAsciiProtocol::new(), device, rx), tx, written)
    }

    #[test]
    fn invoke_writes_framed_request_and_returns_match() {
        let (channel, _tx, written) = scripted(vec![
            frame("sAN mNEVAChangeState 0 1"),
            frame("sRA DeviceIdent NAV350 V1.0 NAV"),
        ]);
        let reply = channel
            .invoke(b"sRN DeviceIdent", b"sRA DeviceIdent", Duration::from_secs(1))
            .unwrap();
        assert_eq!(reply.payload(), b"sRA DeviceIdent NAV350 V1.0 NAV");
        assert_eq!(lock(&written).as_slice(), b"\x02sRN DeviceIdent\x03");
        assert!(!channel.has_pending_exchange());
    }

    #[test]
    fn stale_frames_are_not_taken_as_reply() {
        let (channel, tx, _) = scripted(vec![frame("sWA NEVACurrLayer")]);
        tx.send(frame("sWA NEVACurrLayer stale")).unwrap();
        let reply = channel
            .invoke(b"sWN NEVACurrLayer 1", b"sWA NEVACurrLayer", Duration::from_secs(1))
            .unwrap();
        assert_eq!(reply.payload(), b"sWA NEVACurrLayer");
    }

    #[test]
    fn timeout_releases_the_slot() {
        let (channel, _tx, _) = scripted(vec![frame("sAN mNLMDGetData 0")]);
        let timeout = Duration::from_millis(50);
        let start = Instant::now();
        let result = channel.invoke(b"sRN DeviceIdent", b"sRA DeviceIdent", timeout);
        assert!(matches!(result, Err(Error::OperationTimeout)));
        assert!(start.elapsed() >= timeout);
        assert!(!channel.has_pending_exchange());

        let again = channel.invoke(b"sRN DeviceIdent", b"sRA DeviceIdent", Duration::ZERO);
        assert!(matches!(again, Err(Error::OperationTimeout)));
    }

    #[test]
    fn second_exchange_is_rejected_while_first_waits() {
        let (channel, tx, written) = scripted(Vec::new());
        let channel = Arc::new(channel);

        let waiter = {
            let channel = channel.clone();
            thread::spawn(move || {
                channel.invoke(b"sMN mNPOSGetData 1 2", b"sAN mNPOSGetData", Duration::from_secs(5))
            })
        };
        while !channel.has_pending_exchange() {
            thread::sleep(Duration::from_millis(1));
        }

        let rejected = channel.invoke(b"sRN DeviceIdent", b"sRA DeviceIdent", Duration::from_secs(1));
        assert!(matches!(rejected, Err(Error::ExchangeInProgress)));

        // stale frames are drained before the write, so reply only once the request is out
        while lock(&written).is_empty() {
            thread::sleep(Duration::from_millis(1));
        }
        tx.send(frame("sAN mNPOSGetData 1 0")).unwrap();
        let first = waiter.join().unwrap().unwrap();
        assert_eq!(first.payload(), b"sAN mNPOSGetData 1 0");
        assert!(!channel.has_pending_exchange());
    }

    #[test]
    fn device_error_reply_is_reported() {
        let (channel, _tx, _) = scripted(vec![frame("sFA 4")]);
        let result = channel.invoke(b"sMN mNLAYAddLandmark 1", b"sAN mNLAYAddLandmark", Duration::from_secs(1));
        match result {
            Err(Error::DeviceFault { code }) => assert_eq!(code, "4"),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn receiver_failure_ends_the_exchange() {
        let (channel, _tx, _) = scripted(vec![Err(Error::IoError(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "reset",
        )))]);
        let result = channel.invoke(b"sRN DeviceIdent", b"sRA DeviceIdent", Duration::from_secs(1));
        assert!(matches!(result, Err(Error::IoError(_))));
        assert!(!channel.is_alive());
        assert!(!channel.has_pending_exchange());

        let result = channel.invoke(b"sRN DeviceIdent", b"sRA DeviceIdent", Duration::from_secs(1));
        assert!(matches!(result, Err(Error::ConnectionClosed)));
    }

    #[test]
    fn dropped_receiver_closes_the_channel() {
        let (tx, rx) = mpsc::channel::<Result<Frame>>();
        drop(tx);
        let channel = Channel::new(ColaAsciiProtocol::new(), Vec::new(), rx);
        let result = channel.invoke(b"sRN DeviceIdent", b"sRA DeviceIdent", Duration::from_secs(1));
        assert!(matches!(result, Err(Error::ConnectionClosed)));
        assert!(!channel.is_alive());
    }
}
