use crate::base::{Error, Result};
use log::{debug, error, trace, warn};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpStream};
use std::time::Duration;

/// Opens a TCP connection to a NAV350 with a bounded connect time.
///
/// The connect runs non-blocking and is abandoned after `timeout`. The returned
/// stream is in blocking mode with Nagle disabled and no read timeout, ready to
/// be split between the receiver thread and the writer.
///
/// # Arguments
///
/// * `address` - IPv4 address of the device, e.g. `192.168.1.10`.
/// * `port` - TCP port, 2111 on a factory configured device.
/// * `timeout` - Upper bound for the connect. Zero times out immediately.
///
/// # Errors
///
/// * `OperationTimeout` if the device did not accept the connection in time.
/// * `Connect` for an invalid address or any other connect failure.
pub fn connect(address: &str, port: u16, timeout: Duration) -> Result<TcpStream> {
    trace!("Connecting to {}:{} (timeout {:?})", address, port, timeout);
    let ip: Ipv4Addr = address.trim().parse().map_err(|e| {
        error!("Invalid device address {:?}: {}", address, e);
        Error::Connect(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid IPv4 address {:?}", address),
        ))
    })?;
    if timeout.is_zero() {
        warn!("Connect timeout is zero, giving up on {}:{}", ip, port);
        return Err(Error::OperationTimeout);
    }

    let target = SocketAddr::V4(SocketAddrV4::new(ip, port));
    let stream = TcpStream::connect_timeout(&target, timeout)
        .map_err(|e| connect_error(&target, timeout, e))?;

    stream.set_nodelay(true).map_err(Error::Connect)?;
    stream.set_read_timeout(None).map_err(Error::Connect)?;
    debug!("Connected to {}", target);
    Ok(stream)
}

/// Maps a failed connect attempt: an elapsed timeout is `OperationTimeout`, anything else `Connect`.
fn connect_error(target: &SocketAddr, timeout: Duration, e: io::Error) -> Error {
    match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
            warn!("Connect to {} timed out after {:?}", target, timeout);
            Error::OperationTimeout
        }
        _ => {
            error!("Connect to {} failed: {}", target, e);
            Error::Connect(e)
        }
    }
}
