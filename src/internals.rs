use std::time::Duration;

/// Factory default CoLa-A port of the NAV350.
pub const NAV350_DEFAULT_PORT: u16 = 2111;

/// Default bound for establishing the TCP connection.
pub const NAV350_DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Default timeout for waiting for a reply.
///
/// Data requests with the wait flag set block on the device until the next
/// sweep completes, so this is generous.
pub const NAV350_DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of bytes requested per socket read.
pub const NAV350_DEFAULT_READ_CHUNK_SIZE: usize = 4096;
