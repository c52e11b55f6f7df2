mod channel;
mod error;
mod frame;
mod receive_buffer;
mod receiver;
mod traits;

pub use self::channel::*;
pub use self::error::{DecodeError, Error, Result};
pub use self::frame::Frame;
pub use self::receive_buffer::ReceiveBuffer;
pub use self::receiver::{FrameAssembler, FrameReceiver};
pub use self::traits::{ProtocolDecoder, ProtocolEncoder};
