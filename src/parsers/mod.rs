//! Decoders turning tokenized reply payloads into typed records.
//!
//! Every decoder is a pure function over the tokens of one reply. Fields are
//! read strictly in the order the device sends them, through a bounds-checked
//! cursor, so a short or malformed reply becomes a `DecodeError`.

pub mod identity;
pub mod navigation;
pub mod tokens;

pub use self::identity::{decode_access_mode, decode_identity, decode_method_ack};
pub use self::navigation::{decode_landmarks, decode_mapping, decode_navigation};
pub use self::tokens::{hex_decode, hex_decode_i32, tokenize, TokenCursor};
