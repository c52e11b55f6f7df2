use crate::base::DecodeError;

/// Splits a reply payload on spaces. Empty tokens (double spaces) are dropped.
pub fn tokenize(payload: &[u8]) -> Result<Vec<&str>, DecodeError> {
    let text = std::str::from_utf8(payload).map_err(|_| DecodeError::InvalidText)?;
    Ok(text.split(' ').filter(|token| !token.is_empty()).collect())
}

/// Parses an uppercase hexadecimal token.
///
/// Only `0-9` and `A-F` are accepted; an empty token or a value above `u32::MAX`
/// is an error rather than a silent zero.
pub fn hex_decode(token: &str) -> Result<u32, DecodeError> {
    let invalid = || DecodeError::InvalidHex {
        token: token.to_owned(),
    };
    if token.is_empty() {
        return Err(invalid());
    }
    token.bytes().try_fold(0u32, |value, byte| {
        let digit = match byte {
            b'0'..=b'9' => byte - b'0',
            b'A'..=b'F' => byte - b'A' + 10,
            _ => return Err(invalid()),
        };
        value
            .checked_mul(16)
            .and_then(|value| value.checked_add(u32::from(digit)))
            .ok_or_else(invalid)
    })
}

/// Parses a 32-bit two's complement hexadecimal token (`FFFFFFFF` is `-1`).
pub fn hex_decode_i32(token: &str) -> Result<i32, DecodeError> {
    hex_decode(token).map(|value| value as i32)
}

/// Fails with `DeviceRejected` unless the token at `index` is `"0"`.
pub fn check_status(tokens: &[&str], index: usize) -> Result<(), DecodeError> {
    match tokens.get(index) {
        Some(&"0") => Ok(()),
        Some(status) => Err(DecodeError::DeviceRejected {
            index,
            status: (*status).to_owned(),
        }),
        None => Err(DecodeError::Truncated {
            index,
            len: tokens.len(),
        }),
    }
}

/// Bounds-checked positional reader over reply tokens.
#[derive(Debug, Clone)]
pub struct TokenCursor<'a> {
    tokens: &'a [&'a str],
    pos: usize,
}

impl<'a> TokenCursor<'a> {
    pub fn new(tokens: &'a [&'a str], start: usize) -> TokenCursor<'a> {
        TokenCursor { tokens, pos: start }
    }

    pub fn remaining(&self) -> usize {
        self.tokens.len().saturating_sub(self.pos)
    }

    /// Fails with `Truncated` unless at least `count` tokens are left.
    pub fn require(&self, count: usize) -> Result<(), DecodeError> {
        if count > self.remaining() {
            return Err(DecodeError::Truncated {
                index: self.pos.saturating_add(count - 1),
                len: self.tokens.len(),
            });
        }
        Ok(())
    }

    pub fn next_token(&mut self) -> Result<&'a str, DecodeError> {
        let token = self.tokens.get(self.pos).copied().ok_or(DecodeError::Truncated {
            index: self.pos,
            len: self.tokens.len(),
        })?;
        self.pos += 1;
        Ok(token)
    }

    pub fn next_hex(&mut self) -> Result<u32, DecodeError> {
        hex_decode(self.next_token()?)
    }

    pub fn next_hex_i32(&mut self) -> Result<i32, DecodeError> {
        hex_decode_i32(self.next_token()?)
    }

    /// Reads a presence flag, which must be exactly `0` or `1`.
    pub fn next_flag(&mut self) -> Result<bool, DecodeError> {
        let index = self.pos;
        match self.next_token()? {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(DecodeError::InvalidFlag {
                index,
                token: other.to_owned(),
            }),
        }
    }

    /// Reads a token that must equal `expected`.
    pub fn expect(&mut self, expected: &str) -> Result<(), DecodeError> {
        let index = self.pos;
        let found = self.next_token()?;
        if found != expected {
            return Err(DecodeError::UnexpectedToken {
                index,
                expected: expected.to_owned(),
                found: found.to_owned(),
            });
        }
        Ok(())
    }
}
