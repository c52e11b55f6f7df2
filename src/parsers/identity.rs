use super::tokens::{check_status, TokenCursor};
use crate::base::DecodeError;
use crate::types::DeviceIdentity;

/// Index of the first field after `<service> <name>`.
pub const FIRST_FIELD_INDEX: usize = 2;

/// Decodes `sRA DeviceIdent <part number> <version> <name>`.
pub fn decode_identity(tokens: &[&str]) -> Result<DeviceIdentity, DecodeError> {
    let mut cursor = TokenCursor::new(tokens, FIRST_FIELD_INDEX);
    let part_number = cursor.next_token()?.to_owned();
    let version = cursor.next_token()?.to_owned();
    let name = cursor.next_token()?.to_owned();
    Ok(DeviceIdentity {
        part_number,
        name,
        version,
    })
}

/// Checks `sAN SetAccessMode <granted>`, where `1` means the login was accepted.
pub fn decode_access_mode(tokens: &[&str]) -> Result<(), DecodeError> {
    let granted = TokenCursor::new(tokens, FIRST_FIELD_INDEX).next_token()?;
    if granted != "1" {
        return Err(DecodeError::DeviceRejected {
            index: FIRST_FIELD_INDEX,
            status: granted.to_owned(),
        });
    }
    Ok(())
}

/// Checks the error code that leads every method acknowledgement (`sAN <name> <error code> ...`).
pub fn decode_method_ack(tokens: &[&str]) -> Result<(), DecodeError> {
    check_status(tokens, FIRST_FIELD_INDEX)
}
