//! Display-name validation for the handshake.
//!
//! Names are routing keys for whispers, not identities: they are not
//! required to be unique. They only need to be something other users can
//! type and read.

use crate::SessionError;

/// Longest display name accepted, in characters.
pub const MAX_DISPLAY_NAME_LEN: usize = 32;

/// Checks a raw handshake name and returns the name to register.
///
/// Surrounding whitespace is trimmed. Inner spaces are allowed since
/// whisper targets travel in their own field.
///
/// # Errors
/// Returns [`SessionError::InvalidDisplayName`] if the trimmed name is
/// empty, longer than [`MAX_DISPLAY_NAME_LEN`], or contains control
/// characters.
pub fn validate_display_name(raw: &str) -> Result<String, SessionError> {
    let name = raw.trim();

    if name.is_empty() {
        return Err(SessionError::InvalidDisplayName(
            "name must not be empty".into(),
        ));
    }
    if name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(SessionError::InvalidDisplayName(format!(
            "name must be at most {MAX_DISPLAY_NAME_LEN} characters"
        )));
    }
    if name.chars().any(char::is_control) {
        return Err(SessionError::InvalidDisplayName(
            "name must not contain control characters".into(),
        ));
    }

    Ok(name.to_string())
}
