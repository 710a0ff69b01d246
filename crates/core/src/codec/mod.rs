//! Lossless text codec that turns a whole [`Session`] into a URL-safe string.
//!
//! The session is written as JSON with shortest round-trip float formatting,
//! viewed as UTF-8 bytes (every multibyte character becomes its escaped byte
//! sequence) and then base64 encoded with the URL-safe alphabet, unpadded.
//! Binary audio payloads never travel; notes carry only their byte size.
//!
//! Decoding also accepts a string written entirely in the standard alphabet
//! with padding. Strings that mix the two alphabets are rejected.

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};

use crate::{CodecError, Result, Session};

/// Encodes the shareable part of `session`. The same session always yields
/// the same string.
pub fn encode(session: &Session) -> Result<String> {
    let json = serde_json::to_string(&session.without_payloads())?;
    Ok(URL_SAFE_NO_PAD.encode(json.as_bytes()))
}

/// Decodes a shareable string, reporting the stage that failed.
pub fn try_decode(encoded: &str) -> std::result::Result<Session, CodecError> {
    let trimmed = encoded.trim();
    if trimmed.trim_end_matches('=').is_empty() {
        return Err(CodecError::Empty);
    }

    let bytes = match URL_SAFE_NO_PAD.decode(trimmed.trim_end_matches('=')) {
        Ok(bytes) => bytes,
        Err(err) => STANDARD.decode(trimmed).map_err(|_| err)?,
    };
    let json = String::from_utf8(bytes)?;
    let session: Session = serde_json::from_str(&json)?;
    session
        .validate()
        .map_err(|err| CodecError::Invalid(err.to_string()))?;
    Ok(session)
}

/// Decodes a shareable string. Malformed input of any kind yields `None`.
pub fn decode(encoded: &str) -> Option<Session> {
    match try_decode(encoded) {
        Ok(session) => Some(session),
        Err(err) => {
            tracing::debug!(error = %err, len = encoded.len(), "rejected shared state");
            None
        }
    }
}
