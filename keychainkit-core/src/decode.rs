//! Decoding of raw store results into typed values.
//!
//! Each decoder takes the status and result of one `copy_matching` call.
//! Status translation happens first; shape checks only run on success.

use crate::error::{KeychainError, KeychainResult};
use crate::gateway::RawResult;
use crate::query::attr;
use crate::status::Status;

fn shape_mismatch(expected: &str, received: Option<&RawResult>) -> KeychainError {
    let received = received.map_or_else(|| "nothing".to_string(), RawResult::kind);
    KeychainError::InvalidData(format!("expected {expected}, received {received}"))
}

/// Decodes a single-item payload.
///
/// # Errors
///
/// Returns the translated status on failure (including
/// [`KeychainError::ItemNotFound`]), or [`KeychainError::InvalidData`] if the
/// store returned anything other than binary data.
pub fn bytes(status: Status, result: Option<RawResult>) -> KeychainResult<Vec<u8>> {
    status.check()?;
    match result {
        Some(RawResult::Data(bytes)) => Ok(bytes),
        other => Err(shape_mismatch("data", other.as_ref())),
    }
}

/// Decodes a single-item payload as UTF-8 text.
///
/// # Errors
///
/// Same as [`bytes`], plus [`KeychainError::InvalidData`] if the payload is
/// not valid UTF-8.
pub fn text(status: Status, result: Option<RawResult>) -> KeychainResult<String> {
    let bytes = bytes(status, result)?;
    String::from_utf8(bytes).map_err(|err| {
        KeychainError::InvalidData(format!("expected UTF-8 text: {}", err.utf8_error()))
    })
}

/// Decodes an enumeration into the list of item keys.
///
/// "No matches" yields an empty list: enumerating an empty store is not an
/// error.
///
/// # Errors
///
/// Returns the translated status for any other failure, or
/// [`KeychainError::InvalidData`] if the result is not an array of attribute
/// mappings each carrying the account as text.
pub fn keys(status: Status, result: Option<RawResult>) -> KeychainResult<Vec<String>> {
    if status == Status::ITEM_NOT_FOUND {
        return Ok(Vec::new());
    }
    status.check()?;
    let entries = match result {
        Some(RawResult::Array(entries)) => entries,
        other => return Err(shape_mismatch("array of attributes", other.as_ref())),
    };
    entries
        .into_iter()
        .map(|entry| match entry {
            RawResult::Attributes(attributes) => attributes
                .get(attr::ACCOUNT)
                .and_then(|value| value.as_str())
                .map(str::to_owned)
                .ok_or_else(|| {
                    KeychainError::InvalidData(format!(
                        "expected `{}` as text in item attributes",
                        attr::ACCOUNT
                    ))
                }),
            other => Err(shape_mismatch("attributes", Some(&other))),
        })
        .collect()
}
