//! Enclave and key name rules.

use crate::error::KmsError;

/// Longest accepted enclave or key name.
pub const MAX_NAME_LEN: usize = 128;

/// Checks an enclave or key name: 1 to 128 ASCII alphanumerics, `-` or `_`.
pub fn validate_name(name: &str) -> Result<(), KmsError> {
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(KmsError::InvalidRequest(format!(
            "name must be 1-{MAX_NAME_LEN} characters: {name:?}"
        )));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(KmsError::InvalidRequest(format!(
            "name may only contain alphanumerics, '-' and '_': {name:?}"
        )));
    }

    Ok(())
}
