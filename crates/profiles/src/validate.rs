//! Profile name and endpoint validation

use crate::error::{Error, Result};

/// Check a profile name against `^[a-z0-9]([a-z0-9-_]?[a-z0-9])*$`.
///
/// Lowercase letters and digits, with single dashes or underscores between
/// them. No leading, trailing or doubled separators.
pub fn validate_profile_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidProfileName("profile name is required".into()));
    }

    let is_word = |c: u8| c.is_ascii_lowercase() || c.is_ascii_digit();
    let is_sep = |c: u8| c == b'-' || c == b'_';
    let bytes = name.as_bytes();

    let mut prev_sep = true;
    for &c in bytes {
        if is_word(c) {
            prev_sep = false;
        } else if is_sep(c) && !prev_sep {
            prev_sep = true;
        } else {
            return Err(invalid_name(name));
        }
    }
    if prev_sep {
        return Err(invalid_name(name));
    }
    Ok(())
}

fn invalid_name(name: &str) -> Error {
    Error::InvalidProfileName(format!(
        "{name:?} must be lowercase alphanumeric with single dashes or underscores \
         (e.g. my-profile-name)"
    ))
}

/// Normalize an endpoint for storage, see [`platform_auth::normalize_endpoint`].
pub fn normalize_endpoint(endpoint: &str) -> Result<String> {
    platform_auth::normalize_endpoint(endpoint).map_err(|e| match e {
        platform_auth::Error::InvalidEndpoint(msg) => Error::InvalidEndpoint(msg),
        other => Error::Auth(other),
    })
}
