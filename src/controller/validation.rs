//! Validation of caller input
//!
//! Checks run before any store call so a rejected request has no side
//! effects.

use crate::controller::error::{Error, Result};

/// Minimum number of members of a new cluster
pub const MIN_SIZE: i32 = 1;

/// Longest cluster name; derived pod and secret names must stay valid
pub const MAX_NAME_LENGTH: usize = 63;

/// Validate a cluster name as a DNS-1123 label
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidParams("cluster name is empty".to_string()));
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(Error::InvalidParams(format!(
            "cluster name {name:?} is longer than {MAX_NAME_LENGTH} characters"
        )));
    }

    let valid_chars = name
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    let alnum = |b: Option<u8>| b.is_some_and(|b| b.is_ascii_lowercase() || b.is_ascii_digit());
    if !valid_chars || !alnum(name.bytes().next()) || !alnum(name.bytes().last()) {
        return Err(Error::InvalidParams(format!(
            "cluster name {name:?} must consist of lowercase letters, digits and '-', \
             and start and end with a letter or digit"
        )));
    }
    Ok(())
}

/// Validate the size of a new cluster
pub fn validate_create_size(size: i32) -> Result<()> {
    if size < MIN_SIZE {
        return Err(Error::InvalidParams(format!(
            "cluster size {size} is below minimum {MIN_SIZE}"
        )));
    }
    Ok(())
}

/// Validate the size of an update; zero leaves the size unchanged
pub fn validate_update_size(size: i32) -> Result<()> {
    if size < 0 {
        return Err(Error::InvalidParams(format!(
            "cluster size {size} is negative"
        )));
    }
    Ok(())
}

/// Validate an operator version of the form `MAJOR.MINOR.PATCH`
pub fn validate_version(version: &str) -> Result<()> {
    let parts: Vec<&str> = version.split('.').collect();
    let numeric = |part: &&str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    if parts.len() != 3 || !parts.iter().all(numeric) {
        return Err(Error::InvalidVersion(version.to_string()));
    }
    Ok(())
}
