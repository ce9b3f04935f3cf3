//! Argument validators.
//!
//! Each validator returns `Err` with a description of the violation; callers
//! attach the field name through [`check`].

use crate::error::{ResourceError, ResourceResult};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;
use uuid::Uuid;

static EMAIL_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email address pattern compiles")
});

/// Attaches `field` to a validator failure.
pub fn check(field: &'static str, result: Result<(), String>) -> ResourceResult<()> {
    result.map_err(|message| ResourceError::Validation { field, message })
}

pub fn string_is_not_empty(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err("expected a non-empty string".to_string());
    }
    Ok(())
}

/// Length in characters within `min..=max`.
pub fn string_len_between(value: &str, min: usize, max: usize) -> Result<(), String> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(format!(
            "expected length to be in the range ({min} - {max}), got {len}"
        ));
    }
    Ok(())
}

pub fn string_in_slice(value: &str, allowed: &[&str]) -> Result<(), String> {
    if allowed.contains(&value) {
        return Ok(());
    }
    Err(format!("expected one of {allowed:?}, got {value:?}"))
}

pub fn int_between(value: i64, min: i64, max: i64) -> Result<(), String> {
    if value < min || value > max {
        return Err(format!("expected to be in the range ({min} - {max}), got {value}"));
    }
    Ok(())
}

/// A hyphenated UUID, the only form the directory hands out.
pub fn is_uuid(value: &str) -> Result<(), String> {
    if value.len() == 36 && Uuid::parse_str(value).is_ok() {
        Ok(())
    } else {
        Err(format!("{value:?} is not a valid UUID"))
    }
}

pub fn is_email_address(value: &str) -> Result<(), String> {
    if EMAIL_ADDRESS.is_match(value) {
        Ok(())
    } else {
        Err(format!("{value:?} is not a valid email address"))
    }
}

/// An absolute `http` or `https` URL with a host.
pub fn is_http_or_https_url(value: &str) -> Result<(), String> {
    let url = Url::parse(value).map_err(|e| format!("{value:?} is not a valid URL: {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!(
            "expected {value:?} to have a scheme of http or https, got {}",
            url.scheme()
        ));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(format!("expected {value:?} to have a host"));
    }
    Ok(())
}
