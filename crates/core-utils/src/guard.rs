//! Keyword blacklist for values spliced into SQL text.
//!
//! This is a coarse filter for free-form input (search boxes, sort keys).
//! Bound parameters never need it.

use crate::{Result, UnsafeInputSnafu};
use regex::Regex;
use std::sync::LazyLock;

const UNSAFE_PATTERN: &str = r"(?i)'|--|/\*[\s\S]*?\*/|\b(?:select|update|and|or|delete|insert|truncate|char|chr|into|substr|ascii|declare|exec|count|master|drop|execute)\b";

#[allow(clippy::expect_used)]
static UNSAFE_INPUT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(UNSAFE_PATTERN).expect("SQL guard pattern must compile"));

#[must_use]
pub fn is_suspicious(input: &str) -> bool {
    UNSAFE_INPUT.is_match(input)
}

/// Passes `input` through unchanged unless it contains a quote, a comment or
/// a blacklisted keyword.
///
/// # Errors
///
/// Returns `UnsafeInput` when the input matches the blacklist.
pub fn check_input(input: &str) -> Result<&str> {
    if is_suspicious(input) {
        return UnsafeInputSnafu { input }.fail();
    }
    Ok(input)
}
