//! Structured-output parsing for model replies.
//!
//! Models are asked for a single JSON object but often wrap it in a markdown
//! fence or surround it with prose. Two ways of cutting the object out are
//! supported:
//!
//! - [`ParseStrategy::FixedWrapper`] trims a fixed number of characters from
//!   each end. This only works when the wrapper is exactly as long as assumed
//!   (a four-backtick fence for `FixedWrapper(4)`), so any drift in the
//!   model's output format makes decoding fail.
//! - [`ParseStrategy::BraceScan`] takes everything from the first `{` to the
//!   last `}`. It accepts fences of any length and leading/trailing prose.

use serde::de::DeserializeOwned;
use std::str::FromStr;
use thiserror::Error;

/// How to locate the JSON object inside a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    /// Drop exactly `n` characters from both ends.
    FixedWrapper(usize),
    /// Slice from the first `{` to the last `}` inclusive.
    BraceScan,
}

impl FromStr for ParseStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "brace" | "brace_scan" => Ok(ParseStrategy::BraceScan),
            "fixed" => Ok(ParseStrategy::FixedWrapper(4)),
            _ => match s.strip_prefix("fixed:") {
                Some(n) => n
                    .parse()
                    .map(ParseStrategy::FixedWrapper)
                    .map_err(|e| format!("invalid wrapper length '{}': {}", n, e)),
                None => Err(format!(
                    "unknown parse strategy '{}', expected brace or fixed[:n]",
                    s
                )),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("reply is {len} characters, too short to strip a {wrapper}-character wrapper")]
    TooShort { len: usize, wrapper: usize },

    #[error("no JSON object found in reply")]
    NoObject,

    #[error("reply object has an empty `{0}` list")]
    EmptyList(&'static str),

    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Cut the JSON candidate out of `reply` without decoding it.
pub fn locate(reply: &str, strategy: ParseStrategy) -> Result<&str, ParseError> {
    match strategy {
        ParseStrategy::FixedWrapper(n) => strip_fixed(reply, n),
        ParseStrategy::BraceScan => scan_braces(reply),
    }
}

/// Locate and deserialize the JSON object in `reply`.
pub fn decode<T: DeserializeOwned>(reply: &str, strategy: ParseStrategy) -> Result<T, ParseError> {
    let candidate = locate(reply, strategy)?;
    Ok(serde_json::from_str(candidate)?)
}

fn strip_fixed(reply: &str, n: usize) -> Result<&str, ParseError> {
    let len = reply.chars().count();
    if len < n * 2 {
        return Err(ParseError::TooShort { len, wrapper: n });
    }

    // Character offsets, so multi-byte text in the wrapper cannot split a char.
    let start = reply
        .char_indices()
        .nth(n)
        .map(|(i, _)| i)
        .unwrap_or(reply.len());
    let end = reply
        .char_indices()
        .nth(len - n)
        .map(|(i, _)| i)
        .unwrap_or(reply.len());
    Ok(&reply[start..end])
}

fn scan_braces(reply: &str) -> Result<&str, ParseError> {
    let start = reply.find('{').ok_or(ParseError::NoObject)?;
    let end = reply.rfind('}').ok_or(ParseError::NoObject)?;
    if end < start {
        return Err(ParseError::NoObject);
    }
    Ok(&reply[start..=end])
}
