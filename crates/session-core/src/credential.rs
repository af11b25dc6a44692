// Copyright (c) 2026 Roman Barinov <rbarinov@gmail.com>
// Licensed under the FSL-1.1-NC.

use crate::{Error, Result};
use base64::Engine;
use serde_json::{Map, Value};
use std::time::SystemTime;

/// A session credential issued by the login flow. Replaced wholesale on
/// every update, never mutated in place.
#[derive(Debug, Clone)]
pub struct Credential {
    pub token: String,
    pub username: Option<String>,
    pub established_at: SystemTime,
}

impl Credential {
    pub fn new(token: impl Into<String>, username: Option<String>) -> Self {
        Self {
            token: token.into(),
            username,
            established_at: SystemTime::now(),
        }
    }

    /// Numeric subject from the token's claims segment, or `None` if the
    /// token does not carry one.
    pub fn subject(&self) -> Option<u64> {
        decode_subject(&self.token)
    }
}

/// Decodes the claims segment of a token into a key/value map.
///
/// Tokens are treated as opaque except for their structure: three
/// dot-separated segments, the second a base64url-encoded JSON object.
/// Any structural problem yields `None`; the signature is not checked
/// here (the server is the authority on validity).
pub fn decode_claims(token: &str) -> Option<Map<String, Value>> {
    try_decode_claims(token).ok()
}

pub fn decode_subject(token: &str) -> Option<u64> {
    decode_claims(token)?.get("userID")?.as_u64()
}

pub fn decode_username(token: &str) -> Option<String> {
    decode_claims(token)?
        .get("username")?
        .as_str()
        .map(str::to_owned)
}

fn try_decode_claims(token: &str) -> Result<Map<String, Value>> {
    let mut segments = token.split('.');
    let (Some(_), Some(claims), Some(_), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(Error::MalformedToken(
            "expected three dot-separated segments".to_string(),
        ));
    };

    let raw = base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(claims)?;
    match serde_json::from_slice(&raw)? {
        Value::Object(map) => Ok(map),
        _ => Err(Error::MalformedToken(
            "claims segment is not an object".to_string(),
        )),
    }
}
