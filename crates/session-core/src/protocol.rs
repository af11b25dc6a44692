// Copyright (c) 2026 Roman Barinov <rbarinov@gmail.com>
// Licensed under the FSL-1.1-NC.

use crate::Result;
use serde::{Deserialize, Serialize};

/// First frame sent on a freshly opened transport: identifies the session
/// to the server. Domain traffic after this frame is opaque to this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthFrame {
    #[serde(rename = "type")]
    pub kind: String,
    pub token: String,
}

impl AuthFrame {
    pub const KIND: &'static str = "auth";

    pub fn new(token: impl Into<String>) -> Self {
        Self {
            kind: Self::KIND.to_string(),
            token: token.into(),
        }
    }

    pub fn is_auth(&self) -> bool {
        self.kind == Self::KIND
    }

    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_frame_wire_shape() {
        let frame = AuthFrame::new("tok-1");
        let text = frame.to_text().unwrap();
        assert_eq!(text, r#"{"type":"auth","token":"tok-1"}"#);

        let parsed: AuthFrame = serde_json::from_str(&text).unwrap();
        assert!(parsed.is_auth());
        assert_eq!(parsed.token, "tok-1");
    }
}
