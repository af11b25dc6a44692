// Copyright (c) 2026 Roman Barinov <rbarinov@gmail.com>
// Licensed under the FSL-1.1-NC.

pub mod credential;
pub mod error;
pub mod protocol;

pub use credential::Credential;
pub use error::{Error, Result};
pub use protocol::AuthFrame;
