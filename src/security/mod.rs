//! Request security
//!
//! The only protection the HTTP surface has is a shared access code.

mod access_code;

pub use access_code::{AccessGuard, INVALID_CODE_MESSAGE};
