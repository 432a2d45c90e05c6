//! Shared-secret access code check for the /api endpoints

use crate::error::ErrorBody;
use sha2::{Digest, Sha256};

pub const INVALID_CODE_MESSAGE: &str = "Invalid or missing code";

/// Validates the `code` query parameter
pub struct AccessGuard {
    expected_digest: [u8; 32],
}

impl AccessGuard {
    pub fn new(expected_code: &str) -> Self {
        Self {
            expected_digest: digest(expected_code),
        }
    }

    /// Check a submitted code.
    ///
    /// Both sides are hashed to a fixed length and compared without an
    /// early exit, so timing does not reveal a matching prefix.
    pub fn validate(&self, submitted: Option<&str>) -> Result<(), ErrorBody> {
        let Some(submitted) = submitted.filter(|c| !c.is_empty()) else {
            tracing::warn!("Invalid access code attempt: missing");
            return Err(ErrorBody::new(INVALID_CODE_MESSAGE));
        };

        let candidate = digest(submitted);
        let diff = candidate
            .iter()
            .zip(self.expected_digest.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));

        if diff != 0 {
            tracing::warn!("Invalid access code attempt ({} chars)", submitted.len());
            return Err(ErrorBody::new(INVALID_CODE_MESSAGE));
        }

        tracing::debug!("Access code validation successful");
        Ok(())
    }
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}
