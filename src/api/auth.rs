//! Shared-secret check for inbound quiz tasks.
//!
//! The secret arrives in the request body and doubles as a credential
//! forwarded to the quiz's submission endpoint, so there is no separate
//! token scheme here. Comparison is constant-time to avoid leaking the
//! configured secret through response timing.

fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();
    if a_bytes.len() != b_bytes.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for i in 0..a_bytes.len() {
        diff |= a_bytes[i] ^ b_bytes[i];
    }
    diff == 0
}

/// True iff the request secret matches the configured secret. An empty
/// configured secret never matches.
pub fn verify_secret(provided: &str, expected: &str) -> bool {
    !expected.is_empty() && constant_time_eq(provided, expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_secret_passes() {
        assert!(verify_secret("s3cret", "s3cret"));
    }

    #[test]
    fn mismatched_secret_fails() {
        assert!(!verify_secret("wrong", "s3cret"));
        assert!(!verify_secret("s3cres", "s3cret"));
        assert!(!verify_secret("s3cret ", "s3cret"));
    }

    #[test]
    fn empty_configured_secret_fails_closed() {
        assert!(!verify_secret("", ""));
        assert!(!verify_secret("anything", ""));
    }
}
