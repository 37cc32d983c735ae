// src/auth/password.rs

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest of a password, as stored in APP_PASSWORD_HASH.
pub fn digest_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare two byte strings without short-circuiting on the first mismatch.
/// Lengths still leak; both inputs here are fixed-length hex digests.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Verify a submitted password against a stored hex digest.
pub fn verify_digest(password: &str, reference_hex: &str) -> bool {
    let computed = digest_password(password);
    constant_time_eq(
        computed.as_bytes(),
        reference_hex.to_ascii_lowercase().as_bytes(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable_sha256_hex() {
        // echo -n "secret123" | sha256sum
        assert_eq!(
            digest_password("secret123"),
            "fcf730b6d95236ecd3c9fc2d92d7b6b2bb061514961aec041d6c7a7192f592e4"
        );
    }

    #[test]
    fn verify_digest_accepts_match_and_rejects_near_miss() {
        let reference = digest_password("secret123");
        assert!(verify_digest("secret123", &reference));
        assert!(!verify_digest("secret1234", &reference));
    }

    #[test]
    fn verify_digest_is_case_insensitive_on_reference() {
        let reference = digest_password("secret123").to_uppercase();
        assert!(verify_digest("secret123", &reference));
    }

    #[test]
    fn constant_time_eq_handles_length_mismatch() {
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"abc", b"abc"));
    }
}
