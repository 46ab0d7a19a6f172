//! Salted digests for the per-comment password.
//!
//! Stored form: `hex(salt) ":" hex(digest)` where the digest is a blake3
//! derived key over `salt || password`.

use anyhow::{anyhow, Result};
use rand::fill;

const DIGEST_CONTEXT: &str = "trendly 2024 comment password v1";
const SALT_LEN: usize = 16;

/// Longest password accepted at submission time, in characters.
pub const PASSWORD_MAX_CHARS: usize = 40;

fn digest(salt: &[u8], password: &str) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new_derive_key(DIGEST_CONTEXT);
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize()
}

pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    fill(&mut salt[..]);
    format!("{}:{}", hex::encode(salt), digest(&salt, password).to_hex())
}

pub fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let (salt_hex, digest_hex) = stored
        .split_once(':')
        .ok_or_else(|| anyhow!("malformed password digest"))?;
    let salt = hex::decode(salt_hex)?;
    let expected = blake3::Hash::from_hex(digest_hex).map_err(|e| anyhow!("malformed password digest: {}", e))?;
    // `blake3::Hash` equality is constant-time
    Ok(digest(&salt, password) == expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_matching_password() {
        let stored = hash_password("hunter2");
        assert!(verify_password("hunter2", &stored).unwrap());
        assert!(!verify_password("hunter3", &stored).unwrap());
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("pw");
        let b = hash_password("pw");
        assert_ne!(a, b);
        assert!(verify_password("pw", &a).unwrap());
        assert!(verify_password("pw", &b).unwrap());
    }

    #[test]
    fn stored_form_never_contains_plaintext() {
        let stored = hash_password("plaintext-secret");
        assert!(!stored.contains("plaintext-secret"));
        assert_eq!(stored.len(), SALT_LEN * 2 + 1 + 64);
    }

    #[test]
    fn malformed_digest_is_an_error() {
        assert!(verify_password("pw", "no-separator").is_err());
        assert!(verify_password("pw", "zz:00").is_err());

        let stored = hash_password("pw");
        let (salt_hex, _) = stored.split_once(':').unwrap();
        assert!(verify_password("pw", &format!("{}:abcd", salt_hex)).is_err());
    }

    #[test]
    fn tampered_digest_does_not_verify() {
        let stored = hash_password("pw");
        let mut tampered = stored.clone();
        let last = if tampered.ends_with('0') { "1" } else { "0" };
        tampered.replace_range(tampered.len() - 1.., last);
        assert!(verify_password("pw", &stored).unwrap());
        assert!(!verify_password("pw", &tampered).unwrap());
    }
}
