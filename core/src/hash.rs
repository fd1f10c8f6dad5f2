//! Password digest contract
//!
//! Operator and restart passwords are stored in the configuration as
//! `$ALGO$hexdigest`. Only the digest algorithms below are understood; the
//! rest of the daemon treats hashing as this one function.

use sha2::{Digest, Sha256, Sha512};

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_uppercase().as_str() {
            "SHA256" => Some(HashAlgorithm::Sha256),
            "SHA512" => Some(HashAlgorithm::Sha512),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "SHA256",
            HashAlgorithm::Sha512 => "SHA512",
        }
    }
}

/// Compute the hex digest of `input` under `algo`.
pub fn calculate(algo: HashAlgorithm, input: &str) -> String {
    match algo {
        HashAlgorithm::Sha256 => hex(&Sha256::digest(input.as_bytes())),
        HashAlgorithm::Sha512 => hex(&Sha512::digest(input.as_bytes())),
    }
}

/// Format a password for storage in the configuration file.
pub fn format_password(algo: HashAlgorithm, password: &str) -> String {
    format!("${}${}", algo.tag(), calculate(algo, password))
}

/// Check `candidate` against a stored password.
///
/// A stored value of the form `$ALGO$hex` is compared by digest; anything
/// else is compared as plaintext.
pub fn verify_password(stored: &str, candidate: &str) -> bool {
    if let Some(rest) = stored.strip_prefix('$') {
        if let Some((tag, digest)) = rest.split_once('$') {
            if let Some(algo) = HashAlgorithm::from_tag(tag) {
                return calculate(algo, candidate).eq_ignore_ascii_case(digest);
            }
            // Unknown algorithm tags never match.
            return false;
        }
    }
    stored == candidate
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        // SHA-256 of "abc"
        assert_eq!(
            calculate(HashAlgorithm::Sha256, "abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_verify_hashed() {
        let stored = format_password(HashAlgorithm::Sha256, "hunter2");
        assert!(stored.starts_with("$SHA256$"));
        assert!(verify_password(&stored, "hunter2"));
        assert!(!verify_password(&stored, "hunter3"));
    }

    #[test]
    fn test_verify_plaintext_fallback() {
        assert!(verify_password("secret", "secret"));
        assert!(!verify_password("secret", "other"));
    }

    #[test]
    fn test_unknown_algorithm_never_matches() {
        assert!(!verify_password("$MD4$abcdef", "abcdef"));
    }
}
