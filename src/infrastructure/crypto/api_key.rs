//! API key generation and hashing
//!
//! Only SHA-256 hex digests are kept in configuration; the plain key is
//! shown once when generated.

use rand::Rng;
use sha2::{Digest, Sha256};

/// API key prefix for identification
const API_KEY_PREFIX: &str = "kyr_";

/// Result of API key generation
#[derive(Debug, Clone)]
pub struct GeneratedApiKey {
    /// The full API key (only shown once!)
    pub key: String,
    /// Value for `key_hash` in `[[api_keys]]`
    pub key_hash: String,
}

/// Lowercase ASCII slug, max 24 chars: "Hotel Kadıköy" → "hotel-kad-k-y"
fn slugify_name(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let trimmed = slug.trim_matches('-');
    let cut: String = trimmed.chars().take(24).collect();
    cut.trim_end_matches('-').to_string()
}

/// Generate a new API key: `kyr_<name-slug>_<random-hex>`
pub fn generate_api_key(name: &str) -> GeneratedApiKey {
    let random_bytes: [u8; 16] = rand::thread_rng().gen();
    let random_hex = hex::encode(random_bytes);

    let slug = slugify_name(name);
    let key = if slug.is_empty() {
        format!("{}{}", API_KEY_PREFIX, random_hex)
    } else {
        format!("{}{}_{}", API_KEY_PREFIX, slug, random_hex)
    };
    let key_hash = hash_api_key(&key);

    GeneratedApiKey { key, key_hash }
}

/// Hash an API key for storage using SHA-256
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Verify an API key against a stored hash
pub fn verify_api_key(key: &str, stored_hash: &str) -> bool {
    hash_api_key(key).eq_ignore_ascii_case(stored_hash.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_verifies_against_its_hash() {
        let generated = generate_api_key("Hotel Kadikoy");
        assert!(generated.key.starts_with("kyr_hotel-kadikoy_"));
        assert_eq!(generated.key_hash.len(), 64);
        assert!(verify_api_key(&generated.key, &generated.key_hash));
        assert!(!verify_api_key("kyr_other", &generated.key_hash));
    }

    #[test]
    fn slug_collapses_separators() {
        assert_eq!(slugify_name("  My  Front--Desk "), "my-front-desk");
        assert_eq!(slugify_name("***"), "");
    }

    #[test]
    fn hash_is_stable_hex() {
        assert_eq!(
            hash_api_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
