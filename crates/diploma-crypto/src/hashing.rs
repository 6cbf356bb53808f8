/// BLAKE3 hash (32 bytes).
pub type Hash = [u8; 32];

/// Hash arbitrary data using BLAKE3.
pub fn hash(data: &[u8]) -> Hash {
    *blake3::hash(data).as_bytes()
}

/// Hex-encoded BLAKE3 digest, used as a lookup key for bearer tokens so the
/// raw token is never held at rest.
pub fn hash_hex(data: &[u8]) -> String {
    hex::encode(hash(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_deterministic() {
        assert_eq!(hash(b"session token"), hash(b"session token"));
    }

    #[test]
    fn test_hash_different_inputs() {
        assert_ne!(hash(b"token A"), hash(b"token B"));
    }

    #[test]
    fn test_hash_hex_length() {
        assert_eq!(hash_hex(b"").len(), 64);
    }
}
