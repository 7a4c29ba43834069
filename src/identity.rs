use chrono::Utc;
use uuid::Uuid;

/// Largest integer a JSON consumer can represent exactly (2^53 - 1)
pub const MAX_SAFE_ID: i64 = 9_007_199_254_740_991;

/// Derives a stable numeric id from a 24-char hex object identifier.
///
/// The first 8 hex chars are the creation timestamp and the last 8 the
/// insertion counter. Their sum is positive and well below the safe-integer
/// range, so the primary path is pure. Returns None when the identifier is
/// not a 24-char hex string.
pub fn derive_post_id(oid: &str) -> Option<i64> {
    if oid.len() != 24 || !oid.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let timestamp = u32::from_str_radix(&oid[0..8], 16).ok()?;
    let counter = u32::from_str_radix(&oid[16..24], 16).ok()?;

    let id = timestamp as i64 + counter as i64;
    if id == 0 || id > MAX_SAFE_ID {
        return Some(checksum_id(oid.as_bytes()));
    }

    Some(id)
}

/// Deterministic fallback id for identifiers that miss the primary path.
/// FNV-1a folded into 1..=MAX_SAFE_ID, so the result is always a positive
/// safe integer and repeated calls agree.
pub fn checksum_id(buf: &[u8]) -> i64 {
    let hash = fnv1a64(buf);
    (hash % (MAX_SAFE_ID as u64)) as i64 + 1
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    let mut hash = FNV_OFFSET;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Mints an object identifier for a newly stored document: 8 hex chars of
/// unix-time seconds followed by 16 random hex chars.
pub fn new_object_id() -> String {
    let secs = Utc::now().timestamp() as u32;
    let tail = Uuid::new_v4().simple().to_string();
    format!("{:08x}{}", secs, &tail[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_from_object_id() {
        // timestamp half + counter half
        let id = derive_post_id("507f1f77bcf86cd799439011").unwrap();
        assert_eq!(id, 0x507f1f77i64 + 0x99439011i64);
    }

    #[test]
    fn test_derive_is_deterministic() {
        let a = derive_post_id("65a1b2c3d4e5f60718293a4b").unwrap();
        let b = derive_post_id("65a1b2c3d4e5f60718293a4b").unwrap();
        assert_eq!(a, b);
        assert!(a > 0);
        assert!(a <= MAX_SAFE_ID);
    }

    #[test]
    fn test_derive_rejects_invalid() {
        assert_eq!(derive_post_id(""), None);
        assert_eq!(derive_post_id("507f1f77"), None);
        assert_eq!(derive_post_id("not-an-object-identifier!"), None);
        assert_eq!(derive_post_id("507f1f77bcf86cd79943901g"), None);
    }

    #[test]
    fn test_zero_sum_uses_checksum() {
        let id = derive_post_id("000000000000000000000000").unwrap();
        assert!(id > 0);
        assert!(id <= MAX_SAFE_ID);
        assert_eq!(id, checksum_id(b"000000000000000000000000"));
    }

    #[test]
    fn test_checksum_range() {
        for buf in ["", "a", "hello world", "65a1b2c3d4e5f60718293a4b"] {
            let id = checksum_id(buf.as_bytes());
            assert!(id >= 1);
            assert!(id <= MAX_SAFE_ID);
        }
    }

    #[test]
    fn test_new_object_id_shape() {
        let oid = new_object_id();
        assert_eq!(oid.len(), 24);
        assert!(oid.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_ne!(oid, new_object_id());
    }
}
