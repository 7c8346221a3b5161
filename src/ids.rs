// src/ids.rs
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

pub const DEFAULT_ID_BYTES: usize = 12;

/// Generate an opaque record id like `req_3q2X...` using the OS RNG.
/// This is what the write path should call.
pub fn generate_id(prefix: &str) -> String {
    let mut rng = OsRng;
    generate_id_with(&mut rng, prefix, DEFAULT_ID_BYTES)
}

/// Prefix + URL-safe base64 (no padding) of `nbytes` random bytes.
pub fn generate_id_with<R: RngCore>(rng: &mut R, prefix: &str, nbytes: usize) -> String {
    let mut buf = vec![0u8; nbytes];
    rng.fill_bytes(&mut buf);
    format!(
        "{prefix}_{}",
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&buf)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn id_is_prefixed_and_url_safe() {
        let mut rng = StdRng::seed_from_u64(123);
        let id = generate_id_with(&mut rng, "req", 12);

        let (prefix, rest) = id.split_once('_').unwrap();
        assert_eq!(prefix, "req");
        assert_eq!(rest.len(), 16); // 12 bytes => 16 chars
        assert!(rest
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn ids_differ() {
        assert_ne!(generate_id("prv"), generate_id("prv"));
    }
}
